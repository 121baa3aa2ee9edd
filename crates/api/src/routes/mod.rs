//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod notifications;
pub mod payments;
pub mod tickets;
pub mod trips;

use std::sync::Arc;

use bus::EventBus;
use services::{
    LocalTicketGateway, NotificationDispatcher, PaymentCoordinator, SeatInventoryConsumer,
    TicketService, TracingDelivery,
};
use store::DocumentStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore, B: EventBus> {
    pub tickets: Arc<TicketService<S, B>>,
    pub payments: PaymentCoordinator<S, B, LocalTicketGateway<S, B>>,
    pub inventory: Arc<SeatInventoryConsumer<S, B>>,
    pub notifications: Arc<NotificationDispatcher<S, TracingDelivery>>,
}
