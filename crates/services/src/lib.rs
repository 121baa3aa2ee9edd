//! Service layer for the transit ticketing choreography.
//!
//! Four components cooperate through the bus, never through each other's
//! collections: [`TicketService`] owns the ticket lifecycle,
//! [`PaymentCoordinator`] charges and refunds, [`SeatInventoryConsumer`]
//! decrements seats on purchases, and [`NotificationDispatcher`] fans
//! events out to passengers. [`ConsumerWorker`] runs any of the consumers
//! as a polling loop with commit-after-success semantics.

mod error;
mod inventory;
mod notifications;
mod payments;
mod tickets;
mod worker;

pub use error::{Result, ServiceError};
pub use inventory::SeatInventoryConsumer;
pub use notifications::{
    DeliveryChannel, NotificationDispatcher, SendNotificationRequest, TracingDelivery,
};
pub use payments::{
    ChargeRequest, LocalTicketGateway, PaymentCoordinator, RetryPolicy, TicketGateway,
};
pub use tickets::{IssueTicketRequest, TicketService};
pub use worker::{ConsumerHandler, ConsumerWorker, WorkerHandle};
