//! HTTP API server with observability for the transit ticketing
//! choreography.
//!
//! Exposes the ticket, payment, and notification operations over REST,
//! with structured logging (tracing) and Prometheus metrics. The binary
//! also runs the consumer workers that drive the cross-service
//! choreography over the in-memory bus.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use bus::{EventBus, InMemoryBus, topics};
use services::{
    ConsumerWorker, LocalTicketGateway, NotificationDispatcher, PaymentCoordinator,
    SeatInventoryConsumer, TicketService, TracingDelivery, WorkerHandle,
};
use store::{DocumentStore, InMemoryDocumentStore};

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + 'static, B: EventBus + 'static>(
    state: Arc<AppState<S, B>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/tickets", post(routes::tickets::create::<S, B>))
        .route("/tickets/{id}", get(routes::tickets::get::<S, B>))
        .route(
            "/tickets/{id}/validate",
            post(routes::tickets::validate::<S, B>),
        )
        .route(
            "/tickets/{id}/payments",
            get(routes::payments::list_for_ticket::<S, B>),
        )
        .route("/payments", post(routes::payments::create::<S, B>))
        .route("/payments/{id}", get(routes::payments::get::<S, B>))
        .route(
            "/payments/{id}/refund",
            post(routes::payments::refund::<S, B>),
        )
        .route(
            "/notifications",
            post(routes::notifications::create::<S, B>),
        )
        .route(
            "/notifications/{id}/read",
            post(routes::notifications::mark_read::<S, B>),
        )
        .route(
            "/passengers/{id}/notifications",
            get(routes::notifications::list_for_passenger::<S, B>),
        )
        .route("/trips", post(routes::trips::create::<S, B>))
        .route("/trips/{id}/seats", get(routes::trips::seats::<S, B>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state backed by the in-memory store
/// and bus.
pub fn create_default_state() -> (
    Arc<AppState<InMemoryDocumentStore, InMemoryBus>>,
    Arc<InMemoryBus>,
) {
    let store = Arc::new(InMemoryDocumentStore::new());
    let bus = Arc::new(InMemoryBus::new());

    let tickets = Arc::new(TicketService::new(store.clone(), bus.clone()));
    let payments = PaymentCoordinator::new(
        store.clone(),
        bus.clone(),
        LocalTicketGateway::new(tickets.clone()),
    );
    let inventory = Arc::new(SeatInventoryConsumer::new(store.clone(), bus.clone()));
    let notifications = Arc::new(NotificationDispatcher::new(store.clone(), TracingDelivery));

    let state = Arc::new(AppState {
        tickets,
        payments,
        inventory,
        notifications,
    });
    (state, bus)
}

/// Spawns the consumer workers that drive the choreography.
///
/// One worker per subscription, each with its own consumer group: the
/// seat-inventory decrementer on the purchase topic, and the notification
/// dispatcher on the payment, schedule, disruption, and validation
/// topics.
pub fn spawn_workers<S: DocumentStore + 'static, B: EventBus + 'static>(
    state: &Arc<AppState<S, B>>,
    bus: Arc<B>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> Vec<WorkerHandle> {
    let mut workers = Vec::new();
    workers.push(
        ConsumerWorker::new(bus.clone(), topics::TICKET_PURCHASE, "seat-inventory")
            .with_poll_interval(poll_interval)
            .spawn(state.inventory.clone(), shutdown.clone()),
    );
    for (topic, group) in [
        (topics::PAYMENT_PROCESSED, "notify-payments"),
        (topics::SCHEDULE_UPDATES, "notify-schedule"),
        (topics::SERVICE_DISRUPTIONS, "notify-disruptions"),
        (topics::TICKET_VALIDATIONS, "notify-validations"),
    ] {
        workers.push(
            ConsumerWorker::new(bus.clone(), topic, group)
                .with_poll_interval(poll_interval)
                .spawn(state.notifications.clone(), shutdown.clone()),
        );
    }
    workers
}
