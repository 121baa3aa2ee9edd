//! Domain layer for the transit ticketing choreography.
//!
//! Owns the Ticket and Payment state machines, the seat inventory record,
//! notification records, and the typed domain events exchanged on the bus.

mod error;
mod events;
mod inventory;
mod notification;
mod payment;
mod ticket;

pub use error::DomainError;
pub use events::{
    DisruptionEvent, PaymentEvent, ScheduleEvent, SeatAlertEvent, TicketEvent, ValidationEvent,
};
pub use inventory::{LOW_SEAT_THRESHOLD, SeatInventory};
pub use notification::{
    DeliveryStatus, NotificationCategory, NotificationRecord, Recipient,
};
pub use payment::{Payment, PaymentMethod, PaymentStatus};
pub use ticket::{DEFAULT_MULTI_RIDE_COUNT, Ticket, TicketKind, TicketStatus};
