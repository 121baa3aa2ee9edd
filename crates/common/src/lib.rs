//! Shared types for the transit ticketing choreography.
//!
//! Every identifier crossing a service boundary gets its own newtype so a
//! ticket id can never be passed where a passenger id is expected.

mod types;

pub use types::{Money, NotificationId, PassengerId, PaymentId, TicketId, TripId};
