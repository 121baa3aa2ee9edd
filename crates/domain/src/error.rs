//! Domain error types.

use thiserror::Error;

use crate::{PaymentStatus, TicketStatus};

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested ticket kind is not in the fixed set.
    #[error("Unknown ticket kind: '{0}'")]
    UnknownTicketKind(String),

    /// A ticket operation was attempted from a status that does not allow it.
    #[error("Ticket operation '{operation}' not allowed from status {status}")]
    InvalidTicketState {
        operation: &'static str,
        status: TicketStatus,
    },

    /// A payment operation was attempted from a status that does not allow it.
    #[error("Payment operation '{operation}' not allowed from status {status}")]
    InvalidPaymentState {
        operation: &'static str,
        status: PaymentStatus,
    },

    /// A monetary amount failed validation.
    #[error("Amount must be positive, got {0} cents")]
    NonPositiveAmount(i64),

    /// A multi-ride ticket was requested with zero rides.
    #[error("Multi-ride ticket requires at least one ride")]
    ZeroRides,
}
