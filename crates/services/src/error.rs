use common::{NotificationId, PaymentId, TicketId};
use thiserror::Error;

/// Errors surfaced by the service layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No ticket exists with the given id.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// No payment exists with the given id.
    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    /// No notification exists with the given id.
    #[error("Notification not found: {0}")]
    NotificationNotFound(NotificationId),

    /// The operation is not allowed from the entity's current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The request failed validation before any write.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator (store, bus, gateway) failed.
    #[error("Downstream failure: {0}")]
    Downstream(String),

    /// A domain rule was violated.
    #[error(transparent)]
    Domain(#[from] domain::DomainError),
}

impl ServiceError {
    /// Returns true if retrying the operation could succeed.
    ///
    /// Bus handlers use this to decide between redelivery (transient) and
    /// dropping a poison message (permanent).
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Downstream(_))
    }
}

impl From<store::StoreError> for ServiceError {
    fn from(err: store::StoreError) -> Self {
        ServiceError::Downstream(err.to_string())
    }
}

impl From<bus::BusError> for ServiceError {
    fn from(err: bus::BusError) -> Self {
        ServiceError::Downstream(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::InvalidInput(format!("malformed payload: {err}"))
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
