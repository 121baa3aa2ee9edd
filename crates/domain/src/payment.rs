//! Payment model and state machine.

use chrono::{DateTime, Utc};
use common::{Money, PassengerId, PaymentId, TicketId};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// How the passenger paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    Card,
    Cash,
    MobileWallet,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Cash => "cash",
            PaymentMethod::MobileWallet => "mobile-wallet",
        };
        write!(f, "{s}")
    }
}

/// The status of a payment.
///
/// State transitions:
/// ```text
/// Initiated ──► Confirmed ──► Refunded
///      │
///      └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Authorization in flight.
    #[default]
    Initiated,

    /// Authorization succeeded (the only refundable state).
    Confirmed,

    /// Authorization declined (terminal).
    Failed,

    /// Confirmed payment returned to the passenger (terminal).
    Refunded,
}

impl PaymentStatus {
    /// Returns true if a refund is allowed from this status.
    pub fn can_refund(&self) -> bool {
        matches!(self, PaymentStatus::Confirmed)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Initiated => "Initiated",
            PaymentStatus::Confirmed => "Confirmed",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment against exactly one ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// Unique payment identifier.
    pub id: PaymentId,

    /// The ticket this payment settles.
    pub ticket_id: TicketId,

    /// The paying passenger.
    pub passenger_id: PassengerId,

    /// The amount charged.
    pub amount: Money,

    /// Payment method used.
    pub method: PaymentMethod,

    /// Current status.
    pub status: PaymentStatus,

    /// When the payment was initiated.
    pub created_at: DateTime<Utc>,

    /// When the payment reached a final outcome, if it has.
    pub processed_at: Option<DateTime<Utc>>,

    /// Failure or refund reason, when applicable.
    pub reason: Option<String>,

    /// False when the synchronous mark-paid call to the ticket service
    /// exhausted its retries; such payments need reconciliation.
    pub ticket_synced: bool,
}

impl Payment {
    /// Creates a payment in `Initiated` status.
    ///
    /// Rejects non-positive amounts before any authorization attempt.
    pub fn initiate(
        ticket_id: TicketId,
        passenger_id: PassengerId,
        amount: Money,
        method: PaymentMethod,
    ) -> Result<Self, DomainError> {
        if !amount.is_positive() {
            return Err(DomainError::NonPositiveAmount(amount.cents()));
        }
        Ok(Self {
            id: PaymentId::new(),
            ticket_id,
            passenger_id,
            amount,
            method,
            status: PaymentStatus::Initiated,
            created_at: Utc::now(),
            processed_at: None,
            reason: None,
            ticket_synced: false,
        })
    }

    /// Records a successful authorization.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Initiated {
            return Err(DomainError::InvalidPaymentState {
                operation: "confirm",
                status: self.status,
            });
        }
        self.status = PaymentStatus::Confirmed;
        self.processed_at = Some(now);
        Ok(())
    }

    /// Records a declined authorization with its reason.
    pub fn fail(&mut self, now: DateTime<Utc>, reason: impl Into<String>) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Initiated {
            return Err(DomainError::InvalidPaymentState {
                operation: "fail",
                status: self.status,
            });
        }
        self.status = PaymentStatus::Failed;
        self.processed_at = Some(now);
        self.reason = Some(reason.into());
        Ok(())
    }

    /// Refunds a confirmed payment, recording the reason.
    ///
    /// Refunding does not touch the ticket; that linkage is an external
    /// reconciliation concern.
    pub fn refund(&mut self, now: DateTime<Utc>, reason: impl Into<String>) -> Result<(), DomainError> {
        if !self.status.can_refund() {
            return Err(DomainError::InvalidPaymentState {
                operation: "refund",
                status: self.status,
            });
        }
        self.status = PaymentStatus::Refunded;
        self.processed_at = Some(now);
        self.reason = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initiated() -> Payment {
        Payment::initiate(
            TicketId::new(),
            PassengerId::new(),
            Money::from_cents(1500),
            PaymentMethod::Card,
        )
        .unwrap()
    }

    #[test]
    fn initiate_rejects_non_positive_amount() {
        let result = Payment::initiate(
            TicketId::new(),
            PassengerId::new(),
            Money::zero(),
            PaymentMethod::Cash,
        );
        assert!(matches!(result, Err(DomainError::NonPositiveAmount(0))));
    }

    #[test]
    fn confirm_sets_status_and_processed_time() {
        let mut payment = initiated();
        payment.confirm(Utc::now()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Confirmed);
        assert!(payment.processed_at.is_some());
    }

    #[test]
    fn fail_records_reason() {
        let mut payment = initiated();
        payment.fail(Utc::now(), "declined").unwrap();
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(payment.reason.as_deref(), Some("declined"));
    }

    #[test]
    fn refund_requires_confirmed() {
        let mut payment = initiated();
        assert!(matches!(
            payment.refund(Utc::now(), "oops"),
            Err(DomainError::InvalidPaymentState { .. })
        ));

        payment.confirm(Utc::now()).unwrap();
        payment.refund(Utc::now(), "trip cancelled").unwrap();
        assert_eq!(payment.status, PaymentStatus::Refunded);
    }

    #[test]
    fn refund_is_single_shot() {
        let mut payment = initiated();
        payment.confirm(Utc::now()).unwrap();
        payment.refund(Utc::now(), "first").unwrap();
        assert!(matches!(
            payment.refund(Utc::now(), "second"),
            Err(DomainError::InvalidPaymentState { .. })
        ));
    }

    #[test]
    fn failed_payment_cannot_confirm() {
        let mut payment = initiated();
        payment.fail(Utc::now(), "declined").unwrap();
        assert!(payment.confirm(Utc::now()).is_err());
    }

    #[test]
    fn payment_serialization_roundtrip() {
        let payment = initiated();
        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["status"], "Initiated");
        assert_eq!(json["method"], "card");
        assert_eq!(json["ticket_synced"], false);

        let back: Payment = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, payment.id);
    }
}
