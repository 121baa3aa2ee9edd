//! Ticket model and lifecycle state machine.

use chrono::{DateTime, Duration, Utc};
use common::{Money, PassengerId, TicketId, TripId};
use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Ride count used when a multi-ride request does not specify one.
pub const DEFAULT_MULTI_RIDE_COUNT: u32 = 10;

const SINGLE_RIDE_CENTS: i64 = 1500;
const MULTI_RIDE_CENTS_PER_RIDE: i64 = 1200;
const MONTHLY_PASS_CENTS: i64 = 6000;
const ANNUAL_PASS_CENTS: i64 = 60000;

/// The fixed set of ticket kinds the system sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TicketKind {
    SingleRide,
    MultiRide,
    MonthlyPass,
    AnnualPass,
}

impl TicketKind {
    /// Parses a client-supplied kind string.
    ///
    /// Unknown kinds are the `InvalidTicketKind` failure of the issue
    /// operation and must be rejected before any write.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "single-ride" => Ok(TicketKind::SingleRide),
            "multi-ride" => Ok(TicketKind::MultiRide),
            "monthly-pass" => Ok(TicketKind::MonthlyPass),
            "annual-pass" => Ok(TicketKind::AnnualPass),
            other => Err(DomainError::UnknownTicketKind(other.to_string())),
        }
    }

    /// Returns the kind name as the wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketKind::SingleRide => "single-ride",
            TicketKind::MultiRide => "multi-ride",
            TicketKind::MonthlyPass => "monthly-pass",
            TicketKind::AnnualPass => "annual-pass",
        }
    }

    /// Price for this kind; `rides` is only consulted for multi-ride.
    pub fn price(&self, rides: u32) -> Money {
        match self {
            TicketKind::SingleRide => Money::from_cents(SINGLE_RIDE_CENTS),
            TicketKind::MultiRide => {
                Money::from_cents(MULTI_RIDE_CENTS_PER_RIDE).multiply(rides)
            }
            TicketKind::MonthlyPass => Money::from_cents(MONTHLY_PASS_CENTS),
            TicketKind::AnnualPass => Money::from_cents(ANNUAL_PASS_CENTS),
        }
    }

    /// Validity window from issue time.
    pub fn validity(&self) -> Duration {
        match self {
            TicketKind::SingleRide | TicketKind::MultiRide | TicketKind::MonthlyPass => {
                Duration::days(30)
            }
            TicketKind::AnnualPass => Duration::days(365),
        }
    }
}

impl std::fmt::Display for TicketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a ticket in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► Paid ──► Validated
///               ▲          │  (multi-ride with rides left)
///               └──────────┘
/// ```
/// `Validated` is terminal once no rides remain; `Cancelled` and
/// `Refunded` are terminal states driven by the payment side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TicketStatus {
    /// Issued, awaiting payment.
    #[default]
    Created,

    /// Payment confirmed; usable for boarding.
    Paid,

    /// Consumed at boarding (terminal unless rides remain).
    Validated,

    /// Cancelled before use (terminal).
    Cancelled,

    /// Refunded after payment (terminal).
    Refunded,
}

impl TicketStatus {
    /// Returns true if the ticket can be marked paid from this status.
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, TicketStatus::Created | TicketStatus::Paid)
    }

    /// Returns true if the ticket can be validated from this status.
    pub fn can_validate(&self) -> bool {
        matches!(self, TicketStatus::Created | TicketStatus::Paid)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TicketStatus::Validated | TicketStatus::Cancelled | TicketStatus::Refunded
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Created => "Created",
            TicketStatus::Paid => "Paid",
            TicketStatus::Validated => "Validated",
            TicketStatus::Cancelled => "Cancelled",
            TicketStatus::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A transit ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    /// Unique ticket identifier.
    pub id: TicketId,

    /// The passenger the ticket was issued to.
    pub passenger_id: PassengerId,

    /// The kind of ticket.
    pub kind: TicketKind,

    /// The trip this ticket is bound to, if any; passes are trip-less.
    pub trip_id: Option<TripId>,

    /// Human-readable route reference.
    pub route: Option<String>,

    /// The amount charged for the ticket.
    pub amount: Money,

    /// Current lifecycle status.
    pub status: TicketStatus,

    /// When the ticket was issued.
    pub created_at: DateTime<Utc>,

    /// When the ticket was last validated, if ever.
    pub validated_at: Option<DateTime<Utc>>,

    /// When the ticket stops being usable.
    pub expires_at: Option<DateTime<Utc>>,

    /// Rides left; `Some` iff kind is multi-ride, never negative.
    pub remaining_rides: Option<u32>,
}

impl Ticket {
    /// Issues a new ticket in `Created` status, computing amount, expiry,
    /// and the ride counter from the kind.
    pub fn issue(
        passenger_id: PassengerId,
        kind: TicketKind,
        trip_id: Option<TripId>,
        route: Option<String>,
        rides: Option<u32>,
    ) -> Result<Self, DomainError> {
        let rides = match kind {
            TicketKind::MultiRide => {
                let n = rides.unwrap_or(DEFAULT_MULTI_RIDE_COUNT);
                if n == 0 {
                    return Err(DomainError::ZeroRides);
                }
                Some(n)
            }
            _ => None,
        };

        let now = Utc::now();
        Ok(Self {
            id: TicketId::new(),
            passenger_id,
            kind,
            trip_id,
            route,
            amount: kind.price(rides.unwrap_or(1)),
            status: TicketStatus::Created,
            created_at: now,
            validated_at: None,
            expires_at: Some(now + kind.validity()),
            remaining_rides: rides,
        })
    }

    /// Marks the ticket paid. Idempotent: already-paid tickets are a no-op.
    pub fn mark_paid(&mut self) -> Result<(), DomainError> {
        if !self.status.can_mark_paid() {
            return Err(DomainError::InvalidTicketState {
                operation: "mark_paid",
                status: self.status,
            });
        }
        self.status = TicketStatus::Paid;
        Ok(())
    }

    /// Validates the ticket at boarding.
    ///
    /// Multi-ride tickets consume one ride; while rides remain the status
    /// re-opens to `Paid` so the ticket stays usable, and at zero rides it
    /// becomes terminal at `Validated`.
    pub fn validate(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if !self.status.can_validate() {
            return Err(DomainError::InvalidTicketState {
                operation: "validate",
                status: self.status,
            });
        }

        self.status = TicketStatus::Validated;
        self.validated_at = Some(now);

        if let Some(rides) = self.remaining_rides {
            let left = rides.saturating_sub(1);
            self.remaining_rides = Some(left);
            if left > 0 {
                self.status = TicketStatus::Paid;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_the_fixed_kind_set() {
        assert_eq!(TicketKind::parse("single-ride").unwrap(), TicketKind::SingleRide);
        assert_eq!(TicketKind::parse("multi-ride").unwrap(), TicketKind::MultiRide);
        assert_eq!(TicketKind::parse("monthly-pass").unwrap(), TicketKind::MonthlyPass);
        assert_eq!(TicketKind::parse("annual-pass").unwrap(), TicketKind::AnnualPass);
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        let result = TicketKind::parse("teleport");
        assert!(matches!(result, Err(DomainError::UnknownTicketKind(_))));
    }

    #[test]
    fn single_ride_price_and_expiry() {
        let ticket = Ticket::issue(PassengerId::new(), TicketKind::SingleRide, None, None, None)
            .unwrap();
        assert_eq!(ticket.amount, Money::from_cents(1500));
        assert_eq!(ticket.status, TicketStatus::Created);
        assert!(ticket.remaining_rides.is_none());

        let expires = ticket.expires_at.unwrap();
        let days = (expires - ticket.created_at).num_days();
        assert_eq!(days, 30);
    }

    #[test]
    fn multi_ride_priced_per_ride() {
        let ticket = Ticket::issue(
            PassengerId::new(),
            TicketKind::MultiRide,
            None,
            None,
            Some(3),
        )
        .unwrap();
        assert_eq!(ticket.amount, Money::from_cents(3600));
        assert_eq!(ticket.remaining_rides, Some(3));
    }

    #[test]
    fn multi_ride_defaults_to_ten_rides() {
        let ticket =
            Ticket::issue(PassengerId::new(), TicketKind::MultiRide, None, None, None).unwrap();
        assert_eq!(ticket.remaining_rides, Some(10));
        assert_eq!(ticket.amount, Money::from_cents(12000));
    }

    #[test]
    fn multi_ride_with_zero_rides_is_rejected() {
        let result = Ticket::issue(
            PassengerId::new(),
            TicketKind::MultiRide,
            None,
            None,
            Some(0),
        );
        assert!(matches!(result, Err(DomainError::ZeroRides)));
    }

    #[test]
    fn annual_pass_expires_after_a_year() {
        let ticket =
            Ticket::issue(PassengerId::new(), TicketKind::AnnualPass, None, None, None).unwrap();
        let days = (ticket.expires_at.unwrap() - ticket.created_at).num_days();
        assert_eq!(days, 365);
    }

    #[test]
    fn mark_paid_is_idempotent() {
        let mut ticket =
            Ticket::issue(PassengerId::new(), TicketKind::SingleRide, None, None, None).unwrap();
        ticket.mark_paid().unwrap();
        assert_eq!(ticket.status, TicketStatus::Paid);
        ticket.mark_paid().unwrap();
        assert_eq!(ticket.status, TicketStatus::Paid);
    }

    #[test]
    fn mark_paid_fails_from_terminal_status() {
        let mut ticket =
            Ticket::issue(PassengerId::new(), TicketKind::SingleRide, None, None, None).unwrap();
        ticket.mark_paid().unwrap();
        ticket.validate(Utc::now()).unwrap();
        assert!(matches!(
            ticket.mark_paid(),
            Err(DomainError::InvalidTicketState { .. })
        ));
    }

    #[test]
    fn validate_consumes_single_ride_ticket() {
        let mut ticket =
            Ticket::issue(PassengerId::new(), TicketKind::SingleRide, None, None, None).unwrap();
        ticket.mark_paid().unwrap();
        ticket.validate(Utc::now()).unwrap();
        assert_eq!(ticket.status, TicketStatus::Validated);
        assert!(ticket.validated_at.is_some());
    }

    #[test]
    fn validate_fails_once_terminal() {
        let mut ticket =
            Ticket::issue(PassengerId::new(), TicketKind::SingleRide, None, None, None).unwrap();
        ticket.validate(Utc::now()).unwrap();
        assert!(matches!(
            ticket.validate(Utc::now()),
            Err(DomainError::InvalidTicketState { .. })
        ));
    }

    #[test]
    fn multi_ride_counts_down_and_reopens() {
        let mut ticket = Ticket::issue(
            PassengerId::new(),
            TicketKind::MultiRide,
            None,
            None,
            Some(3),
        )
        .unwrap();
        ticket.mark_paid().unwrap();

        ticket.validate(Utc::now()).unwrap();
        assert_eq!(ticket.remaining_rides, Some(2));
        assert_eq!(ticket.status, TicketStatus::Paid);

        ticket.validate(Utc::now()).unwrap();
        assert_eq!(ticket.remaining_rides, Some(1));
        assert_eq!(ticket.status, TicketStatus::Paid);

        ticket.validate(Utc::now()).unwrap();
        assert_eq!(ticket.remaining_rides, Some(0));
        assert_eq!(ticket.status, TicketStatus::Validated);

        assert!(ticket.validate(Utc::now()).is_err());
    }

    #[test]
    fn status_predicates() {
        assert!(TicketStatus::Created.can_validate());
        assert!(TicketStatus::Paid.can_validate());
        assert!(!TicketStatus::Validated.can_validate());
        assert!(!TicketStatus::Cancelled.can_mark_paid());
        assert!(TicketStatus::Refunded.is_terminal());
        assert!(!TicketStatus::Paid.is_terminal());
    }

    #[test]
    fn ticket_serialization_roundtrip() {
        let ticket = Ticket::issue(
            PassengerId::new(),
            TicketKind::MultiRide,
            Some(TripId::new()),
            Some("Line 4".to_string()),
            Some(5),
        )
        .unwrap();
        let json = serde_json::to_value(&ticket).unwrap();
        assert_eq!(json["status"], "Created");
        assert_eq!(json["kind"], "multi-ride");

        let back: Ticket = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, ticket.id);
        assert_eq!(back.remaining_rides, Some(5));
    }
}
