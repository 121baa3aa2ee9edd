//! Per-trip seat inventory record.

use common::TripId;
use serde::{Deserialize, Serialize};

/// Available-seat count at or below which a low-seat alert is emitted.
pub const LOW_SEAT_THRESHOLD: u32 = 5;

/// Seat counts for one trip.
///
/// `available` never exceeds `total` and never goes negative: adjustments
/// clamp rather than error, since oversell prevention happens before ticket
/// issuance, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatInventory {
    /// The trip this inventory belongs to.
    pub trip_id: TripId,

    /// Total seats, fixed at trip creation.
    pub total_seats: u32,

    /// Seats still available.
    pub available_seats: u32,
}

impl SeatInventory {
    /// Creates inventory for a new trip with all seats available.
    pub fn new(trip_id: TripId, total_seats: u32) -> Self {
        Self {
            trip_id,
            total_seats,
            available_seats: total_seats,
        }
    }

    /// Applies a signed seat delta, clamped to `[0, total_seats]`.
    ///
    /// Returns the new available count.
    pub fn adjust(&mut self, delta: i64) -> u32 {
        let adjusted = i64::from(self.available_seats) + delta;
        let clamped = adjusted.clamp(0, i64::from(self.total_seats));
        self.available_seats = clamped as u32;
        self.available_seats
    }

    /// Returns true if the available count warrants a low-seat alert.
    pub fn is_low(&self) -> bool {
        self.available_seats <= LOW_SEAT_THRESHOLD
    }
}
