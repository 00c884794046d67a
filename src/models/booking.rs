use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SeatRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    /// Statuses whose bookings hold their seats.
    pub const LIVE: [BookingStatus; 3] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn is_live(self) -> bool {
        self != BookingStatus::Cancelled
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: String,
    pub showtime_id: String,
    pub movie_id: String,
    pub cinema_id: String,
    pub seats: Vec<SeatRef>,
    pub total_amount: i64,
    pub booking_date: DateTime<Utc>,
    pub status: BookingStatus,
}

impl Booking {
    pub const STATUS_FIELD: &'static str = "status";

    pub fn seat_labels(&self) -> Vec<String> {
        self.seats.iter().map(SeatRef::label).collect()
    }

    pub fn seat_count(&self) -> i64 {
        self.seats.len() as i64
    }
}

/// Uniqueness marker for one seat held by a live booking; its document id is
/// the seat id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatClaim {
    pub seat_id: SeatRef,
    pub showtime_id: String,
    pub booking_id: String,
}

impl SeatClaim {
    pub const BOOKING_FIELD: &'static str = "booking_id";
}
