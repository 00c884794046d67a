use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowtimeFormat {
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
    #[serde(rename = "IMAX")]
    Imax,
}

/// A screening of a movie on one screen of a cinema.
///
/// `available_seats_count` is owned by the booking transaction: it is set
/// once when the showtime is created and afterwards only moved by the same
/// atomic batches that create and cancel bookings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Showtime {
    pub id: String,
    pub movie_id: String,
    pub cinema_id: String,
    pub screen_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub base_price: i64,
    pub available_seats_count: i64,
    pub format: ShowtimeFormat,
}

impl Showtime {
    pub const AVAILABLE_SEATS_FIELD: &'static str = "available_seats_count";

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }
}
