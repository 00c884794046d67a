use std::collections::HashSet;
use std::sync::Arc;

use crate::models::{Booking, BookingStatus, SeatRef};
use crate::storage::{collections, Filter, Storage, StorageResult};

/// Derives which seats of a showtime are held by live bookings.
///
/// Cancelled bookings do not count. A failed query is returned as an error;
/// callers must not read it as "nothing booked".
#[derive(Clone)]
pub struct BookedSeatIndex {
    storage: Arc<dyn Storage>,
}

impl BookedSeatIndex {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn live_bookings(&self, showtime_id: &str) -> StorageResult<Vec<Booking>> {
        let docs = self
            .storage
            .query(
                collections::BOOKINGS,
                &[
                    Filter::eq("showtime_id", showtime_id),
                    Filter::is_in(Booking::STATUS_FIELD, BookingStatus::LIVE.map(BookingStatus::as_str)),
                ],
            )
            .await?;

        docs.into_iter().map(|doc| doc.decode()).collect()
    }

    pub async fn booked_seats(&self, showtime_id: &str) -> StorageResult<HashSet<SeatRef>> {
        Ok(self
            .live_bookings(showtime_id)
            .await?
            .into_iter()
            .flat_map(|booking| booking.seats)
            .collect())
    }
}
