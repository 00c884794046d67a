//! Booking transactions.
//!
//! Creating and cancelling a booking each commit exactly one atomic batch:
//!
//! * create: insert the booking (PENDING), insert one claim per seat keyed by
//!   the seat id, and decrement the showtime's `available_seats_count` under
//!   an `AtLeast` guard;
//! * cancel: flip the status under a guard on the status that was read,
//!   delete the booking's claims, and increment the counter.
//!
//! Seat claims are what makes two overlapping creates mutually exclusive:
//! whichever batch commits second finds a claim id already present and fails
//! as a whole. Availability is still read from live bookings through
//! [`BookedSeatIndex`]; the pre-commit check only produces a friendlier error
//! earlier, it is not what enforces exclusion.

use chrono::Utc;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::auth::Auth;
use crate::error::{BookingError, BookingResult};
use crate::models::{Booking, BookingStatus, SeatClaim, SeatRef, Showtime};
use crate::services::booked_seats::BookedSeatIndex;
use crate::services::{lifecycle, pricing};
use crate::storage::{collections, Change, Document, Filter, Guard, Storage, StorageError, WriteOp};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookingRequest {
    #[validate(length(min = 1))]
    pub showtime_id: String,
    #[validate(length(min = 1))]
    pub movie_id: String,
    #[validate(length(min = 1))]
    pub cinema_id: String,
    #[validate(length(min = 1, message = "select at least one seat"))]
    pub seats: Vec<SeatRef>,
    #[validate(range(min = 1, message = "total amount must be positive"))]
    pub total_amount: i64,
}

#[derive(Clone)]
pub struct BookingService {
    storage: Arc<dyn Storage>,
    index: BookedSeatIndex,
}

impl BookingService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let index = BookedSeatIndex::new(storage.clone());
        Self { storage, index }
    }

    pub fn index(&self) -> &BookedSeatIndex {
        &self.index
    }

    pub async fn create(&self, auth: &dyn Auth, request: BookingRequest) -> BookingResult<Booking> {
        let user_id = auth.current_user_id().ok_or(BookingError::NotAuthenticated)?;
        request.validate()?;
        let seats = selected_seats(&request)?;

        let showtime = self
            .showtime(&request.showtime_id)
            .await?
            .ok_or_else(|| BookingError::validation(format!("showtime {} does not exist", request.showtime_id)))?;
        if showtime.movie_id != request.movie_id {
            return Err(BookingError::validation(format!(
                "showtime {} does not screen movie {}",
                showtime.id, request.movie_id
            )));
        }
        if showtime.cinema_id != request.cinema_id {
            return Err(BookingError::validation(format!(
                "showtime {} is not at cinema {}",
                showtime.id, request.cinema_id
            )));
        }

        let expected = pricing::total(showtime.base_price, &seats)?;
        if expected != request.total_amount {
            return Err(BookingError::validation(format!(
                "total amount {} does not match quoted total {}",
                request.total_amount, expected
            )));
        }

        // Fresh read; the client's seat map may be stale.
        let booked = self.index.booked_seats(&showtime.id).await?;
        let taken: Vec<String> = seats.iter().filter(|s| booked.contains(*s)).map(SeatRef::label).collect();
        if !taken.is_empty() {
            warn!("Showtime {}: seats {:?} already booked", showtime.id, taken);
            return Err(BookingError::SeatConflict { seats: taken });
        }

        let booking = Booking {
            id: Uuid::new_v4().to_string(),
            user_id,
            showtime_id: showtime.id.clone(),
            movie_id: showtime.movie_id.clone(),
            cinema_id: showtime.cinema_id.clone(),
            seats,
            total_amount: expected,
            booking_date: Utc::now(),
            status: BookingStatus::Pending,
        };

        match self.storage.atomic_write(create_ops(&booking)?).await {
            Ok(()) => {
                info!(
                    "Booking {} created for user {}: showtime {}, seats {:?}, total {}",
                    booking.id,
                    booking.user_id,
                    booking.showtime_id,
                    booking.seat_labels(),
                    booking.total_amount
                );
                Ok(booking)
            }
            Err(StorageError::Conflict(reason)) => {
                warn!("Booking for showtime {} lost a seat race: {}", booking.showtime_id, reason);
                Err(self.conflict_for(&booking).await)
            }
            Err(e) => {
                error!("Booking for showtime {} failed to commit: {}", booking.showtime_id, e);
                Err(e.into())
            }
        }
    }

    /// Cancels a PENDING booking and hands its seats back to the showtime.
    pub async fn cancel(&self, booking_id: &str) -> BookingResult<Booking> {
        let booking = self.get(booking_id).await?;
        let to = lifecycle::transition(booking.status, BookingStatus::Cancelled)?;

        let mut ops = vec![status_update(&booking, to)];
        if lifecycle::releases_seats(to) {
            for seat in &booking.seats {
                ops.push(WriteOp::delete(
                    collections::SEAT_CLAIMS,
                    seat.to_string(),
                    vec![Guard::equals(SeatClaim::BOOKING_FIELD, booking.id.as_str())],
                ));
            }
            ops.push(WriteOp::update(
                collections::SHOWTIMES,
                &booking.showtime_id,
                Vec::new(),
                vec![Change::increment(Showtime::AVAILABLE_SEATS_FIELD, booking.seat_count())],
            ));
        }

        self.commit_transition(booking, to, ops).await
    }

    /// PENDING -> CONFIRMED, driven by the payment step.
    pub async fn confirm(&self, booking_id: &str) -> BookingResult<Booking> {
        self.advance(booking_id, BookingStatus::Confirmed).await
    }

    /// CONFIRMED -> COMPLETED, once the showtime is over.
    pub async fn complete(&self, booking_id: &str) -> BookingResult<Booking> {
        self.advance(booking_id, BookingStatus::Completed).await
    }

    /// Applies any lifecycle transition, routing cancellation through [`Self::cancel`].
    pub async fn transition(&self, booking_id: &str, to: BookingStatus) -> BookingResult<Booking> {
        match to {
            BookingStatus::Cancelled => self.cancel(booking_id).await,
            _ => self.advance(booking_id, to).await,
        }
    }

    pub async fn get(&self, booking_id: &str) -> BookingResult<Booking> {
        match self.storage.get(collections::BOOKINGS, booking_id).await? {
            Some(doc) => Ok(doc.decode()?),
            None => Err(BookingError::NotFound { entity: "booking", id: booking_id.to_string() }),
        }
    }

    /// The user's bookings, newest first.
    pub async fn bookings_for_user(&self, user_id: &str) -> BookingResult<Vec<Booking>> {
        let docs = self
            .storage
            .query(collections::BOOKINGS, &[Filter::eq("user_id", user_id)])
            .await?;
        let mut bookings = docs
            .into_iter()
            .map(|doc| doc.decode::<Booking>())
            .collect::<Result<Vec<_>, _>>()?;
        bookings.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        Ok(bookings)
    }

    pub async fn bookings_with_status(&self, status: BookingStatus) -> BookingResult<Vec<Booking>> {
        let docs = self
            .storage
            .query(collections::BOOKINGS, &[Filter::eq(Booking::STATUS_FIELD, status.as_str())])
            .await?;
        Ok(docs
            .into_iter()
            .map(|doc| doc.decode::<Booking>())
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn showtime(&self, showtime_id: &str) -> BookingResult<Option<Showtime>> {
        match self.storage.get(collections::SHOWTIMES, showtime_id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    async fn advance(&self, booking_id: &str, to: BookingStatus) -> BookingResult<Booking> {
        let booking = self.get(booking_id).await?;
        let to = lifecycle::transition(booking.status, to)?;
        let ops = vec![status_update(&booking, to)];
        self.commit_transition(booking, to, ops).await
    }

    async fn commit_transition(
        &self,
        mut booking: Booking,
        to: BookingStatus,
        ops: Vec<WriteOp>,
    ) -> BookingResult<Booking> {
        let from = booking.status;
        match self.storage.atomic_write(ops).await {
            Ok(()) => {
                info!("Booking {} moved {} -> {}", booking.id, from, to);
                booking.status = to;
                Ok(booking)
            }
            Err(StorageError::Conflict(reason)) => {
                // Someone else moved the booking between our read and commit.
                warn!("Booking {} changed concurrently: {}", booking.id, reason);
                let current = match self.get(&booking.id).await {
                    Ok(current) => current.status,
                    Err(e) => {
                        warn!("Could not re-read booking {} after conflict: {}", booking.id, e);
                        from
                    }
                };
                Err(BookingError::InvalidStateTransition { from: current, to })
            }
            Err(e) => {
                error!("Booking {} failed to move {} -> {}: {}", booking.id, from, to, e);
                Err(e.into())
            }
        }
    }

    /// Names the seats that beat us, falling back to the whole selection when
    /// they can no longer be identified.
    async fn conflict_for(&self, booking: &Booking) -> BookingError {
        let taken = match self.index.booked_seats(&booking.showtime_id).await {
            Ok(booked) => booking
                .seats
                .iter()
                .filter(|s| booked.contains(*s))
                .map(SeatRef::label)
                .collect(),
            Err(e) => {
                warn!("Could not re-read booked seats for showtime {}: {}", booking.showtime_id, e);
                Vec::new()
            }
        };

        let seats = if taken.is_empty() { booking.seat_labels() } else { taken };
        BookingError::SeatConflict { seats }
    }
}

/// Checks the selection belongs to the showtime and has no repeats; returns it
/// in seat order.
fn selected_seats(request: &BookingRequest) -> BookingResult<Vec<SeatRef>> {
    let mut unique = BTreeSet::new();
    for seat in &request.seats {
        if seat.showtime_id != request.showtime_id {
            return Err(BookingError::validation(format!(
                "seat {} does not belong to showtime {}",
                seat, request.showtime_id
            )));
        }
        if !unique.insert(seat.clone()) {
            return Err(BookingError::validation(format!("seat {} selected twice", seat.label())));
        }
    }
    Ok(unique.into_iter().collect())
}

fn create_ops(booking: &Booking) -> BookingResult<Vec<WriteOp>> {
    let mut ops = Vec::with_capacity(booking.seats.len() + 2);
    ops.push(WriteOp::insert(collections::BOOKINGS, Document::from_model(&booking.id, booking)?));

    for seat in &booking.seats {
        let claim = SeatClaim {
            seat_id: seat.clone(),
            showtime_id: booking.showtime_id.clone(),
            booking_id: booking.id.clone(),
        };
        ops.push(WriteOp::insert(collections::SEAT_CLAIMS, Document::from_model(seat.to_string(), &claim)?));
    }

    ops.push(WriteOp::update(
        collections::SHOWTIMES,
        &booking.showtime_id,
        vec![Guard::at_least(Showtime::AVAILABLE_SEATS_FIELD, booking.seat_count())],
        vec![Change::increment(Showtime::AVAILABLE_SEATS_FIELD, -booking.seat_count())],
    ));
    Ok(ops)
}

/// Status flip guarded on the status the caller read.
fn status_update(booking: &Booking, to: BookingStatus) -> WriteOp {
    WriteOp::update(
        collections::BOOKINGS,
        &booking.id,
        vec![Guard::equals(Booking::STATUS_FIELD, booking.status.as_str())],
        vec![Change::set(Booking::STATUS_FIELD, to.as_str())],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(seats: &[&str]) -> BookingRequest {
        BookingRequest {
            showtime_id: "s1".to_string(),
            movie_id: "m1".to_string(),
            cinema_id: "c1".to_string(),
            seats: seats.iter().map(|id| id.parse().unwrap()).collect(),
            total_amount: 1,
        }
    }

    #[test]
    fn selection_is_sorted() {
        let seats = selected_seats(&request(&["s1_B_2", "s1_A_10", "s1_A_2"])).unwrap();
        let labels: Vec<String> = seats.iter().map(SeatRef::label).collect();
        assert_eq!(labels, vec!["A2", "A10", "B2"]);
    }

    #[test]
    fn duplicate_seats_are_rejected() {
        let err = selected_seats(&request(&["s1_A_1", "s1_A_1"])).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn seats_of_another_showtime_are_rejected() {
        let err = selected_seats(&request(&["s1_A_1", "s2_A_2"])).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn create_batch_claims_each_seat_and_guards_the_counter() {
        let booking = Booking {
            id: "b1".to_string(),
            user_id: "u1".to_string(),
            showtime_id: "s1".to_string(),
            movie_id: "m1".to_string(),
            cinema_id: "c1".to_string(),
            seats: vec!["s1_A_1".parse().unwrap(), "s1_A_2".parse().unwrap()],
            total_amount: 180_000,
            booking_date: Utc::now(),
            status: BookingStatus::Pending,
        };

        let ops = create_ops(&booking).unwrap();
        assert_eq!(ops.len(), 4);
        let claim_ids: Vec<&str> = ops
            .iter()
            .filter_map(|op| match op {
                WriteOp::Insert { collection, document } if collection == collections::SEAT_CLAIMS => {
                    Some(document.id.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(claim_ids, vec!["s1_A_1", "s1_A_2"]);
        assert_eq!(
            ops.last(),
            Some(&WriteOp::update(
                collections::SHOWTIMES,
                "s1",
                vec![Guard::at_least(Showtime::AVAILABLE_SEATS_FIELD, 2)],
                vec![Change::increment(Showtime::AVAILABLE_SEATS_FIELD, -2)],
            ))
        );
    }

    /// Lets the first `reads_left` point reads through, then fails them; every
    /// batch loses a race.
    struct RacyStorage {
        inner: crate::storage::MemoryStorage,
        reads_left: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Storage for RacyStorage {
        async fn get(&self, collection: &str, id: &str) -> crate::storage::StorageResult<Option<Document>> {
            use std::sync::atomic::Ordering;
            match self.reads_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)) {
                Ok(_) => self.inner.get(collection, id).await,
                Err(_) => Err(StorageError::Unavailable("connection reset".to_string())),
            }
        }

        async fn query(&self, collection: &str, filters: &[Filter]) -> crate::storage::StorageResult<Vec<Document>> {
            self.inner.query(collection, filters).await
        }

        async fn atomic_write(&self, _ops: Vec<WriteOp>) -> crate::storage::StorageResult<()> {
            Err(StorageError::Conflict("status guard failed".to_string()))
        }
    }

    #[tokio::test]
    async fn unreadable_booking_after_a_lost_race_reports_the_status_we_read() {
        let inner = crate::storage::MemoryStorage::new();
        let booking = Booking {
            id: "b1".to_string(),
            user_id: "u1".to_string(),
            showtime_id: "s1".to_string(),
            movie_id: "m1".to_string(),
            cinema_id: "c1".to_string(),
            seats: vec!["s1_A_1".parse().unwrap()],
            total_amount: 90_000,
            booking_date: Utc::now(),
            status: BookingStatus::Pending,
        };
        inner
            .atomic_write(vec![WriteOp::insert(
                collections::BOOKINGS,
                Document::from_model(&booking.id, &booking).unwrap(),
            )])
            .await
            .unwrap();

        let storage = RacyStorage { inner, reads_left: std::sync::atomic::AtomicUsize::new(1) };
        let service = BookingService::new(Arc::new(storage));

        let err = service.confirm("b1").await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::InvalidStateTransition { from: BookingStatus::Pending, to: BookingStatus::Confirmed }
        ));
    }
}
