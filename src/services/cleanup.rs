use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info};

use crate::error::BookingError;
use crate::models::{Booking, BookingStatus, Showtime};
use crate::services::booking::BookingService;
use crate::services::showtimes::ShowtimeCatalog;

/// Periodic, system-initiated lifecycle transitions.
///
/// Every move goes through [`BookingService`], so a sweep racing a user
/// action simply loses with `InvalidStateTransition` and skips that booking.
#[derive(Clone)]
pub struct LifecycleSweeper {
    bookings: BookingService,
    showtimes: ShowtimeCatalog,
    pending_hold: Duration,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub expired: Vec<Booking>,
    pub completed: Vec<Booking>,
}

impl SweepReport {
    /// Showtimes whose seat maps changed during the sweep.
    pub fn released_showtimes(&self) -> BTreeSet<String> {
        self.expired.iter().map(|b| b.showtime_id.clone()).collect()
    }

    pub fn total(&self) -> usize {
        self.expired.len() + self.completed.len()
    }
}

impl LifecycleSweeper {
    pub fn new(bookings: BookingService, showtimes: ShowtimeCatalog, pending_hold: Duration) -> Self {
        Self { bookings, showtimes, pending_hold }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> SweepReport {
        info!("🧹 Starting booking lifecycle sweep");
        let report = SweepReport {
            expired: self.expire_stale_pending(now).await,
            completed: self.complete_finished(now).await,
        };
        info!(
            "✅ Lifecycle sweep done: {} expired, {} completed",
            report.expired.len(),
            report.completed.len()
        );
        report
    }

    fn hold_expired(&self, booking: &Booking, now: DateTime<Utc>) -> bool {
        // A deadline past the end of time never expires.
        booking
            .booking_date
            .checked_add_signed(self.pending_hold)
            .is_some_and(|deadline| deadline <= now)
    }

    /// Cancels PENDING bookings held longer than the hold window.
    pub async fn expire_stale_pending(&self, now: DateTime<Utc>) -> Vec<Booking> {
        let pending = match self.bookings.bookings_with_status(BookingStatus::Pending).await {
            Ok(pending) => pending,
            Err(e) => {
                error!("🎫 Failed to load pending bookings: {}", e);
                return Vec::new();
            }
        };

        let mut expired = Vec::new();
        for booking in pending.into_iter().filter(|b| self.hold_expired(b, now)) {
            match self.bookings.cancel(&booking.id).await {
                Ok(cancelled) => {
                    info!("🎫 Expired pending booking {}, {} seats released", cancelled.id, cancelled.seats.len());
                    expired.push(cancelled);
                }
                Err(BookingError::InvalidStateTransition { from, .. }) => {
                    debug!("🎫 Booking {} moved to {} before it could expire", booking.id, from);
                }
                Err(e) => {
                    error!("🎫 Failed to expire booking {}: {}", booking.id, e);
                }
            }
        }
        expired
    }

    /// Completes CONFIRMED bookings whose showtime has ended.
    pub async fn complete_finished(&self, now: DateTime<Utc>) -> Vec<Booking> {
        let confirmed = match self.bookings.bookings_with_status(BookingStatus::Confirmed).await {
            Ok(confirmed) => confirmed,
            Err(e) => {
                error!("🎬 Failed to load confirmed bookings: {}", e);
                return Vec::new();
            }
        };

        let mut showtimes: HashMap<String, Option<Showtime>> = HashMap::new();
        let mut completed = Vec::new();
        for booking in confirmed {
            if !showtimes.contains_key(&booking.showtime_id) {
                let showtime = match self.showtimes.get(&booking.showtime_id).await {
                    Ok(showtime) => showtime,
                    Err(e) => {
                        error!("🎬 Failed to load showtime {}: {}", booking.showtime_id, e);
                        continue;
                    }
                };
                showtimes.insert(booking.showtime_id.clone(), showtime);
            }

            let ended = showtimes
                .get(&booking.showtime_id)
                .and_then(Option::as_ref)
                .is_some_and(|showtime| showtime.has_ended(now));
            if !ended {
                continue;
            }

            match self.bookings.complete(&booking.id).await {
                Ok(done) => completed.push(done),
                Err(e) => error!("🎬 Failed to complete booking {}: {}", booking.id, e),
            }
        }
        completed
    }
}
