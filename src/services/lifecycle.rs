//! Booking status graph.
//!
//! ```text
//! PENDING -> CONFIRMED -> COMPLETED
//!    \
//!     -> CANCELLED
//! ```
//!
//! CANCELLED and COMPLETED are terminal. Cancelling is the only transition
//! with side effects: it gives the booking's seats back to the showtime.

use crate::error::{BookingError, BookingResult};
use crate::models::BookingStatus;

pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed)
    )
}

pub fn transition(from: BookingStatus, to: BookingStatus) -> BookingResult<BookingStatus> {
    if can_transition(from, to) {
        Ok(to)
    } else {
        Err(BookingError::InvalidStateTransition { from, to })
    }
}

pub fn releases_seats(to: BookingStatus) -> bool {
    to == BookingStatus::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    const ALL: [BookingStatus; 4] = [Pending, Confirmed, Cancelled, Completed];

    #[test]
    fn allowed_edges() {
        let allowed: Vec<(BookingStatus, BookingStatus)> = ALL
            .iter()
            .flat_map(|from| ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| can_transition(*from, *to))
            .collect();
        assert_eq!(allowed, vec![(Pending, Confirmed), (Pending, Cancelled), (Confirmed, Completed)]);
    }

    #[test]
    fn terminal_states_have_no_exit() {
        for to in ALL {
            assert!(transition(Cancelled, to).is_err());
            assert!(transition(Completed, to).is_err());
        }
    }

    #[test]
    fn confirmed_booking_cannot_be_cancelled() {
        match transition(Confirmed, Cancelled) {
            Err(BookingError::InvalidStateTransition { from, to }) => {
                assert_eq!(from, Confirmed);
                assert_eq!(to, Cancelled);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn only_cancellation_releases_seats() {
        assert!(releases_seats(Cancelled));
        assert!(!releases_seats(Confirmed));
        assert!(!releases_seats(Completed));
    }
}
