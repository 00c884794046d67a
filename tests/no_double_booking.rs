//! Concurrent and randomized checks that a seat is never held twice.
//!
//! Run with: `cargo test --test no_double_booking -- --nocapture`

mod common;

use common::{fixture, Fixture};
use proptest::prelude::*;
use showtime_booking::auth::Session;
use showtime_booking::error::BookingError;
use showtime_booking::models::seat::{ROWS, SEATS_PER_ROW, TOTAL_SEATS};
use showtime_booking::models::Booking;
use std::collections::HashSet;
use std::sync::Arc;

/// Every live seat belongs to exactly one live booking, and the counter agrees
/// with the live bookings.
async fn assert_consistent(fx: &Fixture) {
    let live: Vec<Booking> = fx
        .all_bookings()
        .await
        .into_iter()
        .filter(|b| b.status.is_live())
        .collect();

    let mut seen = HashSet::new();
    for booking in &live {
        for seat in &booking.seats {
            assert!(seen.insert(seat.clone()), "seat {} is held twice", seat);
        }
    }

    let held: i64 = live.iter().map(Booking::seat_count).sum();
    assert_eq!(fx.available_seats().await, TOTAL_SEATS - held);
    assert_eq!(fx.claim_count().await as i64, held);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_seat_goes_to_exactly_one_of_many() {
    println!("🧪 32 concurrent requests for seat C5");
    let fx = Arc::new(fixture(90_000).await);

    let handles: Vec<_> = (0..32)
        .map(|i| {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                let session = Session::signed_in(format!("user-{i}"));
                fx.bookings.create(&session, fx.request(&["C5"])).await
            })
        })
        .collect();

    let mut won = 0;
    for result in futures::future::join_all(handles).await {
        match result.unwrap() {
            Ok(_) => won += 1,
            Err(BookingError::SeatConflict { seats }) => assert_eq!(seats, vec!["C5"]),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(fx.available_seats().await, 79);
    assert_consistent(&fx).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_pairs_never_share_a_seat() {
    let fx = Arc::new(fixture(90_000).await);

    // user i wants B{i} and B{i+1}; neighbours overlap by one seat.
    let handles: Vec<_> = (1..SEATS_PER_ROW)
        .map(|i| {
            let fx = Arc::clone(&fx);
            tokio::spawn(async move {
                let labels = [format!("B{i}"), format!("B{}", i + 1)];
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                let session = Session::signed_in(format!("user-{i}"));
                fx.bookings.create(&session, fx.request(&labels)).await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let won = results.iter().filter(|r| matches!(r, Ok(Ok(_)))).count();
    assert!(won >= 1);
    assert!(won <= SEATS_PER_ROW as usize / 2);
    assert_consistent(&fx).await;
}

#[derive(Debug, Clone)]
enum Step {
    Create { user: u8, seats: Vec<usize> },
    Cancel(usize),
    Confirm(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0u8..4, prop::collection::btree_set(0..TOTAL_SEATS as usize, 1..4))
            .prop_map(|(user, seats)| Step::Create { user, seats: seats.into_iter().collect() }),
        1 => any::<usize>().prop_map(Step::Cancel),
        1 => any::<usize>().prop_map(Step::Confirm),
    ]
}

fn label(index: usize) -> String {
    let per_row = SEATS_PER_ROW as usize;
    format!("{}{}", ROWS[index / per_row], index % per_row + 1)
}

async fn replay(steps: Vec<Step>) {
    let fx = fixture(90_000).await;
    let mut created: Vec<String> = Vec::new();

    for step in steps {
        match step {
            Step::Create { user, seats } => {
                let labels: Vec<String> = seats.into_iter().map(label).collect();
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                let session = Session::signed_in(format!("user-{user}"));
                match fx.bookings.create(&session, fx.request(&labels)).await {
                    Ok(booking) => created.push(booking.id),
                    Err(BookingError::SeatConflict { .. }) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }
            Step::Cancel(pick) if !created.is_empty() => {
                let id = &created[pick % created.len()];
                match fx.bookings.cancel(id).await {
                    Ok(_) | Err(BookingError::InvalidStateTransition { .. }) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }
            Step::Confirm(pick) if !created.is_empty() => {
                let id = &created[pick % created.len()];
                match fx.bookings.confirm(id).await {
                    Ok(_) | Err(BookingError::InvalidStateTransition { .. }) => {}
                    Err(other) => panic!("unexpected error: {other:?}"),
                }
            }
            _ => {}
        }
        assert_consistent(&fx).await;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_sequence_of_steps_keeps_seats_exclusive(steps in prop::collection::vec(step(), 1..24)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(replay(steps));
    }
}
