//! Shared fixtures: one movie, one showtime, in-memory storage.

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;

use showtime_booking::models::{Booking, Movie, SeatRef, Showtime, ShowtimeFormat};
use showtime_booking::services::{pricing, BookingRequest, BookingService, NewShowtime, ShowtimeCatalog};
use showtime_booking::storage::{collections, Filter, MemoryStorage, Storage};

pub struct Fixture {
    pub storage: Arc<MemoryStorage>,
    pub bookings: BookingService,
    pub showtimes: ShowtimeCatalog,
    pub showtime: Showtime,
}

pub async fn fixture(base_price: i64) -> Fixture {
    let storage = Arc::new(MemoryStorage::new());
    let shared: Arc<dyn Storage> = storage.clone();
    let showtimes = ShowtimeCatalog::new(shared.clone());

    showtimes
        .add_movie(&Movie {
            id: "m1".to_string(),
            title: "Dune: Part Two".to_string(),
            duration_minutes: 166,
        })
        .await
        .unwrap();
    let showtime = showtimes
        .create(NewShowtime {
            movie_id: "m1".to_string(),
            cinema_id: "c1".to_string(),
            screen_id: "screen-1".to_string(),
            start_time: Utc.with_ymd_and_hms(2026, 5, 1, 19, 0, 0).unwrap(),
            base_price,
            format: ShowtimeFormat::TwoD,
        })
        .await
        .unwrap();

    Fixture { bookings: BookingService::new(shared), storage, showtimes, showtime }
}

impl Fixture {
    pub fn seats(&self, labels: &[&str]) -> Vec<SeatRef> {
        labels
            .iter()
            .map(|label| SeatRef::from_label(&self.showtime.id, label).unwrap())
            .collect()
    }

    /// A correctly priced request for the given hall labels.
    pub fn request(&self, labels: &[&str]) -> BookingRequest {
        let seats = self.seats(labels);
        BookingRequest {
            showtime_id: self.showtime.id.clone(),
            movie_id: self.showtime.movie_id.clone(),
            cinema_id: self.showtime.cinema_id.clone(),
            total_amount: pricing::total(self.showtime.base_price, &seats).unwrap(),
            seats,
        }
    }

    pub async fn available_seats(&self) -> i64 {
        self.showtimes.get(&self.showtime.id).await.unwrap().unwrap().available_seats_count
    }

    pub async fn booked_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self
            .bookings
            .index()
            .booked_seats(&self.showtime.id)
            .await
            .unwrap()
            .iter()
            .map(SeatRef::label)
            .collect();
        labels.sort();
        labels
    }

    pub async fn all_bookings(&self) -> Vec<Booking> {
        self.storage
            .query(collections::BOOKINGS, &[Filter::eq("showtime_id", self.showtime.id.as_str())])
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.decode().unwrap())
            .collect()
    }

    pub async fn claim_count(&self) -> usize {
        self.storage.query(collections::SEAT_CLAIMS, &[]).await.unwrap().len()
    }
}
