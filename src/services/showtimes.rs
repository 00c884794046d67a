use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::error::{BookingError, BookingResult};
use crate::models::seat::TOTAL_SEATS;
use crate::models::{Movie, Showtime, ShowtimeFormat};
use crate::storage::{collections, Document, Storage, WriteOp};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewShowtime {
    #[validate(length(min = 1))]
    pub movie_id: String,
    #[validate(length(min = 1))]
    pub cinema_id: String,
    #[validate(length(min = 1))]
    pub screen_id: String,
    pub start_time: DateTime<Utc>,
    #[validate(range(min = 1))]
    pub base_price: i64,
    pub format: ShowtimeFormat,
}

/// Movies and showtimes as the booking core sees them.
///
/// Showtimes are only ever inserted here; their seat counter starts at the
/// full layout and is moved exclusively by booking batches.
#[derive(Clone)]
pub struct ShowtimeCatalog {
    storage: Arc<dyn Storage>,
}

impl ShowtimeCatalog {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn add_movie(&self, movie: &Movie) -> BookingResult<()> {
        if movie.duration_minutes == 0 {
            return Err(BookingError::validation("movie duration must be positive"));
        }
        let document = Document::from_model(&movie.id, movie)?;
        self.storage
            .atomic_write(vec![WriteOp::insert(collections::MOVIES, document)])
            .await?;
        Ok(())
    }

    pub async fn movie(&self, movie_id: &str) -> BookingResult<Option<Movie>> {
        match self.storage.get(collections::MOVIES, movie_id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, new: NewShowtime) -> BookingResult<Showtime> {
        new.validate()?;
        let movie = self
            .movie(&new.movie_id)
            .await?
            .ok_or_else(|| BookingError::validation(format!("movie {} does not exist", new.movie_id)))?;

        let showtime = Showtime {
            id: Uuid::new_v4().to_string(),
            movie_id: movie.id,
            cinema_id: new.cinema_id,
            screen_id: new.screen_id,
            start_time: new.start_time,
            end_time: new.start_time + Duration::minutes(i64::from(movie.duration_minutes)),
            base_price: new.base_price,
            available_seats_count: TOTAL_SEATS,
            format: new.format,
        };

        let document = Document::from_model(&showtime.id, &showtime)?;
        self.storage
            .atomic_write(vec![WriteOp::insert(collections::SHOWTIMES, document)])
            .await?;

        info!("Created showtime {} for movie {} at {}", showtime.id, showtime.movie_id, showtime.start_time);
        Ok(showtime)
    }

    pub async fn get(&self, showtime_id: &str) -> BookingResult<Option<Showtime>> {
        match self.storage.get(collections::SHOWTIMES, showtime_id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }
}
