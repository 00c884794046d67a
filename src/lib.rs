pub mod auth;
pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod services;
pub mod storage;

use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CacheService;
use crate::config::{Config, StorageBackend, DEFAULT_PENDING_HOLD_MINUTES};
use crate::services::{BookingService, LifecycleSweeper, ShowtimeCatalog};
use crate::storage::{MemoryStorage, Storage};

// Shared state for the whole application
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub bookings: BookingService,
    pub showtimes: ShowtimeCatalog,
    pub cache: Option<CacheService>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let storage: Arc<dyn Storage> = match config.storage.backend {
            StorageBackend::Postgres => {
                let url = config
                    .storage
                    .url
                    .as_deref()
                    .context("DATABASE_URL must be set for the postgres backend")?;
                let db = database::Database::new(url, config.storage.pool_size)
                    .await
                    .context("Failed to connect to database")?;
                info!("Database connected");
                db.run_migrations().await.context("Failed to run migrations")?;
                Arc::new(db.storage())
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage, bookings are lost on restart");
                Arc::new(MemoryStorage::new())
            }
        };

        let cache = match &config.redis {
            Some(redis) => {
                let client = redis_client::RedisClient::new(&redis.url)
                    .await
                    .context("Failed to connect to Redis")?;
                info!("Redis connected");
                Some(CacheService::new(client, redis.seat_map_ttl_seconds))
            }
            None => None,
        };

        Ok(Self::with_storage(storage, cache, config))
    }

    pub fn with_storage(storage: Arc<dyn Storage>, cache: Option<CacheService>, config: Config) -> Arc<Self> {
        Arc::new(Self {
            bookings: BookingService::new(storage.clone()),
            showtimes: ShowtimeCatalog::new(storage.clone()),
            storage,
            cache,
            config,
        })
    }

    pub fn sweeper(&self) -> LifecycleSweeper {
        LifecycleSweeper::new(
            self.bookings.clone(),
            self.showtimes.clone(),
            self.pending_hold(),
        )
    }

    fn pending_hold(&self) -> Duration {
        let minutes = self.config.booking.pending_hold_minutes;
        Duration::try_minutes(minutes)
            .filter(|hold| *hold > Duration::zero())
            .unwrap_or_else(|| {
                warn!("Pending hold of {} minutes is unusable, falling back to {}", minutes, DEFAULT_PENDING_HOLD_MINUTES);
                Duration::minutes(DEFAULT_PENDING_HOLD_MINUTES)
            })
    }

    /// Drops the cached seat map after a commit that changed it.
    pub async fn invalidate_seat_map(&self, showtime_id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate_seats(showtime_id).await;
        }
    }
}
