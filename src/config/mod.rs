use serde::Deserialize;
use std::env;
use std::str::FromStr;

/// Service configuration, read from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub redis: Option<RedisConfig>,
    pub booking: BookingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Required for the postgres backend.
    pub url: Option<String>,
    pub pool_size: u32,
}

/// Seat-map cache. Absent when `REDIS_URL` is not set.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub seat_map_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookingConfig {
    /// How long a PENDING booking may hold its seats.
    pub pending_hold_minutes: i64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            app: AppConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                environment: "development".to_string(),
                rust_log: "showtime_booking=debug,tower_http=debug".to_string(),
                log_format: LogFormat::Pretty,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                url: None,
                pool_size: 20,
            },
            redis: None,
            booking: BookingConfig {
                pending_hold_minutes: DEFAULT_PENDING_HOLD_MINUTES,
                sweep_interval_seconds: 60,
            },
        }
    }
}

pub const DEFAULT_PENDING_HOLD_MINUTES: i64 = 15;
/// Upper bound for `PENDING_HOLD_MINUTES`: one week.
pub const MAX_PENDING_HOLD_MINUTES: i64 = 7 * 24 * 60;

fn var_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

/// A hold window must be positive and bounded; zero or negative would expire
/// bookings the moment they are created.
fn checked_hold_minutes(minutes: i64) -> Result<i64, ConfigError> {
    if (1..=MAX_PENDING_HOLD_MINUTES).contains(&minutes) {
        Ok(minutes)
    } else {
        Err(ConfigError::Invalid { key: "PENDING_HOLD_MINUTES", value: minutes.to_string() })
    }
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let database_url = env::var("DATABASE_URL").ok();
        // Postgres whenever a database is configured, unless told otherwise.
        let default_backend = if database_url.is_some() {
            StorageBackend::Postgres
        } else {
            defaults.storage.backend
        };
        let backend = var_or("STORAGE_BACKEND", default_backend)?;
        if backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let redis = match env::var("REDIS_URL") {
            Ok(url) => Some(RedisConfig {
                url,
                seat_map_ttl_seconds: var_or("SEAT_MAP_CACHE_TTL_SECONDS", 30)?,
            }),
            Err(_) => None,
        };

        Ok(Config {
            app: AppConfig {
                host: env::var("HOST").unwrap_or(defaults.app.host),
                port: var_or("PORT", defaults.app.port)?,
                environment: env::var("ENVIRONMENT").unwrap_or(defaults.app.environment),
                rust_log: env::var("RUST_LOG").unwrap_or(defaults.app.rust_log),
                log_format: var_or("LOG_FORMAT", defaults.app.log_format)?,
            },
            storage: StorageConfig {
                backend,
                url: database_url,
                pool_size: var_or("DB_POOL_SIZE", defaults.storage.pool_size)?,
            },
            redis,
            booking: BookingConfig {
                pending_hold_minutes: checked_hold_minutes(var_or(
                    "PENDING_HOLD_MINUTES",
                    defaults.booking.pending_hold_minutes,
                )?)?,
                sweep_interval_seconds: var_or("SWEEP_INTERVAL_SECONDS", defaults.booking.sweep_interval_seconds)?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_run_in_memory_without_cache() {
        let config = Config::default();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.redis.is_none());
        assert_eq!(config.booking.pending_hold_minutes, 15);
    }

    #[test]
    fn hold_window_must_be_positive_and_bounded() {
        assert_eq!(checked_hold_minutes(15).unwrap(), 15);
        assert_eq!(checked_hold_minutes(MAX_PENDING_HOLD_MINUTES).unwrap(), MAX_PENDING_HOLD_MINUTES);
        for bad in [0, -30, MAX_PENDING_HOLD_MINUTES + 1, i64::MAX] {
            assert!(matches!(
                checked_hold_minutes(bad),
                Err(ConfigError::Invalid { key: "PENDING_HOLD_MINUTES", .. })
            ));
        }
    }

    #[test]
    fn from_env_rejects_a_negative_hold_window() {
        // Only test in this crate touching the variable.
        std::env::set_var("PENDING_HOLD_MINUTES", "-30");
        let result = Config::from_env();
        std::env::remove_var("PENDING_HOLD_MINUTES");
        assert!(matches!(result, Err(ConfigError::Invalid { key: "PENDING_HOLD_MINUTES", .. })));
    }

    #[test]
    fn parses_backend_and_log_format_names() {
        assert_eq!("PostgreSQL".parse::<StorageBackend>(), Ok(StorageBackend::Postgres));
        assert_eq!("memory".parse::<StorageBackend>(), Ok(StorageBackend::Memory));
        assert!("sqlite".parse::<StorageBackend>().is_err());
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
    }
}
