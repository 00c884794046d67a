use crate::cache::CacheService;
use crate::models::Seat;
use redis::AsyncCommands;
use tracing::info;

fn seat_map_key(showtime_id: &str) -> String {
    format!("seats:{}", showtime_id)
}

impl CacheService {
    pub async fn get_seat_map(&self, showtime_id: &str) -> Result<Option<Vec<Seat>>, redis::RedisError> {
        let mut conn = self.redis.conn.clone();
        let data: Option<String> = conn.get(seat_map_key(showtime_id)).await?;
        match data {
            Some(data) => serde_json::from_str(&data).map(Some).map_err(|_| {
                redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
            }),
            None => Ok(None),
        }
    }

    pub async fn save_seat_map(&self, showtime_id: &str, seats: &[Seat]) -> Result<(), redis::RedisError> {
        let data = serde_json::to_string(seats).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = self.redis.conn.clone();
        conn.set_ex(seat_map_key(showtime_id), data, self.seat_map_ttl).await
    }

    pub async fn invalidate_seats(&self, showtime_id: &str) {
        let mut conn = self.redis.conn.clone();
        let _: Result<(), _> = conn.del(seat_map_key(showtime_id)).await;
        info!("Invalidated seats cache for showtime {}", showtime_id);
    }
}
