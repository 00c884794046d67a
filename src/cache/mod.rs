use crate::redis_client::RedisClient;

pub mod seats;

/// Read-through cache for the browse path.
///
/// Nothing that decides whether a booking may commit reads from here.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    seat_map_ttl: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, seat_map_ttl: u64) -> Self {
        Self { redis, seat_map_ttl }
    }
}
