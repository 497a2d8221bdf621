/// Redis-backed cache
use super::CacheBackend;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{error, info, warn};

/// Redis cache client
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis at `redis_url`
    pub async fn connect(redis_url: &str) -> ApiResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            ApiError::Cache(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            ApiError::Cache(format!("Redis connection failed: {}", e))
        })?;

        info!("Redis connection established");

        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> ApiResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", key, e);
            ApiError::Cache(format!("Cache get failed: {}", e))
        })
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> ApiResult<()> {
        let mut conn = self.connection.clone();
        conn.set(key, value).await.map_err(|e| {
            warn!("Redis SET failed for {}: {}", key, e);
            ApiError::Cache(format!("Cache set failed: {}", e))
        })
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> ApiResult<()> {
        let mut conn = self.connection.clone();
        conn.expire(key, ttl_secs as i64).await.map_err(|e| {
            warn!("Redis EXPIRE failed for {}: {}", key, e);
            ApiError::Cache(format!("Cache expire failed: {}", e))
        })
    }

    async fn delete(&self, key: &str) -> ApiResult<()> {
        let mut conn = self.connection.clone();
        conn.del(key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", key, e);
            ApiError::Cache(format!("Cache delete failed: {}", e))
        })
    }

    async fn ping(&self) -> ApiResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await.map_err(|e| {
            error!("Redis PING failed: {}", e);
            ApiError::Cache(format!("Cache ping failed: {}", e))
        })?;

        if pong != "PONG" {
            return Err(ApiError::Cache("Unexpected Redis PING response".to_string()));
        }

        Ok(())
    }

    /// SET with EX in one round trip
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> ApiResult<()> {
        let mut conn = self.connection.clone();
        conn.set_ex(key, value, ttl_secs).await.map_err(|e| {
            warn!("Redis SETEX failed for {}: {}", key, e);
            ApiError::Cache(format!("Cache set failed: {}", e))
        })
    }
}
