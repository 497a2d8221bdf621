/// Session cache for authenticated user snapshots
///
/// A JSON-encoded `User` is stored under `<prefix>user:<email>` with a
/// bounded TTL. The key/value store behind it is pluggable:
/// - `RedisCache` for shared deployments
/// - `MemoryCache` for single-node runs and tests
use crate::db::user::User;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub mod memory;
pub mod redis;

pub use memory::MemoryCache;
pub use self::redis::RedisCache;

/// Minimal key/value operations the session cache needs
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> ApiResult<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>) -> ApiResult<()>;

    async fn expire(&self, key: &str, ttl_secs: u64) -> ApiResult<()>;

    async fn delete(&self, key: &str) -> ApiResult<()>;

    async fn ping(&self) -> ApiResult<()>;

    /// Store a value with a TTL. Backends with an atomic form override this.
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> ApiResult<()> {
        self.set(key, value).await?;
        self.expire(key, ttl_secs).await
    }
}

/// Key category constants
pub mod categories {
    pub const USER: &str = "user:";
}

/// Typed user-snapshot cache over any backend
#[derive(Clone)]
pub struct SessionCache {
    backend: Arc<dyn CacheBackend>,
    key_prefix: String,
    ttl_secs: u64,
}

impl SessionCache {
    pub fn new(backend: Arc<dyn CacheBackend>, key_prefix: impl Into<String>, ttl_secs: u64) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
            ttl_secs,
        }
    }

    /// Build a cache key with prefix
    fn build_key(&self, email: &str) -> String {
        format!("{}{}{}", self.key_prefix, categories::USER, email)
    }

    /// Fetch the cached snapshot for `email`.
    ///
    /// An entry that no longer decodes is deleted and reported as a miss.
    pub async fn get_user(&self, email: &str) -> ApiResult<Option<User>> {
        let key = self.build_key(email);

        let Some(bytes) = self.backend.get(&key).await? else {
            debug!("Cache MISS: {}", key);
            return Ok(None);
        };

        match serde_json::from_slice::<User>(&bytes) {
            Ok(user) => {
                debug!("Cache HIT: {}", key);
                Ok(Some(user))
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
                if let Err(e) = self.backend.delete(&key).await {
                    warn!("Failed to delete corrupt cache entry {}: {}", key, e);
                }
                Ok(None)
            }
        }
    }

    /// Store a snapshot under the user's email with the configured TTL
    pub async fn put_user(&self, user: &User) -> ApiResult<()> {
        let key = self.build_key(&user.email);
        let payload = serde_json::to_vec(user)
            .map_err(|e| ApiError::Cache(format!("Cache serialization failed: {}", e)))?;

        debug!("Cache SET: {} (TTL: {}s)", key, self.ttl_secs);
        self.backend.set_with_ttl(&key, payload, self.ttl_secs).await
    }

    pub async fn invalidate(&self, email: &str) -> ApiResult<()> {
        let key = self.build_key(email);
        debug!("Cache DELETE: {}", key);
        self.backend.delete(&key).await
    }
}
