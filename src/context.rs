/// Application context and dependency injection
use crate::{
    auth::{IdentityResolver, TokenCodec},
    cache::{CacheBackend, MemoryCache, RedisCache, SessionCache},
    config::{CacheBackendKind, CacheConfig, ServerConfig},
    contacts::ContactStore,
    db,
    error::ApiResult,
    image_host::{CloudinaryHost, ImageHost, UnconfiguredImageHost},
    mailer::Mailer,
    rate_limit::RateLimiter,
    users::UserStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Build the configured cache backend and make sure it answers
async fn connect_cache(config: &CacheConfig) -> ApiResult<Arc<dyn CacheBackend>> {
    let backend: Arc<dyn CacheBackend> = match config.backend {
        CacheBackendKind::Redis => Arc::new(RedisCache::connect(&config.redis_url).await?),
        CacheBackendKind::Memory => {
            info!("Using in-process session cache");
            Arc::new(MemoryCache::new())
        }
    };

    backend.ping().await?;
    info!("Session cache reachable");

    Ok(backend)
}

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub users: UserStore,
    pub contacts: ContactStore,
    pub identity: Arc<IdentityResolver>,
    pub rate_limiter: Arc<RateLimiter>,
    pub mailer: Arc<Mailer>,
    pub image_host: Arc<dyn ImageHost>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> ApiResult<Self> {
        config.validate()?;

        let db = db::create_pool(&config.database).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;
        info!("Database ready at {}", config.database.url);

        let cache_backend = connect_cache(&config.cache).await?;

        let image_host: Arc<dyn ImageHost> = match config.image_host.clone() {
            Some(host_config) => Arc::new(CloudinaryHost::new(host_config)?),
            None => {
                tracing::warn!("Image host not configured; avatar uploads will fail");
                Arc::new(UnconfiguredImageHost)
            }
        };

        Self::assemble(config, db, cache_backend, image_host)
    }

    /// Wire services around already-built infrastructure
    pub fn assemble(
        config: ServerConfig,
        db: SqlitePool,
        cache_backend: Arc<dyn CacheBackend>,
        image_host: Arc<dyn ImageHost>,
    ) -> ApiResult<Self> {
        let users = UserStore::new(db.clone());
        let contacts = ContactStore::new(db.clone());

        let tokens = Arc::new(TokenCodec::new(&config.authentication)?);
        let session_cache = SessionCache::new(
            cache_backend,
            config.cache.key_prefix.clone(),
            config.cache.session_ttl,
        );
        let identity = Arc::new(IdentityResolver::new(
            tokens,
            Arc::new(users.clone()),
            session_cache,
            config.cache.invalidation,
        ));

        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let mailer = Arc::new(Mailer::new(config.email.clone())?);

        Ok(Self {
            config: Arc::new(config),
            db,
            users,
            contacts,
            identity,
            rate_limiter,
            mailer,
            image_host,
        })
    }

    pub fn tokens(&self) -> &TokenCodec {
        self.identity.tokens()
    }

    /// Base URL used in outgoing links
    pub fn public_url(&self) -> &str {
        &self.config.service.public_url
    }
}
