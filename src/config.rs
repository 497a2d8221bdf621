/// Configuration management for the contacts API
use crate::error::{ApiError, ApiResult};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub authentication: AuthConfig,
    pub cache: CacheConfig,
    pub rate_limit: RateLimitSettings,
    pub email: Option<EmailConfig>,
    pub image_host: Option<ImageHostConfig>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Public base URL used in confirmation links
    pub public_url: String,
    pub avatar_upload_limit: usize,
}

/// Relational store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token signing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// JWT algorithm identifier (HS256, HS384 or HS512)
    pub jwt_algorithm: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub email_token_ttl_hours: i64,
}

impl AuthConfig {
    /// Parse the configured algorithm, accepting only shared-secret (HMAC) algorithms
    pub fn algorithm(&self) -> ApiResult<Algorithm> {
        let algorithm = Algorithm::from_str(&self.jwt_algorithm).map_err(|_| {
            ApiError::Config(format!("Unknown JWT algorithm {}", self.jwt_algorithm))
        })?;

        match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
            other => Err(ApiError::Config(format!(
                "JWT algorithm {:?} needs a key pair; only HS256, HS384 and HS512 are supported",
                other
            ))),
        }
    }
}

/// Which key/value store backs the session cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

impl FromStr for CacheBackendKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "redis" => Ok(CacheBackendKind::Redis),
            "memory" => Ok(CacheBackendKind::Memory),
            other => Err(ApiError::Config(format!("Unknown cache backend {}", other))),
        }
    }
}

/// What happens to a cached user snapshot when the user row changes
/// through the confirmation or refresh-token paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationPolicy {
    /// Drop the cache entry in the same operation
    Strict,
    /// Leave the entry to expire; staleness is bounded by the cache TTL
    Ttl,
}

impl FromStr for InvalidationPolicy {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(InvalidationPolicy::Strict),
            "ttl" => Ok(InvalidationPolicy::Ttl),
            other => Err(ApiError::Config(format!(
                "Unknown cache invalidation policy {}",
                other
            ))),
        }
    }
}

/// Session cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub redis_url: String,
    /// Key prefix for all cache entries
    pub key_prefix: String,
    /// User snapshot TTL in seconds
    pub session_ttl: u64,
    pub invalidation: InvalidationPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "contacts:".to_string(),
            session_ttl: 300,
            invalidation: InvalidationPolicy::Strict,
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
    /// Per-credential quota for the profile endpoint
    pub profile_requests_per_minute: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            authenticated_rps: 100,
            unauthenticated_rps: 10,
            burst_size: 50,
            profile_requests_per_minute: 10,
        }
    }
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Image host (Cloudinary) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageHostConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder prepended to every public id
    pub folder: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> ApiResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ApiError::Config(format!("Invalid value for {}: {}", name, raw))),
        Err(_) => Ok(default),
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env_or("APP_HOSTNAME", "0.0.0.0");
        let port: u16 = env_parse("APP_PORT", 8000)?;
        let public_url = env::var("APP_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));
        let avatar_upload_limit = env_parse("AVATAR_UPLOAD_LIMIT", 5 * 1024 * 1024)?;

        let database_url = env_or("DATABASE_URL", "sqlite://contacts.sqlite");
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10)?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| ApiError::Config("JWT_SECRET is required".to_string()))?;
        let jwt_algorithm = env_or("JWT_ALGORITHM", "HS256");
        let access_token_ttl_minutes = env_parse("ACCESS_TOKEN_TTL_MINUTES", 15)?;
        let refresh_token_ttl_days = env_parse("REFRESH_TOKEN_TTL_DAYS", 7)?;
        let email_token_ttl_hours = env_parse("EMAIL_TOKEN_TTL_HOURS", 24)?;

        let defaults = CacheConfig::default();
        let cache = CacheConfig {
            backend: env_or("CACHE_BACKEND", "redis").parse()?,
            redis_url: env_or("REDIS_URL", &defaults.redis_url),
            key_prefix: env_or("CACHE_KEY_PREFIX", &defaults.key_prefix),
            session_ttl: env_parse("SESSION_CACHE_TTL", defaults.session_ttl)?,
            invalidation: env_or("SESSION_CACHE_INVALIDATION", "strict").parse()?,
        };

        let limits = RateLimitSettings::default();
        let rate_limit = RateLimitSettings {
            enabled: env_parse("RATE_LIMITS_ENABLED", limits.enabled)?,
            authenticated_rps: env_parse("RATE_LIMIT_AUTHENTICATED_RPS", limits.authenticated_rps)?,
            unauthenticated_rps: env_parse(
                "RATE_LIMIT_UNAUTHENTICATED_RPS",
                limits.unauthenticated_rps,
            )?,
            burst_size: env_parse("RATE_LIMIT_BURST", limits.burst_size)?,
            profile_requests_per_minute: env_parse(
                "PROFILE_REQUESTS_PER_MINUTE",
                limits.profile_requests_per_minute,
            )?,
        };

        let email = env::var("SMTP_URL").ok().map(|smtp_url| EmailConfig {
            smtp_url,
            from_address: env_or("MAIL_FROM", "noreply@contacts.local"),
        });

        let image_host = match env::var("CLOUDINARY_CLOUD_NAME") {
            Ok(cloud_name) => Some(ImageHostConfig {
                cloud_name,
                api_key: env::var("CLOUDINARY_API_KEY").map_err(|_| {
                    ApiError::Config("CLOUDINARY_API_KEY is required".to_string())
                })?,
                api_secret: env::var("CLOUDINARY_API_SECRET").map_err(|_| {
                    ApiError::Config("CLOUDINARY_API_SECRET is required".to_string())
                })?,
                folder: env_or("CLOUDINARY_FOLDER", "ContactsApp"),
            }),
            Err(_) => None,
        };

        let logging = LoggingConfig {
            level: env_or("RUST_LOG", "info"),
            json: env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                avatar_upload_limit,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                jwt_algorithm,
                access_token_ttl_minutes,
                refresh_token_ttl_days,
                email_token_ttl_hours,
            },
            cache,
            rate_limit,
            email,
            image_host,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Config("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ApiError::Config(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        self.authentication.algorithm()?;

        if self.authentication.access_token_ttl_minutes <= 0
            || self.authentication.refresh_token_ttl_days <= 0
            || self.authentication.email_token_ttl_hours <= 0
        {
            return Err(ApiError::Config("Token lifetimes must be positive".to_string()));
        }

        if self.cache.session_ttl == 0 {
            return Err(ApiError::Config("Session cache TTL must be positive".to_string()));
        }

        Ok(())
    }

    /// Configuration suitable for tests: in-memory SQLite and cache, no mail or image host
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                public_url: "http://localhost:8000".to_string(),
                avatar_upload_limit: 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                jwt_algorithm: "HS256".to_string(),
                access_token_ttl_minutes: 15,
                refresh_token_ttl_days: 7,
                email_token_ttl_hours: 24,
            },
            cache: CacheConfig {
                backend: CacheBackendKind::Memory,
                ..CacheConfig::default()
            },
            rate_limit: RateLimitSettings {
                enabled: false,
                ..RateLimitSettings::default()
            },
            email: None,
            image_host: None,
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}
