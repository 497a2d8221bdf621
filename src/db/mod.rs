/// Database layer for the contacts API
///
/// Manages the connection pool and the embedded schema migrations, and
/// holds the row types for users and contacts.

pub mod contact;
pub mod user;

use crate::config::DatabaseConfig;
use crate::error::{ApiError, ApiResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Create a SQLite connection pool
pub async fn create_pool(config: &DatabaseConfig) -> ApiResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)
        .map_err(ApiError::Database)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));

    let in_memory = config.url.contains(":memory:");

    let mut pool_options = SqlitePoolOptions::new().max_connections(config.max_connections.max(1));
    if in_memory {
        // An in-memory database lives only as long as its connection
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(ApiError::Database)?;

    Ok(pool)
}

/// Run migrations for a database
/// Migrations are embedded at compile time from ./migrations directory
pub async fn run_migrations(pool: &SqlitePool) -> ApiResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> ApiResult<()> {
    let one: i64 = sqlx::query_scalar("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(ApiError::Database)?;

    if one != 1 {
        return Err(ApiError::Internal(
            "Database is not configured correctly".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let pool = create_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
