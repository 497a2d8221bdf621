/// User persistence
use crate::auth::UserDirectory;
use crate::db::user::User;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

/// Input for `UserStore::create`; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Clone)]
pub struct UserStore {
    db: SqlitePool,
}

impl UserStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    /// Insert a new user. Duplicate email or username is a `Conflict`.
    pub async fn create(&self, new_user: NewUser) -> ApiResult<User> {
        let taken: Option<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE email = ? OR username = ?")
                .bind(&new_user.email)
                .bind(&new_user.username)
                .fetch_optional(&self.db)
                .await?;

        if taken.is_some() {
            return Err(ApiError::Conflict("Account already exists".to_string()));
        }

        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, avatar, refresh_token, confirmed, created_at, updated_at)
            VALUES (?, ?, ?, NULL, NULL, 0, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(now)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|e| ApiError::from_write(e, "Account already exists"))?;

        info!("Created user {} ({})", user.id, user.email);
        Ok(user)
    }

    /// Store or clear the user's current refresh token
    pub async fn update_refresh_token(&self, email: &str, token: Option<&str>) -> ApiResult<()> {
        let result = sqlx::query("UPDATE users SET refresh_token = ?, updated_at = ? WHERE email = ?")
            .bind(token)
            .bind(Utc::now())
            .bind(email)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    pub async fn set_confirmed(&self, email: &str) -> ApiResult<()> {
        let result = sqlx::query("UPDATE users SET confirmed = 1, updated_at = ? WHERE email = ?")
            .bind(Utc::now())
            .bind(email)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User not found".to_string()));
        }
        Ok(())
    }

    /// Set the avatar URL and return the updated record
    pub async fn update_avatar_url(&self, email: &str, url: &str) -> ApiResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET avatar = ?, updated_at = ? WHERE email = ? RETURNING *",
        )
        .bind(url)
        .bind(Utc::now())
        .bind(email)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }
}

#[async_trait]
impl UserDirectory for UserStore {
    async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        UserStore::find_by_email(self, email).await
    }
}
