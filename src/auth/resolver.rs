/// Resolve a bearer token to the current user through the session cache
use super::token::TokenCodec;
use crate::cache::SessionCache;
use crate::config::InvalidationPolicy;
use crate::db::user::User;
use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Read access to user records by email
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>>;
}

#[derive(Clone)]
pub struct IdentityResolver {
    tokens: Arc<TokenCodec>,
    users: Arc<dyn UserDirectory>,
    cache: SessionCache,
    policy: InvalidationPolicy,
}

impl IdentityResolver {
    pub fn new(
        tokens: Arc<TokenCodec>,
        users: Arc<dyn UserDirectory>,
        cache: SessionCache,
        policy: InvalidationPolicy,
    ) -> Self {
        Self {
            tokens,
            users,
            cache,
            policy,
        }
    }

    pub fn tokens(&self) -> &TokenCodec {
        &self.tokens
    }

    /// Access token to user.
    ///
    /// A cache hit skips the store entirely. On a miss the user is loaded and
    /// the snapshot cached for the configured TTL. Any token problem, or a
    /// subject with no user behind it, is `Unauthenticated`.
    pub async fn resolve(&self, bearer: &str) -> ApiResult<User> {
        let email = self
            .tokens
            .decode_access(bearer)
            .map_err(|_| ApiError::Unauthenticated)?;

        if let Some(user) = self.cache.get_user(&email).await? {
            return Ok(user);
        }

        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        self.cache.put_user(&user).await?;
        debug!("Cached session snapshot for user {}", user.id);

        Ok(user)
    }

    /// Overwrite the cached snapshot with a fresh record
    pub async fn refresh(&self, user: &User) -> ApiResult<()> {
        self.cache.put_user(user).await
    }

    pub async fn invalidate(&self, email: &str) -> ApiResult<()> {
        self.cache.invalidate(email).await
    }

    /// Called after a user row changed outside the avatar path.
    ///
    /// Under the strict policy the cached entry is dropped now; under the
    /// TTL policy it is left to expire.
    pub async fn user_changed(&self, email: &str) {
        if self.policy != InvalidationPolicy::Strict {
            return;
        }

        if let Err(e) = self.cache.invalidate(email).await {
            warn!("Failed to invalidate cached session for {}: {}", email, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::ServerConfig;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingDirectory {
        users: Mutex<Vec<User>>,
        lookups: AtomicUsize,
    }

    impl CountingDirectory {
        fn with(user: User) -> Self {
            Self {
                users: Mutex::new(vec![user]),
                lookups: AtomicUsize::new(0),
            }
        }

        fn lookups(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        fn rename(&self, email: &str, username: &str) {
            let mut users = self.users.lock().unwrap();
            if let Some(user) = users.iter_mut().find(|u| u.email == email) {
                user.username = username.to_string();
            }
        }
    }

    #[async_trait]
    impl UserDirectory for CountingDirectory {
        async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email)
                .cloned())
        }
    }

    fn user(email: &str) -> User {
        User {
            id: 1,
            username: "deadpool".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            avatar: None,
            refresh_token: None,
            confirmed: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn resolver(directory: Arc<CountingDirectory>, policy: InvalidationPolicy) -> IdentityResolver {
        let config = ServerConfig::for_tests();
        let tokens = Arc::new(TokenCodec::new(&config.authentication).unwrap());
        let cache = SessionCache::new(Arc::new(MemoryCache::new()), "test:", 300);
        IdentityResolver::new(tokens, directory, cache, policy)
    }

    #[tokio::test]
    async fn test_second_resolve_is_served_from_cache() {
        let directory = Arc::new(CountingDirectory::with(user("dp@example.com")));
        let resolver = resolver(directory.clone(), InvalidationPolicy::Strict);
        let token = resolver.tokens().issue_access("dp@example.com").unwrap();

        let first = resolver.resolve(&token).await.unwrap();
        assert_eq!(first.email, "dp@example.com");
        assert_eq!(directory.lookups(), 1);

        let second = resolver.resolve(&token).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_unknown_subject_is_unauthenticated() {
        let directory = Arc::new(CountingDirectory::default());
        let resolver = resolver(directory, InvalidationPolicy::Strict);
        let token = resolver.tokens().issue_access("ghost@example.com").unwrap();

        assert!(matches!(
            resolver.resolve(&token).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_non_access_tokens_are_unauthenticated() {
        let directory = Arc::new(CountingDirectory::with(user("dp@example.com")));
        let resolver = resolver(directory.clone(), InvalidationPolicy::Strict);
        let refresh = resolver.tokens().issue_refresh("dp@example.com").unwrap();

        assert!(matches!(
            resolver.resolve(&refresh).await,
            Err(ApiError::Unauthenticated)
        ));
        assert!(matches!(
            resolver.resolve("garbage").await,
            Err(ApiError::Unauthenticated)
        ));
        assert_eq!(directory.lookups(), 0);
    }

    #[tokio::test]
    async fn test_strict_policy_drops_entry_on_change() {
        let directory = Arc::new(CountingDirectory::with(user("dp@example.com")));
        let resolver = resolver(directory.clone(), InvalidationPolicy::Strict);
        let token = resolver.tokens().issue_access("dp@example.com").unwrap();

        resolver.resolve(&token).await.unwrap();
        directory.rename("dp@example.com", "wade");
        resolver.user_changed("dp@example.com").await;

        let fresh = resolver.resolve(&token).await.unwrap();
        assert_eq!(fresh.username, "wade");
        assert_eq!(directory.lookups(), 2);
    }

    #[tokio::test]
    async fn test_ttl_policy_keeps_entry_on_change() {
        let directory = Arc::new(CountingDirectory::with(user("dp@example.com")));
        let resolver = resolver(directory.clone(), InvalidationPolicy::Ttl);
        let token = resolver.tokens().issue_access("dp@example.com").unwrap();

        resolver.resolve(&token).await.unwrap();
        directory.rename("dp@example.com", "wade");
        resolver.user_changed("dp@example.com").await;

        let stale = resolver.resolve(&token).await.unwrap();
        assert_eq!(stale.username, "deadpool");
        assert_eq!(directory.lookups(), 1);
    }

    #[tokio::test]
    async fn test_refresh_overwrites_snapshot() {
        let directory = Arc::new(CountingDirectory::with(user("dp@example.com")));
        let resolver = resolver(directory.clone(), InvalidationPolicy::Ttl);
        let token = resolver.tokens().issue_access("dp@example.com").unwrap();

        let mut cached = resolver.resolve(&token).await.unwrap();
        cached.avatar = Some("https://img.example/a.png".to_string());
        resolver.refresh(&cached).await.unwrap();

        let served = resolver.resolve(&token).await.unwrap();
        assert_eq!(served.avatar.as_deref(), Some("https://img.example/a.png"));
        assert_eq!(directory.lookups(), 1);
    }
}
