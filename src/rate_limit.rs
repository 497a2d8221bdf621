/// Rate Limiting System
///
/// Two global direct limiters split traffic by whether an Authorization
/// header is present, and a keyed limiter caps the profile endpoint per
/// bearer credential.
use crate::{
    api::middleware::extract_bearer_token,
    config::RateLimitSettings,
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{keyed::DefaultKeyedStateStore, InMemoryState, NotKeyed},
    NotUntil, Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;
type KeyedLimiter = GovernorLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

fn non_zero(value: u32, fallback: NonZeroU32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(fallback)
}

fn retry_after(not_until: NotUntil<<DefaultClock as Clock>::Instant>) -> ApiError {
    let wait = not_until.wait_time_from(DefaultClock::default().now());
    ApiError::RateLimitExceeded {
        retry_after: wait.max(Duration::from_secs(1)),
    }
}

/// Rate limiter manager
#[derive(Clone)]
pub struct RateLimiter {
    enabled: bool,
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
    profile: Arc<KeyedLimiter>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitSettings) -> Self {
        let auth_quota = Quota::per_second(non_zero(config.authenticated_rps, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size, NonZeroU32::MIN));

        let unauth_quota = Quota::per_second(non_zero(config.unauthenticated_rps, NonZeroU32::MIN))
            .allow_burst(non_zero(config.burst_size / 5, NonZeroU32::MIN));

        let profile_quota =
            Quota::per_minute(non_zero(config.profile_requests_per_minute, NonZeroU32::MIN));

        Self {
            enabled: config.enabled,
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
            profile: Arc::new(GovernorLimiter::keyed(profile_quota)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check rate limit for authenticated traffic
    pub fn check_authenticated(&self) -> ApiResult<()> {
        self.authenticated.check().map_err(retry_after)
    }

    /// Check rate limit for unauthenticated traffic
    pub fn check_unauthenticated(&self) -> ApiResult<()> {
        self.unauthenticated.check().map_err(retry_after)
    }

    /// Check the profile quota for one credential
    pub fn check_profile(&self, credential: &str) -> ApiResult<()> {
        self.profile
            .check_key(&credential.to_string())
            .map_err(retry_after)
    }

    /// Drop keyed state for credentials that have fully replenished
    pub fn prune(&self) {
        self.profile.retain_recent();
        self.profile.shrink_to_fit();
    }
}

/// Global rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !ctx.rate_limiter.is_enabled() {
        return Ok(next.run(request).await);
    }

    let has_auth_header = request
        .headers()
        .contains_key(axum::http::header::AUTHORIZATION);

    if has_auth_header {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_unauthenticated()?;
    }

    Ok(next.run(request).await)
}

/// Per-credential limit for the profile endpoint
pub async fn profile_rate_limit(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if ctx.rate_limiter.is_enabled() {
        if let Some(token) = extract_bearer_token(request.headers()) {
            if let Err(err) = ctx.rate_limiter.check_profile(&token) {
                tracing::warn!("Profile rate limit hit");
                return Err(err);
            }
        }
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RateLimitSettings {
        RateLimitSettings {
            enabled: true,
            authenticated_rps: 10,
            unauthenticated_rps: 5,
            burst_size: 5,
            profile_requests_per_minute: 3,
        }
    }

    #[test]
    fn test_rate_limiter_creation() {
        let limiter = RateLimiter::new(&RateLimitSettings::default());

        assert!(limiter.is_enabled());
        assert!(limiter.check_authenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_ok());
        assert!(limiter.check_profile("token").is_ok());
    }

    #[test]
    fn test_burst_limit() {
        let limiter = RateLimiter::new(&settings());

        for _ in 0..5 {
            assert!(limiter.check_authenticated().is_ok());
        }

        assert!(matches!(
            limiter.check_authenticated(),
            Err(ApiError::RateLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_profile_limit_is_per_credential() {
        let limiter = RateLimiter::new(&settings());

        for _ in 0..3 {
            assert!(limiter.check_profile("alice-token").is_ok());
        }
        let err = limiter.check_profile("alice-token").unwrap_err();
        match err {
            ApiError::RateLimitExceeded { retry_after } => {
                assert!(retry_after >= Duration::from_secs(1))
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(limiter.check_profile("bob-token").is_ok());
        limiter.prune();
    }

    #[test]
    fn test_zero_settings_fall_back_to_one() {
        let limiter = RateLimiter::new(&RateLimitSettings {
            enabled: true,
            authenticated_rps: 0,
            unauthenticated_rps: 0,
            burst_size: 0,
            profile_requests_per_minute: 0,
        });

        assert!(limiter.check_unauthenticated().is_ok());
        assert!(limiter.check_unauthenticated().is_err());
    }
}
