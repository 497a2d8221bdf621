/// Authentication extractors and utilities
use crate::{
    api::middleware::extract_bearer_token, context::AppContext, db::user::User, error::ApiError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub mod password;
pub mod resolver;
pub mod token;

pub use resolver::{IdentityResolver, UserDirectory};
pub use token::{TokenCodec, TokenError, TokenScope};

/// Authenticated user, resolved from the bearer access token
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers).ok_or(ApiError::Unauthenticated)?;
        let user = state.identity.resolve(&token).await?;

        Ok(AuthUser(user))
    }
}
