/// Token codec: issues and validates scope-tagged JWTs
///
/// Every token carries `{sub, scope, iat, exp}`. The scope is a closed set
/// decoded through a single entry point, so a refresh token can never be
/// accepted where an access token is expected and vice versa.
use crate::config::AuthConfig;
use crate::error::{ApiError, ApiResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Codec failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Bad signature, malformed token or expired
    #[error("Invalid token")]
    InvalidToken,

    /// Valid token with a scope not accepted by this decode
    #[error("Invalid scope for token")]
    WrongScope,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::InvalidToken => ApiError::Unauthenticated,
            TokenError::WrongScope => ApiError::WrongScope,
            TokenError::Signing(msg) => ApiError::Internal(msg),
        }
    }
}

/// Scope discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    AccessToken,
    RefreshToken,
    EmailToken,
}

/// Registered claims shared by every flavor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    /// Subject: the user's email
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Decoded token payload, tagged by scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope")]
pub enum TokenClaims {
    #[serde(rename = "access_token")]
    Access(ClaimSet),
    #[serde(rename = "refresh_token")]
    Refresh(ClaimSet),
    #[serde(rename = "email_token")]
    Email(ClaimSet),
}

impl TokenClaims {
    pub fn scope(&self) -> TokenScope {
        match self {
            TokenClaims::Access(_) => TokenScope::AccessToken,
            TokenClaims::Refresh(_) => TokenScope::RefreshToken,
            TokenClaims::Email(_) => TokenScope::EmailToken,
        }
    }

    pub fn claims(&self) -> &ClaimSet {
        match self {
            TokenClaims::Access(c) | TokenClaims::Refresh(c) | TokenClaims::Email(c) => c,
        }
    }

    fn new(scope: TokenScope, claims: ClaimSet) -> Self {
        match scope {
            TokenScope::AccessToken => TokenClaims::Access(claims),
            TokenScope::RefreshToken => TokenClaims::Refresh(claims),
            TokenScope::EmailToken => TokenClaims::Email(claims),
        }
    }
}

/// Access/refresh pair handed out at login and refresh
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Signs and verifies tokens with a shared secret
pub struct TokenCodec {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
    email_ttl: Duration,
}

impl TokenCodec {
    pub fn new(config: &AuthConfig) -> ApiResult<Self> {
        let algorithm = config.algorithm()?;

        Ok(Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
            email_ttl: Duration::hours(config.email_token_ttl_hours),
        })
    }

    /// Sign a token for `subject` that expires `ttl` from now
    pub fn issue(&self, subject: &str, scope: TokenScope, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = TokenClaims::new(
            scope,
            ClaimSet {
                sub: subject.to_string(),
                iat: now,
                exp: now + ttl.num_seconds(),
            },
        );

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn issue_access(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, TokenScope::AccessToken, self.access_ttl)
    }

    pub fn issue_refresh(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, TokenScope::RefreshToken, self.refresh_ttl)
    }

    pub fn issue_email(&self, email: &str) -> Result<String, TokenError> {
        self.issue(email, TokenScope::EmailToken, self.email_ttl)
    }

    pub fn issue_pair(&self, email: &str) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.issue_access(email)?,
            refresh_token: self.issue_refresh(email)?,
        })
    }

    /// Verify signature and expiry, then decode the scope-tagged claims
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Token rejected: {}", e);
                TokenError::InvalidToken
            })
    }

    /// General access decode. Any other scope is simply invalid here.
    pub fn decode_access(&self, token: &str) -> Result<String, TokenError> {
        match self.decode(token)? {
            TokenClaims::Access(claims) => Ok(claims.sub),
            _ => Err(TokenError::InvalidToken),
        }
    }

    /// Refresh decode; returns the subject only
    pub fn decode_refresh(&self, token: &str) -> Result<String, TokenError> {
        match self.decode(token)? {
            TokenClaims::Refresh(claims) => Ok(claims.sub),
            _ => Err(TokenError::WrongScope),
        }
    }

    /// Email-confirmation decode; returns the subject only
    pub fn decode_email(&self, token: &str) -> Result<String, TokenError> {
        match self.decode(token)? {
            TokenClaims::Email(claims) => Ok(claims.sub),
            _ => Err(TokenError::WrongScope),
        }
    }
}
