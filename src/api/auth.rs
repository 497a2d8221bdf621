/// Session endpoints: login, token refresh and e-mail confirmation
use crate::{
    api::{extract::ValidatedJson, middleware::extract_bearer_token},
    auth::password::verify_password_blocking,
    context::AppContext,
    error::{ApiError, ApiResult},
    users::{LoginForm, MessageResponse, RequestEmail, TokenResponse},
};
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{info, warn};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh_token", get(refresh_token))
        .route("/api/auth/confirmed_email/:token", get(confirmed_email))
        .route("/api/auth/request_email", post(request_email))
}

/// Issue a fresh pair and remember the refresh half on the user row
async fn issue_session(ctx: &AppContext, email: &str) -> ApiResult<TokenResponse> {
    let pair = ctx.tokens().issue_pair(email)?;
    ctx.users
        .update_refresh_token(email, Some(pair.refresh_token.as_str()))
        .await?;
    ctx.identity.user_changed(email).await;

    Ok(TokenResponse::bearer(pair.access_token, pair.refresh_token))
}

/// Password login. `username` carries the e-mail address.
async fn login(
    State(ctx): State<AppContext>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    let user = ctx
        .users
        .find_by_email(&form.username)
        .await?
        .ok_or_else(|| ApiError::InvalidCredentials("Invalid email".to_string()))?;

    if !user.confirmed {
        return Err(ApiError::InvalidCredentials("Email not confirmed".to_string()));
    }

    if !verify_password_blocking(form.password, user.password_hash.clone()).await? {
        warn!("login: wrong password for user {}", user.id);
        return Err(ApiError::InvalidCredentials("Invalid password".to_string()));
    }

    let tokens = issue_session(&ctx, &user.email).await?;
    info!("login: user {} signed in", user.id);

    Ok(Json(tokens))
}

/// Rotate the pair. A refresh token that no longer matches the stored one
/// revokes the stored token as well.
async fn refresh_token(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
) -> ApiResult<Json<TokenResponse>> {
    let token = extract_bearer_token(&headers).ok_or(ApiError::Unauthenticated)?;
    let email = ctx.tokens().decode_refresh(&token)?;

    let user = ctx
        .users
        .find_by_email(&email)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if user.refresh_token.as_deref() != Some(token.as_str()) {
        warn!("refresh_token: stale refresh token for user {}, revoking", user.id);
        ctx.users.update_refresh_token(&email, None).await?;
        ctx.identity.user_changed(&email).await;
        return Err(ApiError::InvalidCredentials("Invalid refresh token".to_string()));
    }

    Ok(Json(issue_session(&ctx, &email).await?))
}

async fn confirmed_email(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let email = ctx.tokens().decode_email(&token).map_err(|_| {
        ApiError::Validation("Invalid token for email verification".to_string())
    })?;

    let user = ctx
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::Validation("Verification error".to_string()))?;

    if user.confirmed {
        return Ok(Json(MessageResponse::new("Your email is already confirmed")));
    }

    ctx.users.set_confirmed(&email).await?;
    ctx.identity.user_changed(&email).await;
    info!("confirmed_email: user {} confirmed", user.id);

    Ok(Json(MessageResponse::new("Email confirmed")))
}

/// Re-send the confirmation link. The reply does not reveal whether the
/// address is registered.
async fn request_email(
    State(ctx): State<AppContext>,
    ValidatedJson(body): ValidatedJson<RequestEmail>,
) -> ApiResult<Json<MessageResponse>> {
    if let Some(user) = ctx.users.find_by_email(&body.email).await? {
        if user.confirmed {
            return Ok(Json(MessageResponse::new("Your email is already confirmed")));
        }
        spawn_confirmation_email(&ctx, user.email, user.username)?;
    }

    Ok(Json(MessageResponse::new("Check your email for confirmation.")))
}

/// Sign an e-mail token now and deliver it off the request path
pub(crate) fn spawn_confirmation_email(
    ctx: &AppContext,
    email: String,
    username: String,
) -> ApiResult<()> {
    if !ctx.mailer.is_configured() {
        tracing::debug!("Mail not configured, not sending confirmation to {}", email);
        return Ok(());
    }

    let token = ctx.tokens().issue_email(&email)?;
    let mailer = ctx.mailer.clone();
    let base_url = ctx.public_url().to_string();

    tokio::spawn(async move {
        if let Err(e) = mailer
            .send_confirmation_email(&email, &username, &token, &base_url)
            .await
        {
            tracing::error!(error = %e, "Failed to send confirmation email to {}", email);
        }
    });

    Ok(())
}
