/// User endpoints: registration, profile and avatar
use crate::{
    api::{auth::spawn_confirmation_email, extract::ValidatedJson},
    auth::{password::hash_password_blocking, AuthUser},
    context::AppContext,
    error::{ApiError, ApiResult},
    rate_limit::profile_rate_limit,
    users::{NewUser, SignupRequest, UserResponse},
};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    middleware,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::info;

/// Build user routes
pub fn routes(ctx: &AppContext) -> Router<AppContext> {
    Router::new()
        .route("/api/users/signup", post(signup))
        .route(
            "/api/users/me",
            get(me).route_layer(middleware::from_fn_with_state(ctx.clone(), profile_rate_limit)),
        )
        .route(
            "/api/users/avatar",
            patch(update_avatar).layer(DefaultBodyLimit::max(ctx.config.service.avatar_upload_limit)),
        )
}

async fn signup(
    State(ctx): State<AppContext>,
    ValidatedJson(body): ValidatedJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let password_hash = hash_password_blocking(body.password).await?;

    let user = ctx
        .users
        .create(NewUser {
            username: body.username,
            email: body.email,
            password_hash,
        })
        .await?;

    spawn_confirmation_email(&ctx, user.email.clone(), user.username.clone())?;
    info!("signup: registered user {}", user.id);

    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn me(AuthUser(user): AuthUser) -> Json<UserResponse> {
    Json(user.into())
}

/// Upload the `file` part to the image host and store the resulting URL
async fn update_avatar(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UserResponse>> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read multipart data: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read file bytes: {}", e)))?;
        upload = Some(data);
        break;
    }

    let data = upload
        .filter(|data| !data.is_empty())
        .ok_or_else(|| ApiError::Validation("Multipart form must include a file".to_string()))?;

    let image = ctx.image_host.upload(data.to_vec(), &user.username).await?;

    let updated = ctx.users.update_avatar_url(&user.email, &image.url).await?;
    ctx.identity.refresh(&updated).await?;
    info!("update_avatar: user {} avatar at version {}", updated.id, image.version);

    Ok(Json(updated.into()))
}
