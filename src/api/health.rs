/// Liveness endpoints
use crate::{
    context::AppContext,
    db,
    error::{ApiError, ApiResult},
    users::MessageResponse,
};
use axum::{extract::State, response::Json, routing::get, Router};

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(index))
        .route("/api/healthchecker", get(healthchecker))
}

/// Application banner
pub async fn index() -> Json<MessageResponse> {
    Json(MessageResponse::new("Contact Application"))
}

/// Round-trip `SELECT 1` through the pool
pub async fn healthchecker(State(ctx): State<AppContext>) -> ApiResult<Json<MessageResponse>> {
    if let Err(e) = db::test_connection(&ctx.db).await {
        tracing::warn!(error = %e, "healthchecker: database check failed");
        return Err(ApiError::Internal(
            "Error connecting to the database".to_string(),
        ));
    }

    Ok(Json(MessageResponse::new("Contacts API is healthy")))
}
