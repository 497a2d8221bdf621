/// Contact endpoints. All of them are scoped to the authenticated owner.
use crate::{
    api::extract::ValidatedJson,
    auth::AuthUser,
    contacts::{ContactInput, ContactResponse, ContactUpdate, ListParams, SearchParams},
    context::AppContext,
    error::ApiResult,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;

/// Build contact routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/contacts", get(list_contacts).post(create_contact))
        .route("/api/contacts/search", get(search_contacts))
        .route("/api/contacts/birthdays", get(upcoming_birthdays))
        .route(
            "/api/contacts/:id",
            get(get_contact).put(update_contact).delete(delete_contact),
        )
}

fn respond(contacts: Vec<crate::db::contact::Contact>) -> Json<Vec<ContactResponse>> {
    Json(contacts.into_iter().map(ContactResponse::from).collect())
}

async fn list_contacts(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let (limit, offset) = params.clamped();
    let contacts = ctx.contacts.list(limit, offset, user.id).await?;
    Ok(respond(contacts))
}

async fn search_contacts(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let contacts = ctx.contacts.search(params.q.trim(), user.id).await?;
    Ok(respond(contacts))
}

async fn upcoming_birthdays(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<ContactResponse>>> {
    let today = Utc::now().date_naive();
    let contacts = ctx.contacts.upcoming_birthdays(user.id, today).await?;
    Ok(respond(contacts))
}

async fn get_contact(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ContactResponse>> {
    let contact = ctx.contacts.get(id, user.id).await?;
    Ok(Json(contact.into()))
}

async fn create_contact(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    ValidatedJson(body): ValidatedJson<ContactInput>,
) -> ApiResult<(StatusCode, Json<ContactResponse>)> {
    let contact = ctx.contacts.create(body.into(), user.id).await?;
    Ok((StatusCode::CREATED, Json(contact.into())))
}

async fn update_contact(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    ValidatedJson(body): ValidatedJson<ContactUpdate>,
) -> ApiResult<Json<ContactResponse>> {
    let contact = ctx.contacts.update(id, body.into(), user.id).await?;
    Ok(Json(contact.into()))
}

async fn delete_contact(
    State(ctx): State<AppContext>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    ctx.contacts.delete(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
