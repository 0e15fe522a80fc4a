use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{UserRead, UserWrite},
    services::{self, UpdateMode},
};
use crate::{
    auth::extractors::{Caller, MaybeCaller},
    error::ApiError,
    extract::ApiJson,
    state::AppState,
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .put(replace_user)
                .patch(patch_user)
                .delete(delete_user),
        )
}

#[instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<Json<Vec<UserRead>>, ApiError> {
    let users = services::list_users(&state, caller.as_ref()).await?;
    Ok(Json(users))
}

#[instrument(skip(state, caller, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    ApiJson(payload): ApiJson<UserWrite>,
) -> Result<(StatusCode, HeaderMap, Json<UserRead>), ApiError> {
    let user = services::create_user(&state, &caller, payload).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = format!("/api/users/{}", user.id).parse() {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(user)))
}

#[instrument(skip(state, caller))]
pub async fn get_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<UserRead>, ApiError> {
    Ok(Json(services::get_user(&state, &caller, id).await?))
}

#[instrument(skip(state, caller, payload))]
pub async fn replace_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UserWrite>,
) -> Result<Json<UserRead>, ApiError> {
    let user = services::update_user(&state, &caller, id, payload, UpdateMode::Replace).await?;
    Ok(Json(user))
}

#[instrument(skip(state, caller, payload))]
pub async fn patch_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
    ApiJson(payload): ApiJson<UserWrite>,
) -> Result<Json<UserRead>, ApiError> {
    let user = services::update_user(&state, &caller, id, payload, UpdateMode::Patch).await?;
    Ok(Json(user))
}

#[instrument(skip(state, caller))]
pub async fn delete_user(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    services::delete_user(&state, &caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
