use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{required_text, AppState};
use crate::{
    db::{MovieQueries, UserStore},
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::User,
};

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users))
        .route("/create", post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
}

fn user_not_found(user_id: i64) -> AppError {
    AppError::NotFound(format!("User {} not found", user_id))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<UserRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    let username = required_text(&request.username, "username")?;
    let user = state.store.create_user(&username).await?;

    tracing::info!(request_id = %request_id, user_id = user.id, "User created");

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<UserResponse>>> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or_else(|| user_not_found(user_id))?;
    Ok(Json(user.into()))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
    Json(request): Json<UserRequest>,
) -> AppResult<Json<UserResponse>> {
    let username = required_text(&request.username, "username")?;
    let user = state
        .store
        .update_user(user_id, &username)
        .await?
        .ok_or_else(|| user_not_found(user_id))?;

    tracing::info!(request_id = %request_id, user_id, "User renamed");

    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> AppResult<StatusCode> {
    if !state.store.delete_user(user_id).await? {
        return Err(user_not_found(user_id));
    }

    tracing::info!(request_id = %request_id, user_id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
