use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::{required_text, AppState};
use crate::{
    db::GenreStore,
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::Genre,
};

#[derive(Debug, Deserialize)]
pub struct GenreRequest {
    pub name: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_genres))
        .route("/create", post(create_genre))
        .route("/:id", get(get_genre).put(update_genre).delete(delete_genre))
}

fn genre_not_found(genre_id: i64) -> AppError {
    AppError::NotFound(format!("Genre {} not found", genre_id))
}

pub async fn create_genre(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<GenreRequest>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    let name = required_text(&request.name, "name")?;
    let genre = state.store.create_genre(&name).await?;

    tracing::info!(request_id = %request_id, genre_id = genre.id, "Genre created");

    Ok((StatusCode::CREATED, Json(genre)))
}

pub async fn list_genres(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<Genre>>> {
    Ok(Json(state.store.list_genres().await?))
}

pub async fn get_genre(
    State(state): State<Arc<AppState>>,
    Path(genre_id): Path<i64>,
) -> AppResult<Json<Genre>> {
    state
        .store
        .find_genre(genre_id)
        .await?
        .map(Json)
        .ok_or_else(|| genre_not_found(genre_id))
}

pub async fn update_genre(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(genre_id): Path<i64>,
    Json(request): Json<GenreRequest>,
) -> AppResult<Json<Genre>> {
    let name = required_text(&request.name, "name")?;
    let genre = state
        .store
        .update_genre(genre_id, &name)
        .await?
        .ok_or_else(|| genre_not_found(genre_id))?;

    tracing::info!(request_id = %request_id, genre_id, "Genre renamed");

    Ok(Json(genre))
}

pub async fn delete_genre(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(genre_id): Path<i64>,
) -> AppResult<StatusCode> {
    if !state.store.delete_genre(genre_id).await? {
        return Err(genre_not_found(genre_id));
    }

    tracing::info!(request_id = %request_id, genre_id, "Genre deleted");

    Ok(StatusCode::NO_CONTENT)
}
