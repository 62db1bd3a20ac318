use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{listing_or_no_content, required_text, AppState};
use crate::{
    db::MovieStore,
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::Movie,
    services::movie_search::{self, SearchCriteria},
};

#[derive(Debug, Deserialize)]
pub struct CreateMovieRequest {
    pub title: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MovieResponse {
    pub id: i64,
    pub title: String,
    pub genres: BTreeSet<String>,
}

impl From<&Movie> for MovieResponse {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            genres: movie.genre_names(),
        }
    }
}

fn responses(movies: &[Movie]) -> Vec<MovieResponse> {
    movies.iter().map(MovieResponse::from).collect()
}

#[derive(Debug, Deserialize)]
pub struct GenreQuery {
    pub genre: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinRankingQuery {
    pub min_ranking: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxRankingQuery {
    pub max_ranking: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub title: Option<String>,
    pub genres: Option<String>,
    pub keyword: Option<String>,
}

impl From<SearchQuery> for SearchCriteria {
    fn from(query: SearchQuery) -> Self {
        Self {
            title: query.title,
            genres: query
                .genres
                .as_deref()
                .map(SearchCriteria::parse_genres)
                .unwrap_or_default(),
            keyword: query.keyword,
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_movies))
        .route("/create", post(create_movie))
        .route("/by-genre", get(movies_by_genre))
        .route("/by-min-ranking", get(movies_by_min_ranking))
        .route("/by-max-ranking", get(movies_by_max_ranking))
        .route("/search", get(search_movies))
        .route("/:id", get(get_movie).delete(delete_movie))
}

fn movie_not_found(movie_id: i64) -> AppError {
    AppError::NotFound(format!("Movie {} not found", movie_id))
}

fn finite_bound(value: f64, name: &str) -> AppResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AppError::InvalidInput(format!("{} must be a finite number", name)))
    }
}

pub async fn create_movie(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<CreateMovieRequest>,
) -> AppResult<(StatusCode, Json<MovieResponse>)> {
    let title = required_text(&request.title, "title")?;
    let genres = request
        .genres
        .iter()
        .map(|name| required_text(name, "genre name"))
        .collect::<AppResult<BTreeSet<String>>>()?;

    let movie = state.store.create_movie(&title, &genres).await?;

    tracing::info!(
        request_id = %request_id,
        movie_id = movie.id,
        genre_count = movie.genres.len(),
        "Movie created"
    );

    Ok((StatusCode::CREATED, Json(MovieResponse::from(&movie))))
}

pub async fn list_movies(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<MovieResponse>>> {
    let movies = state.store.list_movies().await?;
    Ok(Json(responses(&movies)))
}

pub async fn get_movie(
    State(state): State<Arc<AppState>>,
    Path(movie_id): Path<i64>,
) -> AppResult<Json<MovieResponse>> {
    let movie = state
        .store
        .find_movie(movie_id)
        .await?
        .ok_or_else(|| movie_not_found(movie_id))?;
    Ok(Json(MovieResponse::from(&movie)))
}

pub async fn delete_movie(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(movie_id): Path<i64>,
) -> AppResult<StatusCode> {
    if !state.store.delete_movie(movie_id).await? {
        return Err(movie_not_found(movie_id));
    }

    tracing::info!(request_id = %request_id, movie_id, "Movie deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn movies_by_genre(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GenreQuery>,
) -> AppResult<Response> {
    let movies = state.store.movies_by_genre(query.genre.trim()).await?;
    Ok(listing_or_no_content(responses(&movies)))
}

pub async fn movies_by_min_ranking(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MinRankingQuery>,
) -> AppResult<Response> {
    let min = finite_bound(query.min_ranking, "minRanking")?;
    let movies = state.store.movies_by_min_rating(min).await?;
    Ok(listing_or_no_content(responses(&movies)))
}

pub async fn movies_by_max_ranking(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MaxRankingQuery>,
) -> AppResult<Response> {
    let max = finite_bound(query.max_ranking, "maxRanking")?;
    let movies = state.store.movies_by_max_rating(max).await?;
    Ok(listing_or_no_content(responses(&movies)))
}

pub async fn search_movies(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<MovieResponse>>> {
    let criteria = SearchCriteria::from(query);
    let movies = movie_search::search(state.store.as_ref(), &criteria).await?;

    tracing::info!(request_id = %request_id, matches = movies.len(), "Movie search");

    Ok(Json(responses(&movies)))
}
