use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{listing_or_no_content, movies::MovieResponse, AppState};
use crate::{
    db::{MovieQueries, RankingStore},
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{MovieSummary, Ranking, RankingKind, Rating, UpsertOutcome},
    services::recommendations::Recommendations,
};

#[derive(Debug, Serialize)]
pub struct RankingResponse {
    pub movie: MovieResponse,
    pub rank1: Option<u8>,
    pub rank2: Option<u8>,
}

impl From<&Ranking> for RankingResponse {
    fn from(ranking: &Ranking) -> Self {
        Self {
            movie: MovieResponse::from(&ranking.movie),
            rank1: ranking.rating.rank1(),
            rank2: ranking.rating.rank2(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RankingTypeQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RatingQuery {
    pub rank1: Option<i32>,
    pub rank2: Option<i32>,
}

/// Recommended movies; `message` explains an empty list
#[derive(Debug, Serialize)]
pub struct RecommendationsResponse {
    pub movies: Vec<MovieSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

impl From<&Recommendations> for RecommendationsResponse {
    fn from(recommendations: &Recommendations) -> Self {
        let message = match recommendations {
            Recommendations::Ranked(_) => None,
            Recommendations::Empty(reason) => Some(reason.message()),
        };
        Self {
            movies: recommendations.movies().iter().map(MovieSummary::from).collect(),
            message,
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/user/:user_id", get(rankings_for_user))
        .route(
            "/user/:user_id/movie/:movie_id",
            post(rank_movie).delete(delete_ranking),
        )
        .route("/user/:user_id/recommendations", get(recommendations))
}

pub async fn rankings_for_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<RankingTypeQuery>,
) -> AppResult<Response> {
    if state.store.find_user(user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let kind = query.kind.as_deref().map(RankingKind::parse).unwrap_or_default();
    let rankings: Vec<RankingResponse> = state
        .store
        .rankings_for_user(user_id)
        .await?
        .iter()
        .filter(|r| kind.matches(&r.rating))
        .map(RankingResponse::from)
        .collect();

    Ok(listing_or_no_content(rankings))
}

pub async fn rank_movie(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((user_id, movie_id)): Path<(i64, i64)>,
    Query(query): Query<RatingQuery>,
) -> AppResult<(StatusCode, Json<RankingResponse>)> {
    let rating = Rating::from_parts(query.rank1, query.rank2)?;
    let (ranking, outcome) = state.store.upsert_ranking(user_id, movie_id, rating).await?;

    tracing::info!(
        request_id = %request_id,
        user_id,
        movie_id,
        outcome = ?outcome,
        "Ranking saved"
    );

    let status = match outcome {
        UpsertOutcome::Created => StatusCode::CREATED,
        UpsertOutcome::Updated => StatusCode::OK,
    };
    Ok((status, Json(RankingResponse::from(&ranking))))
}

pub async fn delete_ranking(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path((user_id, movie_id)): Path<(i64, i64)>,
) -> AppResult<StatusCode> {
    if !state.store.delete_ranking(user_id, movie_id).await? {
        return Err(AppError::NotFound(format!(
            "User {} has not ranked movie {}",
            user_id, movie_id
        )));
    }

    tracing::info!(request_id = %request_id, user_id, movie_id, "Ranking deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn recommendations(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<RecommendationsResponse>> {
    tracing::info!(request_id = %request_id, user_id, "Processing recommendation request");

    let recommendations = state
        .recommender
        .recommend(state.store.as_ref(), user_id)
        .await?;

    Ok(Json(RecommendationsResponse::from(&recommendations)))
}
