//! Movie recommendations from a single user's rating history.
//!
//! The pipeline runs in three stages, each of which collapses to an empty
//! outcome rather than an error when it has nothing to work with:
//!
//! 1. `preferences`: genres of the movies the user rated highly
//! 2. `candidates`: every movie sharing one of those genres
//! 3. `ranking`: drop already-rated movies, order by ranking count

pub mod candidates;
pub mod normalizer;
pub mod preferences;
pub mod ranking;

pub use ranking::PopularityOrder;

use crate::{
    db::MovieQueries,
    error::{AppError, AppResult},
    models::Movie,
};

/// Why a recommendation request produced no movies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// The user has not rated any movie highly
    NoPreferenceSignal,
    /// No unrated movie shares a preferred genre
    NoCandidates,
}

impl EmptyReason {
    pub fn message(&self) -> &'static str {
        match self {
            EmptyReason::NoPreferenceSignal => {
                "No recommendations available: the user has no highly rated movies"
            }
            EmptyReason::NoCandidates => {
                "No recommendations available: no unrated movies match the preferred genres"
            }
        }
    }
}

/// Outcome of a recommendation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recommendations {
    Ranked(Vec<Movie>),
    Empty(EmptyReason),
}

impl Recommendations {
    pub fn movies(&self) -> &[Movie] {
        match self {
            Recommendations::Ranked(movies) => movies,
            Recommendations::Empty(_) => &[],
        }
    }
}

/// Runs the recommendation pipeline against a `MovieQueries` backend
#[derive(Debug, Clone, Copy, Default)]
pub struct Recommender {
    order: PopularityOrder,
}

impl Recommender {
    pub fn new(order: PopularityOrder) -> Self {
        Self { order }
    }

    pub fn order(&self) -> PopularityOrder {
        self.order
    }

    /// Recommends movies for `user_id`.
    ///
    /// Fails with `NotFound` for an unknown user; storage failures are
    /// propagated unchanged. Everything else ends in `Ranked` or `Empty`.
    #[tracing::instrument(skip(self, source), fields(order = ?self.order))]
    pub async fn recommend<S>(&self, source: &S, user_id: i64) -> AppResult<Recommendations>
    where
        S: MovieQueries + ?Sized,
    {
        let user = source
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let history = preferences::extract(source, user.id).await?;

        let Some(preferred_genres) = history.preferred_genres else {
            tracing::info!(user_id, "No highly rated movies, nothing to recommend");
            return Ok(Recommendations::Empty(EmptyReason::NoPreferenceSignal));
        };

        let candidates = candidates::generate(source, &preferred_genres).await?;
        let candidate_count = candidates.len();
        let remaining = ranking::exclude_rated(candidates, &history.rated_movie_ids);

        tracing::debug!(
            user_id,
            candidates = candidate_count,
            excluded = candidate_count - remaining.len(),
            "Excluded already rated movies"
        );

        if remaining.is_empty() {
            tracing::info!(user_id, "No candidates left after exclusion");
            return Ok(Recommendations::Empty(EmptyReason::NoCandidates));
        }

        let movie_ids: Vec<i64> = remaining.iter().map(|m| m.id).collect();
        let popularity = source.count_rankings_for_movies(&movie_ids).await?;
        let ranked = ranking::rank_by_popularity(remaining, &popularity, self.order);

        tracing::info!(user_id, count = ranked.len(), "Recommendations ranked");

        Ok(Recommendations::Ranked(ranked))
    }
}
