use std::collections::HashSet;

use crate::{db::MovieQueries, error::AppResult, models::Movie};

/// Every movie sharing at least one genre with `preferred_genres`, once each.
///
/// An empty genre set short-circuits without touching storage.
pub async fn generate<S>(source: &S, preferred_genres: &HashSet<String>) -> AppResult<Vec<Movie>>
where
    S: MovieQueries + ?Sized,
{
    if preferred_genres.is_empty() {
        return Ok(Vec::new());
    }

    let matches = source.movies_by_genre_names(preferred_genres).await?;
    let candidates = dedup_by_id(matches);

    tracing::debug!(candidates = candidates.len(), "Generated candidates");

    Ok(candidates)
}

/// Keeps the first occurrence of each movie id
pub fn dedup_by_id(movies: Vec<Movie>) -> Vec<Movie> {
    let mut seen = HashSet::new();
    movies.into_iter().filter(|m| seen.insert(m.id)).collect()
}
