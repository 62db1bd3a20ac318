use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::models::Movie;

/// Direction of the popularity sort. `Ascending` puts the least-ranked
/// movies first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopularityOrder {
    #[default]
    Ascending,
    Descending,
}

impl PopularityOrder {
    pub fn compare(self, a: i64, b: i64) -> Ordering {
        match self {
            PopularityOrder::Ascending => a.cmp(&b),
            PopularityOrder::Descending => b.cmp(&a),
        }
    }
}

/// Drops every candidate the user has already rated
pub fn exclude_rated(candidates: Vec<Movie>, rated_movie_ids: &HashSet<i64>) -> Vec<Movie> {
    candidates
        .into_iter()
        .filter(|m| !rated_movie_ids.contains(&m.id))
        .collect()
}

/// Orders candidates by ranking count. Ties keep their incoming order.
pub fn rank_by_popularity(
    candidates: Vec<Movie>,
    popularity: &HashMap<i64, i64>,
    order: PopularityOrder,
) -> Vec<Movie> {
    let mut scored: Vec<(i64, Movie)> = candidates
        .into_iter()
        .map(|m| (popularity.get(&m.id).copied().unwrap_or(0), m))
        .collect();

    // sort_by is stable
    scored.sort_by(|(a, _), (b, _)| order.compare(*a, *b));

    scored.into_iter().map(|(_, m)| m).collect()
}
