use std::collections::HashSet;

use crate::{db::MovieQueries, error::AppResult, models::Ranking};

/// What a user's rating history tells the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserHistory {
    /// Every movie the user has rated, at any score
    pub rated_movie_ids: HashSet<i64>,
    /// Genres of the highly rated movies; `None` when nothing is highly rated
    pub preferred_genres: Option<HashSet<String>>,
}

impl UserHistory {
    pub fn from_rankings(rankings: &[Ranking]) -> Self {
        Self {
            rated_movie_ids: rankings.iter().map(|r| r.movie.id).collect(),
            preferred_genres: preferred_genres(rankings),
        }
    }
}

/// Loads the user's rankings and derives their history
pub async fn extract<S>(source: &S, user_id: i64) -> AppResult<UserHistory>
where
    S: MovieQueries + ?Sized,
{
    let rankings = source.rankings_for_user(user_id).await?;
    let history = UserHistory::from_rankings(&rankings);

    tracing::debug!(
        user_id,
        rankings = rankings.len(),
        preferred_genres = history.preferred_genres.as_ref().map_or(0, |g| g.len()),
        "Extracted user preferences"
    );

    Ok(history)
}

/// Union of the genre names attached to highly rated movies
fn preferred_genres(rankings: &[Ranking]) -> Option<HashSet<String>> {
    let mut highly_rated = rankings
        .iter()
        .filter(|r| r.rating.is_highly_rated())
        .peekable();

    highly_rated.peek()?;

    Some(
        highly_rated
            .flat_map(|r| r.movie.genres.iter().map(|g| g.name.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Genre, Movie, Rating};

    fn ranking(movie_id: i64, genres: &[&str], rating: Rating) -> Ranking {
        Ranking {
            id: movie_id,
            user_id: 1,
            movie: Movie {
                id: movie_id,
                title: format!("Movie {}", movie_id),
                genres: genres
                    .iter()
                    .enumerate()
                    .map(|(i, name)| Genre {
                        id: i as i64,
                        name: name.to_string(),
                    })
                    .collect(),
            },
            rating,
        }
    }

    #[test]
    fn test_no_highly_rated_means_no_preference() {
        let rankings = vec![
            ranking(1, &["Action"], Rating::Explicit(3)),
            ranking(2, &["Drama"], Rating::Implicit(60)),
        ];
        let history = UserHistory::from_rankings(&rankings);
        assert_eq!(history.preferred_genres, None);
        assert_eq!(history.rated_movie_ids, HashSet::from([1, 2]));
    }

    #[test]
    fn test_genres_are_unioned_and_deduplicated() {
        let rankings = vec![
            ranking(1, &["Action", "Thriller"], Rating::Explicit(5)),
            ranking(2, &["Action", "Sci-Fi"], Rating::Implicit(85)),
            ranking(3, &["Romance"], Rating::Explicit(1)),
        ];
        let history = UserHistory::from_rankings(&rankings);
        let expected: HashSet<String> = ["Action", "Thriller", "Sci-Fi"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(history.preferred_genres, Some(expected));
    }

    #[test]
    fn test_highly_rated_movie_without_genres_yields_empty_set() {
        let rankings = vec![ranking(1, &[], Rating::Explicit(5))];
        let history = UserHistory::from_rankings(&rankings);
        assert_eq!(history.preferred_genres, Some(HashSet::new()));
    }

    #[test]
    fn test_empty_history() {
        let history = UserHistory::from_rankings(&[]);
        assert!(history.rated_movie_ids.is_empty());
        assert_eq!(history.preferred_genres, None);
    }
}
