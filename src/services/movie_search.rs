use std::collections::HashSet;

use crate::{db::MovieStore, error::AppResult, models::Movie};

/// Filters accepted by the combined movie search
///
/// Blank values are ignored. Results of the remaining filters are unioned.
#[derive(Debug, Default, Clone)]
pub struct SearchCriteria {
    pub title: Option<String>,
    pub genres: Vec<String>,
    pub keyword: Option<String>,
}

impl SearchCriteria {
    /// Splits a comma-separated genre list, dropping blank entries
    pub fn parse_genres(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn title(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    fn keyword(&self) -> Option<&str> {
        non_blank(self.keyword.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Runs every present filter and returns the union, each movie once,
/// in the order it was first found.
pub async fn search<S>(store: &S, criteria: &SearchCriteria) -> AppResult<Vec<Movie>>
where
    S: MovieStore + ?Sized,
{
    let mut found = Vec::new();

    if let Some(title) = criteria.title() {
        found.extend(store.movies_by_title(title).await?);
    }
    for genre in &criteria.genres {
        found.extend(store.movies_by_genre(genre).await?);
    }
    if let Some(keyword) = criteria.keyword() {
        found.extend(store.movies_by_keyword(keyword).await?);
    }

    let mut seen = HashSet::new();
    found.retain(|movie| seen.insert(movie.id));

    tracing::debug!(matches = found.len(), "Movie search finished");

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use std::collections::BTreeSet;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (title, genres) in [
            ("Heat", vec!["Action", "Crime"]),
            ("Heathers", vec!["Comedy"]),
            ("Alien", vec!["Horror", "Sci-Fi"]),
        ] {
            let genres: BTreeSet<String> = genres.into_iter().map(str::to_string).collect();
            store.create_movie(title, &genres).await.unwrap();
        }
        store
    }

    fn titles(movies: &[Movie]) -> Vec<&str> {
        movies.iter().map(|m| m.title.as_str()).collect()
    }

    #[test]
    fn test_parse_genres_trims_and_skips_blanks() {
        assert_eq!(
            SearchCriteria::parse_genres(" Action, ,Crime,"),
            vec!["Action".to_string(), "Crime".to_string()]
        );
    }

    #[tokio::test]
    async fn test_no_criteria_finds_nothing() {
        let store = seeded().await;
        let criteria = SearchCriteria {
            title: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(search(&store, &criteria).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_filters_are_unioned_without_duplicates() {
        let store = seeded().await;
        let criteria = SearchCriteria {
            title: Some("heat".to_string()),
            genres: vec!["Crime".to_string(), "Horror".to_string()],
            keyword: Some("Heat".to_string()),
        };

        let movies = search(&store, &criteria).await.unwrap();
        assert_eq!(titles(&movies), vec!["Heat", "Alien", "Heathers"]);
    }
}
