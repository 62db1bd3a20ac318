use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Genre;

/// A movie together with the genres it is tagged with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub genres: Vec<Genre>,
}

impl Movie {
    /// Names of the attached genres, deduplicated and sorted
    pub fn genre_names(&self) -> BTreeSet<String> {
        self.genres.iter().map(|g| g.name.clone()).collect()
    }
}

/// What a client sees of a recommended movie: its title and genre names
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MovieSummary {
    pub title: String,
    pub genres: BTreeSet<String>,
}

impl From<&Movie> for MovieSummary {
    fn from(movie: &Movie) -> Self {
        Self {
            title: movie.title.clone(),
            genres: movie.genre_names(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie() -> Movie {
        Movie {
            id: 1,
            title: "Heat".to_string(),
            genres: vec![
                Genre { id: 2, name: "Thriller".to_string() },
                Genre { id: 1, name: "Action".to_string() },
                Genre { id: 1, name: "Action".to_string() },
            ],
        }
    }

    #[test]
    fn test_genre_names_are_sorted_and_unique() {
        let names: Vec<String> = movie().genre_names().into_iter().collect();
        assert_eq!(names, vec!["Action".to_string(), "Thriller".to_string()]);
    }

    #[test]
    fn test_summary_serialization() {
        let summary = MovieSummary::from(&movie());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "title": "Heat", "genres": ["Action", "Thriller"] })
        );
    }
}
