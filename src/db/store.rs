//! Persistence traits
//!
//! The CRUD surface talks to storage through `UserStore`, `GenreStore`,
//! `MovieStore` and `RankingStore`. The recommendation engine only ever
//! needs the read operations grouped in `MovieQueries`.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    error::AppResult,
    models::{Genre, Movie, Ranking, Rating, UpsertOutcome, User},
};

/// Read-only queries consumed by the recommendation engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MovieQueries: Send + Sync {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>>;

    /// Every ranking the user has left, each with its movie and genres
    async fn rankings_for_user(&self, user_id: i64) -> AppResult<Vec<Ranking>>;

    /// Movies carrying at least one of `names`
    ///
    /// A movie matching several names may be returned once per match.
    async fn movies_by_genre_names(&self, names: &HashSet<String>) -> AppResult<Vec<Movie>>;

    /// Number of rankings, across all users, referencing the movie
    async fn count_rankings_for_movie(&self, movie_id: i64) -> AppResult<i64>;

    /// Ranking counts for several movies at once
    ///
    /// Default implementation issues one count per movie. Backends with a
    /// grouped query should override it.
    async fn count_rankings_for_movies(&self, movie_ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        let mut counts = HashMap::with_capacity(movie_ids.len());
        for &movie_id in movie_ids {
            let count = self.count_rankings_for_movie(movie_id).await?;
            counts.insert(movie_id, count);
        }
        Ok(counts)
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `Conflict` when the username is taken
    async fn create_user(&self, username: &str) -> AppResult<User>;

    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// `None` when no user has this id
    async fn update_user(&self, user_id: i64, username: &str) -> AppResult<Option<User>>;

    /// Also removes the user's rankings. Returns whether a user was deleted.
    async fn delete_user(&self, user_id: i64) -> AppResult<bool>;
}

#[async_trait]
pub trait GenreStore: Send + Sync {
    async fn create_genre(&self, name: &str) -> AppResult<Genre>;

    async fn list_genres(&self) -> AppResult<Vec<Genre>>;

    async fn find_genre(&self, genre_id: i64) -> AppResult<Option<Genre>>;

    async fn find_genre_by_name(&self, name: &str) -> AppResult<Option<Genre>>;

    async fn update_genre(&self, genre_id: i64, name: &str) -> AppResult<Option<Genre>>;

    /// Detaches the genre from every movie before removing it
    async fn delete_genre(&self, genre_id: i64) -> AppResult<bool>;
}

#[async_trait]
pub trait MovieStore: Send + Sync {
    /// Inserts a movie, creating any genre name that does not exist yet
    async fn create_movie(&self, title: &str, genre_names: &BTreeSet<String>) -> AppResult<Movie>;

    async fn list_movies(&self) -> AppResult<Vec<Movie>>;

    async fn find_movie(&self, movie_id: i64) -> AppResult<Option<Movie>>;

    /// Also removes every ranking of the movie
    async fn delete_movie(&self, movie_id: i64) -> AppResult<bool>;

    async fn movies_by_genre(&self, genre_name: &str) -> AppResult<Vec<Movie>>;

    /// Case-insensitive exact title match
    async fn movies_by_title(&self, title: &str) -> AppResult<Vec<Movie>>;

    /// Case-insensitive substring match on the title
    async fn movies_by_keyword(&self, keyword: &str) -> AppResult<Vec<Movie>>;

    /// Movies whose average effective rating is at least `min`
    async fn movies_by_min_rating(&self, min: f64) -> AppResult<Vec<Movie>>;

    /// Movies whose average effective rating is at most `max`
    async fn movies_by_max_rating(&self, max: f64) -> AppResult<Vec<Movie>>;
}

#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Creates the (user, movie) ranking or replaces its rating.
    ///
    /// At most one row ever exists per pair, even under concurrent writers.
    async fn upsert_ranking(
        &self,
        user_id: i64,
        movie_id: i64,
        rating: Rating,
    ) -> AppResult<(Ranking, UpsertOutcome)>;

    async fn delete_ranking(&self, user_id: i64, movie_id: i64) -> AppResult<bool>;
}

/// Everything the HTTP layer needs from a backend
pub trait Store: UserStore + GenreStore + MovieStore + RankingStore + MovieQueries {}

impl<T> Store for T where T: UserStore + GenreStore + MovieStore + RankingStore + MovieQueries {}
