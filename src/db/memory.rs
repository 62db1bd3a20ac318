use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    db::store::{GenreStore, MovieQueries, MovieStore, RankingStore, UserStore},
    error::{AppError, AppResult},
    models::{Genre, Movie, Ranking, Rating, UpsertOutcome, User},
};

struct MovieRecord {
    title: String,
    genre_ids: Vec<i64>,
}

struct RankingRecord {
    user_id: i64,
    movie_id: i64,
    rating: Rating,
}

/// Tables keyed by id; BTreeMap keeps listings in id order like the SQL backend
#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    genres: BTreeMap<i64, Genre>,
    movies: BTreeMap<i64, MovieRecord>,
    rankings: BTreeMap<i64, RankingRecord>,
    user_seq: i64,
    genre_seq: i64,
    movie_seq: i64,
    ranking_seq: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

impl Tables {
    fn movie(&self, id: i64, record: &MovieRecord) -> Movie {
        let mut genres: Vec<Genre> = record
            .genre_ids
            .iter()
            .filter_map(|gid| self.genres.get(gid).cloned())
            .collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));

        Movie {
            id,
            title: record.title.clone(),
            genres,
        }
    }

    fn movies_where(&self, predicate: impl Fn(&Movie) -> bool) -> Vec<Movie> {
        self.movies
            .iter()
            .map(|(id, record)| self.movie(*id, record))
            .filter(|m| predicate(m))
            .collect()
    }

    fn ranking(&self, id: i64, record: &RankingRecord) -> AppResult<Ranking> {
        let movie = self
            .movies
            .get(&record.movie_id)
            .map(|m| self.movie(record.movie_id, m))
            .ok_or_else(|| {
                AppError::Internal(format!("Ranking {} references a missing movie", id))
            })?;

        Ok(Ranking {
            id,
            user_id: record.user_id,
            movie,
            rating: record.rating,
        })
    }

    fn username_taken(&self, username: &str, except: Option<i64>) -> bool {
        self.users
            .values()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn genre_taken(&self, name: &str, except: Option<i64>) -> bool {
        self.genres
            .values()
            .any(|g| g.name == name && Some(g.id) != except)
    }

    /// Average effective rating per rated movie
    fn average_ratings(&self) -> HashMap<i64, f64> {
        let mut totals: HashMap<i64, (u64, u64)> = HashMap::new();
        for record in self.rankings.values() {
            let entry = totals.entry(record.movie_id).or_default();
            entry.0 += u64::from(record.rating.effective());
            entry.1 += 1;
        }
        totals
            .into_iter()
            .map(|(movie_id, (sum, count))| (movie_id, sum as f64 / count as f64))
            .collect()
    }

    fn movies_by_average(&self, keep: impl Fn(f64) -> bool) -> Vec<Movie> {
        let averages = self.average_ratings();
        self.movies_where(|m| averages.get(&m.id).is_some_and(|avg| keep(*avg)))
    }
}

/// In-process store with the same semantics as `PgStore`
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MovieQueries for MemoryStore {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn rankings_for_user(&self, user_id: i64) -> AppResult<Vec<Ranking>> {
        let tables = self.tables.read().await;
        tables
            .rankings
            .iter()
            .filter(|(_, r)| r.user_id == user_id)
            .map(|(id, r)| tables.ranking(*id, r))
            .collect()
    }

    async fn movies_by_genre_names(&self, names: &HashSet<String>) -> AppResult<Vec<Movie>> {
        let tables = self.tables.read().await;
        let mut matches = Vec::new();
        for (id, record) in &tables.movies {
            let movie = tables.movie(*id, record);
            // One entry per matching genre, as a SQL join would produce
            let hits = movie.genres.iter().filter(|g| names.contains(&g.name)).count();
            for _ in 0..hits {
                matches.push(movie.clone());
            }
        }
        Ok(matches)
    }

    async fn count_rankings_for_movie(&self, movie_id: i64) -> AppResult<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .rankings
            .values()
            .filter(|r| r.movie_id == movie_id)
            .count();
        Ok(count as i64)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, username: &str) -> AppResult<User> {
        let mut tables = self.tables.write().await;
        if tables.username_taken(username, None) {
            return Err(AppError::Conflict(format!("User '{}' already exists", username)));
        }

        let user = User {
            id: next(&mut tables.user_seq),
            username: username.to_string(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    async fn update_user(&self, user_id: i64, username: &str) -> AppResult<Option<User>> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Ok(None);
        }
        if tables.username_taken(username, Some(user_id)) {
            return Err(AppError::Conflict(format!("User '{}' already exists", username)));
        }

        let user = User {
            id: user_id,
            username: username.to_string(),
        };
        tables.users.insert(user_id, user.clone());
        Ok(Some(user))
    }

    async fn delete_user(&self, user_id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&user_id).is_none() {
            return Ok(false);
        }
        tables.rankings.retain(|_, r| r.user_id != user_id);
        Ok(true)
    }
}

#[async_trait]
impl GenreStore for MemoryStore {
    async fn create_genre(&self, name: &str) -> AppResult<Genre> {
        let mut tables = self.tables.write().await;
        if tables.genre_taken(name, None) {
            return Err(AppError::Conflict(format!("Genre '{}' already exists", name)));
        }

        let genre = Genre {
            id: next(&mut tables.genre_seq),
            name: name.to_string(),
        };
        tables.genres.insert(genre.id, genre.clone());
        Ok(genre)
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        Ok(self.tables.read().await.genres.values().cloned().collect())
    }

    async fn find_genre(&self, genre_id: i64) -> AppResult<Option<Genre>> {
        Ok(self.tables.read().await.genres.get(&genre_id).cloned())
    }

    async fn find_genre_by_name(&self, name: &str) -> AppResult<Option<Genre>> {
        let tables = self.tables.read().await;
        Ok(tables.genres.values().find(|g| g.name == name).cloned())
    }

    async fn update_genre(&self, genre_id: i64, name: &str) -> AppResult<Option<Genre>> {
        let mut tables = self.tables.write().await;
        if !tables.genres.contains_key(&genre_id) {
            return Ok(None);
        }
        if tables.genre_taken(name, Some(genre_id)) {
            return Err(AppError::Conflict(format!("Genre '{}' already exists", name)));
        }

        let genre = Genre {
            id: genre_id,
            name: name.to_string(),
        };
        tables.genres.insert(genre_id, genre.clone());
        Ok(Some(genre))
    }

    async fn delete_genre(&self, genre_id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.genres.remove(&genre_id).is_none() {
            return Ok(false);
        }
        for movie in tables.movies.values_mut() {
            movie.genre_ids.retain(|gid| *gid != genre_id);
        }
        Ok(true)
    }
}

#[async_trait]
impl MovieStore for MemoryStore {
    async fn create_movie(&self, title: &str, genre_names: &BTreeSet<String>) -> AppResult<Movie> {
        let mut tables = self.tables.write().await;

        let mut genre_ids = Vec::with_capacity(genre_names.len());
        for name in genre_names {
            let existing = tables.genres.values().find(|g| &g.name == name).map(|g| g.id);
            let genre_id = match existing {
                Some(id) => id,
                None => {
                    let id = next(&mut tables.genre_seq);
                    tables.genres.insert(
                        id,
                        Genre {
                            id,
                            name: name.clone(),
                        },
                    );
                    id
                }
            };
            genre_ids.push(genre_id);
        }

        let id = next(&mut tables.movie_seq);
        let record = MovieRecord {
            title: title.to_string(),
            genre_ids,
        };
        let movie = tables.movie(id, &record);
        tables.movies.insert(id, record);
        Ok(movie)
    }

    async fn list_movies(&self) -> AppResult<Vec<Movie>> {
        Ok(self.tables.read().await.movies_where(|_| true))
    }

    async fn find_movie(&self, movie_id: i64) -> AppResult<Option<Movie>> {
        let tables = self.tables.read().await;
        Ok(tables.movies.get(&movie_id).map(|r| tables.movie(movie_id, r)))
    }

    async fn delete_movie(&self, movie_id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.movies.remove(&movie_id).is_none() {
            return Ok(false);
        }
        tables.rankings.retain(|_, r| r.movie_id != movie_id);
        Ok(true)
    }

    async fn movies_by_genre(&self, genre_name: &str) -> AppResult<Vec<Movie>> {
        let tables = self.tables.read().await;
        Ok(tables.movies_where(|m| m.genres.iter().any(|g| g.name == genre_name)))
    }

    async fn movies_by_title(&self, title: &str) -> AppResult<Vec<Movie>> {
        let wanted = title.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.movies_where(|m| m.title.to_lowercase() == wanted))
    }

    async fn movies_by_keyword(&self, keyword: &str) -> AppResult<Vec<Movie>> {
        let needle = keyword.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables.movies_where(|m| m.title.to_lowercase().contains(&needle)))
    }

    async fn movies_by_min_rating(&self, min: f64) -> AppResult<Vec<Movie>> {
        Ok(self.tables.read().await.movies_by_average(|avg| avg >= min))
    }

    async fn movies_by_max_rating(&self, max: f64) -> AppResult<Vec<Movie>> {
        Ok(self.tables.read().await.movies_by_average(|avg| avg <= max))
    }
}

#[async_trait]
impl RankingStore for MemoryStore {
    async fn upsert_ranking(
        &self,
        user_id: i64,
        movie_id: i64,
        rating: Rating,
    ) -> AppResult<(Ranking, UpsertOutcome)> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        if !tables.movies.contains_key(&movie_id) {
            return Err(AppError::NotFound(format!("Movie {} not found", movie_id)));
        }

        let existing = tables
            .rankings
            .iter()
            .find(|(_, r)| r.user_id == user_id && r.movie_id == movie_id)
            .map(|(id, _)| *id);

        let (id, outcome) = match existing {
            Some(id) => (id, UpsertOutcome::Updated),
            None => (next(&mut tables.ranking_seq), UpsertOutcome::Created),
        };

        let record = RankingRecord {
            user_id,
            movie_id,
            rating,
        };
        let ranking = tables.ranking(id, &record)?;
        tables.rankings.insert(id, record);
        Ok((ranking, outcome))
    }

    async fn delete_ranking(&self, user_id: i64, movie_id: i64) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.rankings.len();
        tables
            .rankings
            .retain(|_, r| !(r.user_id == user_id && r.movie_id == movie_id));
        Ok(tables.rankings.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn genres(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        assert_ok!(store.create_user("alice").await);
        let err = assert_err!(store.create_user("alice").await);
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_user_to_taken_name_conflicts() {
        let store = MemoryStore::new();
        store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();

        let err = assert_err!(store.update_user(bob.id, "alice").await);
        assert!(matches!(err, AppError::Conflict(_)));

        // Renaming to one's own name is fine
        let same = store.update_user(bob.id, "bob").await.unwrap();
        assert_eq!(same.map(|u| u.username), Some("bob".to_string()));
    }

    #[tokio::test]
    async fn test_create_movie_reuses_existing_genres() {
        let store = MemoryStore::new();
        let action = store.create_genre("Action").await.unwrap();

        let movie = store
            .create_movie("Heat", &genres(&["Action", "Crime"]))
            .await
            .unwrap();

        assert_eq!(movie.genres.len(), 2);
        assert!(movie.genres.contains(&action));
        assert_eq!(store.list_genres().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_row_per_pair() {
        let store = MemoryStore::new();
        let user = store.create_user("alice").await.unwrap();
        let movie = store.create_movie("Heat", &genres(&["Action"])).await.unwrap();

        let (first, outcome) = store
            .upsert_ranking(user.id, movie.id, Rating::Explicit(2))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let (second, outcome) = store
            .upsert_ranking(user.id, movie.id, Rating::Implicit(90))
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated);
        assert_eq!(first.id, second.id);
        assert_eq!(second.rating, Rating::Implicit(90));

        assert_eq!(store.count_rankings_for_movie(movie.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_unknown_user_or_movie() {
        let store = MemoryStore::new();
        let user = store.create_user("alice").await.unwrap();

        let err = assert_err!(store.upsert_ranking(user.id, 99, Rating::Explicit(3)).await);
        assert!(matches!(err, AppError::NotFound(_)));

        let err = assert_err!(store.upsert_ranking(99, 1, Rating::Explicit(3)).await);
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_rankings() {
        let store = MemoryStore::new();
        let user = store.create_user("alice").await.unwrap();
        let movie = store.create_movie("Heat", &genres(&["Action"])).await.unwrap();
        store
            .upsert_ranking(user.id, movie.id, Rating::Explicit(5))
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert_eq!(store.count_rankings_for_movie(movie.id).await.unwrap(), 0);
        assert!(store.find_user(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_deleting_genre_detaches_it_from_movies() {
        let store = MemoryStore::new();
        let movie = store
            .create_movie("Heat", &genres(&["Action", "Crime"]))
            .await
            .unwrap();
        let crime = store.find_genre_by_name("Crime").await.unwrap().unwrap();

        assert!(store.delete_genre(crime.id).await.unwrap());

        let movie = store.find_movie(movie.id).await.unwrap().unwrap();
        let names: Vec<String> = movie.genres.into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["Action".to_string()]);
    }

    #[tokio::test]
    async fn test_movies_by_genre_names_returns_one_row_per_match() {
        let store = MemoryStore::new();
        let both = store
            .create_movie("Rush Hour", &genres(&["Action", "Comedy"]))
            .await
            .unwrap();
        let comedy = store.create_movie("Airplane!", &genres(&["Comedy"])).await.unwrap();
        store.create_movie("Amour", &genres(&["Drama"])).await.unwrap();

        let wanted: HashSet<String> = ["Action", "Comedy"].iter().map(|s| s.to_string()).collect();
        let ids: Vec<i64> = store
            .movies_by_genre_names(&wanted)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();

        assert_eq!(ids, vec![both.id, both.id, comedy.id]);
    }

    #[tokio::test]
    async fn test_default_batch_count_covers_unrated_movies() {
        let store = MemoryStore::new();
        let user = store.create_user("alice").await.unwrap();
        let rated = store.create_movie("Heat", &genres(&[])).await.unwrap();
        let unrated = store.create_movie("Ronin", &genres(&[])).await.unwrap();
        store
            .upsert_ranking(user.id, rated.id, Rating::Explicit(4))
            .await
            .unwrap();

        let counts = store
            .count_rankings_for_movies(&[rated.id, unrated.id])
            .await
            .unwrap();
        assert_eq!(counts.get(&rated.id), Some(&1));
        assert_eq!(counts.get(&unrated.id), Some(&0));
    }

    #[tokio::test]
    async fn test_average_rating_filters_use_effective_scale() {
        let store = MemoryStore::new();
        let alice = store.create_user("alice").await.unwrap();
        let bob = store.create_user("bob").await.unwrap();
        let good = store.create_movie("Heat", &genres(&[])).await.unwrap();
        let poor = store.create_movie("Gigli", &genres(&[])).await.unwrap();
        store.create_movie("Unrated", &genres(&[])).await.unwrap();

        // (5 + 4) / 2 = 4.5
        store.upsert_ranking(alice.id, good.id, Rating::Explicit(5)).await.unwrap();
        store.upsert_ranking(bob.id, good.id, Rating::Implicit(75)).await.unwrap();
        // (1 + 2) / 2 = 1.5
        store.upsert_ranking(alice.id, poor.id, Rating::Implicit(10)).await.unwrap();
        store.upsert_ranking(bob.id, poor.id, Rating::Explicit(2)).await.unwrap();

        let high: Vec<i64> = store
            .movies_by_min_rating(4.5)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(high, vec![good.id]);

        let low: Vec<i64> = store
            .movies_by_max_rating(2.0)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(low, vec![poor.id]);
    }

    #[tokio::test]
    async fn test_title_and_keyword_matching_ignore_case() {
        let store = MemoryStore::new();
        let heat = store.create_movie("Heat", &genres(&[])).await.unwrap();
        let heathers = store.create_movie("Heathers", &genres(&[])).await.unwrap();

        let exact = store.movies_by_title("HEAT").await.unwrap();
        assert_eq!(exact.iter().map(|m| m.id).collect::<Vec<_>>(), vec![heat.id]);

        let partial = store.movies_by_keyword("eat").await.unwrap();
        assert_eq!(
            partial.iter().map(|m| m.id).collect::<Vec<_>>(),
            vec![heat.id, heathers.id]
        );
    }
}
