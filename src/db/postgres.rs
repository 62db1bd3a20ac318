use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::{
    db::store::{GenreStore, MovieQueries, MovieStore, RankingStore, UserStore},
    error::{AppError, AppResult},
    models::{Genre, Movie, Ranking, Rating, UpsertOutcome, User},
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

/// Average of the effective 1-5 rating over a movie's rankings
///
/// Must stay in step with `services::recommendations::normalizer`.
const AVERAGE_EFFECTIVE_RATING: &str = r#"
    AVG(
        CASE
            WHEN r.rank1 IS NOT NULL THEN r.rank1
            WHEN r.rank2 <= 20 THEN 1
            WHEN r.rank2 <= 40 THEN 2
            WHEN r.rank2 <= 60 THEN 3
            WHEN r.rank2 <= 80 THEN 4
            ELSE 5
        END
    )::float8
"#;

#[derive(sqlx::FromRow)]
struct MovieRow {
    id: i64,
    title: String,
}

#[derive(sqlx::FromRow)]
struct MovieGenreRow {
    movie_id: i64,
    id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct RankingRow {
    id: i64,
    user_id: i64,
    movie_id: i64,
    rank1: Option<i16>,
    rank2: Option<i16>,
}

#[derive(sqlx::FromRow)]
struct UpsertRow {
    id: i64,
    user_id: i64,
    movie_id: i64,
    rank1: Option<i16>,
    rank2: Option<i16>,
    inserted: bool,
}

fn decode_rating(rank1: Option<i16>, rank2: Option<i16>) -> AppResult<Rating> {
    Rating::from_stored(rank1.map(i32::from), rank2.map(i32::from))
}

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Loads genres for the given rows and assembles movies in row order
    async fn attach_genres(&self, rows: Vec<MovieRow>) -> AppResult<Vec<Movie>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let genre_rows = sqlx::query_as::<_, MovieGenreRow>(
            r#"
            SELECT mg.movie_id, g.id, g.name
            FROM movie_genres mg
            JOIN genres g ON g.id = mg.genre_id
            WHERE mg.movie_id = ANY($1)
            ORDER BY g.name
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut by_movie: HashMap<i64, Vec<Genre>> = HashMap::new();
        for row in genre_rows {
            by_movie.entry(row.movie_id).or_default().push(Genre {
                id: row.id,
                name: row.name,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| Movie {
                genres: by_movie.get(&row.id).cloned().unwrap_or_default(),
                id: row.id,
                title: row.title,
            })
            .collect())
    }

    async fn movies_by_ids(&self, ids: &[i64]) -> AppResult<HashMap<i64, Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>("SELECT id, title FROM movies WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(self
            .attach_genres(rows)
            .await?
            .into_iter()
            .map(|m| (m.id, m))
            .collect())
    }

    async fn movies_by_average(&self, comparison: &str, bound: f64) -> AppResult<Vec<Movie>> {
        let sql = format!(
            r#"
            SELECT m.id, m.title
            FROM movies m
            JOIN rankings r ON r.movie_id = m.id
            GROUP BY m.id, m.title
            HAVING {} {} $1
            ORDER BY m.id
            "#,
            AVERAGE_EFFECTIVE_RATING, comparison
        );

        let rows = sqlx::query_as::<_, MovieRow>(&sql)
            .bind(bound)
            .fetch_all(&self.pool)
            .await?;

        self.attach_genres(rows).await
    }
}

#[async_trait]
impl MovieQueries for PgStore {
    async fn find_user(&self, user_id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT id, username FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn rankings_for_user(&self, user_id: i64) -> AppResult<Vec<Ranking>> {
        let rows = sqlx::query_as::<_, RankingRow>(
            r#"
            SELECT id, user_id, movie_id, rank1, rank2
            FROM rankings
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let movie_ids: Vec<i64> = rows.iter().map(|r| r.movie_id).collect();
        let movies = self.movies_by_ids(&movie_ids).await?;

        rows.into_iter()
            .map(|row| {
                let movie = movies.get(&row.movie_id).cloned().ok_or_else(|| {
                    AppError::Internal(format!("Ranking {} references a missing movie", row.id))
                })?;
                Ok(Ranking {
                    id: row.id,
                    user_id: row.user_id,
                    movie,
                    rating: decode_rating(row.rank1, row.rank2)?,
                })
            })
            .collect()
    }

    async fn movies_by_genre_names(&self, names: &HashSet<String>) -> AppResult<Vec<Movie>> {
        let names: Vec<String> = names.iter().cloned().collect();
        let rows = sqlx::query_as::<_, MovieRow>(
            r#"
            SELECT m.id, m.title
            FROM movies m
            JOIN movie_genres mg ON mg.movie_id = m.id
            JOIN genres g ON g.id = mg.genre_id
            WHERE g.name = ANY($1)
            ORDER BY m.id
            "#,
        )
        .bind(&names[..])
        .fetch_all(&self.pool)
        .await?;

        self.attach_genres(rows).await
    }

    async fn count_rankings_for_movie(&self, movie_id: i64) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rankings WHERE movie_id = $1")
            .bind(movie_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_rankings_for_movies(&self, movie_ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT movie_id, COUNT(*)
            FROM rankings
            WHERE movie_id = ANY($1)
            GROUP BY movie_id
            "#,
        )
        .bind(movie_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut counts: HashMap<i64, i64> = movie_ids.iter().map(|id| (*id, 0)).collect();
        counts.extend(rows);
        Ok(counts)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, username: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>("INSERT INTO users (username) VALUES ($1) RETURNING id, username")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::from_unique_violation(e, format!("User '{}' already exists", username))
            })
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT id, username FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_user(&self, user_id: i64, username: &str) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET username = $2 WHERE id = $1 RETURNING id, username",
        )
        .bind(user_id)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::from_unique_violation(e, format!("User '{}' already exists", username)))
    }

    async fn delete_user(&self, user_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl GenreStore for PgStore {
    async fn create_genre(&self, name: &str) -> AppResult<Genre> {
        sqlx::query_as::<_, Genre>("INSERT INTO genres (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, format!("Genre '{}' already exists", name)))
    }

    async fn list_genres(&self) -> AppResult<Vec<Genre>> {
        let genres = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(genres)
    }

    async fn find_genre(&self, genre_id: i64) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE id = $1")
            .bind(genre_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(genre)
    }

    async fn find_genre_by_name(&self, name: &str) -> AppResult<Option<Genre>> {
        let genre = sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(genre)
    }

    async fn update_genre(&self, genre_id: i64, name: &str) -> AppResult<Option<Genre>> {
        sqlx::query_as::<_, Genre>("UPDATE genres SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(genre_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::from_unique_violation(e, format!("Genre '{}' already exists", name)))
    }

    async fn delete_genre(&self, genre_id: i64) -> AppResult<bool> {
        // movie_genres rows go with it through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM genres WHERE id = $1")
            .bind(genre_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MovieStore for PgStore {
    async fn create_movie(&self, title: &str, genre_names: &BTreeSet<String>) -> AppResult<Movie> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MovieRow>(
            "INSERT INTO movies (title) VALUES ($1) RETURNING id, title",
        )
        .bind(title)
        .fetch_one(&mut *tx)
        .await?;

        let mut genres = Vec::with_capacity(genre_names.len());
        for name in genre_names {
            // Find-or-create; the no-op update makes RETURNING yield the existing row
            let genre = sqlx::query_as::<_, Genre>(
                r#"
                INSERT INTO genres (name) VALUES ($1)
                ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
                RETURNING id, name
                "#,
            )
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO movie_genres (movie_id, genre_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(row.id)
            .bind(genre.id)
            .execute(&mut *tx)
            .await?;

            genres.push(genre);
        }

        tx.commit().await?;

        tracing::debug!(movie_id = row.id, genres = genres.len(), "Movie inserted");

        Ok(Movie {
            id: row.id,
            title: row.title,
            genres,
        })
    }

    async fn list_movies(&self) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>("SELECT id, title FROM movies ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        self.attach_genres(rows).await
    }

    async fn find_movie(&self, movie_id: i64) -> AppResult<Option<Movie>> {
        let row = sqlx::query_as::<_, MovieRow>("SELECT id, title FROM movies WHERE id = $1")
            .bind(movie_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_genres(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn delete_movie(&self, movie_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM movies WHERE id = $1")
            .bind(movie_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn movies_by_genre(&self, genre_name: &str) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>(
            r#"
            SELECT m.id, m.title
            FROM movies m
            JOIN movie_genres mg ON mg.movie_id = m.id
            JOIN genres g ON g.id = mg.genre_id
            WHERE g.name = $1
            ORDER BY m.id
            "#,
        )
        .bind(genre_name)
        .fetch_all(&self.pool)
        .await?;

        self.attach_genres(rows).await
    }

    async fn movies_by_title(&self, title: &str) -> AppResult<Vec<Movie>> {
        let rows = sqlx::query_as::<_, MovieRow>(
            "SELECT id, title FROM movies WHERE LOWER(title) = LOWER($1) ORDER BY id",
        )
        .bind(title)
        .fetch_all(&self.pool)
        .await?;

        self.attach_genres(rows).await
    }

    async fn movies_by_keyword(&self, keyword: &str) -> AppResult<Vec<Movie>> {
        // POSITION instead of LIKE so '%' and '_' in the keyword stay literal
        let rows = sqlx::query_as::<_, MovieRow>(
            "SELECT id, title FROM movies WHERE POSITION(LOWER($1) IN LOWER(title)) > 0 ORDER BY id",
        )
        .bind(keyword)
        .fetch_all(&self.pool)
        .await?;

        self.attach_genres(rows).await
    }

    async fn movies_by_min_rating(&self, min: f64) -> AppResult<Vec<Movie>> {
        self.movies_by_average(">=", min).await
    }

    async fn movies_by_max_rating(&self, max: f64) -> AppResult<Vec<Movie>> {
        self.movies_by_average("<=", max).await
    }
}

#[async_trait]
impl RankingStore for PgStore {
    async fn upsert_ranking(
        &self,
        user_id: i64,
        movie_id: i64,
        rating: Rating,
    ) -> AppResult<(Ranking, UpsertOutcome)> {
        // xmax is 0 only for a freshly inserted tuple
        let row = sqlx::query_as::<_, UpsertRow>(
            r#"
            INSERT INTO rankings (user_id, movie_id, rank1, rank2)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, movie_id)
            DO UPDATE SET rank1 = EXCLUDED.rank1, rank2 = EXCLUDED.rank2
            RETURNING id, user_id, movie_id, rank1, rank2, (xmax = 0) AS inserted
            "#,
        )
        .bind(user_id)
        .bind(movie_id)
        .bind(rating.rank1().map(i16::from))
        .bind(rating.rank2().map(i16::from))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let missing_parent = e
                .as_database_error()
                .map(|db| db.is_foreign_key_violation())
                .unwrap_or(false);
            if missing_parent {
                AppError::NotFound(format!("User {} or movie {} not found", user_id, movie_id))
            } else {
                AppError::Database(e)
            }
        })?;

        let movie = self.find_movie(row.movie_id).await?.ok_or_else(|| {
            AppError::NotFound(format!("Movie {} not found", row.movie_id))
        })?;

        let outcome = if row.inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        };

        Ok((
            Ranking {
                id: row.id,
                user_id: row.user_id,
                movie,
                rating: decode_rating(row.rank1, row.rank2)?,
            },
            outcome,
        ))
    }

    async fn delete_ranking(&self, user_id: i64, movie_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM rankings WHERE user_id = $1 AND movie_id = $2")
            .bind(user_id)
            .bind(movie_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
