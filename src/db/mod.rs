pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use postgres::{create_pool, run_migrations, PgStore};
pub use store::{GenreStore, MovieQueries, MovieStore, RankingStore, Store, UserStore};

#[cfg(test)]
pub use store::MockMovieQueries;
