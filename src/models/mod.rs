pub mod genre;
pub mod movie;
pub mod ranking;
pub mod user;

pub use genre::Genre;
pub use movie::{Movie, MovieSummary};
pub use ranking::{Ranking, RankingKind, Rating, UpsertOutcome};
pub use user::User;
