use serde::{Deserialize, Serialize};

/// A registered account; `username` is unique across users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
}
