use serde::{Deserialize, Serialize};

/// A shared genre tag, referenced by many movies and owned by none
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::FromRow)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}
