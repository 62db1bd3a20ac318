use serde::Serialize;

use super::Movie;
use crate::error::{AppError, AppResult};
use crate::services::recommendations::normalizer;

/// A user's score for one movie, on exactly one of the two scales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    /// Explicit star rating, 1 to 5
    Explicit(u8),
    /// Implicit engagement score, 0 to 100
    Implicit(u8),
}

impl Rating {
    pub const EXPLICIT_MIN: i32 = 1;
    pub const EXPLICIT_MAX: i32 = 5;
    pub const IMPLICIT_MIN: i32 = 0;
    pub const IMPLICIT_MAX: i32 = 100;

    pub fn explicit(value: i32) -> AppResult<Self> {
        if !(Self::EXPLICIT_MIN..=Self::EXPLICIT_MAX).contains(&value) {
            return Err(AppError::InvalidInput(format!(
                "rank1 must be between {} and {}, got {}",
                Self::EXPLICIT_MIN,
                Self::EXPLICIT_MAX,
                value
            )));
        }
        Ok(Rating::Explicit(value as u8))
    }

    pub fn implicit(value: i32) -> AppResult<Self> {
        if !(Self::IMPLICIT_MIN..=Self::IMPLICIT_MAX).contains(&value) {
            return Err(AppError::InvalidInput(format!(
                "rank2 must be between {} and {}, got {}",
                Self::IMPLICIT_MIN,
                Self::IMPLICIT_MAX,
                value
            )));
        }
        Ok(Rating::Implicit(value as u8))
    }

    /// Builds a rating from the two optional wire/storage columns.
    ///
    /// Exactly one of `rank1` / `rank2` must be present.
    pub fn from_parts(rank1: Option<i32>, rank2: Option<i32>) -> AppResult<Self> {
        match (rank1, rank2) {
            (Some(value), None) => Self::explicit(value),
            (None, Some(value)) => Self::implicit(value),
            _ => Err(AppError::InvalidInput(
                "You must provide either rank1 or rank2, but not both".to_string(),
            )),
        }
    }

    /// Decodes a persisted row. `rank1` wins whenever it is set, so a legacy
    /// row carrying both columns is read on the explicit scale.
    pub fn from_stored(rank1: Option<i32>, rank2: Option<i32>) -> AppResult<Self> {
        let rating = match (rank1, rank2) {
            (Some(value), _) => Self::explicit(value),
            (None, Some(value)) => Self::implicit(value),
            (None, None) => {
                return Err(AppError::Internal(
                    "Stored ranking has neither rank1 nor rank2".to_string(),
                ))
            }
        };
        rating.map_err(|e| AppError::Internal(format!("Corrupt stored ranking: {}", e)))
    }

    pub fn rank1(&self) -> Option<u8> {
        match self {
            Rating::Explicit(value) => Some(*value),
            Rating::Implicit(_) => None,
        }
    }

    pub fn rank2(&self) -> Option<u8> {
        match self {
            Rating::Explicit(_) => None,
            Rating::Implicit(value) => Some(*value),
        }
    }

    /// Normalized 1-5 score
    pub fn effective(&self) -> u8 {
        normalizer::effective_rating(self)
    }

    pub fn is_highly_rated(&self) -> bool {
        normalizer::is_highly_rated(self)
    }
}

/// One row linking a user to a movie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranking {
    pub id: i64,
    pub user_id: i64,
    pub movie: Movie,
    pub rating: Rating,
}

/// Which rating scale a listing should be narrowed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankingKind {
    /// Only explicit (`rank1`) rows
    Explicit,
    /// Only implicit (`rank2`) rows
    Implicit,
    #[default]
    Both,
}

impl RankingKind {
    /// Parses `rank1`, `rank2` or `both`, ignoring case. Anything else means `Both`.
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "rank1" => RankingKind::Explicit,
            "rank2" => RankingKind::Implicit,
            _ => RankingKind::Both,
        }
    }

    pub fn matches(&self, rating: &Rating) -> bool {
        match (self, rating) {
            (RankingKind::Both, _) => true,
            (RankingKind::Explicit, Rating::Explicit(_)) => true,
            (RankingKind::Implicit, Rating::Implicit(_)) => true,
            _ => false,
        }
    }
}

/// Whether an upsert inserted a new row or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_explicit() {
        assert_eq!(Rating::from_parts(Some(4), None).unwrap(), Rating::Explicit(4));
    }

    #[test]
    fn test_from_parts_implicit() {
        assert_eq!(Rating::from_parts(None, Some(0)).unwrap(), Rating::Implicit(0));
        assert_eq!(Rating::from_parts(None, Some(100)).unwrap(), Rating::Implicit(100));
    }

    #[test]
    fn test_from_parts_rejects_both_and_neither() {
        assert!(matches!(
            Rating::from_parts(Some(3), Some(50)),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            Rating::from_parts(None, None),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        assert!(Rating::explicit(0).is_err());
        assert!(Rating::explicit(6).is_err());
        assert!(Rating::implicit(-1).is_err());
        assert!(Rating::implicit(101).is_err());
    }

    #[test]
    fn test_from_stored_prefers_rank1() {
        let rating = Rating::from_stored(Some(2), Some(95)).unwrap();
        assert_eq!(rating, Rating::Explicit(2));
        assert_eq!(rating.effective(), 2);
    }

    #[test]
    fn test_from_stored_without_any_rank_is_internal() {
        assert!(matches!(
            Rating::from_stored(None, None),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_rank_accessors() {
        let explicit = Rating::Explicit(5);
        assert_eq!((explicit.rank1(), explicit.rank2()), (Some(5), None));

        let implicit = Rating::Implicit(42);
        assert_eq!((implicit.rank1(), implicit.rank2()), (None, Some(42)));
    }

    #[test]
    fn test_ranking_kind_parse() {
        assert_eq!(RankingKind::parse("RANK1"), RankingKind::Explicit);
        assert_eq!(RankingKind::parse("rank2"), RankingKind::Implicit);
        assert_eq!(RankingKind::parse("both"), RankingKind::Both);
        assert_eq!(RankingKind::parse("whatever"), RankingKind::Both);
    }

    #[test]
    fn test_ranking_kind_matches() {
        assert!(RankingKind::Explicit.matches(&Rating::Explicit(1)));
        assert!(!RankingKind::Explicit.matches(&Rating::Implicit(90)));
        assert!(RankingKind::Implicit.matches(&Rating::Implicit(90)));
        assert!(RankingKind::Both.matches(&Rating::Explicit(1)));
    }
}
