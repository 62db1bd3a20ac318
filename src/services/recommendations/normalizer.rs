//! Maps both rating scales onto one comparable 1-5 scale.

use crate::models::Rating;

/// Effective rating at or above which a movie counts as highly rated
pub const HIGHLY_RATED_THRESHOLD: u8 = 4;

/// Implicit-score buckets: inclusive upper bound and the 1-5 score it maps to
const IMPLICIT_BUCKETS: [(u8, u8); 5] = [(20, 1), (40, 2), (60, 3), (80, 4), (100, 5)];

/// Maps a 0-100 engagement score onto 1-5.
///
/// Scores above 100 cannot be constructed through `Rating`; they clamp to 5.
pub fn normalize_implicit(score: u8) -> u8 {
    IMPLICIT_BUCKETS
        .iter()
        .find(|(upper, _)| score <= *upper)
        .map(|(_, mapped)| *mapped)
        .unwrap_or(5)
}

pub fn effective_rating(rating: &Rating) -> u8 {
    match rating {
        Rating::Explicit(value) => *value,
        Rating::Implicit(score) => normalize_implicit(*score),
    }
}

pub fn is_highly_rated(rating: &Rating) -> bool {
    effective_rating(rating) >= HIGHLY_RATED_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_boundaries() {
        assert_eq!(normalize_implicit(0), 1);
        assert_eq!(normalize_implicit(20), 1);
        assert_eq!(normalize_implicit(21), 2);
        assert_eq!(normalize_implicit(40), 2);
        assert_eq!(normalize_implicit(41), 3);
        assert_eq!(normalize_implicit(60), 3);
        assert_eq!(normalize_implicit(61), 4);
        assert_eq!(normalize_implicit(80), 4);
        assert_eq!(normalize_implicit(81), 5);
        assert_eq!(normalize_implicit(100), 5);
    }

    #[test]
    fn test_implicit_mapping_is_monotonic_and_in_range() {
        let mut previous = 0;
        for score in 0..=100u8 {
            let mapped = normalize_implicit(score);
            assert!((1..=5).contains(&mapped), "score {} mapped to {}", score, mapped);
            assert!(mapped >= previous, "mapping decreased at {}", score);
            previous = mapped;
        }
    }

    #[test]
    fn test_explicit_rating_is_taken_as_is() {
        for value in 1..=5u8 {
            assert_eq!(effective_rating(&Rating::Explicit(value)), value);
        }
    }

    #[test]
    fn test_highly_rated_threshold() {
        assert!(!is_highly_rated(&Rating::Explicit(3)));
        assert!(is_highly_rated(&Rating::Explicit(4)));
        assert!(!is_highly_rated(&Rating::Implicit(60)));
        assert!(is_highly_rated(&Rating::Implicit(61)));
    }
}
