use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_RATING: i32 = 1;
pub const MAX_RATING: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RatingError {
    #[error("rating {0} is outside the 1-4 scale")]
    OutOfRange(i32),
}

/// A single answer on the 1-4 feedback scale.
///
/// The only way to obtain one is through `TryFrom`, so everything past the
/// ingestion boundary can rely on the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct Rating(u8);

impl Rating {
    pub fn value(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        match self.0 {
            1 => "Poor",
            2 => "Fair",
            3 => "Good",
            _ => "Excellent",
        }
    }

    pub fn all() -> [Rating; 4] {
        [Rating(1), Rating(2), Rating(3), Rating(4)]
    }
}

impl TryFrom<i32> for Rating {
    type Error = RatingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if (MIN_RATING..=MAX_RATING).contains(&value) {
            Ok(Rating(value as u8))
        } else {
            Err(RatingError::OutOfRange(value))
        }
    }
}

impl From<Rating> for i32 {
    fn from(rating: Rating) -> Self {
        i32::from(rating.0)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_four_point_scale() {
        for value in 1..=4 {
            let rating = Rating::try_from(value).unwrap();
            assert_eq!(i32::from(rating), value);
        }
    }

    #[test]
    fn rejects_values_outside_the_scale() {
        assert_eq!(Rating::try_from(0), Err(RatingError::OutOfRange(0)));
        assert_eq!(Rating::try_from(5), Err(RatingError::OutOfRange(5)));
        assert_eq!(Rating::try_from(-3), Err(RatingError::OutOfRange(-3)));
    }

    #[test]
    fn deserializing_checks_the_range() {
        let ok: Rating = serde_json::from_str("3").unwrap();
        assert_eq!(ok.value(), 3);
        assert!(serde_json::from_str::<Rating>("7").is_err());
    }

    #[test]
    fn labels_follow_the_scale() {
        let labels: Vec<&str> = Rating::all().iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["Poor", "Fair", "Good", "Excellent"]);
    }
}
