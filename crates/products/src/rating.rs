use serde::{Deserialize, Serialize};

use catalog_core::{DomainError, DomainResult, ValueObject, rules};

/// Lowest and highest score a customer can submit.
pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 5;

/// Running average of customer scores.
///
/// Immutable: [`Rating::add`] returns a new value and the owner replaces its
/// rating wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    value: f64,
    total_ratings: i64,
    total_score: i64,
}

impl ValueObject for Rating {}

impl Default for Rating {
    fn default() -> Self {
        Self::empty()
    }
}

impl Rating {
    /// No ratings yet: `Rating(0, 0, 0)`.
    pub const fn empty() -> Self {
        Self {
            value: 0.0,
            total_ratings: 0,
            total_score: 0,
        }
    }

    /// Build a rating from its parts.
    ///
    /// When `total_ratings > 0` the value is recomputed as
    /// `total_score / total_ratings` and `value` is ignored; otherwise `value`
    /// is taken as given. The resulting value must lie in `[0, 5]`.
    pub fn create(value: f64, total_ratings: i64, total_score: i64) -> DomainResult<Self> {
        rules::non_negative("total_ratings", total_ratings)?;
        rules::non_negative("total_score", total_score)?;

        let value = if total_ratings > 0 {
            total_score as f64 / total_ratings as f64
        } else {
            value
        };

        if !value.is_finite() || !(MIN_SCORE as f64..=MAX_SCORE as f64).contains(&value) {
            return Err(DomainError::validation(format!(
                "rating value must be between {MIN_SCORE} and {MAX_SCORE}, got {value}"
            )));
        }

        Ok(Self {
            value,
            total_ratings,
            total_score,
        })
    }

    /// Accumulate one more score.
    pub fn add(&self, score: i64) -> DomainResult<Self> {
        rules::in_range("score", score, MIN_SCORE, MAX_SCORE)?;
        let total_ratings = rules::checked_add("total_ratings", self.total_ratings, 1)?;
        let total_score = rules::checked_add("total_score", self.total_score, score)?;
        Self::create(self.value, total_ratings, total_score)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn total_ratings(&self) -> i64 {
        self.total_ratings
    }

    pub fn total_score(&self) -> i64 {
        self.total_score
    }
}
