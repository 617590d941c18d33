//! Shared rule validators.
//!
//! Small, pure checks reused by every aggregate so that messages stay uniform.
//! Each returns `DomainError::Validation` naming the field and the offending
//! value.

use crate::error::{DomainError, DomainResult};

/// Require `value > 0`.
pub fn positive(field: &str, value: i64) -> DomainResult<()> {
    if value <= 0 {
        return Err(DomainError::validation(format!(
            "{field} must be greater than zero, got {value}"
        )));
    }
    Ok(())
}

/// Require `value >= 0`.
pub fn non_negative(field: &str, value: i64) -> DomainResult<()> {
    if value < 0 {
        return Err(DomainError::validation(format!(
            "{field} cannot be negative, got {value}"
        )));
    }
    Ok(())
}

/// Require `min <= value <= max`.
pub fn in_range<T>(field: &str, value: T, min: T, max: T) -> DomainResult<()>
where
    T: PartialOrd + core::fmt::Display,
{
    if value < min || value > max {
        return Err(DomainError::validation(format!(
            "{field} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

/// Trim `value` and require its length in characters to be within bounds.
///
/// Returns the trimmed string so callers store the canonical form.
pub fn text(field: &str, value: &str, min: usize, max: usize) -> DomainResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len == 0 {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    if len < min || len > max {
        return Err(DomainError::validation(format!(
            "{field} must be {min}-{max} characters, got {len} ('{trimmed}')"
        )));
    }
    Ok(trimmed.to_string())
}

/// Optional variant of [`text`]: `None` stays `None`, present values are checked.
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    min: usize,
    max: usize,
) -> DomainResult<Option<String>> {
    value.map(|v| text(field, v, min, max)).transpose()
}

/// Upper-cased shadow form used for case-insensitive comparison.
pub fn normalize(value: &str) -> String {
    value.trim().to_uppercase()
}

/// Checked addition that reports overflow as a validation failure.
pub fn checked_add(field: &str, current: i64, delta: i64) -> DomainResult<i64> {
    current.checked_add(delta).ok_or_else(|| {
        DomainError::validation(format!("{field} overflow ({current} + {delta})"))
    })
}
