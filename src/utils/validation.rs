use crate::utils::error::{FeedError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: String) -> FeedError {
    FeedError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason,
    }
}

pub fn validate_positive_number(field: &str, value: u64, min: u64) -> Result<()> {
    if value < min {
        return Err(invalid(field, value, format!("Value must be at least {}", min)));
    }
    Ok(())
}

pub fn validate_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, value, format!("Expected one of: {}", allowed.join(", "))))
    }
}

/// Rejects empty and whitespace-only values.
pub fn validate_non_empty_string(field: &str, value: &str) -> Result<()> {
    match value.trim() {
        "" => Err(invalid(field, value, "Value cannot be blank".to_string())),
        _ => Ok(()),
    }
}
