//! Parsing error types
//!
//! These only surface while a parser is being built from configuration.
//! Running a built parser against a page never fails; missing data degrades to
//! empty fields instead.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ParsingError {
    #[error("Invalid CSS selector for {field}: {selector} - {reason}")]
    InvalidSelector {
        field: String,
        selector: String,
        reason: String,
    },

    #[error("Invalid regex pattern for {field}: {pattern} - {reason}")]
    InvalidPattern {
        field: String,
        pattern: String,
        reason: String,
    },

    #[error("No usable strategies for {field}: {errors}")]
    EmptyStrategyChain { field: String, errors: String },
}

impl ParsingError {
    pub fn invalid_selector(field: &str, selector: &str, reason: impl ToString) -> Self {
        Self::InvalidSelector {
            field: field.to_string(),
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_pattern(field: &str, pattern: &str, reason: impl ToString) -> Self {
        Self::InvalidPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Field the broken configuration belongs to
    pub fn field(&self) -> &str {
        match self {
            Self::InvalidSelector { field, .. }
            | Self::InvalidPattern { field, .. }
            | Self::EmptyStrategyChain { field, .. } => field,
        }
    }
}

pub type ParsingResult<T> = Result<T, ParsingError>;
