//! Fatal import errors
//!
//! Only the validation and rendering stages can abort an import. Everything
//! after that degrades to empty fields or a shorter asset list.

use std::time::Duration;
use thiserror::Error;

use crate::domain::ImportStage;

/// Message shown to users for any fatal import error
pub const USER_FACING_MESSAGE: &str = "Could not import from this link";

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Links from '{host}' are not supported")]
    InvalidSourceDomain { host: String },

    #[error("Failed to launch browser: {reason}")]
    BrowserLaunchFailed { reason: String },

    #[error("Timed out during {step} after {timeout:?}: {url}")]
    RenderTimeout {
        step: &'static str,
        url: String,
        timeout: Duration,
    },

    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailed { url: String, reason: String },

    #[error("Page at {url} is not a recognizable product page (missing '{marker}')")]
    PageNotRecognized { url: String, marker: String },
}

impl ImportError {
    pub fn invalid_url(url: &str, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn browser_launch_failed(reason: impl ToString) -> Self {
        Self::BrowserLaunchFailed {
            reason: reason.to_string(),
        }
    }

    pub fn navigation_failed(url: &str, reason: impl ToString) -> Self {
        Self::NavigationFailed {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Stage the import was in when this error was raised
    pub const fn stage(&self) -> ImportStage {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidSourceDomain { .. } => ImportStage::Validating,
            Self::BrowserLaunchFailed { .. }
            | Self::RenderTimeout { .. }
            | Self::NavigationFailed { .. }
            | Self::PageNotRecognized { .. } => ImportStage::Rendering,
        }
    }

    /// Text for the "could not import" dialog
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidSourceDomain { host } => {
                format!("{USER_FACING_MESSAGE}: {host} is not a supported store")
            }
            _ => USER_FACING_MESSAGE.to_string(),
        }
    }
}

pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_carry_their_stage() {
        let err = ImportError::InvalidSourceDomain {
            host: "not-allowed.example".to_string(),
        };
        assert_eq!(err.stage(), ImportStage::Validating);
        assert!(err.user_message().contains("not-allowed.example"));

        let err = ImportError::RenderTimeout {
            step: "navigation",
            url: "https://www.amazon.com/dp/B000000001".to_string(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(err.stage(), ImportStage::Rendering);
        assert!(err.stage().can_fail());
        assert_eq!(err.user_message(), USER_FACING_MESSAGE);
    }
}
