use std::time::Duration;
use thiserror::Error;

/// The region list could not be read; the run is skipped.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("browser session failed: {0}")]
    Browser(String),
    #[error("devtools protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("unexpected page script result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

/// A region (or one of its markets) could not be scraped.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("browser session failed: {0}")]
    Browser(String),
    #[error("devtools protocol error: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("unexpected page script result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("option {label:?} not present in {select}")]
    OptionMissing { select: &'static str, label: String },
}

impl ExtractionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<ExtractionError> for DiscoveryError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::Cdp(e) => Self::Cdp(e),
            ExtractionError::Decode(e) => Self::Decode(e),
            ExtractionError::Timeout { operation, after } => Self::Timeout { operation, after },
            other => Self::Browser(other.to_string()),
        }
    }
}
