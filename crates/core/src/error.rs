//! Partner call error types
//!
//! Provides error classification for partner exchanges with retry metadata.
//! Administrative-down never surfaces here: disabled operation families are
//! short-circuited to `AdminDown` results before any call is attempted.

use std::time::Duration;

use thiserror::Error;

/// Failure classes for partner exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartnerErrorCategory {
    /// Entity or record could not be mapped to wire form - terminal
    Conversion,
    /// Request never completed (connect failure, timeout) - retryable
    Transport,
    /// Completed call the partner refused - retryable at batch level
    Rejected,
}

impl PartnerErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversion => "conversion",
            Self::Transport => "transport",
            Self::Rejected => "rejected",
        }
    }
}

/// Errors raised by partner client implementations
#[derive(Debug, Error)]
pub enum PartnerError {
    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Partner rejected request: {0}")]
    Rejected(String),
}

impl PartnerError {
    /// Get the failure class for this error
    pub fn category(&self) -> PartnerErrorCategory {
        match self {
            Self::Conversion(_) => PartnerErrorCategory::Conversion,
            Self::Network(_) | Self::Timeout(_) => PartnerErrorCategory::Transport,
            Self::Rejected(_) => PartnerErrorCategory::Rejected,
        }
    }

    /// Check if items that failed with this error may be re-enqueued
    pub fn is_retryable(&self) -> bool {
        !matches!(self.category(), PartnerErrorCategory::Conversion)
    }

    /// Whether the call as a whole timed out rather than failing
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Result type alias for partner client operations
pub type PartnerResult<T> = std::result::Result<T, PartnerError>;
