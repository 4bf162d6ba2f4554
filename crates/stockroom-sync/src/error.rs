//! Error taxonomy for the synchronisation layer.
//!
//! # Design
//! - One enum for every fetch and mutation so views can render failures uniformly.
//! - Variants carry display-ready messages; transport details stay in the logs.

use stockroom_api_models::{ModelError, RecordId};
use thiserror::Error;

/// Failure surfaced by a fetch or mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// Credentials were rejected or the session expired.
    #[error("authentication failed: {message}")]
    AuthFailure {
        /// User-facing explanation.
        message: String,
    },
    /// Transport error, unexpected status, or an undecodable payload.
    #[error("request failed: {message}")]
    NetworkFailure {
        /// User-facing explanation.
        message: String,
        /// HTTP status when the server answered.
        status: Option<u16>,
    },
    /// Input rejected locally or by the server.
    #[error("invalid input: {message}")]
    ValidationFailure {
        /// User-facing explanation.
        message: String,
    },
    /// The item was saved but its image upload failed.
    #[error("item {item_id} was saved but the image upload failed: {message}")]
    PartialFailure {
        /// Item that now exists without the image.
        item_id: RecordId,
        /// Upload failure detail.
        message: String,
    },
}

impl SyncError {
    /// Authentication failure with a custom message.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::AuthFailure {
            message: message.into(),
        }
    }

    /// Transport failure with no HTTP status.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
            status: None,
        }
    }

    /// Validation failure.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailure {
            message: message.into(),
        }
    }

    /// Payload decoded but violated the boundary contract.
    #[must_use]
    pub fn invalid_response(what: &str, error: &ModelError) -> Self {
        Self::network(format!("invalid {what} response: {error}"))
    }

    /// Failure raised when a protected operation runs without a session.
    #[must_use]
    pub fn login_required() -> Self {
        Self::auth("login required")
    }

    /// Message suitable for direct display.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthFailure { message } | Self::ValidationFailure { message } => message.clone(),
            Self::NetworkFailure { message, status } => status.map_or_else(
                || format!("could not reach the server: {message}"),
                |status| format!("the server returned an error ({status}): {message}"),
            ),
            Self::PartialFailure { .. } => self.to_string(),
        }
    }

    /// Whether re-invoking the same operation can succeed without user changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkFailure { .. } | Self::PartialFailure { .. }
        )
    }

    /// Whether the failure means the bearer token is no longer accepted.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthFailure { .. })
    }
}

impl From<ModelError> for SyncError {
    fn from(value: ModelError) -> Self {
        Self::validation(value.to_string())
    }
}
