//! Error types shared by the grid controller, session storage and configuration.

use thiserror::Error;

/// Errors raised by the crate's own operations.
///
/// Fetch failures are not part of this enum: they travel as data inside
/// [`FetchOutcome`](crate::query::FetchOutcome) and are classified when rendered.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("invalid grid identity {key:?}: {reason}")]
    InvalidIdentity { key: String, reason: &'static str },

    #[error("grid identity {0:?} is already mounted")]
    IdentityInUse(String),

    #[error("page must be at least 1, got {0}")]
    InvalidPage(u32),

    #[error("page size must be positive, got {0}")]
    InvalidPageSize(u32),

    #[error("invalid grid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed pagination envelope: {0}")]
    Envelope(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A failed fetch as reported by the data source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct FetchError {
    /// HTTP status when the failure came from a response, `None` for transport failures.
    pub status: Option<u16>,
    pub message: String,
}

impl FetchError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        FetchError {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        FetchError::new(Some(404), "Not Found")
    }

    /// List endpoints answer 404 for an empty or unprovisioned resource.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}
