//! Error taxonomy for exports.
//!
//! Every failure that can abort an export is a variant of [`ExportError`].
//! Remote failures always carry the identifier of the page or block that was
//! being fetched so a batch summary can point at the culprit.
//!
//! A single child page failing during tree construction is *not* an error at
//! this level: the tree builder records it as a [`crate::tree::ChildFailure`]
//! warning and carries on with the siblings.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Debug, Error)]
pub enum ExportError {
    /// Missing or invalid credentials/settings. Raised before any remote call.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The input could not be turned into a page identifier.
    #[error("invalid Notion page URL {input:?}: {reason}")]
    InvalidPageUrl { input: String, reason: String },

    #[error("Notion object {id} not found (is the page shared with the integration?)")]
    NotFound { id: String },

    #[error("access to Notion object {id} denied: {message}")]
    Unauthorized { id: String, message: String },

    #[error("rate limited by Notion while fetching {id}")]
    RateLimited {
        id: String,
        retry_after: Option<Duration>,
    },

    /// Any other non-success response from the API.
    #[error("Notion API error for {id} (status {status}, code {code}): {message}")]
    Api {
        id: String,
        status: u16,
        code: String,
        message: String,
    },

    #[error("request for {id} failed: {source}")]
    Transport {
        id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not decode Notion response for {id}: {message}")]
    Decode { id: String, message: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("export cancelled")]
    Cancelled,
}

impl ExportError {
    /// Whether repeating the same call later has a reasonable chance to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::RateLimited { .. } => true,
            ExportError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            ExportError::Api { status, .. } => *status >= 500,
            ExportError::Configuration(_)
            | ExportError::InvalidPageUrl { .. }
            | ExportError::NotFound { .. }
            | ExportError::Unauthorized { .. }
            | ExportError::Decode { .. }
            | ExportError::Io { .. }
            | ExportError::Cancelled => false,
        }
    }

    /// The remote identifier this error is about, if any.
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            ExportError::NotFound { id }
            | ExportError::Unauthorized { id, .. }
            | ExportError::RateLimited { id, .. }
            | ExportError::Api { id, .. }
            | ExportError::Transport { id, .. }
            | ExportError::Decode { id, .. } => Some(id),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }
}
