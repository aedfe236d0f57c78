//! Error types shared by the content client, formatter and generator

use thiserror::Error;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, BlogError>;

/// Errors raised while fetching, formatting or rendering content
#[derive(Error, Debug)]
pub enum BlogError {
    /// The request to the content API could not be completed
    #[error("Failed to fetch {url}: {source}")]
    ContentFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The content API answered with a non-success status
    #[error("Content API returned {status} for {url}")]
    UpstreamStatus { url: String, status: u16 },

    /// The content API has no master ref to query against
    #[error("Content API at {0} did not advertise a master ref")]
    MissingRef(String),

    /// A pagination cursor could not be turned into a request
    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),

    /// A document is missing required fields or carries unusable values
    #[error("Malformed document {id}: {reason}")]
    MalformedDocument { id: String, reason: String },

    /// No document of the given type carries the given UID
    #[error("No {doc_type} document with uid {uid:?}")]
    NotFound { doc_type: String, uid: String },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlogError {
    /// Shorthand for a [`BlogError::MalformedDocument`]
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error means the requested document does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
