use thiserror::Error;

use crate::record::BackendKind;
use crate::request::RequestClass;

/// Failure of a single adapter operation.
///
/// The dispatcher converts every variant into "try the next adapter";
/// the registry uses [`AdapterError::is_gone`] to tell a recoverable
/// removal failure from a hard one.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("GCP auth unavailable")]
    AuthUnavailable,

    #[error("{backend} adapter is not configured: {reason}")]
    NotConfigured {
        backend: BackendKind,
        reason: String,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Backend returned an empty URL")]
    EmptyUrl,

    #[error("{backend} cannot deploy a {class} artifact")]
    UnsupportedArtifact {
        backend: BackendKind,
        class: RequestClass,
    },

    #[error("Invalid artifact path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdapterError {
    /// The backend reported the resource as already absent.
    pub fn is_gone(&self) -> bool {
        matches!(self, AdapterError::Rejected { status: 404 | 410, .. })
    }

    pub fn not_configured(backend: BackendKind, reason: impl Into<String>) -> Self {
        AdapterError::NotConfigured {
            backend,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;
