use launchpad_common::{AdapterError, BackendKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Slug already registered: {0}")]
    SlugTaken(String),

    #[error("Deployment not found: {0}")]
    NotFound(String),

    #[error("No adapter registered for backend {backend} (slug {slug})")]
    NoAdapter { slug: String, backend: BackendKind },

    /// The owning adapter failed to remove external resources; the record
    /// stays live so the call can be retried.
    #[error("Failed to remove {slug} from {backend}: {source}")]
    Decommission {
        slug: String,
        backend: BackendKind,
        #[source]
        source: AdapterError,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<redis::RedisError> for RegistryError {
    fn from(err: redis::RedisError) -> Self {
        RegistryError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
