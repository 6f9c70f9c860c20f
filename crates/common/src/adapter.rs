//! Contract every hosting backend implements

use async_trait::async_trait;

use crate::error::Result;
use crate::record::BackendKind;
use crate::request::{DeploymentRequest, RequestClass};

/// What a successful deploy produced
#[derive(Debug, Clone, Default)]
pub struct DeployOutcome {
    /// Externally reachable URL
    pub url: String,

    /// Files uploaded or tasks started
    pub resource_count: usize,

    /// Execution identifier (batch jobs)
    pub execution_id: Option<String>,

    /// Raw backend response (interactive dispatch)
    pub payload: Option<serde_json::Value>,
}

impl DeployOutcome {
    pub fn new(url: impl Into<String>, resource_count: usize) -> Self {
        Self {
            url: url.into(),
            resource_count,
            ..Default::default()
        }
    }
}

/// A backend-specific implementation of deploy/remove.
///
/// `deploy` may be called more than once with the same slug; a second call
/// either converges on the same state or fails cleanly. `remove` succeeds
/// (or no-ops) for slugs this backend never saw.
#[async_trait]
pub trait TargetAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn request_class(&self) -> RequestClass {
        self.kind().request_class()
    }

    /// Whether the required configuration is present. An unconfigured
    /// adapter is skipped, not attempted.
    fn is_configured(&self) -> bool;

    async fn deploy(&self, slug: &str, request: &DeploymentRequest) -> Result<DeployOutcome>;

    async fn remove(&self, slug: &str) -> Result<()>;
}
