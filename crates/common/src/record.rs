//! Deployment records held by the registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::request::RequestClass;

/// Hosting backend a deployment lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    Job,
    Service,
    #[serde(rename = "EdgeCDN")]
    EdgeCdn,
    ObjectStore,
    LocalStaticServe,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Job => "Job",
            BackendKind::Service => "Service",
            BackendKind::EdgeCdn => "EdgeCDN",
            BackendKind::ObjectStore => "ObjectStore",
            BackendKind::LocalStaticServe => "LocalStaticServe",
        }
    }

    pub fn request_class(&self) -> RequestClass {
        match self {
            BackendKind::Job | BackendKind::Service => RequestClass::ComputeDispatch,
            BackendKind::EdgeCdn | BackendKind::ObjectStore | BackendKind::LocalStaticServe => {
                RequestClass::Publish
            }
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The orchestrator's memory of one live deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Generated once, never reused
    pub deployment_id: Uuid,

    /// Registry key
    pub slug: String,

    /// Fixed at creation
    pub backend: BackendKind,

    /// Externally reachable URL
    pub url: String,

    /// Number of files or resources deployed
    pub resource_count: usize,

    pub project_name: String,

    pub owner_id: String,

    pub created_at: DateTime<Utc>,

    /// Last adapter error seen before this backend won
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DeploymentRecord {
    /// Create a new record
    pub fn new(
        slug: String,
        backend: BackendKind,
        url: String,
        resource_count: usize,
        project_name: String,
        owner_id: String,
    ) -> Self {
        Self {
            deployment_id: Uuid::new_v4(),
            slug,
            backend,
            url,
            resource_count,
            project_name,
            owner_id,
            created_at: Utc::now(),
            last_error: None,
        }
    }

    pub fn with_last_error(mut self, error: Option<String>) -> Self {
        self.last_error = error;
        self
    }
}
