//! Deployment requests submitted by the orchestrating layer

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Which family of backends a request can be dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    /// Static file bundle (EdgeCDN, ObjectStore, LocalStaticServe)
    Publish,
    /// Long-running compute workload (Job, Service)
    ComputeDispatch,
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClass::Publish => f.write_str("publish"),
            RequestClass::ComputeDispatch => f.write_str("compute-dispatch"),
        }
    }
}

/// Compute task handed to the Job or Service backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Opaque task identifier
    pub task_id: String,

    /// Optional reference to a task manifest
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,

    /// Caller-supplied environment overrides
    #[serde(default)]
    pub env_overrides: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default)]
    pub steps: Vec<serde_json::Value>,

    #[serde(default)]
    pub context: serde_json::Value,

    /// Number of parallel tasks for batch execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_count: Option<u32>,
}

impl TaskDescriptor {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            ..Default::default()
        }
    }
}

/// The payload being deployed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Artifact {
    /// Relative file path -> file content
    Files { files: BTreeMap<String, String> },
    /// Compute task descriptor
    Task(TaskDescriptor),
}

/// Caller-supplied intent to deploy. Never mutated after submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Logical project name
    pub project_name: String,

    /// Owning user identifier
    pub owner_id: String,

    pub artifact: Artifact,

    /// Custom domain for publish backends
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<String>,

    /// Optional overall timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl DeploymentRequest {
    /// Create a request to publish a static file bundle
    pub fn publish(
        project_name: impl Into<String>,
        owner_id: impl Into<String>,
        files: BTreeMap<String, String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            owner_id: owner_id.into(),
            artifact: Artifact::Files { files },
            custom_domain: None,
            timeout_secs: None,
        }
    }

    /// Create a request to dispatch a compute task
    pub fn compute(
        project_name: impl Into<String>,
        owner_id: impl Into<String>,
        task: TaskDescriptor,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            owner_id: owner_id.into(),
            artifact: Artifact::Task(task),
            custom_domain: None,
            timeout_secs: None,
        }
    }

    pub fn with_custom_domain(mut self, domain: impl Into<String>) -> Self {
        self.custom_domain = Some(domain.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn class(&self) -> RequestClass {
        match self.artifact {
            Artifact::Files { .. } => RequestClass::Publish,
            Artifact::Task(_) => RequestClass::ComputeDispatch,
        }
    }

    pub fn files(&self) -> Option<&BTreeMap<String, String>> {
        match &self.artifact {
            Artifact::Files { files } => Some(files),
            Artifact::Task(_) => None,
        }
    }

    pub fn task(&self) -> Option<&TaskDescriptor> {
        match &self.artifact {
            Artifact::Task(task) => Some(task),
            Artifact::Files { .. } => None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
