//! Shared types for the deployment orchestrator
//!
//! Data model, error taxonomy, slug generation and the adapter contract
//! used by both the dispatcher and the registry.

pub mod adapter;
pub mod error;
pub mod record;
pub mod request;
pub mod result;
pub mod slug;

pub use adapter::{DeployOutcome, TargetAdapter};
pub use error::{AdapterError, Result};
pub use record::{BackendKind, DeploymentRecord};
pub use request::{Artifact, DeploymentRequest, RequestClass, TaskDescriptor};
pub use result::{AttemptFailure, BackendTag, DeploymentResult};
pub use slug::{generate_slug, generate_slug_at};
