//! Storage contract behind the registry

use async_trait::async_trait;
use launchpad_common::DeploymentRecord;

use crate::error::Result;

/// put/get/list/delete over deployment records keyed by slug
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Store a record under its slug.
    /// Returns Ok(true) if created, Ok(false) if the slug is already taken.
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool>;

    async fn get(&self, slug: &str) -> Result<Option<DeploymentRecord>>;

    /// All records, newest first
    async fn list(&self) -> Result<Vec<DeploymentRecord>>;

    /// Returns Ok(true) if a record was deleted
    async fn delete(&self, slug: &str) -> Result<bool>;
}
