//! In-process registry storage
//!
//! The default store. Records do not survive a restart, even though the
//! external resources they describe do.

use async_trait::async_trait;
use launchpad_common::DeploymentRecord;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::store::RegistryStore;

#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, DeploymentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.slug) {
            debug!("Slug already registered: {}", record.slug);
            return Ok(false);
        }
        records.insert(record.slug.clone(), record.clone());
        Ok(true)
    }

    async fn get(&self, slug: &str) -> Result<Option<DeploymentRecord>> {
        Ok(self.records.read().await.get(slug).cloned())
    }

    async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        let mut records: Vec<DeploymentRecord> =
            self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete(&self, slug: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(slug).is_some())
    }
}
