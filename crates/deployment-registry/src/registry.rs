//! Live deployment registry and decommission lifecycle
//!
//! pending (implicit) → live (record stored under its slug) → removed
//! (record deleted). There is no live → live backend migration.

use launchpad_common::{BackendKind, DeploymentRecord, TargetAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{RegistryError, Result};
use crate::memory::InMemoryStore;
use crate::store::RegistryStore;

pub struct DeploymentRegistry {
    store: Arc<dyn RegistryStore>,
    adapters: HashMap<BackendKind, Arc<dyn TargetAdapter>>,
}

impl DeploymentRegistry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            adapters: HashMap::new(),
        }
    }

    /// Registry backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Register the adapter that owns deployments of its backend kind
    pub fn with_adapter(mut self, adapter: Arc<dyn TargetAdapter>) -> Self {
        self.register_adapter(adapter);
        self
    }

    pub fn register_adapter(&mut self, adapter: Arc<dyn TargetAdapter>) {
        debug!("Registry routes {} removals", adapter.kind());
        self.adapters.insert(adapter.kind(), adapter);
    }

    /// pending → live. Fails with `SlugTaken` instead of overwriting.
    pub async fn put(&self, record: DeploymentRecord) -> Result<DeploymentRecord> {
        if !self.store.insert(&record).await? {
            return Err(RegistryError::SlugTaken(record.slug));
        }

        info!(
            "Deployment live: {} on {} at {}",
            record.slug, record.backend, record.url
        );
        Ok(record)
    }

    pub async fn get(&self, slug: &str) -> Result<Option<DeploymentRecord>> {
        self.store.get(slug).await
    }

    pub async fn contains(&self, slug: &str) -> Result<bool> {
        Ok(self.store.get(slug).await?.is_some())
    }

    pub async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        self.store.list().await
    }

    /// live → removed.
    ///
    /// Routes to the owning adapter's `remove`. The record is deleted when
    /// removal succeeds or reports the resource as already gone; any other
    /// adapter error leaves the record live and is returned so the caller
    /// can retry.
    pub async fn decommission(&self, slug: &str) -> Result<DeploymentRecord> {
        let record = self
            .store
            .get(slug)
            .await?
            .ok_or_else(|| RegistryError::NotFound(slug.to_string()))?;

        let adapter = self
            .adapters
            .get(&record.backend)
            .ok_or_else(|| RegistryError::NoAdapter {
                slug: slug.to_string(),
                backend: record.backend,
            })?;

        match adapter.remove(slug).await {
            Ok(()) => {
                info!("Removed {} from {}", slug, record.backend);
            }
            Err(e) if e.is_gone() => {
                warn!(
                    "{} already absent from {}, dropping record: {}",
                    slug, record.backend, e
                );
            }
            Err(e) => {
                error!("Failed to decommission {} on {}: {}", slug, record.backend, e);
                return Err(RegistryError::Decommission {
                    slug: slug.to_string(),
                    backend: record.backend,
                    source: e,
                });
            }
        }

        self.store.delete(slug).await?;
        info!("Deployment decommissioned: {}", slug);
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use launchpad_common::{AdapterError, DeployOutcome, DeploymentRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum RemoveBehavior {
        Ok,
        Gone,
        Fail,
    }

    struct FakeAdapter {
        kind: BackendKind,
        behavior: RemoveBehavior,
        removals: AtomicUsize,
    }

    impl FakeAdapter {
        fn new(kind: BackendKind, behavior: RemoveBehavior) -> Arc<Self> {
            Arc::new(Self {
                kind,
                behavior,
                removals: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TargetAdapter for FakeAdapter {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn is_configured(&self) -> bool {
            true
        }

        async fn deploy(
            &self,
            slug: &str,
            _request: &DeploymentRequest,
        ) -> launchpad_common::Result<DeployOutcome> {
            Ok(DeployOutcome::new(format!("https://{}.example.dev", slug), 1))
        }

        async fn remove(&self, _slug: &str) -> launchpad_common::Result<()> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                RemoveBehavior::Ok => Ok(()),
                RemoveBehavior::Gone => Err(AdapterError::Rejected {
                    status: 404,
                    body: "no such project".to_string(),
                }),
                RemoveBehavior::Fail => Err(AdapterError::Timeout("delete timed out".to_string())),
            }
        }
    }

    fn record(slug: &str, backend: BackendKind) -> DeploymentRecord {
        DeploymentRecord::new(
            slug.to_string(),
            backend,
            format!("https://{}.example.dev", slug),
            1,
            "demo".to_string(),
            "user-1".to_string(),
        )
    }

    #[tokio::test]
    async fn test_put_rejects_taken_slug() {
        let registry = DeploymentRegistry::in_memory();

        registry
            .put(record("demo-ab12cd", BackendKind::EdgeCdn))
            .await
            .unwrap();
        let err = registry
            .put(record("demo-ab12cd", BackendKind::ObjectStore))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::SlugTaken(ref s) if s == "demo-ab12cd"));
        let kept = registry.get("demo-ab12cd").await.unwrap().unwrap();
        assert_eq!(kept.backend, BackendKind::EdgeCdn);
    }

    #[tokio::test]
    async fn test_decommission_removes_record() {
        let adapter = FakeAdapter::new(BackendKind::LocalStaticServe, RemoveBehavior::Ok);
        let registry = DeploymentRegistry::in_memory().with_adapter(adapter.clone());

        registry
            .put(record("demo-ab12cd", BackendKind::LocalStaticServe))
            .await
            .unwrap();
        registry
            .put(record("other-123456", BackendKind::LocalStaticServe))
            .await
            .unwrap();

        let removed = registry.decommission("demo-ab12cd").await.unwrap();
        assert_eq!(removed.slug, "demo-ab12cd");
        assert_eq!(adapter.removals.load(Ordering::SeqCst), 1);

        assert!(registry.get("demo-ab12cd").await.unwrap().is_none());
        let remaining: Vec<String> = registry
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.slug)
            .collect();
        assert_eq!(remaining, vec!["other-123456"]);
    }

    #[tokio::test]
    async fn test_decommission_routes_to_owning_adapter() {
        let edge = FakeAdapter::new(BackendKind::EdgeCdn, RemoveBehavior::Ok);
        let local = FakeAdapter::new(BackendKind::LocalStaticServe, RemoveBehavior::Ok);
        let registry = DeploymentRegistry::in_memory()
            .with_adapter(edge.clone())
            .with_adapter(local.clone());

        registry
            .put(record("demo-ab12cd", BackendKind::EdgeCdn))
            .await
            .unwrap();
        registry.decommission("demo-ab12cd").await.unwrap();

        assert_eq!(edge.removals.load(Ordering::SeqCst), 1);
        assert_eq!(local.removals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_decommission_already_gone_drops_record() {
        let adapter = FakeAdapter::new(BackendKind::EdgeCdn, RemoveBehavior::Gone);
        let registry = DeploymentRegistry::in_memory().with_adapter(adapter);

        registry
            .put(record("demo-ab12cd", BackendKind::EdgeCdn))
            .await
            .unwrap();
        registry.decommission("demo-ab12cd").await.unwrap();

        assert!(!registry.contains("demo-ab12cd").await.unwrap());
    }

    #[tokio::test]
    async fn test_hard_failure_keeps_record_live() {
        let adapter = FakeAdapter::new(BackendKind::ObjectStore, RemoveBehavior::Fail);
        let registry = DeploymentRegistry::in_memory().with_adapter(adapter.clone());

        registry
            .put(record("demo-ab12cd", BackendKind::ObjectStore))
            .await
            .unwrap();

        let err = registry.decommission("demo-ab12cd").await.unwrap_err();
        assert!(matches!(
            err,
            RegistryError::Decommission {
                backend: BackendKind::ObjectStore,
                ..
            }
        ));
        assert!(registry.contains("demo-ab12cd").await.unwrap());

        // Retry reaches the adapter again
        let _ = registry.decommission("demo-ab12cd").await;
        assert_eq!(adapter.removals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_adapter_is_hard_error() {
        let registry = DeploymentRegistry::in_memory();
        registry
            .put(record("demo-ab12cd", BackendKind::Job))
            .await
            .unwrap();

        let err = registry.decommission("demo-ab12cd").await.unwrap_err();
        assert!(matches!(err, RegistryError::NoAdapter { .. }));
        assert!(registry.contains("demo-ab12cd").await.unwrap());
    }

    #[tokio::test]
    async fn test_decommission_unknown_slug() {
        let registry = DeploymentRegistry::in_memory();
        let err = registry.decommission("missing-000000").await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_reads_during_insert() {
        let registry = Arc::new(DeploymentRegistry::in_memory());

        let mut handles = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let slug = format!("demo-{:06}", i);
                registry
                    .put(record(&slug, BackendKind::LocalStaticServe))
                    .await
                    .unwrap();
                registry.list().await.unwrap().len()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap() >= 1);
        }

        assert_eq!(registry.list().await.unwrap().len(), 16);
    }
}
