//! Entry point tying slugs, the fallback chains and the registry together

use anyhow::{Context, Result};
use deployment_registry::{
    DeploymentRegistry, InMemoryStore, RedisStore, RegistryError, RegistryStore,
};
use launchpad_common::{
    generate_slug, BackendKind, DeploymentRecord, DeploymentRequest, DeploymentResult,
    RequestClass, TargetAdapter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::adapters::{
    EdgeCdnAdapter, JobAdapter, LocalStaticAdapter, ObjectStoreAdapter, ServiceAdapter,
};
use crate::config::Config;
use crate::credentials::CredentialProvider;
use crate::dispatcher::dispatch;

/// Slugs generated per request before giving up on collisions
pub const MAX_SLUG_ATTEMPTS: usize = 5;

pub struct Orchestrator {
    registry: DeploymentRegistry,
    credentials: Arc<CredentialProvider>,
    publish_chain: Vec<Arc<dyn TargetAdapter>>,
    compute_chain: Vec<Arc<dyn TargetAdapter>>,
}

impl Orchestrator {
    /// Build from explicit chains. Every adapter in either chain is
    /// registered with the registry so decommission can find its owner.
    pub fn new(
        mut registry: DeploymentRegistry,
        credentials: Arc<CredentialProvider>,
        publish_chain: Vec<Arc<dyn TargetAdapter>>,
        compute_chain: Vec<Arc<dyn TargetAdapter>>,
    ) -> Self {
        for adapter in publish_chain.iter().chain(compute_chain.iter()) {
            registry.register_adapter(Arc::clone(adapter));
        }

        Self {
            registry,
            credentials,
            publish_chain,
            compute_chain,
        }
    }

    /// Wire the default chains from configuration:
    /// publish is EdgeCDN → ObjectStore → LocalStaticServe,
    /// compute is Service → Job (Service only for interactive requests).
    pub async fn from_config(config: &Config) -> Result<Self> {
        let credentials = Arc::new(CredentialProvider::new(config.auth.clone()));

        let store: Arc<dyn RegistryStore> = match &config.registry.redis_url {
            Some(url) => {
                info!("Using Redis registry store");
                Arc::new(
                    RedisStore::new(url)
                        .await
                        .context("Failed to connect registry store")?,
                )
            }
            None => {
                debug!("Using in-memory registry store");
                Arc::new(InMemoryStore::new())
            }
        };

        let publish_chain: Vec<Arc<dyn TargetAdapter>> = vec![
            Arc::new(EdgeCdnAdapter::new(config.edge_cdn.clone())),
            Arc::new(ObjectStoreAdapter::new(
                config.object_store.clone(),
                Arc::clone(&credentials),
            )),
            Arc::new(LocalStaticAdapter::new(config.local_static.clone())),
        ];

        let compute_chain: Vec<Arc<dyn TargetAdapter>> = vec![
            Arc::new(ServiceAdapter::new(
                config.service.clone(),
                Arc::clone(&credentials),
            )),
            Arc::new(JobAdapter::new(config.job.clone(), Arc::clone(&credentials))),
        ];

        Ok(Self::new(
            DeploymentRegistry::new(store),
            credentials,
            publish_chain,
            compute_chain,
        ))
    }

    /// Publish a static file bundle
    pub async fn publish(
        &self,
        request: &DeploymentRequest,
    ) -> deployment_registry::Result<DeploymentResult> {
        self.run(RequestClass::Publish, request, &self.publish_chain)
            .await
    }

    /// Dispatch a compute task. The interactive Service backend is only
    /// tried when the caller asks for it.
    pub async fn dispatch_compute(
        &self,
        request: &DeploymentRequest,
        interactive: bool,
    ) -> deployment_registry::Result<DeploymentResult> {
        let chain: Vec<Arc<dyn TargetAdapter>> = self
            .compute_chain
            .iter()
            .filter(|adapter| interactive || adapter.kind() != BackendKind::Service)
            .cloned()
            .collect();

        self.run(RequestClass::ComputeDispatch, request, &chain)
            .await
    }

    /// Route by artifact kind (non-interactive for compute)
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
    ) -> deployment_registry::Result<DeploymentResult> {
        match request.class() {
            RequestClass::Publish => self.publish(request).await,
            RequestClass::ComputeDispatch => self.dispatch_compute(request, false).await,
        }
    }

    async fn run(
        &self,
        class: RequestClass,
        request: &DeploymentRequest,
        chain: &[Arc<dyn TargetAdapter>],
    ) -> deployment_registry::Result<DeploymentResult> {
        let mut last_slug = String::new();

        for attempt in 1..=MAX_SLUG_ATTEMPTS {
            if attempt > 1 {
                // Next millisecond, next suffix
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            let slug = generate_slug(&request.project_name, &request.owner_id);
            if self.registry.contains(&slug).await? {
                debug!("Slug {} already live, regenerating", slug);
                last_slug = slug;
                continue;
            }

            let mut result = dispatch(class, &slug, request, chain).await;
            let Some(backend) = result.backend.kind() else {
                return Ok(result);
            };

            let record = DeploymentRecord::new(
                slug.clone(),
                backend,
                result.url.clone(),
                result.resource_count,
                request.project_name.clone(),
                request.owner_id.clone(),
            )
            .with_last_error(result.last_attempt_error().map(str::to_string));

            match self.registry.put(record).await {
                Ok(record) => {
                    result.deployment_id = Some(record.deployment_id);
                    return Ok(result);
                }
                Err(RegistryError::SlugTaken(taken)) => {
                    warn!("Slug {} was claimed during deployment, regenerating", taken);
                    last_slug = taken;
                }
                Err(e) => return Err(e),
            }
        }

        Err(RegistryError::SlugTaken(last_slug))
    }

    /// Tear a live deployment down through its owning adapter
    pub async fn decommission(&self, slug: &str) -> deployment_registry::Result<DeploymentRecord> {
        self.registry.decommission(slug).await
    }

    pub async fn get(&self, slug: &str) -> deployment_registry::Result<Option<DeploymentRecord>> {
        self.registry.get(slug).await
    }

    pub async fn list(&self) -> deployment_registry::Result<Vec<DeploymentRecord>> {
        self.registry.list().await
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    pub fn credentials(&self) -> &CredentialProvider {
        &self.credentials
    }
}
