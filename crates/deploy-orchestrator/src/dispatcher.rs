//! Ordered fallback across target adapters
//!
//! Adapters are tried strictly one at a time, in the order given. A
//! missing configuration is a skip, a failed attempt is recorded and the
//! walk continues, and the first success ends it. When nothing succeeds
//! the result carries the `local-fallback` sentinel.

use launchpad_common::{
    AdapterError, AttemptFailure, BackendTag, DeployOutcome, DeploymentRequest,
    DeploymentResult, RequestClass, TargetAdapter,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Terminal error when no adapter was even attempted
pub const NO_BACKEND_CONFIGURED: &str = "no backend configured";

async fn attempt(
    adapter: &dyn TargetAdapter,
    slug: &str,
    request: &DeploymentRequest,
) -> Result<DeployOutcome, AdapterError> {
    let outcome = match request.timeout() {
        Some(limit) => tokio::time::timeout(limit, adapter.deploy(slug, request))
            .await
            .map_err(|_| {
                AdapterError::Timeout(format!(
                    "{} did not finish within {}s",
                    adapter.kind(),
                    limit.as_secs()
                ))
            })??,
        None => adapter.deploy(slug, request).await?,
    };

    if outcome.url.trim().is_empty() {
        return Err(AdapterError::EmptyUrl);
    }
    Ok(outcome)
}

/// Walk `adapters` in order until one deploys `request` under `slug`
pub async fn dispatch(
    class: RequestClass,
    slug: &str,
    request: &DeploymentRequest,
    adapters: &[Arc<dyn TargetAdapter>],
) -> DeploymentResult {
    let mut attempts = Vec::new();
    let mut skipped = Vec::new();

    for adapter in adapters {
        let kind = adapter.kind();

        if adapter.request_class() != class {
            debug!("Skipping {}: does not handle {} requests", kind, class);
            skipped.push(kind);
            continue;
        }

        if !adapter.is_configured() {
            debug!("Skipping {}: not configured", kind);
            skipped.push(kind);
            continue;
        }

        debug!("Attempting {} for {}", kind, slug);

        match attempt(adapter.as_ref(), slug, request).await {
            Ok(outcome) => {
                info!("Deployed {} via {} at {}", slug, kind, outcome.url);
                return DeploymentResult {
                    backend: BackendTag::Adapter(kind),
                    slug: slug.to_string(),
                    url: outcome.url,
                    resource_count: outcome.resource_count,
                    deployment_id: None,
                    execution_id: outcome.execution_id,
                    payload: outcome.payload,
                    error: None,
                    attempts,
                    skipped,
                };
            }
            Err(e) => {
                warn!("{} failed for {}: {}", kind, slug, e);
                attempts.push(AttemptFailure {
                    backend: kind,
                    error: e.to_string(),
                });
            }
        }
    }

    let error = attempts
        .last()
        .map(|failure| failure.error.clone())
        .unwrap_or_else(|| NO_BACKEND_CONFIGURED.to_string());

    info!("No backend accepted {}, falling back to local execution: {}", slug, error);

    DeploymentResult {
        backend: BackendTag::LocalFallback,
        slug: slug.to_string(),
        url: String::new(),
        resource_count: 0,
        deployment_id: None,
        execution_id: None,
        payload: None,
        error: Some(error),
        attempts,
        skipped,
    }
}
