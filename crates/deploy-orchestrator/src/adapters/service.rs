//! Interactive execution against a long-lived HTTP service

use async_trait::async_trait;
use launchpad_common::{
    AdapterError, BackendKind, DeployOutcome, DeploymentRequest, Result, TargetAdapter,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use super::{http_error, rejection, require_task};
use crate::config::ServiceConfig;
use crate::credentials::CredentialProvider;

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    task_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<&'a str>,
    steps: &'a [Value],
    user_id: &'a str,
    context: &'a Value,
    slug: &'a str,
}

pub struct ServiceAdapter {
    config: ServiceConfig,
    credentials: Arc<CredentialProvider>,
    http: reqwest::Client,
}

impl ServiceAdapter {
    pub fn new(config: ServiceConfig, credentials: Arc<CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TargetAdapter for ServiceAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Service
    }

    fn is_configured(&self) -> bool {
        self.config.resolved_url().is_some()
    }

    async fn deploy(&self, slug: &str, request: &DeploymentRequest) -> Result<DeployOutcome> {
        let task = require_task(BackendKind::Service, request)?;
        let base_url = self.config.resolved_url().ok_or_else(|| {
            AdapterError::not_configured(
                BackendKind::Service,
                "CLOUD_RUN_SERVICE_URL or CLOUD_RUN_SERVICE_NAME + GCP_PROJECT_NUMBER required",
            )
        })?;

        let credential = self
            .credentials
            .get_access_token()
            .await
            .ok_or(AdapterError::AuthUnavailable)?;

        let body = ExecuteRequest {
            task_id: &task.task_id,
            intent: task.intent.as_deref(),
            query: task.query.as_deref(),
            steps: &task.steps,
            user_id: &request.owner_id,
            context: &task.context,
            slug,
        };

        debug!("Executing task {} on {}", task.task_id, base_url);

        let response = self
            .http
            .post(format!("{}/execute", base_url))
            .bearer_auth(credential.token())
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let text = response.text().await.map_err(http_error)?;
        let payload = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));

        info!("Interactive execution completed for {}", slug);

        Ok(DeployOutcome {
            url: base_url,
            resource_count: 1,
            execution_id: None,
            payload: Some(payload),
        })
    }

    async fn remove(&self, slug: &str) -> Result<()> {
        // The service outlives any single deployment
        debug!("Nothing to remove on the service backend for {}", slug);
        Ok(())
    }
}
