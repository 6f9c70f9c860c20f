//! Batch execution through the Cloud Run Jobs control plane

use async_trait::async_trait;
use launchpad_common::{
    AdapterError, BackendKind, DeployOutcome, DeploymentRequest, Result, TargetAdapter,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use super::{http_error, rejection, require_task};
use crate::config::JobConfig;
use crate::credentials::CredentialProvider;

pub struct JobAdapter {
    config: JobConfig,
    credentials: Arc<CredentialProvider>,
    http: reqwest::Client,
    /// slug → execution resource name, for cancellation
    executions: Mutex<HashMap<String, String>>,
}

impl JobAdapter {
    pub fn new(config: JobConfig, credentials: Arc<CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
            http: reqwest::Client::new(),
            executions: Mutex::new(HashMap::new()),
        }
    }

    fn job_path(&self) -> Result<String> {
        match (&self.config.project_id, &self.config.job_name) {
            (Some(project), Some(job)) => Ok(format!(
                "projects/{}/locations/{}/jobs/{}",
                project, self.config.region, job
            )),
            _ => Err(AdapterError::not_configured(
                BackendKind::Job,
                "GCP_PROJECT_ID and CLOUD_RUN_JOB_NAME are required",
            )),
        }
    }

    fn track(&self, slug: &str, execution_name: String) {
        if let Ok(mut executions) = self.executions.lock() {
            executions.insert(slug.to_string(), execution_name);
        }
    }

    fn tracked(&self, slug: &str) -> Option<String> {
        self.executions
            .lock()
            .ok()
            .and_then(|executions| executions.get(slug).cloned())
    }

    fn forget(&self, slug: &str) {
        if let Ok(mut executions) = self.executions.lock() {
            executions.remove(slug);
        }
    }
}

#[async_trait]
impl TargetAdapter for JobAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Job
    }

    fn is_configured(&self) -> bool {
        self.config.project_id.is_some() && self.config.job_name.is_some()
    }

    async fn deploy(&self, slug: &str, request: &DeploymentRequest) -> Result<DeployOutcome> {
        let task = require_task(BackendKind::Job, request)?;
        let job_path = self.job_path()?;

        let credential = self
            .credentials
            .get_access_token()
            .await
            .ok_or(AdapterError::AuthUnavailable)?;

        let mut env = vec![
            json!({ "name": "TASK_ID", "value": task.task_id }),
            json!({ "name": "DEPLOYMENT_SLUG", "value": slug }),
        ];
        if let Some(manifest_url) = &task.manifest_url {
            env.push(json!({ "name": "MANIFEST_URL", "value": manifest_url }));
        }
        for (name, value) in &task.env_overrides {
            env.push(json!({ "name": name, "value": value }));
        }

        let mut overrides = json!({ "containerOverrides": [{ "env": env }] });
        if let Some(task_count) = task.task_count {
            overrides["taskCount"] = json!(task_count);
        }
        if let Some(timeout) = request.timeout() {
            overrides["timeout"] = json!(format!("{}s", timeout.as_secs()));
        }

        let url = format!("{}/v2/{}:run", self.config.api_base, job_path);
        debug!("Triggering job execution for task {}", task.task_id);

        let response = self
            .http
            .post(&url)
            .bearer_auth(credential.token())
            .timeout(self.config.timeout)
            .json(&json!({ "overrides": overrides }))
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let body: Value = response.json().await.map_err(http_error)?;

        let execution_id = body
            .pointer("/metadata/name")
            .and_then(Value::as_str)
            .and_then(|name| name.rsplit('/').next())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("exec-{}", task.task_id));

        let execution_name = format!("{}/executions/{}", job_path, execution_id);
        self.track(slug, execution_name.clone());

        info!("Job execution started: {} for {}", execution_id, slug);

        Ok(DeployOutcome {
            url: format!("{}/v2/{}", self.config.api_base, execution_name),
            resource_count: task.task_count.unwrap_or(1) as usize,
            execution_id: Some(execution_id),
            payload: None,
        })
    }

    async fn remove(&self, slug: &str) -> Result<()> {
        let Some(execution_name) = self.tracked(slug) else {
            debug!("No tracked execution for {}, nothing to cancel", slug);
            return Ok(());
        };

        let credential = self
            .credentials
            .get_access_token()
            .await
            .ok_or(AdapterError::AuthUnavailable)?;

        let url = format!("{}/v2/{}:cancel", self.config.api_base, execution_name);
        let response = self
            .http
            .post(&url)
            .bearer_auth(credential.token())
            .timeout(self.config.timeout)
            .json(&json!({}))
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            let err = rejection(response).await;
            if err.is_gone() {
                self.forget(slug);
                warn!("Job execution {} already gone", execution_name);
                return Ok(());
            }
            return Err(err);
        }

        self.forget(slug);
        info!("Cancelled job execution {}", execution_name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use launchpad_common::TaskDescriptor;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RUN_PATH: &str = "/v2/projects/demo-project/locations/us-central1/jobs/agent-runner:run";

    fn adapter(server: &MockServer, token: Option<&str>) -> JobAdapter {
        let auth = AuthConfig {
            static_token: token.map(str::to_string),
            metadata_token_url: format!("{}/metadata/token", server.uri()),
            metadata_timeout: Duration::from_millis(200),
            ..AuthConfig::default()
        };
        let config = JobConfig {
            project_id: Some("demo-project".to_string()),
            job_name: Some("agent-runner".to_string()),
            api_base: server.uri(),
            ..JobConfig::default()
        };
        JobAdapter::new(config, Arc::new(CredentialProvider::new(auth)))
    }

    fn request() -> DeploymentRequest {
        let mut task = TaskDescriptor::new("task-42");
        task.manifest_url = Some("gs://manifests/task-42.json".to_string());
        task.env_overrides.insert("MODE".to_string(), "batch".to_string());
        DeploymentRequest::compute("agent", "user-1", task)
    }

    #[tokio::test]
    async fn test_dispatch_extracts_execution_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .and(header("authorization", "Bearer job-token"))
            .and(body_partial_json(serde_json::json!({
                "overrides": { "containerOverrides": [{ "env": [
                    { "name": "TASK_ID", "value": "task-42" },
                    { "name": "DEPLOYMENT_SLUG", "value": "agent-abc123" },
                    { "name": "MANIFEST_URL", "value": "gs://manifests/task-42.json" },
                    { "name": "MODE", "value": "batch" }
                ]}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "projects/demo-project/locations/us-central1/operations/op-1",
                "metadata": {
                    "name": "projects/demo-project/locations/us-central1/jobs/agent-runner/executions/agent-runner-x7k2p"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = adapter(&server, Some("job-token"))
            .deploy("agent-abc123", &request())
            .await
            .unwrap();

        assert_eq!(outcome.execution_id.as_deref(), Some("agent-runner-x7k2p"));
        assert_eq!(outcome.resource_count, 1);
        assert!(outcome.url.ends_with("/executions/agent-runner-x7k2p"));
    }

    #[tokio::test]
    async fn test_missing_execution_name_is_synthesized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let outcome = adapter(&server, Some("job-token"))
            .deploy("agent-abc123", &request())
            .await
            .unwrap();

        assert_eq!(outcome.execution_id.as_deref(), Some("exec-task-42"));
    }

    #[tokio::test]
    async fn test_rejection_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(ResponseTemplate::new(403).set_body_string("permission denied on job"))
            .mount(&server)
            .await;

        let err = adapter(&server, Some("job-token"))
            .deploy("agent-abc123", &request())
            .await
            .unwrap_err();

        match err {
            AdapterError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert!(body.contains("permission denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_credential_is_auth_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/metadata/token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = adapter(&server, None)
            .deploy("agent-abc123", &request())
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::AuthUnavailable));
        assert_eq!(err.to_string(), "GCP auth unavailable");
    }

    #[tokio::test]
    async fn test_remove_cancels_tracked_execution() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": { "name": "projects/demo-project/locations/us-central1/jobs/agent-runner/executions/run-1" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/v2/projects/demo-project/locations/us-central1/jobs/agent-runner/executions/run-1:cancel",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, Some("job-token"));
        adapter.deploy("agent-abc123", &request()).await.unwrap();
        adapter.remove("agent-abc123").await.unwrap();

        // Second removal has nothing left to cancel
        adapter.remove("agent-abc123").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_finished_execution_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(RUN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "metadata": { "name": "projects/demo-project/locations/us-central1/jobs/agent-runner/executions/run-2" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(
                "/v2/projects/demo-project/locations/us-central1/jobs/agent-runner/executions/run-2:cancel",
            ))
            .respond_with(ResponseTemplate::new(404).set_body_string("execution not found"))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server, Some("job-token"));
        adapter.deploy("agent-abc123", &request()).await.unwrap();
        adapter.remove("agent-abc123").await.unwrap();

        // Forgotten after the 404, so no second cancel is sent
        adapter.remove("agent-abc123").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_unknown_slug_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        adapter(&server, Some("job-token"))
            .remove("never-deployed")
            .await
            .unwrap();
    }

    #[test]
    fn test_is_configured() {
        let provider = Arc::new(CredentialProvider::new(AuthConfig::default()));
        let adapter = JobAdapter::new(JobConfig::default(), provider);
        assert!(!adapter.is_configured());
    }
}
