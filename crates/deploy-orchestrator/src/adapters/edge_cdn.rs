//! Edge CDN publishing through the Cloudflare Pages direct-upload API
//!
//! Each slug maps to one Pages project. Deploying ensures the project
//! exists and then uploads the whole file set as a single multipart
//! deployment, with a manifest mapping each `/path` to its content hash.

use async_trait::async_trait;
use launchpad_common::{
    AdapterError, BackendKind, DeployOutcome, DeploymentRequest, Result, TargetAdapter,
};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{http_error, mime, public_url, rejection, require_files, FileSet};
use crate::config::EdgeCdnConfig;

pub struct EdgeCdnAdapter {
    config: EdgeCdnConfig,
    http: reqwest::Client,
}

impl EdgeCdnAdapter {
    pub fn new(config: EdgeCdnConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (
            self.config.account_id.as_deref(),
            self.config.api_token.as_deref(),
        ) {
            (Some(account), Some(token)) => Ok((account, token)),
            _ => Err(AdapterError::not_configured(
                BackendKind::EdgeCdn,
                "CLOUDFLARE_ACCOUNT_ID and CLOUDFLARE_API_TOKEN are required",
            )),
        }
    }

    fn project_url(&self, account: &str, slug: &str) -> String {
        format!(
            "{}/accounts/{}/pages/projects/{}",
            self.config.api_base, account, slug
        )
    }

    /// Create the Pages project unless it already exists
    async fn ensure_project(&self, account: &str, token: &str, slug: &str) -> Result<()> {
        let response = self
            .http
            .get(self.project_url(account, slug))
            .bearer_auth(token)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(http_error)?;

        match response.status() {
            status if status.is_success() => {
                debug!("Pages project {} already exists", slug);
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            _ => return Err(rejection(response).await),
        }

        let response = self
            .http
            .post(format!(
                "{}/accounts/{}/pages/projects",
                self.config.api_base, account
            ))
            .bearer_auth(token)
            .timeout(self.config.timeout)
            .json(&json!({
                "name": slug,
                "production_branch": self.config.production_branch,
            }))
            .send()
            .await
            .map_err(http_error)?;

        match response.status() {
            // Lost a creation race; the project is there either way
            StatusCode::CONFLICT => Ok(()),
            status if status.is_success() => {
                info!("Created Pages project {}", slug);
                Ok(())
            }
            _ => Err(rejection(response).await),
        }
    }
}

fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

fn upload_form(files: &FileSet<'_>) -> Result<Form> {
    let manifest: BTreeMap<String, String> = files
        .iter()
        .map(|(path, content)| (format!("/{}", path), content_hash(content)))
        .collect();

    let mut form = Form::new().text("manifest", serde_json::to_string(&manifest)?);

    for (path, content) in files {
        let part = Part::bytes(content.as_bytes().to_vec())
            .file_name(path.clone())
            .mime_str(mime::content_type_for(path))
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        form = form.part(content_hash(content), part);
    }

    Ok(form)
}

#[async_trait]
impl TargetAdapter for EdgeCdnAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::EdgeCdn
    }

    fn is_configured(&self) -> bool {
        self.config.account_id.is_some() && self.config.api_token.is_some()
    }

    async fn deploy(&self, slug: &str, request: &DeploymentRequest) -> Result<DeployOutcome> {
        let files = require_files(BackendKind::EdgeCdn, request)?;
        let (account, token) = self.credentials()?;

        self.ensure_project(account, token, slug).await?;

        debug!("Uploading {} files to Pages project {}", files.len(), slug);

        let response = self
            .http
            .post(format!("{}/deployments", self.project_url(account, slug)))
            .bearer_auth(token)
            .timeout(self.config.timeout)
            .multipart(upload_form(&files)?)
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        let url = public_url(
            request,
            format!("https://{}.{}", slug, self.config.pages_domain),
        );
        info!("Published {} to edge CDN at {}", slug, url);

        Ok(DeployOutcome::new(url, files.len()))
    }

    async fn remove(&self, slug: &str) -> Result<()> {
        let (account, token) = self.credentials()?;

        let response = self
            .http
            .delete(self.project_url(account, slug))
            .bearer_auth(token)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            let err = rejection(response).await;
            if err.is_gone() {
                debug!("Pages project {} already absent", slug);
                return Ok(());
            }
            return Err(err);
        }

        info!("Deleted Pages project {}", slug);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROJECT: &str = "/accounts/acct-1/pages/projects/demo-ab12cd";

    fn adapter(server: &MockServer) -> EdgeCdnAdapter {
        EdgeCdnAdapter::new(EdgeCdnConfig {
            account_id: Some("acct-1".to_string()),
            api_token: Some("cf-token".to_string()),
            api_base: server.uri(),
            ..EdgeCdnConfig::default()
        })
    }

    fn request() -> DeploymentRequest {
        let mut files = BTreeMap::new();
        files.insert("index.html".to_string(), "<h1>hi</h1>".to_string());
        files.insert("css/site.css".to_string(), "body{}".to_string());
        DeploymentRequest::publish("demo", "user-1", files)
    }

    async fn mount_upload(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(format!("{}/deployments", PROJECT)))
            .and(header("authorization", "Bearer cf-token"))
            .and(body_string_contains("\"/index.html\""))
            .and(body_string_contains("<h1>hi</h1>"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_creates_missing_project_then_uploads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts/acct-1/pages/projects"))
            .and(body_string_contains("\"production_branch\":\"main\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_upload(&server).await;

        let outcome = adapter(&server).deploy("demo-ab12cd", &request()).await.unwrap();

        assert_eq!(outcome.url, "https://demo-ab12cd.pages.dev");
        assert_eq!(outcome.resource_count, 2);
    }

    #[tokio::test]
    async fn test_existing_project_is_reused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/accounts/acct-1/pages/projects"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        mount_upload(&server).await;

        let request = request().with_custom_domain("docs.example.com");
        let outcome = adapter(&server).deploy("demo-ab12cd", &request).await.unwrap();

        assert_eq!(outcome.url, "https://docs.example.com");
    }

    #[tokio::test]
    async fn test_upload_failure_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/deployments", PROJECT)))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad manifest"))
            .mount(&server)
            .await;

        let err = adapter(&server).deploy("demo-ab12cd", &request()).await.unwrap_err();
        assert!(matches!(err, AdapterError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_remove_deletes_project() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        adapter(&server).remove("demo-ab12cd").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_missing_project_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/accounts/acct-1/pages/projects/never-000000"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(410))
            .expect(1)
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        adapter.remove("never-000000").await.unwrap();
        adapter.remove("demo-ab12cd").await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_server_error_is_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(500).set_body_string("try later"))
            .mount(&server)
            .await;

        let err = adapter(&server).remove("demo-ab12cd").await.unwrap_err();
        assert!(matches!(err, AdapterError::Rejected { status: 500, .. }));
        assert!(!err.is_gone());
    }

    #[tokio::test]
    async fn test_manifest_uses_normalized_paths() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROJECT))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(format!("{}/deployments", PROJECT)))
            .and(body_string_contains("\"/about/index.html\""))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut files = BTreeMap::new();
        files.insert("./about//index.html".to_string(), "about".to_string());
        let request = DeploymentRequest::publish("demo", "user-1", files);

        let outcome = adapter(&server).deploy("demo-ab12cd", &request).await.unwrap();
        assert_eq!(outcome.resource_count, 1);
    }

    #[test]
    fn test_requires_account_and_token() {
        let adapter = EdgeCdnAdapter::new(EdgeCdnConfig {
            account_id: Some("acct-1".to_string()),
            ..EdgeCdnConfig::default()
        });
        assert!(!adapter.is_configured());
    }
}
