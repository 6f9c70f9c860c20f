//! Object store publishing (GCS)

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use launchpad_common::{
    AdapterError, BackendKind, DeployOutcome, DeploymentRequest, Result, TargetAdapter,
};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{http_error, mime, public_url, rejection, require_files};
use crate::config::ObjectStoreConfig;
use crate::credentials::CredentialProvider;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectList {
    #[serde(default)]
    items: Vec<ObjectEntry>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ObjectEntry {
    name: String,
}

pub struct ObjectStoreAdapter {
    config: ObjectStoreConfig,
    credentials: Arc<CredentialProvider>,
    http: reqwest::Client,
}

impl ObjectStoreAdapter {
    pub fn new(config: ObjectStoreConfig, credentials: Arc<CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
            http: reqwest::Client::new(),
        }
    }

    fn bucket(&self) -> Result<&str> {
        self.config.bucket.as_deref().ok_or_else(|| {
            AdapterError::not_configured(BackendKind::ObjectStore, "GCS_BUCKET is required")
        })
    }

    fn published_url(&self, bucket: &str, slug: &str) -> String {
        match &self.config.custom_domain {
            Some(domain) => format!("https://{}/{}/index.html", domain, slug),
            None => format!("{}/{}/{}/index.html", self.config.base_url, bucket, slug),
        }
    }

    /// JSON API URL for a single object; the name is one encoded segment
    fn object_url(&self, bucket: &str, name: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| AdapterError::Transport("invalid GCS_BASE_URL".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", bucket, "o", name]);
        Ok(url)
    }

    /// Media URL for `slug/path`, one encoded segment per path component
    fn upload_url(&self, bucket: &str, slug: &str, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| AdapterError::Transport("invalid GCS_BASE_URL".to_string()))?
            .pop_if_empty()
            .push(bucket)
            .push(slug)
            .extend(path.split('/'));
        Ok(url)
    }

    async fn upload(
        &self,
        token: &str,
        bucket: &str,
        slug: &str,
        path: &str,
        content: &str,
    ) -> Result<()> {
        let content_type = mime::content_type_for(path);
        debug!("Uploading gs://{}/{}/{} ({})", bucket, slug, path, content_type);

        let response = self
            .http
            .put(self.upload_url(bucket, slug, path)?)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .timeout(self.config.timeout)
            .body(content.to_string())
            .send()
            .await
            .map_err(http_error)?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    async fn list_prefix(&self, token: &str, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let list_url = format!("{}/storage/v1/b/{}/o", self.config.base_url, bucket);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("prefix", prefix.to_string())];
            if let Some(page) = page_token.take() {
                query.push(("pageToken", page));
            }

            let response = self
                .http
                .get(&list_url)
                .bearer_auth(token)
                .query(&query)
                .timeout(self.config.timeout)
                .send()
                .await
                .map_err(http_error)?;

            if !response.status().is_success() {
                return Err(rejection(response).await);
            }

            let page: ObjectList = response.json().await.map_err(http_error)?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(names)
    }
}

#[async_trait]
impl TargetAdapter for ObjectStoreAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::ObjectStore
    }

    fn is_configured(&self) -> bool {
        self.config.bucket.is_some()
    }

    async fn deploy(&self, slug: &str, request: &DeploymentRequest) -> Result<DeployOutcome> {
        let files = require_files(BackendKind::ObjectStore, request)?;
        let bucket = self.bucket()?;

        let credential = self
            .credentials
            .get_access_token()
            .await
            .ok_or(AdapterError::AuthUnavailable)?;
        let token = credential.token();

        let uploads: Vec<_> = files
            .iter()
            .map(|(path, content)| self.upload(token, bucket, slug, path, content))
            .collect();

        // Any failed object fails the whole attempt
        stream::iter(uploads)
            .buffer_unordered(self.config.upload_concurrency)
            .try_collect::<Vec<()>>()
            .await?;

        let url = public_url(request, self.published_url(bucket, slug));
        info!("Published {} objects for {} at {}", files.len(), slug, url);

        Ok(DeployOutcome::new(url, files.len()))
    }

    async fn remove(&self, slug: &str) -> Result<()> {
        let bucket = self.bucket()?;
        let credential = self
            .credentials
            .get_access_token()
            .await
            .ok_or(AdapterError::AuthUnavailable)?;
        let token = credential.token();

        let names = self.list_prefix(token, bucket, &format!("{}/", slug)).await?;
        if names.is_empty() {
            debug!("No objects under {}/, nothing to remove", slug);
            return Ok(());
        }

        for name in &names {
            let response = self
                .http
                .delete(self.object_url(bucket, name)?)
                .bearer_auth(token)
                .timeout(self.config.timeout)
                .send()
                .await
                .map_err(http_error)?;

            match response.status() {
                StatusCode::NOT_FOUND => warn!("Object {} already deleted", name),
                status if status.is_success() => {}
                _ => return Err(rejection(response).await),
            }
        }

        info!("Removed {} objects under {}/", names.len(), slug);
        Ok(())
    }
}
