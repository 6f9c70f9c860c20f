//! Configuration management for the orchestrator
//!
//! Loaded once from environment variables with sensible defaults, then
//! handed to each adapter. Adapters never read the environment themselves.

use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::credentials::ServiceAccountKey;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
pub const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub auth: AuthConfig,
    pub job: JobConfig,
    pub service: ServiceConfig,
    pub edge_cdn: EdgeCdnConfig,
    pub object_store: ObjectStoreConfig,
    pub local_static: LocalStaticConfig,
    pub registry: RegistryConfig,
}

/// Credential sources for the cloud control plane
#[derive(Clone)]
pub struct AuthConfig {
    /// Operator-supplied bearer token
    pub static_token: Option<String>,

    /// Decoded service-account key
    pub service_account_key: Option<ServiceAccountKey>,

    /// Token-exchange endpoint, also the assertion audience
    pub token_uri: String,

    /// Metadata server token endpoint
    pub metadata_token_url: String,

    pub scope: String,

    pub exchange_timeout: Duration,

    pub metadata_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            static_token: None,
            service_account_key: None,
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            metadata_token_url: DEFAULT_METADATA_TOKEN_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            exchange_timeout: Duration::from_secs(10),
            metadata_timeout: Duration::from_secs(3),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("static_token", &self.static_token.as_ref().map(|_| "<redacted>"))
            .field(
                "service_account",
                &self.service_account_key.as_ref().map(|k| k.client_email.as_str()),
            )
            .field("token_uri", &self.token_uri)
            .field("metadata_token_url", &self.metadata_token_url)
            .field("scope", &self.scope)
            .field("exchange_timeout", &self.exchange_timeout)
            .field("metadata_timeout", &self.metadata_timeout)
            .finish()
    }
}

/// Batch-execution backend (Cloud Run Jobs)
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub project_id: Option<String>,
    pub region: String,
    pub job_name: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            region: "us-central1".to_string(),
            job_name: None,
            api_base: "https://run.googleapis.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Interactive execution backend (long-lived HTTP service)
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Explicit service URL; wins over the conventional host pattern
    pub url: Option<String>,
    pub service_name: Option<String>,
    pub project_number: Option<String>,
    pub region: String,
    pub timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            url: None,
            service_name: None,
            project_number: None,
            region: "us-central1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ServiceConfig {
    /// Explicit URL, or `https://<service>-<project-number>.<region>.run.app`
    pub fn resolved_url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.trim_end_matches('/').to_string());
        }
        match (&self.service_name, &self.project_number) {
            (Some(name), Some(number)) => Some(format!(
                "https://{}-{}.{}.run.app",
                name, number, self.region
            )),
            _ => None,
        }
    }
}

/// Edge CDN backend (Cloudflare Pages)
#[derive(Clone)]
pub struct EdgeCdnConfig {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    pub api_base: String,
    /// Conventional `<slug>.<domain>` suffix
    pub pages_domain: String,
    pub production_branch: String,
    pub timeout: Duration,
}

impl Default for EdgeCdnConfig {
    fn default() -> Self {
        Self {
            account_id: None,
            api_token: None,
            api_base: "https://api.cloudflare.com/client/v4".to_string(),
            pages_domain: "pages.dev".to_string(),
            production_branch: "main".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for EdgeCdnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeCdnConfig")
            .field("account_id", &self.account_id)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("pages_domain", &self.pages_domain)
            .field("production_branch", &self.production_branch)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Object store backend (GCS)
#[derive(Debug, Clone)]
pub struct ObjectStoreConfig {
    pub bucket: Option<String>,
    pub base_url: String,
    /// Public domain fronting the bucket
    pub custom_domain: Option<String>,
    pub upload_concurrency: usize,
    pub timeout: Duration,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            base_url: "https://storage.googleapis.com".to_string(),
            custom_domain: None,
            upload_concurrency: 8,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Local static serving behind a reverse proxy
#[derive(Debug, Clone)]
pub struct LocalStaticConfig {
    /// One directory per slug lives here
    pub static_root: PathBuf,
    /// One `<slug>.conf` virtual host per deployment lives here
    pub vhost_dir: PathBuf,
    /// Per-environment domain suffix
    pub domain: String,
}

impl Default for LocalStaticConfig {
    fn default() -> Self {
        Self {
            static_root: PathBuf::from("/var/www/deployments"),
            vhost_dir: PathBuf::from("/etc/nginx/conf.d"),
            domain: "deploy.localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Redis URL for durable registry storage; in-memory when unset
    pub redis_url: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let service_account_key = match env_opt("GCP_SERVICE_ACCOUNT_KEY") {
            Some(encoded) => Some(
                ServiceAccountKey::from_base64(&encoded)
                    .context("Invalid GCP_SERVICE_ACCOUNT_KEY")?,
            ),
            None => None,
        };

        let region = env_opt("GCP_REGION").unwrap_or(defaults.job.region);

        let config = Config {
            auth: AuthConfig {
                static_token: env_opt("GCP_ACCESS_TOKEN"),
                service_account_key,
                token_uri: env_opt("GCP_TOKEN_URI").unwrap_or(defaults.auth.token_uri),
                metadata_token_url: env_opt("GCP_METADATA_TOKEN_URL")
                    .unwrap_or(defaults.auth.metadata_token_url),
                scope: env_opt("GCP_SCOPE").unwrap_or(defaults.auth.scope),
                exchange_timeout: env_secs("GCP_TOKEN_TIMEOUT_SECS", defaults.auth.exchange_timeout)?,
                metadata_timeout: env_secs(
                    "GCP_METADATA_TIMEOUT_SECS",
                    defaults.auth.metadata_timeout,
                )?,
            },

            job: JobConfig {
                project_id: env_opt("GCP_PROJECT_ID"),
                region: region.clone(),
                job_name: env_opt("CLOUD_RUN_JOB_NAME"),
                api_base: env_opt("CLOUD_RUN_API_BASE").unwrap_or(defaults.job.api_base),
                timeout: env_secs("CLOUD_RUN_JOB_TIMEOUT_SECS", defaults.job.timeout)?,
            },

            service: ServiceConfig {
                url: env_opt("CLOUD_RUN_SERVICE_URL"),
                service_name: env_opt("CLOUD_RUN_SERVICE_NAME"),
                project_number: env_opt("GCP_PROJECT_NUMBER"),
                region,
                timeout: env_secs("CLOUD_RUN_SERVICE_TIMEOUT_SECS", defaults.service.timeout)?,
            },

            edge_cdn: EdgeCdnConfig {
                account_id: env_opt("CLOUDFLARE_ACCOUNT_ID"),
                api_token: env_opt("CLOUDFLARE_API_TOKEN"),
                api_base: env_opt("CLOUDFLARE_API_BASE").unwrap_or(defaults.edge_cdn.api_base),
                pages_domain: env_opt("CLOUDFLARE_PAGES_DOMAIN")
                    .unwrap_or(defaults.edge_cdn.pages_domain),
                production_branch: env_opt("CLOUDFLARE_PRODUCTION_BRANCH")
                    .unwrap_or(defaults.edge_cdn.production_branch),
                timeout: env_secs("CLOUDFLARE_TIMEOUT_SECS", defaults.edge_cdn.timeout)?,
            },

            object_store: ObjectStoreConfig {
                bucket: env_opt("GCS_BUCKET"),
                base_url: env_opt("GCS_BASE_URL").unwrap_or(defaults.object_store.base_url),
                custom_domain: env_opt("GCS_CUSTOM_DOMAIN"),
                upload_concurrency: env_opt("GCS_UPLOAD_CONCURRENCY")
                    .map(|v| v.parse())
                    .transpose()
                    .context("Invalid GCS_UPLOAD_CONCURRENCY")?
                    .unwrap_or(defaults.object_store.upload_concurrency),
                timeout: env_secs("GCS_TIMEOUT_SECS", defaults.object_store.timeout)?,
            },

            local_static: LocalStaticConfig {
                static_root: env_opt("STATIC_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.local_static.static_root),
                vhost_dir: env_opt("VHOST_CONF_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.local_static.vhost_dir),
                domain: env_opt("DEPLOY_DOMAIN").unwrap_or(defaults.local_static.domain),
            },

            registry: RegistryConfig {
                redis_url: env_opt("REGISTRY_REDIS_URL"),
            },
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("GCP_TOKEN_TIMEOUT_SECS", self.auth.exchange_timeout),
            ("GCP_METADATA_TIMEOUT_SECS", self.auth.metadata_timeout),
            ("CLOUD_RUN_JOB_TIMEOUT_SECS", self.job.timeout),
            ("CLOUD_RUN_SERVICE_TIMEOUT_SECS", self.service.timeout),
            ("CLOUDFLARE_TIMEOUT_SECS", self.edge_cdn.timeout),
            ("GCS_TIMEOUT_SECS", self.object_store.timeout),
        ];
        for (name, timeout) in timeouts {
            if timeout.is_zero() {
                anyhow::bail!("{} must be greater than 0", name);
            }
        }

        if self.object_store.upload_concurrency == 0 {
            anyhow::bail!("GCS_UPLOAD_CONCURRENCY must be greater than 0");
        }

        if self.local_static.domain.trim().is_empty() {
            anyhow::bail!("DEPLOY_DOMAIN must not be empty");
        }

        Ok(())
    }
}

/// Read a variable, treating empty values as unset
fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_secs(name: &str, default: Duration) -> Result<Duration> {
    match env_opt(name) {
        Some(value) => {
            let secs: u64 = value
                .parse()
                .with_context(|| format!("Invalid {}", name))?;
            Ok(Duration::from_secs(secs))
        }
        None => Ok(default),
    }
}
