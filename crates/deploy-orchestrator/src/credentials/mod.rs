//! Bearer credentials for the cloud control plane
//!
//! Sources are tried in order until one yields a non-empty token:
//! 1. a statically configured token
//! 2. a service-account key, exchanged via the JWT-bearer grant
//! 3. the metadata server (only reachable inside the cloud fabric)
//!
//! Tokens are not cached: every orchestration attempt asks again.

mod assertion;

pub use assertion::{
    AssertionClaims, AssertionMinter, ServiceAccountKey, SignedAssertion, ASSERTION_LIFETIME_SECS,
};

use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AuthConfig;

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Failure of a single credential source. Never escapes the provider:
/// a failed source falls through to the next one.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Invalid service-account key: {0}")]
    KeyDecode(String),

    #[error("Failed to sign assertion: {0}")]
    Signing(String),

    #[error("Token endpoint returned {status}: {body}")]
    Exchange { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Token response did not contain an access token")]
    EmptyToken,
}

/// Which source produced a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Static,
    ServiceAccount,
    Metadata,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Static => f.write_str("static token"),
            CredentialSource::ServiceAccount => f.write_str("service account"),
            CredentialSource::Metadata => f.write_str("metadata server"),
        }
    }
}

/// A bearer token, held only for the duration of a call
#[derive(Clone)]
pub struct Credential {
    token: String,
    source: CredentialSource,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

/// Layered credential resolution
pub struct CredentialProvider {
    config: AuthConfig,
    minter: AssertionMinter,
    http: reqwest::Client,
}

impl CredentialProvider {
    pub fn new(config: AuthConfig) -> Self {
        let minter = AssertionMinter::new(config.token_uri.clone(), config.scope.clone());
        Self {
            config,
            minter,
            http: reqwest::Client::new(),
        }
    }

    /// Resolve a usable token, or `None` when every source is exhausted.
    /// `None` is an expected outcome, not an error.
    pub async fn get_access_token(&self) -> Option<Credential> {
        if let Some(token) = self.config.static_token.as_deref().filter(|t| !t.is_empty()) {
            debug!("Using static access token");
            return Some(Credential {
                token: token.to_string(),
                source: CredentialSource::Static,
            });
        }

        if let Some(key) = &self.config.service_account_key {
            match self.exchange_service_account(key).await {
                Ok(token) => {
                    debug!("Exchanged service-account assertion for {}", key.client_email);
                    return Some(Credential {
                        token,
                        source: CredentialSource::ServiceAccount,
                    });
                }
                Err(e) => {
                    warn!("Service-account token exchange failed, trying metadata server: {}", e);
                }
            }
        }

        match self.query_metadata_server().await {
            Ok(token) => {
                debug!("Obtained access token from metadata server");
                Some(Credential {
                    token,
                    source: CredentialSource::Metadata,
                })
            }
            Err(e) => {
                info!("Metadata server unavailable, skipping: {}", e);
                None
            }
        }
    }

    async fn exchange_service_account(&self, key: &ServiceAccountKey) -> Result<String, CredentialError> {
        let assertion = self.minter.mint(&key.client_email, &key.private_key)?;

        let response = self
            .http
            .post(&self.config.token_uri)
            .timeout(self.config.exchange_timeout)
            .form(&[
                ("grant_type", JWT_BEARER_GRANT),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        read_token(response).await
    }

    async fn query_metadata_server(&self) -> Result<String, CredentialError> {
        let response = self
            .http
            .get(&self.config.metadata_token_url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.config.metadata_timeout)
            .send()
            .await?;

        read_token(response).await
    }
}

async fn read_token(response: reqwest::Response) -> Result<String, CredentialError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::Exchange {
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = response.json().await?;
    if token.access_token.is_empty() {
        return Err(CredentialError::EmptyToken);
    }
    Ok(token.access_token)
}
