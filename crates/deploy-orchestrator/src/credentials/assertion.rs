//! Signed assertions for the JWT-bearer token exchange
//!
//! A fresh assertion is minted for every exchange: RS256 over
//! `base64url(header).base64url(claims)`, valid for one hour from the
//! moment it was minted.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::CredentialError;

/// Validity window of a minted assertion
pub const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Structured service-account credential
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Identity the assertion is issued for
    pub client_email: String,

    /// PEM-encoded RSA private key
    pub private_key: String,

    #[serde(default)]
    pub private_key_id: Option<String>,
}

impl ServiceAccountKey {
    /// Decode base64-encoded key JSON
    pub fn from_base64(encoded: &str) -> Result<Self, CredentialError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CredentialError::KeyDecode(e.to_string()))?;
        Self::from_json(&bytes)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, CredentialError> {
        let key: ServiceAccountKey =
            serde_json::from_slice(bytes).map_err(|e| CredentialError::KeyDecode(e.to_string()))?;

        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(CredentialError::KeyDecode(
                "client_email and private_key are required".to_string(),
            ));
        }

        Ok(key)
    }
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Claims carried by the assertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub scope: String,
    pub iat: i64,
    pub exp: i64,
}

/// Compact `header.claims.signature` serialization
#[derive(Clone, PartialEq, Eq)]
pub struct SignedAssertion(String);

impl SignedAssertion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SignedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignedAssertion(<redacted>)")
    }
}

/// Builds and signs assertions for a fixed audience and scope
#[derive(Debug, Clone)]
pub struct AssertionMinter {
    audience: String,
    scope: String,
}

impl AssertionMinter {
    pub fn new(audience: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
            scope: scope.into(),
        }
    }

    /// Mint an assertion issued now
    pub fn mint(&self, identity: &str, signing_key_pem: &str) -> Result<SignedAssertion, CredentialError> {
        self.mint_at(identity, signing_key_pem, Utc::now().timestamp())
    }

    /// Mint an assertion with an explicit issued-at (unix seconds).
    /// Identical inputs produce identical assertions.
    pub fn mint_at(
        &self,
        identity: &str,
        signing_key_pem: &str,
        issued_at: i64,
    ) -> Result<SignedAssertion, CredentialError> {
        let claims = AssertionClaims {
            iss: identity.to_string(),
            sub: identity.to_string(),
            aud: self.audience.clone(),
            scope: self.scope.clone(),
            iat: issued_at,
            exp: issued_at + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(signing_key_pem.as_bytes())
            .map_err(|e| CredentialError::Signing(e.to_string()))?;

        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| CredentialError::Signing(e.to_string()))?;

        Ok(SignedAssertion(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use jsonwebtoken::{DecodingKey, Validation};

    const PRIVATE_KEY: &str = include_str!("../../tests/fixtures/test_rsa_private.pem");
    const PUBLIC_KEY: &str = include_str!("../../tests/fixtures/test_rsa_public.pem");
    const AUDIENCE: &str = "https://oauth2.googleapis.com/token";
    const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
    const IDENTITY: &str = "deployer@demo-project.iam.gserviceaccount.com";

    #[test]
    fn test_mint_is_verifiable() {
        let minter = AssertionMinter::new(AUDIENCE, SCOPE);
        let assertion = minter.mint(IDENTITY, PRIVATE_KEY).unwrap();

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[AUDIENCE]);
        validation.set_issuer(&[IDENTITY]);

        let decoded = jsonwebtoken::decode::<AssertionClaims>(
            assertion.as_str(),
            &DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap();

        let claims = decoded.claims;
        assert_eq!(claims.iss, IDENTITY);
        assert_eq!(claims.sub, IDENTITY);
        assert_eq!(claims.aud, AUDIENCE);
        assert_eq!(claims.scope, SCOPE);
        assert_eq!(claims.exp - claims.iat, ASSERTION_LIFETIME_SECS);
    }

    #[test]
    fn test_compact_serialization() {
        let minter = AssertionMinter::new(AUDIENCE, SCOPE);
        let assertion = minter.mint_at(IDENTITY, PRIVATE_KEY, 1_700_000_000).unwrap();

        let parts: Vec<&str> = assertion.as_str().split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");

        let claims: AssertionClaims =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims.iat, 1_700_000_000);
        assert_eq!(claims.exp, 1_700_003_600);
    }

    #[test]
    fn test_deterministic_for_same_timestamp() {
        let minter = AssertionMinter::new(AUDIENCE, SCOPE);
        let a = minter.mint_at(IDENTITY, PRIVATE_KEY, 1_700_000_000).unwrap();
        let b = minter.mint_at(IDENTITY, PRIVATE_KEY, 1_700_000_000).unwrap();
        let c = minter.mint_at(IDENTITY, PRIVATE_KEY, 1_700_000_001).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_key() {
        let minter = AssertionMinter::new(AUDIENCE, SCOPE);
        let err = minter.mint(IDENTITY, "not a pem").unwrap_err();
        assert!(matches!(err, CredentialError::Signing(_)));
    }

    #[test]
    fn test_service_account_key_from_base64() {
        let json = serde_json::json!({
            "type": "service_account",
            "client_email": IDENTITY,
            "private_key": PRIVATE_KEY,
            "private_key_id": "abc123"
        });
        let encoded = STANDARD.encode(json.to_string());

        let key = ServiceAccountKey::from_base64(&encoded).unwrap();
        assert_eq!(key.client_email, IDENTITY);
        assert_eq!(key.private_key_id.as_deref(), Some("abc123"));
        assert!(!format!("{:?}", key).contains("PRIVATE KEY"));
    }

    #[test]
    fn test_service_account_key_rejects_garbage() {
        assert!(ServiceAccountKey::from_base64("%%%").is_err());

        let missing = STANDARD.encode(r#"{"client_email": "a@b"}"#);
        assert!(ServiceAccountKey::from_base64(&missing).is_err());
    }
}
