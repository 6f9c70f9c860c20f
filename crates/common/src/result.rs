//! Outcome of a fallback dispatch

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use crate::record::BackendKind;

/// Which backend won, or the local-fallback sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendTag {
    Adapter(BackendKind),
    /// No orchestrated backend succeeded; the caller must execute locally
    LocalFallback,
}

impl BackendTag {
    pub const LOCAL_FALLBACK: &'static str = "local-fallback";

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendTag::Adapter(kind) => kind.as_str(),
            BackendTag::LocalFallback => Self::LOCAL_FALLBACK,
        }
    }

    pub fn kind(&self) -> Option<BackendKind> {
        match self {
            BackendTag::Adapter(kind) => Some(*kind),
            BackendTag::LocalFallback => None,
        }
    }
}

impl fmt::Display for BackendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for BackendTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BackendTag {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        if tag == Self::LOCAL_FALLBACK {
            return Ok(BackendTag::LocalFallback);
        }
        let kind = serde_json::from_value::<BackendKind>(serde_json::Value::String(tag))
            .map_err(serde::de::Error::custom)?;
        Ok(BackendTag::Adapter(kind))
    }
}

/// One adapter that was attempted and failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub backend: BackendKind,
    pub error: String,
}

/// Structured result handed back to the caller; never a pending state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub backend: BackendTag,

    pub slug: String,

    /// Empty for the local-fallback sentinel
    pub url: String,

    pub resource_count: usize,

    /// Set once the registry has recorded the deployment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<Uuid>,

    /// Execution identifier for batch jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,

    /// Response body passed through from interactive dispatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Terminal error for local-fallback results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Adapters attempted before the outcome, in order
    #[serde(default)]
    pub attempts: Vec<AttemptFailure>,

    /// Adapters skipped for missing configuration
    #[serde(default)]
    pub skipped: Vec<BackendKind>,
}

impl DeploymentResult {
    pub fn is_deployed(&self) -> bool {
        matches!(self.backend, BackendTag::Adapter(_))
    }

    pub fn is_local_fallback(&self) -> bool {
        self.backend == BackendTag::LocalFallback
    }

    /// Error of the last failed attempt, if any
    pub fn last_attempt_error(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.error.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_tag_serializes_as_string() {
        let tag = BackendTag::Adapter(BackendKind::EdgeCdn);
        assert_eq!(serde_json::to_value(tag).unwrap(), "EdgeCDN");
        assert_eq!(
            serde_json::to_value(BackendTag::LocalFallback).unwrap(),
            "local-fallback"
        );
    }

    #[test]
    fn test_backend_tag_parses() {
        let tag: BackendTag = serde_json::from_str("\"local-fallback\"").unwrap();
        assert_eq!(tag, BackendTag::LocalFallback);

        let tag: BackendTag = serde_json::from_str("\"Job\"").unwrap();
        assert_eq!(tag.kind(), Some(BackendKind::Job));

        assert!(serde_json::from_str::<BackendTag>("\"Mainframe\"").is_err());
    }
}
