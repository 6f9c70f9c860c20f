//! Hosting backend adapters
//!
//! Compute-dispatch class: [`JobAdapter`], [`ServiceAdapter`].
//! Publish class: [`EdgeCdnAdapter`], [`ObjectStoreAdapter`],
//! [`LocalStaticAdapter`].

pub mod edge_cdn;
pub mod job;
pub mod local_static;
pub mod mime;
pub mod object_store;
pub mod service;

pub use edge_cdn::EdgeCdnAdapter;
pub use job::JobAdapter;
pub use local_static::LocalStaticAdapter;
pub use object_store::ObjectStoreAdapter;
pub use service::ServiceAdapter;

use launchpad_common::{
    AdapterError, BackendKind, DeploymentRequest, RequestClass, Result, TaskDescriptor,
};
use std::collections::BTreeMap;
use std::path::{Component, Path};

/// Map a reqwest failure onto the adapter taxonomy
pub(crate) fn http_error(err: reqwest::Error) -> AdapterError {
    if err.is_timeout() {
        AdapterError::Timeout(err.to_string())
    } else {
        AdapterError::Transport(err.to_string())
    }
}

/// Turn a non-success response into a rejection carrying the body
pub(crate) async fn rejection(response: reqwest::Response) -> AdapterError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    AdapterError::Rejected { status, body }
}

/// Artifact files keyed by normalized relative path
pub(crate) type FileSet<'a> = BTreeMap<String, &'a str>;

/// The request's files with every path normalized and checked. Two keys
/// that normalize to the same path are rejected.
pub(crate) fn require_files(
    backend: BackendKind,
    request: &DeploymentRequest,
) -> Result<FileSet<'_>> {
    let files = request
        .files()
        .ok_or(AdapterError::UnsupportedArtifact {
            backend,
            class: RequestClass::ComputeDispatch,
        })?;

    let mut normalized = FileSet::new();
    for (path, content) in files {
        let key = normalize_relative_path(path)?;
        if normalized.insert(key, content.as_str()).is_some() {
            return Err(AdapterError::InvalidPath(format!(
                "duplicate path: {}",
                path
            )));
        }
    }
    Ok(normalized)
}

pub(crate) fn require_task(
    backend: BackendKind,
    request: &DeploymentRequest,
) -> Result<&TaskDescriptor> {
    request.task().ok_or(AdapterError::UnsupportedArtifact {
        backend,
        class: RequestClass::Publish,
    })
}

/// Artifact paths must stay inside the deployment root. Returns the path
/// as `/`-joined normal components (`./a//b.html` becomes `a/b.html`).
pub(crate) fn normalize_relative_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(AdapterError::InvalidPath(path.to_string())),
        }
    }

    if parts.is_empty() {
        return Err(AdapterError::InvalidPath(format!("empty path: '{}'", path)));
    }
    Ok(parts.join("/"))
}

/// `https://<custom>` when the caller supplied a domain, otherwise the fallback
pub(crate) fn public_url(request: &DeploymentRequest, fallback: String) -> String {
    match request.custom_domain.as_deref().map(str::trim) {
        Some(domain) if !domain.is_empty() => format!("https://{}", domain),
        _ => fallback,
    }
}
