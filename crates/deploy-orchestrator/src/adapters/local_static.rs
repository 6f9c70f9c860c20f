//! Local static serving behind a reverse proxy
//!
//! Layout on disk:
//!
//! ```text
//! <static_root>/<slug>/...        published files (+ synthesized index.html)
//! <vhost_dir>/<slug>.conf         one server block per deployment
//! ```
//!
//! Files are written into a hidden staging directory first and moved into
//! place with a rename, so a redeploy never serves a half-written tree.

use async_trait::async_trait;
use launchpad_common::{BackendKind, DeployOutcome, DeploymentRequest, Result, TargetAdapter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{public_url, require_files, FileSet};
use crate::config::LocalStaticConfig;

pub struct LocalStaticAdapter {
    config: LocalStaticConfig,
}

impl LocalStaticAdapter {
    pub fn new(config: LocalStaticConfig) -> Self {
        Self { config }
    }

    pub fn site_dir(&self, slug: &str) -> PathBuf {
        self.config.static_root.join(slug)
    }

    pub fn vhost_path(&self, slug: &str) -> PathBuf {
        self.config.vhost_dir.join(format!("{}.conf", slug))
    }

    fn host_name(&self, slug: &str) -> String {
        format!("{}.{}", slug, self.config.domain)
    }

    async fn write_tree(&self, staging: &Path, files: &FileSet<'_>) -> Result<()> {
        fs::create_dir_all(staging).await?;

        for (path, content) in files {
            let target = staging.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&target, content).await?;
            debug!("Wrote {}", target.display());
        }

        if !has_index(files) {
            fs::write(staging.join("index.html"), directory_listing(files)).await?;
        }

        Ok(())
    }

    fn vhost_config(&self, slug: &str, custom_domain: Option<&str>) -> String {
        let mut server_names = self.host_name(slug);
        if let Some(domain) = custom_domain.map(str::trim).filter(|d| !d.is_empty()) {
            server_names.push(' ');
            server_names.push_str(domain);
        }

        format!(
            "# Generated for deployment {slug}\n\
             server {{\n    \
                 listen 80;\n    \
                 server_name {names};\n    \
                 root {root};\n    \
                 index index.html;\n\n    \
                 location / {{\n        \
                     try_files $uri $uri/ =404;\n    \
                 }}\n\
             }}\n",
            slug = slug,
            names = server_names,
            root = self.site_dir(slug).display(),
        )
    }
}

fn has_index(files: &FileSet<'_>) -> bool {
    files.contains_key("index.html")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Minimal index page linking every published file
fn directory_listing(files: &FileSet<'_>) -> String {
    let entries: String = files
        .keys()
        .map(|path| {
            let path = escape_html(path);
            format!("    <li><a href=\"{0}\">{0}</a></li>\n", path)
        })
        .collect();

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Files</title></head>\n\
         <body>\n<ul>\n{}</ul>\n</body>\n</html>\n",
        entries
    )
}

/// Swap `staging` in as `site_dir`. On failure the staging tree is removed
/// so nothing hidden accumulates under the static root.
async fn promote(staging: &Path, site_dir: &Path) -> std::io::Result<()> {
    let result = async {
        if remove_if_present(site_dir, true).await? {
            debug!("Replaced previous tree at {}", site_dir.display());
        }
        fs::rename(staging, site_dir).await
    }
    .await;

    if result.is_err() {
        if let Err(cleanup) = remove_if_present(staging, true).await {
            warn!("Failed to clean up {}: {}", staging.display(), cleanup);
        }
    }
    result
}

async fn remove_if_present(path: &Path, is_dir: bool) -> std::io::Result<bool> {
    let result = if is_dir {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl TargetAdapter for LocalStaticAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::LocalStaticServe
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn deploy(&self, slug: &str, request: &DeploymentRequest) -> Result<DeployOutcome> {
        let files = require_files(BackendKind::LocalStaticServe, request)?;

        fs::create_dir_all(&self.config.static_root).await?;
        let staging = self
            .config
            .static_root
            .join(format!(".{}.staging-{}", slug, Uuid::new_v4()));

        if let Err(e) = self.write_tree(&staging, &files).await {
            if let Err(cleanup) = remove_if_present(&staging, true).await {
                warn!("Failed to clean up {}: {}", staging.display(), cleanup);
            }
            return Err(e);
        }

        let site_dir = self.site_dir(slug);
        promote(&staging, &site_dir).await?;

        fs::create_dir_all(&self.config.vhost_dir).await?;
        fs::write(
            self.vhost_path(slug),
            self.vhost_config(slug, request.custom_domain.as_deref()),
        )
        .await?;

        let url = public_url(request, format!("https://{}", self.host_name(slug)));
        info!("Serving {} from {} at {}", slug, site_dir.display(), url);

        Ok(DeployOutcome::new(url, files.len()))
    }

    async fn remove(&self, slug: &str) -> Result<()> {
        let removed_dir = remove_if_present(&self.site_dir(slug), true).await?;
        let removed_conf = remove_if_present(&self.vhost_path(slug), false).await?;

        if removed_dir || removed_conf {
            info!("Removed local deployment {}", slug);
        } else {
            debug!("Local deployment {} was already absent", slug);
        }
        Ok(())
    }
}
