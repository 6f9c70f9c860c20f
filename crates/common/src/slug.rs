//! Human-readable, time-salted deployment slugs
//!
//! A slug is `<base>-<suffix>`: the base is the project name normalized to
//! `[a-z0-9-]` and capped at 30 characters, the suffix is the first six hex
//! characters of `SHA-256(owner_id + project_name + unix_millis)`.
//!
//! Slugs are collision-resistant, not unique. Two calls in the same
//! millisecond with the same inputs produce the same slug.

use chrono::Utc;
use sha2::{Digest, Sha256};

/// Maximum length of the normalized project-name part
pub const MAX_BASE_LEN: usize = 30;

/// Hex characters kept from the digest
pub const SUFFIX_LEN: usize = 6;

/// Base used when the project name has no usable characters
const EMPTY_BASE: &str = "deploy";

/// Generate a slug salted with the current time
pub fn generate_slug(project_name: &str, owner_id: &str) -> String {
    generate_slug_at(project_name, owner_id, Utc::now().timestamp_millis())
}

/// Generate a slug for an explicit timestamp in milliseconds
pub fn generate_slug_at(project_name: &str, owner_id: &str, unix_millis: i64) -> String {
    format!(
        "{}-{}",
        slug_base(project_name),
        slug_suffix(project_name, owner_id, unix_millis)
    )
}

/// Normalize a project name into the slug base
pub fn slug_base(project_name: &str) -> String {
    let mut base = String::with_capacity(project_name.len());
    for c in project_name.to_lowercase().chars() {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && base.ends_with('-') {
            continue;
        }
        base.push(c);
    }

    // Only ASCII remains, so byte truncation is safe
    let mut base: String = base.trim_matches('-').to_string();
    base.truncate(MAX_BASE_LEN);
    let base = base.trim_end_matches('-');

    if base.is_empty() {
        EMPTY_BASE.to_string()
    } else {
        base.to_string()
    }
}

fn slug_suffix(project_name: &str, owner_id: &str, unix_millis: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(owner_id.as_bytes());
    hasher.update(project_name.as_bytes());
    hasher.update(unix_millis.to_string().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..SUFFIX_LEN].to_string()
}
