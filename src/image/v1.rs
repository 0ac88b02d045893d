//! Legacy v1 image records and identifier derivation
//!
//! `docker load` expects one directory per layer named by a synthetic v1 ID.
//! The ID chain is deterministic: each layer's chain ID accumulates the diff
//! IDs seen so far, and the v1 ID hashes the layer's v1 JSON (without its own
//! `id`) together with the chain ID and the parent's ID.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// The per-layer `json` record of the legacy image layout.
///
/// Empty fields stay off the wire; only `created` is always serialized. The
/// opaque `config`/`container_config` bodies are carried as raw JSON since
/// the pull never interprets them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct V1Image {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    #[serde(default)]
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_config: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub docker_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub variant: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub os: String,
}

/// Chain ID for the next layer: the diff ID itself for the first layer,
/// otherwise SHA-256 over `"<parent_chain> <diff_id>"` in digest form.
pub fn chain_id(parent_chain: Option<&str>, diff_id: &str) -> String {
    match parent_chain {
        None => diff_id.to_string(),
        Some(parent) => format!(
            "sha256:{}",
            hex::encode(Sha256::digest(format!("{} {}", parent, diff_id)))
        ),
    }
}

/// Synthesize the layer's v1 ID (lowercase hex, no prefix).
///
/// The hashed byte stream is the layer's v1 JSON with `id` cleared, a space,
/// the chain ID, a space, and the parent's hex ID (empty for the root).
pub fn create_id(image: &V1Image, chain_id: &str, parent_id: &str) -> Result<String> {
    let mut scratch = image.clone();
    scratch.id = String::new();

    let mut bytes = serde_json::to_vec(&scratch)?;
    bytes.push(b' ');
    bytes.extend_from_slice(chain_id.as_bytes());
    bytes.push(b' ');
    bytes.extend_from_slice(parent_id.as_bytes());

    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_root_is_diff_id() {
        assert_eq!(chain_id(None, "sha256:aaaa"), "sha256:aaaa");
    }

    #[test]
    fn test_chain_id_accumulates() {
        let chained = chain_id(Some("sha256:aaaa"), "sha256:bbbb");
        let expected = format!(
            "sha256:{}",
            hex::encode(Sha256::digest(b"sha256:aaaa sha256:bbbb"))
        );
        assert_eq!(chained, expected);
        // order matters
        assert_ne!(chained, chain_id(Some("sha256:bbbb"), "sha256:aaaa"));
    }

    #[test]
    fn test_create_id_deterministic() {
        let image = V1Image {
            os: "linux".to_string(),
            ..Default::default()
        };

        let first = create_id(&image, "sha256:aaaa", "").unwrap();
        let second = create_id(&image, "sha256:aaaa", "").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_create_id_ignores_own_id() {
        let mut image = V1Image::default();
        let bare = create_id(&image, "sha256:aaaa", "").unwrap();

        image.id = "f".repeat(64);
        assert_eq!(create_id(&image, "sha256:aaaa", "").unwrap(), bare);
    }

    #[test]
    fn test_create_id_varies_with_inputs() {
        let image = V1Image::default();
        let root = create_id(&image, "sha256:aaaa", "").unwrap();

        assert_ne!(create_id(&image, "sha256:bbbb", "").unwrap(), root);
        assert_ne!(create_id(&image, "sha256:aaaa", &root).unwrap(), root);

        let mut other = image.clone();
        other.os = "linux".to_string();
        assert_ne!(create_id(&other, "sha256:aaaa", "").unwrap(), root);
    }

    #[test]
    fn test_v1_image_serialization_shape() {
        let image = V1Image {
            id: "aa".repeat(32),
            os: "linux".to_string(),
            ..Default::default()
        };

        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["id"], serde_json::json!("aa".repeat(32)));
        assert_eq!(value["os"], "linux");
        // empty fields are omitted, created never is
        assert!(value.get("parent").is_none());
        assert!(value.get("config").is_none());
        assert_eq!(value["created"], "1970-01-01T00:00:00Z");
    }
}
