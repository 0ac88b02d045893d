//! Registry wire formats and docker-save output shapes
//!
//! Everything here deserializes leniently: fields the pull does not consume
//! are ignored, and the manifest-list shape defaults to an empty list so a
//! registry answering with a single manifest decodes cleanly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::v1::V1Image;

pub const MEDIA_TYPE_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const MEDIA_TYPE_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";

/// Multi-platform manifest index.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestList {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
}

/// One per-platform entry of a manifest list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    pub digest: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub platform: Platform,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
}

/// Image manifest, schema 2.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: u32,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

/// Content descriptor: a digest-addressed blob.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub digest: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
}

/// Image configuration blob. The legacy v1 fields flatten into [`V1Image`];
/// `rootfs.diff_ids` drives the layer loop.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(flatten)]
    pub v1: V1Image,
    pub rootfs: RootFs,
    #[serde(default)]
    pub history: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type", default)]
    pub fs_type: String,
    #[serde(default)]
    pub diff_ids: Vec<String>,
}

/// One element of the output `manifest.json` array.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestItem {
    #[serde(rename = "Config")]
    pub config: String,
    #[serde(rename = "RepoTags")]
    pub repo_tags: Vec<String>,
    #[serde(rename = "Layers")]
    pub layers: Vec<String>,
}
