//! Pull orchestration: manifest traversal and workspace assembly
//!
//! Walks the manifest-list → manifest → config → layers DAG and rebuilds
//! the legacy per-layer directory layout `docker load` expects. Layers are
//! fetched sequentially in manifest order; the only state shared with the
//! copy loops is the progress sink.

pub mod layer;

use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::digest::{hex_part, save_json};
use crate::error::{PullError, Result};
use crate::image::reference::OFFICIAL_REPO_NAME;
use crate::image::v1::{chain_id, create_id};
use crate::image::{ImageConfig, ImageReference, ManifestItem, V1Image};
use crate::output::Logger;
use crate::progress::ProgressSink;
use crate::registry::RegistryClient;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const REPOSITORIES_FILE: &str = "repositories";

/// Pull configuration: platform selection, credentials, transport.
#[derive(Debug, Clone)]
pub struct Puller {
    pub arch: String,
    pub os: String,
    pub login: String,
    pub password: String,
    pub insecure: bool,
    pub logger: Logger,
}

impl Puller {
    /// Pull `image` into its workspace directory. On success the workspace
    /// holds the config JSON, one directory per layer, `manifest.json` and
    /// `repositories`, ready to be packaged with [`crate::archive::tar`].
    pub async fn pull(&self, image: &mut ImageReference, bar: &dyn ProgressSink) -> Result<()> {
        image.set_insecure(self.insecure);
        println!("{}: Pulling from {}", image.tag(), image.ns);

        let mut client = RegistryClient::new(image.clone(), self.logger.clone());
        client.set_credentials(&self.login, &self.password);

        let manifests = match client.manifest_list().await {
            Ok(list) => list.manifests,
            Err(PullError::EmptyManifestList) => Vec::new(),
            Err(e) => return Err(e),
        };

        // pick the first per-platform manifest matching the configured
        // platform; with no match the original tag stays in effect
        let mut image_os = self.os.clone();
        let mut manifest_tag = image.tag().to_string();
        for descriptor in &manifests {
            if descriptor.platform.architecture == self.arch && descriptor.platform.os == self.os {
                image_os = descriptor.platform.os.clone();
                manifest_tag = descriptor.digest.clone();
                break;
            }
        }

        let (manifest, content_digest) = client.manifest(&manifest_tag).await?;

        let tmp_dir = image.create_workspace()?;

        let config_response = client.blob(&manifest.config.digest, None, 0).await?;
        let config_bytes = config_response.bytes().await?;

        let config_file_name = format!("{}.json", hex_part(&manifest.config.digest));
        let config_path = tmp_dir.join(&config_file_name);
        std::fs::write(&config_path, &config_bytes).map_err(|e| PullError::io(&config_path, e))?;

        let config: ImageConfig = serde_json::from_slice(&config_bytes)?;
        let created: SystemTime = config.v1.created.into();
        layer::chtimes(&config_path, created)?;

        if manifest.layers.len() < config.rootfs.diff_ids.len() {
            return Err(PullError::Parse(format!(
                "manifest has {} layers but config lists {} diff ids",
                manifest.layers.len(),
                config.rootfs.diff_ids.len()
            )));
        }

        // the public repo name drops the implicit library/ namespace
        let official_prefix = format!("{}/", OFFICIAL_REPO_NAME);
        let image_repo = if image.registry_host.is_none() && image.ns.starts_with(&official_prefix)
        {
            image.ns.replacen(&official_prefix, "", 1)
        } else {
            image.ns.clone()
        };

        let mut manifest_item = ManifestItem {
            config: config_file_name,
            repo_tags: vec![format!("{}:{}", image_repo, image.tag())],
            layers: Vec::new(),
        };

        let last = config.rootfs.diff_ids.len().saturating_sub(1);
        let mut parent_id = String::new();
        let mut chain: Option<String> = None;

        for (i, diff_id) in config.rootfs.diff_ids.iter().enumerate() {
            // intermediate layers get a zero v1 image (created at the
            // epoch); the topmost one carries the image's own v1 body
            let mut legacy_image = if i == last {
                config.v1.clone()
            } else {
                V1Image::default()
            };

            chain = Some(chain_id(chain.as_deref(), diff_id));
            let v1_id = create_id(&legacy_image, chain.as_deref().unwrap_or(diff_id), &parent_id)?;

            if !parent_id.is_empty() {
                legacy_image.parent = parent_id.clone();
            }
            parent_id = v1_id.clone();
            legacy_image.id = v1_id;
            legacy_image.os = image_os.clone();

            manifest_item
                .layers
                .push(format!("{}/{}", legacy_image.id, layer::LEGACY_LAYER_FILE));

            layer::fetch_layer(
                &mut client,
                &tmp_dir,
                diff_id,
                &manifest.layers[i],
                &legacy_image,
                created,
                bar,
            )
            .await?;
        }

        let manifest_path = tmp_dir.join(MANIFEST_FILE);
        save_json(&manifest_path, &vec![manifest_item])?;

        let mut tags = BTreeMap::new();
        tags.insert(image.tag().to_string(), parent_id);
        let mut repositories = BTreeMap::new();
        repositories.insert(image_repo, tags);

        let repositories_path = tmp_dir.join(REPOSITORIES_FILE);
        save_json(&repositories_path, &repositories)?;

        // epoch mtimes keep repeated pulls byte-identical after packaging
        layer::chtimes(&manifest_path, SystemTime::UNIX_EPOCH)?;
        layer::chtimes(&repositories_path, SystemTime::UNIX_EPOCH)?;

        println!("Digest: {}", content_digest);

        Ok(())
    }
}
