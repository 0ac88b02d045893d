//! Per-layer cache / resume / fetch / verify / decompress pipeline
//!
//! Each layer materializes as `<workspace>/<v1_id>/{VERSION, json,
//! layer.tar}`. A `layer.tar` only ever exists with content hashing to the
//! layer's diff ID; partial downloads live under the `.gz` suffix, so an
//! interrupted pull resumes from whatever made it to disk.

use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use crate::archive::gunzip;
use crate::digest::{file_digest_matches, file_sha256_hex, hex_part};
use crate::error::{PullError, Result};
use crate::image::spec::Descriptor;
use crate::image::v1::V1Image;
use crate::progress::ProgressSink;
use crate::registry::RegistryClient;

pub const LEGACY_VERSION_FILE: &str = "VERSION";
pub const LEGACY_CONFIG_FILE: &str = "json";
pub const LEGACY_LAYER_FILE: &str = "layer.tar";

/// Materialize one layer into `<dir>/<v1_id>/`, reusing cached or partial
/// downloads when their digests check out. `created` is stamped onto the
/// directory and all three files once the layer is complete.
pub async fn fetch_layer(
    client: &mut RegistryClient,
    dir: &Path,
    diff_id: &str,
    layer_desc: &Descriptor,
    legacy_image: &V1Image,
    created: SystemTime,
    bar: &dyn ProgressSink,
) -> Result<()> {
    let result = fetch_layer_inner(client, dir, diff_id, layer_desc, legacy_image, created, bar).await;
    bar.close();

    result
}

async fn fetch_layer_inner(
    client: &mut RegistryClient,
    dir: &Path,
    diff_id: &str,
    layer_desc: &Descriptor,
    legacy_image: &V1Image,
    created: SystemTime,
    bar: &dyn ProgressSink,
) -> Result<()> {
    let out_dir = dir.join(&legacy_image.id);
    fs::create_dir_all(&out_dir).map_err(|e| PullError::io(&out_dir, e))?;

    let version_path = out_dir.join(LEGACY_VERSION_FILE);
    fs::write(&version_path, b"1.0").map_err(|e| PullError::io(&version_path, e))?;

    let json_path = out_dir.join(LEGACY_CONFIG_FILE);
    fs::write(&json_path, serde_json::to_vec(legacy_image)?)
        .map_err(|e| PullError::io(&json_path, e))?;

    let layer_path = out_dir.join(LEGACY_LAYER_FILE);
    let gz_path = out_dir.join(format!("{}.gz", LEGACY_LAYER_FILE));
    let short_tag = short_digest(&layer_desc.digest);

    // cached, fully extracted layer
    if layer_path.exists() && file_digest_matches(&layer_path, hex_part(diff_id))? {
        bar.set_description(&format!("{}: Pull complete ", short_tag));
        bar.flush_line();

        return chtimes_layer(&out_dir, created);
    }

    // partial or complete compressed blob from an earlier run
    let mut resume_offset = 0;
    let mut need_fetch = true;
    if gz_path.exists() {
        if file_digest_matches(&gz_path, hex_part(&layer_desc.digest))? {
            need_fetch = false;
        } else {
            resume_offset = fs::metadata(&gz_path)
                .map_err(|e| PullError::io(&gz_path, e))?
                .len();
        }
    }

    if need_fetch {
        let media_type = if layer_desc.media_type.is_empty() {
            None
        } else {
            Some(layer_desc.media_type.as_str())
        };
        let mut response = client
            .blob(&layer_desc.digest, media_type, resume_offset)
            .await?;

        bar.set_total(response.content_length().unwrap_or(0));
        bar.set_description(&format!("{}: Downloading ", short_tag));

        let mut out = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&gz_path)
            .map_err(|e| PullError::io(&gz_path, e))?;

        while let Some(chunk) = response.chunk().await? {
            out.write_all(&chunk).map_err(|e| PullError::io(&gz_path, e))?;
            bar.record(&chunk);
        }
        drop(out);

        let actual = file_sha256_hex(&gz_path)?;
        if actual != hex_part(&layer_desc.digest) {
            return Err(PullError::DigestMismatch {
                path: gz_path,
                expected: layer_desc.digest.clone(),
                actual: format!("sha256:{}", actual),
            });
        }
    }

    gunzip_layer(&layer_path, &gz_path, &short_tag, bar)?;

    let actual = file_sha256_hex(&layer_path)?;
    if actual != hex_part(diff_id) {
        let mismatch = PullError::DigestMismatch {
            path: layer_path.clone(),
            expected: diff_id.to_string(),
            actual: format!("sha256:{}", actual),
        };
        // an untrusted layer.tar must not survive
        fs::remove_file(&layer_path).map_err(|e| PullError::io(&layer_path, e))?;
        return Err(mismatch);
    }

    bar.set_description(&format!("{}: Pull complete ", short_tag));
    bar.flush_line();

    chtimes_layer(&out_dir, created)
}

/// Decompress the downloaded blob into `layer.tar`, seeding the progress
/// total from the gzip ISIZE trailer, and drop the blob afterwards.
fn gunzip_layer(dst: &Path, src: &Path, tag: &str, bar: &dyn ProgressSink) -> Result<()> {
    let size = gunzip::decompressed_size(src)?;
    bar.set_total(size as u64);
    bar.set_description(&format!("{}: Extracting ", tag));
    bar.flush_line();

    gunzip::decompress(src, dst, &[bar])?;

    fs::remove_file(src).map_err(|e| PullError::io(src, e))
}

fn short_digest(digest: &str) -> String {
    let hex = hex_part(digest);
    hex[..hex.len().min(12)].to_string()
}

fn chtimes_layer(out_dir: &Path, created: SystemTime) -> Result<()> {
    chtimes(out_dir, created)?;
    for name in [LEGACY_VERSION_FILE, LEGACY_CONFIG_FILE, LEGACY_LAYER_FILE] {
        chtimes(&out_dir.join(name), created)?;
    }

    Ok(())
}

/// Set both access and modification time; works on files and directories.
pub fn chtimes(path: &Path, to: SystemTime) -> Result<()> {
    let times = FileTimes::new().set_accessed(to).set_modified(to);
    File::open(path)
        .and_then(|f| f.set_times(times))
        .map_err(|e| PullError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_digest() {
        assert_eq!(
            short_digest("sha256:0123456789abcdef0123456789abcdef"),
            "0123456789ab"
        );
        assert_eq!(short_digest("abc"), "abc");
    }

    #[test]
    fn test_chtimes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file");
        fs::write(&path, b"x").unwrap();

        let epoch = SystemTime::UNIX_EPOCH;
        chtimes(&path, epoch).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), epoch);

        chtimes(dir.path(), epoch).unwrap();
        assert_eq!(fs::metadata(dir.path()).unwrap().modified().unwrap(), epoch);
    }
}
