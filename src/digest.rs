//! SHA-256 digest helpers and JSON persistence
//!
//! Registry digests are `sha256:<hex>` strings. Layer verification streams
//! files through the hasher instead of loading them into memory, since layers
//! can be multiple gigabytes.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{PullError, Result};

const HASH_BUFFER_SIZE: usize = 131072;

/// Strip the `sha256:` prefix from a digest, if present.
pub fn hex_part(digest: &str) -> &str {
    digest.strip_prefix("sha256:").unwrap_or(digest)
}

/// SHA-256 of a byte slice as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of a file's contents as lowercase hex, computed in 128 KiB reads.
pub fn file_sha256_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| PullError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let n = file.read(&mut buf).map_err(|e| PullError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Whether the file's SHA-256 equals `expected_hex` (lowercase hex compare).
pub fn file_digest_matches(path: &Path, expected_hex: &str) -> Result<bool> {
    Ok(file_sha256_hex(path)? == expected_hex)
}

/// Write `value` to `path` as pretty JSON with a trailing newline, creating
/// or truncating the file.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = File::create(path).map_err(|e| PullError::io(path, e))?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n").map_err(|e| PullError::io(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hex_part() {
        assert_eq!(hex_part("sha256:abcd"), "abcd");
        assert_eq!(hex_part("abcd"), "abcd");
    }

    #[test]
    fn test_file_sha256_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data");
        std::fs::write(&path, b"hello world").unwrap();

        assert_eq!(
            file_sha256_hex(&path).unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert!(
            file_digest_matches(
                &path,
                "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
            )
            .unwrap()
        );
        assert!(!file_digest_matches(&path, "0000").unwrap());
    }

    #[test]
    fn test_file_sha256_hex_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(file_sha256_hex(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_save_json_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        save_json(&path, &serde_json::json!({"a": 1})).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with('\n'));
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_save_json_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        std::fs::write(&path, "x".repeat(1024)).unwrap();
        save_json(&path, &serde_json::json!([])).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]\n");
    }
}
