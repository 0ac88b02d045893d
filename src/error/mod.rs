//! Error types for registry and archive operations

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PullError>;

/// All the ways a pull can fail.
///
/// `EmptyManifestList` is a recoverable sentinel: the orchestrator matches on
/// it and falls back to a bare-tag manifest fetch. Every other variant aborts
/// the pull of the current image.
#[derive(Error, Debug)]
pub enum PullError {
    /// Two consecutive 401/403 responses from the registry
    #[error("pull access denied, repository does not exist or may require login and password")]
    ImageNotFound,

    /// The manifest-list endpoint returned a single manifest or an
    /// unsupported schema version
    #[error("empty manifest list")]
    EmptyManifestList,

    /// Any response >= 400 outside the auth retry path
    #[error("status code [{status}]: error: \"{body}\"")]
    HttpStatus { status: u16, body: String },

    /// Malformed image reference or manifest JSON
    #[error("{0}")]
    Parse(String),

    /// Computed SHA-256 disagrees with the expected digest
    #[error("digest mismatch for {}: expected {expected}, got {actual}", .path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// File system failure, with the offending path
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tar extractor hit an entry type it does not support
    #[error("extract tar: unknown type {typeflag:#04x} in {name}")]
    UnknownTarEntry { typeflag: u8, name: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PullError {
    /// Wrap an IO error together with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        PullError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
