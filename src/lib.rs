//! docker-pull
//!
//! `docker-pull` downloads a container image from an OCI/Docker Registry v2
//! endpoint and materializes it on disk as a `docker save`-compatible tar
//! archive, without a container runtime or daemon anywhere in the loop.
//!
//! ## Features
//! - **Daemonless pulls**: bearer-token authentication against the realm the
//!   registry advertises, with transparent re-auth on 401/403.
//! - **Resumable downloads**: interrupted layer blobs continue with HTTP
//!   Range requests; completed layers are verified and reused.
//! - **Two-stage verification**: compressed blobs check against the manifest
//!   digest, decompressed layers against the config's diff IDs.
//! - **docker-load compatible output**: the legacy per-layer directory
//!   layout with deterministic, owner-cleared tar packaging.
//!
//! ## Main Modules
//! - [`cli`] - Command-line interface and the per-image run loop.
//! - [`image`] - Reference parsing, wire formats, legacy v1 layout.
//! - [`registry`] - Registry client and bearer-token authentication.
//! - [`puller`] - Pull orchestration and the per-layer pipeline.
//! - [`archive`] - Gzip decompression and tar packaging.
//! - [`progress`] - Terminal progress reporting.
//! - [`digest`] - Digest calculation and JSON persistence helpers.
//! - [`error`] - Error types.
//!
//! ## Example Usage
//!
//! ```sh
//! docker-pull alpine:3.18
//! docker load -i library_alpine_3.18.tar
//! ```

pub mod archive;
pub mod cli;
pub mod digest;
pub mod error;
pub mod image;
pub mod output;
pub mod progress;
pub mod puller;
pub mod registry;

pub use error::{PullError, Result};
pub use image::ImageReference;
pub use puller::Puller;
