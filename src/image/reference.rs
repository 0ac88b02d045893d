//! Image reference parsing and registry URL construction
//!
//! A reference looks like `[host[:port]/][ns/]name[:tag|@digest]`. The
//! leading component is treated as a registry host iff it contains a `.` or
//! `:`; anything else is part of the namespace. Bare names (`alpine`) are
//! namespaced under `library/`, matching the registry's official images.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{PullError, Result};

pub const DEFAULT_REGISTRY_HOST: &str = "registry-1.docker.io";
pub const OFFICIAL_REPO_NAME: &str = "library";
pub const DEFAULT_TAG: &str = "latest";

/// A parsed image reference plus the workspace it pulls into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Explicit registry host (with optional port); `None` means the default
    /// public registry.
    pub registry_host: Option<String>,
    /// Use plain HTTP when talking to the registry.
    pub insecure: bool,
    /// Repository namespace, e.g. `library/alpine`.
    pub ns: String,
    /// Tag, or full `<algo>:<hex>` digest for `@` references.
    pub tag: String,
    temp_dir: Option<PathBuf>,
}

impl ImageReference {
    /// Parse a free-form reference string.
    ///
    /// Fails when the tail component carries more than one `@`/`:` separator
    /// or the image name is empty.
    pub fn parse(image: &str) -> Result<Self> {
        let invalid = || PullError::Parse(format!("image format name {} image is invalid", image));

        let components: Vec<&str> = image.split('/').collect();
        let (registry_host, mut ns_parts): (Option<String>, Vec<&str>) = if components.len() == 1 {
            (None, vec![OFFICIAL_REPO_NAME])
        } else if components[0].contains('.') || components[0].contains(':') {
            (
                Some(components[0].to_string()),
                components[1..components.len() - 1].to_vec(),
            )
        } else {
            (None, components[..components.len() - 1].to_vec())
        };

        let last = components[components.len() - 1];
        let name_tag: Vec<&str> = if last.contains('@') {
            last.split('@').collect()
        } else {
            last.split(':').collect()
        };

        if name_tag[0].is_empty() {
            return Err(invalid());
        }
        ns_parts.push(name_tag[0]);

        let tag = match name_tag.len() {
            1 => DEFAULT_TAG.to_string(),
            2 => name_tag[1].to_string(),
            _ => return Err(invalid()),
        };

        Ok(Self {
            registry_host,
            insecure: false,
            ns: ns_parts.join("/"),
            tag,
            temp_dir: None,
        })
    }

    /// Toggle plain-HTTP access to the registry.
    pub fn set_insecure(&mut self, insecure: bool) {
        self.insecure = insecure;
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Registry URL for `/v2/<ns>/<paths...>`.
    pub fn url(&self, paths: &[&str]) -> String {
        let scheme = if self.insecure { "http" } else { "https" };
        let host = self
            .registry_host
            .as_deref()
            .unwrap_or(DEFAULT_REGISTRY_HOST);

        let mut url = format!("{}://{}/v2/{}", scheme, host, self.ns);
        for p in paths {
            url.push('/');
            url.push_str(p);
        }

        url
    }

    pub fn manifest_url(&self, tag: &str) -> String {
        self.url(&["manifests", tag])
    }

    pub fn blob_url(&self, digest: &str) -> String {
        self.url(&["blobs", digest])
    }

    fn flat_name(&self) -> String {
        format!(
            "{}_{}",
            self.ns.replace('/', "_"),
            self.tag.replace('-', "_")
        )
    }

    /// File name of the final archive, `<ns_flat>_<tag_flat>.tar`.
    pub fn output_file_name(&self) -> String {
        format!("{}.tar", self.flat_name())
    }

    /// Workspace directory name, `<ns_flat>_<tag_flat>.tmp`.
    pub fn workspace_name(&self) -> String {
        format!("{}.tmp", self.flat_name())
    }

    /// Create the workspace directory and remember it for later
    /// packaging/cleanup.
    pub fn create_workspace(&mut self) -> Result<PathBuf> {
        let dir = PathBuf::from(self.workspace_name());
        std::fs::create_dir_all(&dir).map_err(|e| PullError::io(&dir, e))?;
        self.temp_dir = Some(dir.clone());

        Ok(dir)
    }

    /// The workspace directory, once `create_workspace` has run.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }
}

impl FromStr for ImageReference {
    type Err = PullError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(host) = &self.registry_host {
            write!(f, "{}/", host)?;
        }
        // digest references render with '@' so that re-parsing round-trips
        let sep = if self.tag.contains(':') { '@' } else { ':' };
        write!(f, "{}{}{}", self.ns, sep, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference(host: Option<&str>, ns: &str, tag: &str) -> ImageReference {
        ImageReference {
            registry_host: host.map(str::to_string),
            insecure: false,
            ns: ns.to_string(),
            tag: tag.to_string(),
            temp_dir: None,
        }
    }

    #[test]
    fn test_parse() {
        let cases = [
            ("alpine", reference(None, "library/alpine", "latest")),
            ("alpine:1.13", reference(None, "library/alpine", "1.13")),
            (
                "alpine@sha256:abcdefgh",
                reference(None, "library/alpine", "sha256:abcdefgh"),
            ),
            ("ns/alpine", reference(None, "ns/alpine", "latest")),
            ("ns/alpine:1.13", reference(None, "ns/alpine", "1.13")),
            (
                "ns/alpine@sha256:abcdefgh",
                reference(None, "ns/alpine", "sha256:abcdefgh"),
            ),
            (
                "private.registry/alpine",
                reference(Some("private.registry"), "alpine", "latest"),
            ),
            (
                "private.registry/ns/alpine",
                reference(Some("private.registry"), "ns/alpine", "latest"),
            ),
            (
                "private.registry/ns/alpine:1.13",
                reference(Some("private.registry"), "ns/alpine", "1.13"),
            ),
            (
                "private.registry/ns/alpine@sha256:abcdefgh",
                reference(Some("private.registry"), "ns/alpine", "sha256:abcdefgh"),
            ),
            (
                "private.registry:8443/alpine",
                reference(Some("private.registry:8443"), "alpine", "latest"),
            ),
            (
                "private.registry:8443/ns/alpine",
                reference(Some("private.registry:8443"), "ns/alpine", "latest"),
            ),
            (
                "private.registry:8443/ns/alpine:1.13",
                reference(Some("private.registry:8443"), "ns/alpine", "1.13"),
            ),
            (
                "private.registry:8443/ns/alpine@sha256:abcdefgh",
                reference(
                    Some("private.registry:8443"),
                    "ns/alpine",
                    "sha256:abcdefgh",
                ),
            ),
        ];

        for (input, want) in cases {
            let got = ImageReference::parse(input).unwrap();
            assert_eq!(got, want, "parsing {:?}", input);
        }
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ImageReference::parse("alpine:1.13:extra").is_err());
        assert!(ImageReference::parse("alpine@sha@extra").is_err());
        assert!(ImageReference::parse(":1.13").is_err());
        assert!(ImageReference::parse("ns/:latest").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for input in [
            "alpine",
            "alpine:1.13",
            "ns/alpine:1.13",
            "private.registry:8443/ns/alpine:1.13",
            "private.registry:8443/ns/alpine@sha256:abcdefgh",
        ] {
            let first = ImageReference::parse(input).unwrap();
            let second = ImageReference::parse(&first.to_string()).unwrap();
            assert_eq!(first, second, "round-tripping {:?}", input);
        }
    }

    #[test]
    fn test_urls() {
        let reference = ImageReference::parse("alpine").unwrap();
        assert_eq!(
            reference.manifest_url("latest"),
            "https://registry-1.docker.io/v2/library/alpine/manifests/latest"
        );

        let mut reference = ImageReference::parse("myreg.local:5000/foo/bar:v1").unwrap();
        reference.set_insecure(true);
        assert_eq!(
            reference.blob_url("sha256:abcd"),
            "http://myreg.local:5000/v2/foo/bar/blobs/sha256:abcd"
        );
    }

    #[test]
    fn test_output_names() {
        let reference = ImageReference::parse("ns/alpine:1.13-rc2").unwrap();
        assert_eq!(reference.output_file_name(), "ns_alpine_1.13_rc2.tar");
    }

    #[test]
    fn test_workspace_name() {
        let reference = ImageReference::parse("alpine:3.18").unwrap();
        assert_eq!(reference.workspace_name(), "library_alpine_3.18.tmp");
    }
}
