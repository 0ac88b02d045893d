//! Registry v2 HTTP client
//!
//! One client serves one image reference. The bearer token is fetched
//! lazily: the first request probes the target URL unauthenticated, parses
//! the `WWW-Authenticate` challenge, and trades it (plus optional HTTP
//! Basic credentials) for a token at the advertised realm. A 401/403 on an
//! authenticated request re-runs that exchange exactly once; a second
//! rejection is reported as "image not found", matching the registry's own
//! phrasing for repositories that may simply require login.

use reqwest::header::{ACCEPT, AUTHORIZATION, RANGE, USER_AGENT, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};

use crate::error::{PullError, Result};
use crate::image::spec::{MEDIA_TYPE_MANIFEST, MEDIA_TYPE_MANIFEST_LIST};
use crate::image::{ImageReference, Manifest, ManifestList};
use crate::output::Logger;
use crate::registry::auth::{AuthChallenge, BearerToken};

pub const DEFAULT_USER_AGENT: &str = "docker-pull";

pub struct RegistryClient {
    http: reqwest::Client,
    image: ImageReference,
    token: Option<BearerToken>,
    login: String,
    password: String,
    user_agent: String,
    logger: Logger,
}

impl RegistryClient {
    pub fn new(image: ImageReference, logger: Logger) -> Self {
        Self {
            http: reqwest::Client::new(),
            image,
            token: None,
            login: String::new(),
            password: String::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            logger,
        }
    }

    /// Set HTTP Basic credentials for the token endpoint. Clears any token
    /// already held.
    pub fn set_credentials(&mut self, login: &str, password: &str) {
        self.login = login.to_string();
        self.password = password.to_string();
        self.token = None;
    }

    pub fn image(&self) -> &ImageReference {
        &self.image
    }

    fn get_request(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.get(url).header(USER_AGENT, &self.user_agent)
    }

    /// Probe `url` unauthenticated for a challenge, then trade it for a
    /// bearer token at the advertised realm.
    async fn fetch_token(&mut self, url: &str) -> Result<()> {
        let probe = self.get_request(url).send().await?;
        let challenge = probe
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(AuthChallenge::parse)
            .unwrap_or_default();

        let token_url = challenge.token_url(None)?;
        self.logger
            .verbose(&format!("requesting token from {}", token_url));

        let mut request = self.get_request(&token_url);
        if !self.login.is_empty() {
            request = request.basic_auth(&self.login, Some(&self.password));
        }

        let token: BearerToken = request.send().await?.json().await?;
        self.token = Some(token);

        Ok(())
    }

    /// Authenticated GET with a single transparent re-auth on 401/403.
    async fn get(
        &mut self,
        url: &str,
        accept: Option<&str>,
        range_offset: u64,
    ) -> Result<Response> {
        if self.token.is_none() {
            self.fetch_token(url).await?;
        }

        let response = self.send(url, accept, range_offset).await?;
        if !is_denied(response.status()) {
            return Ok(response);
        }

        self.logger
            .verbose(&format!("{}: {}, re-authenticating", url, response.status()));
        self.fetch_token(url).await?;

        let response = self.send(url, accept, range_offset).await?;
        if is_denied(response.status()) {
            return Err(PullError::ImageNotFound);
        }

        Ok(response)
    }

    async fn send(&self, url: &str, accept: Option<&str>, range_offset: u64) -> Result<Response> {
        let token = self.token.as_ref().map(|t| t.token.as_str()).unwrap_or("");
        let mut request = self
            .get_request(url)
            .header(AUTHORIZATION, format!("Bearer {}", token));

        if let Some(media_type) = accept {
            request = request.header(ACCEPT, media_type);
        }
        if range_offset > 0 {
            request = request.header(RANGE, format!("bytes={}-", range_offset));
        }

        Ok(request.send().await?)
    }

    /// Fetch the manifest list for the image's tag. A single-manifest
    /// response or a foreign schema version comes back as the recoverable
    /// [`PullError::EmptyManifestList`].
    pub async fn manifest_list(&mut self) -> Result<ManifestList> {
        let url = self.image.manifest_url(self.image.tag());
        let response = self.get(&url, Some(MEDIA_TYPE_MANIFEST_LIST), 0).await?;
        let list: ManifestList = response.json().await?;

        if list.schema_version != 2 || list.manifests.is_empty() {
            return Err(PullError::EmptyManifestList);
        }

        Ok(list)
    }

    /// Fetch a schema-2 manifest by tag or digest, returning it together
    /// with the `Docker-Content-Digest` header value.
    pub async fn manifest(&mut self, tag: &str) -> Result<(Manifest, String)> {
        let url = self.image.manifest_url(tag);
        let response = self.get(&url, Some(MEDIA_TYPE_MANIFEST), 0).await?;

        let content_digest = response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let manifest: Manifest = response.json().await?;

        Ok((manifest, content_digest))
    }

    /// Open a blob download, optionally resuming at `resume_offset` with a
    /// Range request. Any status >= 400 is fatal and carries the body.
    pub async fn blob(
        &mut self,
        digest: &str,
        media_type: Option<&str>,
        resume_offset: u64,
    ) -> Result<Response> {
        let url = self.image.blob_url(digest);
        let response = self.get(&url, media_type, resume_offset).await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(PullError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

fn is_denied(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
