//! Bearer-token authentication against the registry's advertised realm
//!
//! Registries answer unauthenticated requests with a `WWW-Authenticate:
//! Bearer realm=...,service=...,scope=...` challenge. The challenge parser
//! is deliberately forgiving: on malformed input it yields an empty
//! challenge and the subsequent token fetch becomes the source of truth.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use url::Url;

use crate::error::{PullError, Result};

/// Parsed `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthChallenge {
    pub realm: String,
    pub service: String,
    pub scope: String,
}

/// Token issued by the realm endpoint. Partial responses are fine; every
/// field defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BearerToken {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

impl AuthChallenge {
    /// Parse the header value (`Bearer realm="...",service="..."`,...).
    /// Keys are matched case-insensitively; quoted values may contain
    /// commas. Never fails: malformed input yields an empty challenge.
    pub fn parse(header: &str) -> Self {
        let mut challenge = Self::default();

        let Some((_, params)) = header.split_once(' ') else {
            return challenge;
        };

        for part in split_unquoted_commas(params) {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');

            match key.trim().to_ascii_lowercase().as_str() {
                "realm" => challenge.realm = value.to_string(),
                "service" => challenge.service = value.to_string(),
                "scope" => challenge.scope = value.to_string(),
                _ => {}
            }
        }

        challenge
    }

    /// Build the token endpoint URL: the realm with its `service` and (when
    /// a scope is present) `scope` query parameters overwritten.
    ///
    /// When `action` is given and the scope has exactly three
    /// colon-separated fields (`repository:<name>:<action>`), the final
    /// field is replaced; any other shape passes through unchanged.
    pub fn token_url(&self, action: Option<&str>) -> Result<String> {
        let mut url = Url::parse(&self.realm)
            .map_err(|e| PullError::Parse(format!("auth realm {:?}: {}", self.realm, e)))?;

        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "service" && k != "scope")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.push(("service".to_string(), self.service.clone()));

        if !self.scope.is_empty() {
            let mut scope = self.scope.clone();
            if let Some(action) = action {
                let fields: Vec<&str> = scope.split(':').collect();
                if fields.len() == 3 {
                    scope = format!("{}:{}:{}", fields[0], fields[1], action);
                }
            }
            pairs.push(("scope".to_string(), scope));
        }

        url.query_pairs_mut().clear().extend_pairs(&pairs);

        Ok(url.into())
    }
}

/// Split on commas that are outside double quotes.
fn split_unquoted_commas(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);

    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_docker_hub_challenge() {
        let challenge = AuthChallenge::parse(
            "Bearer realm=\"https://auth.docker.io/token\",service=\"registry.docker.io\",scope=\"repository:library/alpine:pull\"",
        );

        assert_eq!(challenge.realm, "https://auth.docker.io/token");
        assert_eq!(challenge.service, "registry.docker.io");
        assert_eq!(challenge.scope, "repository:library/alpine:pull");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let challenge = AuthChallenge::parse("Bearer Realm=\"https://r/t\",SERVICE=\"s\"");
        assert_eq!(challenge.realm, "https://r/t");
        assert_eq!(challenge.service, "s");
    }

    #[test]
    fn test_parse_quoted_commas() {
        let challenge =
            AuthChallenge::parse("Bearer realm=\"https://r/t\",scope=\"repository:a:pull,push\"");
        assert_eq!(challenge.scope, "repository:a:pull,push");
    }

    #[test]
    fn test_parse_malformed_is_silent() {
        assert_eq!(AuthChallenge::parse("Bearer"), AuthChallenge::default());
        assert_eq!(AuthChallenge::parse(""), AuthChallenge::default());

        let challenge = AuthChallenge::parse("Bearer garbage-without-pairs");
        assert_eq!(challenge, AuthChallenge::default());
    }

    #[test]
    fn test_token_url_overwrites_params() {
        let challenge = AuthChallenge {
            realm: "https://auth.example.com/token?service=stale&keep=1".to_string(),
            service: "registry.example.com".to_string(),
            scope: "repository:foo/bar:pull".to_string(),
        };

        let url = Url::parse(&challenge.token_url(None).unwrap()).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert!(pairs.contains(&("keep".to_string(), "1".to_string())));
        assert!(pairs.contains(&("service".to_string(), "registry.example.com".to_string())));
        assert!(pairs.contains(&("scope".to_string(), "repository:foo/bar:pull".to_string())));
        assert_eq!(pairs.iter().filter(|(k, _)| k == "service").count(), 1);
    }

    #[test]
    fn test_token_url_action_rewrite() {
        let challenge = AuthChallenge {
            realm: "https://auth.example.com/token".to_string(),
            service: "svc".to_string(),
            scope: "repository:foo/bar:pull".to_string(),
        };

        let url = Url::parse(&challenge.token_url(Some("push")).unwrap()).unwrap();
        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(scope, "repository:foo/bar:push");
    }

    #[test]
    fn test_token_url_action_needs_three_fields() {
        // scopes that are not repository:<name>:<action> pass through
        let challenge = AuthChallenge {
            realm: "https://auth.example.com/token".to_string(),
            service: "svc".to_string(),
            scope: "registry:catalog:search:extra".to_string(),
        };

        let url = Url::parse(&challenge.token_url(Some("push")).unwrap()).unwrap();
        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(scope, "registry:catalog:search:extra");
    }

    #[test]
    fn test_token_url_empty_scope_omitted() {
        let challenge = AuthChallenge {
            realm: "https://auth.example.com/token".to_string(),
            service: "svc".to_string(),
            scope: String::new(),
        };

        let url = Url::parse(&challenge.token_url(None).unwrap()).unwrap();
        assert!(url.query_pairs().all(|(k, _)| k != "scope"));
    }

    #[test]
    fn test_token_url_bad_realm() {
        let challenge = AuthChallenge::default();
        assert!(challenge.token_url(None).is_err());
    }

    #[test]
    fn test_bearer_token_partial_decode() {
        let token: BearerToken = serde_json::from_str(r#"{"token": "abc"}"#).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expires_in, 0);
        assert!(token.issued_at.is_none());

        let token: BearerToken = serde_json::from_str(
            r#"{"token": "abc", "expires_in": 300, "issued_at": "2021-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(token.expires_in, 300);
        assert!(token.issued_at.is_some());
    }
}
