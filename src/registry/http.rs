//! Reqwest-backed registry transport speaking the OCI distribution API.
//!
//! Handles the token-authentication handshake (anonymous attempt, then a
//! bearer token fetched from the `WWW-Authenticate` challenge) and the
//! manifest/blob/tag endpoints. Deadlines come from
//! [`RegistryConfig::timeout`]; nothing here retries.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::RegistryConfig;
use crate::error::{DistributorError, Result};
use crate::reference::Reference;
use crate::registry::MANIFEST_MEDIA_TYPE;
use crate::registry::transport::RegistryTransport;

const PULL_SCOPE: &str = "pull";
const PUSH_SCOPE: &str = "push,pull";

pub struct HttpRegistryTransport {
    client: reqwest::Client,
    username: Option<String>,
    password: Option<String>,
    plain_http: bool,
    /// Bearer tokens keyed by `registry#scope`.
    tokens: Mutex<HashMap<String, String>>,
}

impl HttpRegistryTransport {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca_file) = &config.ca_file {
            let pem = std::fs::read(ca_file)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }

        Ok(Self {
            client: builder.build()?,
            username: config.auth.username.clone(),
            password: config.auth.password.clone(),
            plain_http: config.plain_http,
            tokens: Mutex::new(HashMap::new()),
        })
    }

    fn scheme(&self) -> &'static str {
        if self.plain_http { "http" } else { "https" }
    }

    fn repo_url(&self, reference: &Reference, suffix: &str) -> String {
        format!(
            "{}://{}/v2/{}/{}",
            self.scheme(),
            reference.registry,
            reference.repository,
            suffix
        )
    }

    fn apply_auth(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        if let Some(token) = token {
            request.bearer_auth(token)
        } else if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request.basic_auth(username, Some(password))
        } else {
            request
        }
    }

    /// Send a request, performing the bearer-token handshake on a 401.
    async fn send(
        &self,
        reference: &Reference,
        scope: &str,
        request: RequestBuilder,
    ) -> Result<Response> {
        let token_key = format!("{}#{}", reference.registry, scope);
        let cached = self.tokens.lock().await.get(&token_key).cloned();

        let retry = request.try_clone();
        let response = self
            .apply_auth(request, cached.as_deref())
            .send()
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        let Some(retry) = retry else {
            return Ok(response);
        };

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_bearer_challenge);
        let Some(challenge) = challenge else {
            return Ok(response);
        };

        let token = self.request_token(&challenge, reference, scope).await?;
        self.tokens
            .lock()
            .await
            .insert(token_key, token.clone());
        Ok(retry.bearer_auth(token).send().await?)
    }

    async fn request_token(
        &self,
        challenge: &BearerChallenge,
        reference: &Reference,
        scope: &str,
    ) -> Result<String> {
        let mut token_url = url::Url::parse(&challenge.realm)?;
        if let Some(service) = &challenge.service {
            token_url.query_pairs_mut().append_pair("service", service);
        }
        token_url
            .query_pairs_mut()
            .append_pair("scope", &format!("repository:{}:{}", reference.repository, scope));

        let mut request = self.client.get(token_url);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            request = request.basic_auth(username, Some(password));
        }
        let response = ensure_success(request.send().await?, "token request")?;

        #[derive(Deserialize)]
        struct TokenResponse {
            token: Option<String>,
            access_token: Option<String>,
        }
        let body: TokenResponse = response.json().await?;
        body.token
            .or(body.access_token)
            .ok_or_else(|| DistributorError::Transport("token response carries no token".to_string()))
    }
}

#[async_trait]
impl RegistryTransport for HttpRegistryTransport {
    async fn list_tags(&self, reference: &Reference) -> Result<Vec<String>> {
        let url = self.repo_url(reference, "tags/list");
        let response = self
            .send(reference, PULL_SCOPE, self.client.get(&url))
            .await?;
        let response = ensure_success(response, "tag listing")?;

        #[derive(Deserialize)]
        struct TagList {
            #[serde(default)]
            tags: Vec<String>,
        }
        let body: TagList = response.json().await?;
        Ok(body.tags)
    }

    async fn fetch_manifest(&self, reference: &Reference) -> Result<Bytes> {
        let url = self.repo_url(reference, &format!("manifests/{}", reference.tag));
        let request = self.client.get(&url).header(ACCEPT, MANIFEST_MEDIA_TYPE);
        let response = self.send(reference, PULL_SCOPE, request).await?;
        Ok(ensure_success(response, "manifest fetch")?.bytes().await?)
    }

    async fn fetch_blob(&self, reference: &Reference, digest: &str) -> Result<Bytes> {
        let url = self.repo_url(reference, &format!("blobs/{}", digest));
        let response = self
            .send(reference, PULL_SCOPE, self.client.get(&url))
            .await?;
        Ok(ensure_success(response, "blob fetch")?.bytes().await?)
    }

    async fn push_blob(&self, reference: &Reference, digest: &str, data: Bytes) -> Result<()> {
        // Skip the upload when the registry already holds the blob.
        let head_url = self.repo_url(reference, &format!("blobs/{}", digest));
        let response = self
            .send(reference, PUSH_SCOPE, self.client.head(&head_url))
            .await?;
        if response.status() == StatusCode::OK {
            return Ok(());
        }

        let start_url = self.repo_url(reference, "blobs/uploads/");
        let response = self
            .send(reference, PUSH_SCOPE, self.client.post(&start_url))
            .await?;
        let response = ensure_success(response, "blob upload start")?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                DistributorError::Transport("blob upload start returned no location".to_string())
            })?;

        let mut upload_url = if location.starts_with("http://") || location.starts_with("https://")
        {
            url::Url::parse(location)?
        } else {
            url::Url::parse(&format!("{}://{}", self.scheme(), reference.registry))?
                .join(location)?
        };
        upload_url.query_pairs_mut().append_pair("digest", digest);

        let request = self
            .client
            .put(upload_url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data);
        let response = self.send(reference, PUSH_SCOPE, request).await?;
        ensure_success(response, "blob upload")?;
        Ok(())
    }

    async fn push_manifest(
        &self,
        reference: &Reference,
        media_type: &str,
        data: Bytes,
    ) -> Result<()> {
        let url = self.repo_url(reference, &format!("manifests/{}", reference.tag));
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, media_type)
            .body(data);
        let response = self.send(reference, PUSH_SCOPE, request).await?;
        ensure_success(response, "manifest upload")?;
        Ok(())
    }
}

struct BearerChallenge {
    realm: String,
    service: Option<String>,
}

/// Parse a `Bearer realm="...",service="..."` challenge header.
fn parse_bearer_challenge(header: &str) -> Option<BearerChallenge> {
    let params = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?;

    let mut realm = None;
    let mut service = None;
    for part in params.split(',') {
        let (key, value) = part.trim().split_once('=')?;
        let value = value.trim_matches('"');
        match key {
            "realm" => realm = Some(value.to_string()),
            "service" => service = Some(value.to_string()),
            _ => {}
        }
    }

    Some(BearerChallenge {
        realm: realm?,
        service,
    })
}

fn ensure_success(response: Response, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(DistributorError::Transport(format!(
            "{context} failed: registry returned {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer_challenge() {
        let header = r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:ext:pull""#;
        let challenge = parse_bearer_challenge(header).unwrap();
        assert_eq!(challenge.realm, "https://auth.example.com/token");
        assert_eq!(challenge.service.as_deref(), Some("registry.example.com"));
    }

    #[test]
    fn test_parse_bearer_challenge_rejects_basic() {
        assert!(parse_bearer_challenge(r#"Basic realm="registry""#).is_none());
    }

    #[test]
    fn test_repo_url_plain_http() {
        let transport = HttpRegistryTransport::new(&RegistryConfig {
            plain_http: true,
            ..RegistryConfig::default()
        })
        .unwrap();
        let reference = Reference::parse("oci://localhost:5000/ext/filter:1.0.0").unwrap();
        assert_eq!(
            transport.repo_url(&reference, "tags/list"),
            "http://localhost:5000/v2/ext/filter/tags/list"
        );
    }
}
