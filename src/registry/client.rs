//! High-level registry client tying the content pipelines to a
//! transport.

use std::sync::Arc;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::metadata::Metadata;
use crate::reference::Reference;
use crate::registry::http::HttpRegistryTransport;
use crate::registry::pull::{PullResult, pull_artifact};
use crate::registry::push::{PushOptions, PushResult, push_artifact};
use crate::registry::transport::RegistryTransport;
use crate::version;

/// Works with OCI-compliant registries holding WASM extension artifacts.
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn RegistryTransport>,
}

impl RegistryClient {
    /// Client backed by the HTTP transport built from `config`.
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(HttpRegistryTransport::new(
            config,
        )?)))
    }

    /// Client over a caller-supplied transport.
    pub fn with_transport(transport: Arc<dyn RegistryTransport>) -> Self {
        Self { transport }
    }

    /// Download a WASM extension artifact from a registry.
    pub async fn pull(&self, reference: &str) -> Result<PullResult> {
        let parsed = Reference::parse(reference)?;
        let result = pull_artifact(self.transport.as_ref(), &parsed).await?;
        debug!(reference = %result.reference, digest = %result.manifest.digest, "pulled");
        Ok(result)
    }

    /// Upload a WASM extension artifact to a registry.
    pub async fn push(
        &self,
        payload: &[u8],
        metadata: &Metadata,
        reference: &str,
        options: PushOptions,
    ) -> Result<PushResult> {
        let parsed = Reference::parse(reference)?;
        let result = push_artifact(self.transport.as_ref(), payload, metadata, &parsed, options)
            .await?;
        debug!(reference = %result.reference, digest = %result.manifest.digest, "pushed");
        Ok(result)
    }

    /// All semver-compliant tags for a repository, sorted by descending
    /// version precedence with the registry's `_` substitution reversed.
    pub async fn tags(&self, reference: &str) -> Result<Vec<String>> {
        let parsed = Reference::parse(reference)?;
        let raw = self.transport.list_tags(&parsed).await?;
        Ok(version::sorted_tags(&raw))
    }
}
