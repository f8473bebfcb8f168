//! Scheme-keyed artifact providers.
//!
//! A provider is the capability seam for one reference scheme: fetch the
//! binary payload behind a reference, or publish a payload plus metadata
//! to one. The registry of providers is populated once at startup and
//! consulted by scheme, so new transports slot in without touching the
//! download or publish paths.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::RegistryConfig;
use crate::error::{DistributorError, Result};
use crate::metadata::Metadata;
use crate::reference::OCI_SCHEME;
use crate::registry::push::{PushOptions, PushResult};
use crate::registry::RegistryClient;

#[async_trait]
pub trait ArtifactProvider: Send + Sync {
    /// URL schemes this provider serves.
    fn schemes(&self) -> &'static [&'static str];

    /// Fetch the extension payload behind a reference.
    async fn fetch(&self, reference: &str) -> Result<Bytes>;

    /// Publish a payload and its metadata under a reference.
    async fn publish(
        &self,
        payload: &[u8],
        metadata: &Metadata,
        reference: &str,
    ) -> Result<PushResult>;
}

/// Provider backed by an OCI registry client.
pub struct OciProvider {
    client: RegistryClient,
}

impl OciProvider {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            client: RegistryClient::new(config)?,
        })
    }

    pub fn with_client(client: RegistryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArtifactProvider for OciProvider {
    fn schemes(&self) -> &'static [&'static str] {
        &[OCI_SCHEME]
    }

    async fn fetch(&self, reference: &str) -> Result<Bytes> {
        let result = self.client.pull(reference).await?;
        Ok(result.extension.data)
    }

    async fn publish(
        &self,
        payload: &[u8],
        metadata: &Metadata,
        reference: &str,
    ) -> Result<PushResult> {
        self.client
            .push(payload, metadata, reference, PushOptions::default())
            .await
    }
}

/// The provider collection consulted by URL scheme.
#[derive(Default)]
pub struct Providers {
    by_scheme: HashMap<&'static str, Arc<dyn ArtifactProvider>>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The default collection: an OCI provider built from `config`.
    pub fn with_defaults(config: &RegistryConfig) -> Result<Self> {
        let mut providers = Self::new();
        providers.register(Arc::new(OciProvider::new(config)?));
        Ok(providers)
    }

    pub fn register(&mut self, provider: Arc<dyn ArtifactProvider>) {
        for scheme in provider.schemes() {
            self.by_scheme.insert(scheme, provider.clone());
        }
    }

    pub fn by_scheme(&self, scheme: &str) -> Result<&Arc<dyn ArtifactProvider>> {
        self.by_scheme
            .get(scheme)
            .ok_or_else(|| DistributorError::UnsupportedScheme(scheme.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transport::mock::MockRegistry;

    fn mock_providers() -> Providers {
        let client = RegistryClient::with_transport(Arc::new(MockRegistry::new()));
        let mut providers = Providers::new();
        providers.register(Arc::new(OciProvider::with_client(client)));
        providers
    }

    #[test]
    fn test_lookup_by_scheme() {
        let providers = mock_providers();
        assert!(providers.by_scheme(OCI_SCHEME).is_ok());
    }

    #[test]
    fn test_unknown_scheme() {
        let providers = mock_providers();
        let err = providers.by_scheme("ftp").err().unwrap();
        assert!(matches!(err, DistributorError::UnsupportedScheme(_)));
    }

    #[tokio::test]
    async fn test_publish_then_fetch() {
        let providers = mock_providers();
        let provider = providers.by_scheme(OCI_SCHEME).unwrap();

        let metadata = Metadata {
            name: "auth-filter".to_string(),
            version: "1.0.0".to_string(),
            api_version: "v1".to_string(),
            ..Metadata::default()
        };
        provider
            .publish(b"\0asm", &metadata, "oci://registry.io/ext/auth-filter:1.0.0")
            .await
            .unwrap();

        let payload = provider
            .fetch("oci://registry.io/ext/auth-filter:1.0.0")
            .await
            .unwrap();
        assert_eq!(payload.as_ref(), b"\0asm");
    }
}
