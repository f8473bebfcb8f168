//! Publishing extensions: load a binary and its metadata file, validate,
//! and push to a registry repository derived from the metadata.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{DistributorError, Result};
use crate::metadata::Metadata;
use crate::providers::Providers;
use crate::reference::is_oci;
use crate::registry::push::PushResult;

/// Handles uploading an extension artifact.
pub struct Publisher {
    providers: Providers,
}

impl Publisher {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        Ok(Self {
            providers: Providers::with_defaults(config)?,
        })
    }

    pub fn with_providers(providers: Providers) -> Self {
        Self { providers }
    }

    /// Publish the extension at `wasm_path` to `remote`.
    ///
    /// The artifact lands at `<remote>/<name>:<version>`, both taken from
    /// the validated metadata.
    pub async fn run(
        &self,
        wasm_path: &Path,
        metadata_path: &Path,
        remote: &str,
    ) -> Result<PushResult> {
        let stat = std::fs::metadata(wasm_path)?;
        if stat.is_dir() {
            return Err(DistributorError::validation(
                "cannot publish a directory, provide a WASM file",
            ));
        }

        if !is_oci(remote) {
            return Err(DistributorError::invalid_reference(
                remote,
                "only OCI registries are supported",
            ));
        }
        let scheme = remote.split_once("://").map(|(s, _)| s).unwrap_or_default();

        let mut metadata = Metadata::from_file(metadata_path)?;
        metadata.validate()?;

        let payload = std::fs::read(wasm_path)?;

        let reference = format!(
            "{}/{}:{}",
            remote.trim_end_matches('/'),
            metadata.name,
            metadata.version
        );
        debug!(reference = %reference, "publishing extension");

        let provider = self.providers.by_scheme(scheme)?;
        provider.publish(&payload, &metadata, &reference).await
    }
}

/// Locate the metadata file for an extension binary.
///
/// Tries `<stem>.yaml` next to the binary first, then a `Wasm.yaml` in
/// the same directory.
pub fn guess_metadata_path(wasm_path: &Path) -> Option<PathBuf> {
    let sibling = wasm_path.with_extension("yaml");
    if sibling.is_file() {
        return Some(sibling);
    }
    let shared = wasm_path.parent()?.join("Wasm.yaml");
    if shared.is_file() {
        return Some(shared);
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::providers::OciProvider;
    use crate::registry::RegistryClient;
    use crate::registry::transport::mock::MockRegistry;

    fn write_fixture(dir: &Path) -> (PathBuf, PathBuf) {
        let wasm = dir.join("auth-filter.wasm");
        std::fs::write(&wasm, b"\0asm payload").unwrap();
        let meta = dir.join("auth-filter.yaml");
        std::fs::write(
            &meta,
            "name: auth-filter\nversion: 1.0.0\napiVersion: v1\n",
        )
        .unwrap();
        (wasm, meta)
    }

    fn mock_publisher(registry: Arc<MockRegistry>) -> Publisher {
        let client = RegistryClient::with_transport(registry);
        let mut providers = Providers::new();
        providers.register(Arc::new(OciProvider::with_client(client)));
        Publisher::with_providers(providers)
    }

    #[tokio::test]
    async fn test_publish_derives_reference_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (wasm, meta) = write_fixture(dir.path());
        let registry = Arc::new(MockRegistry::new());
        let publisher = mock_publisher(registry.clone());

        let result = publisher
            .run(&wasm, &meta, "oci://registry.io/extensions")
            .await
            .unwrap();

        assert_eq!(result.reference, "registry.io/extensions/auth-filter:1.0.0");
        assert_eq!(
            registry.tags_of("extensions/auth-filter"),
            vec!["1.0.0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_publish_rejects_non_oci_remote() {
        let dir = tempfile::tempdir().unwrap();
        let (wasm, meta) = write_fixture(dir.path());
        let publisher = mock_publisher(Arc::new(MockRegistry::new()));

        let err = publisher
            .run(&wasm, &meta, "https://registry.io/extensions")
            .await
            .unwrap_err();
        assert!(matches!(err, DistributorError::InvalidReference { .. }));
    }

    #[tokio::test]
    async fn test_publish_rejects_invalid_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (wasm, _) = write_fixture(dir.path());
        let bad_meta = dir.path().join("bad.yaml");
        std::fs::write(&bad_meta, "name: auth-filter\nversion: not-semver\napiVersion: v1\n")
            .unwrap();
        let publisher = mock_publisher(Arc::new(MockRegistry::new()));

        let err = publisher
            .run(&wasm, &bad_meta, "oci://registry.io/extensions")
            .await
            .unwrap_err();
        assert!(matches!(err, DistributorError::Validation(_)));
    }

    #[test]
    fn test_guess_metadata_path() {
        let dir = tempfile::tempdir().unwrap();
        let wasm = dir.path().join("filter.wasm");
        std::fs::write(&wasm, b"\0asm").unwrap();

        assert!(guess_metadata_path(&wasm).is_none());

        let shared = dir.path().join("Wasm.yaml");
        std::fs::write(&shared, "name: filter\n").unwrap();
        assert_eq!(guess_metadata_path(&wasm).unwrap(), shared);

        let sibling = dir.path().join("filter.yaml");
        std::fs::write(&sibling, "name: filter\n").unwrap();
        assert_eq!(guess_metadata_path(&wasm).unwrap(), sibling);
    }
}
