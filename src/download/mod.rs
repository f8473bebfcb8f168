//! Downloading extensions: version resolution, provider fetch, and
//! crash-safe materialization on disk.

pub mod atomic;
pub mod coordinator;

pub use atomic::atomic_write_file;
pub use coordinator::{DownloadCoordinator, SharedOutcome};

use std::path::{Path, PathBuf};

use semver::Version;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::Result;
use crate::providers::{OciProvider, Providers};
use crate::reference::{Reference, decode_tag};
use crate::registry::RegistryClient;
use crate::version;

/// Constraint used when a reference carries no explicit version: any
/// released version, not necessarily the newest.
pub const FALLBACK_VERSION_CONSTRAINT: &str = ">0.0.0-0";

/// File mode applied to downloaded artifacts.
const DOWNLOAD_FILE_MODE: u32 = 0o644;

/// Strategy for verifying artifact provenance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerifyStrategy {
    /// Skip all verification.
    #[default]
    Never,
    /// Attempt verification, tolerating missing provenance data.
    IfPossible,
    /// Verify and fail when verification fails.
    Always,
    /// Fetch provenance data but let a later step verify it.
    Later,
}

/// Version request to use for a reference when the caller supplies none.
///
/// A tag that parses as an exact semantic version is used directly;
/// anything else falls back to the "any released version" constraint.
pub fn version_from_reference(reference: &str) -> String {
    match Reference::parse(reference) {
        Ok(parsed) if !parsed.tag.is_empty() && Version::parse(&parsed.tag).is_ok() => parsed.tag,
        _ => FALLBACK_VERSION_CONSTRAINT.to_string(),
    }
}

/// Handles downloading an extension artifact.
pub struct Downloader {
    providers: Providers,
    client: RegistryClient,
    verify: VerifyStrategy,
}

impl Downloader {
    pub fn new(config: &RegistryConfig) -> Result<Self> {
        let client = RegistryClient::new(config)?;
        let mut providers = Providers::new();
        providers.register(std::sync::Arc::new(OciProvider::with_client(client.clone())));
        Ok(Self::with_parts(providers, client, VerifyStrategy::Never))
    }

    pub fn with_parts(
        providers: Providers,
        client: RegistryClient,
        verify: VerifyStrategy,
    ) -> Self {
        Self {
            providers,
            client,
            verify,
        }
    }

    /// Resolve a reference and version request to a concrete tag.
    ///
    /// An exact semantic version is taken as the tag directly. Otherwise
    /// the repository's tags are listed and matched against the request
    /// as a constraint, in descending version order.
    pub async fn resolve_version(&self, reference: &str, version: &str) -> Result<Reference> {
        let parsed = Reference::parse(reference)?;
        if Version::parse(version).is_ok() {
            return Ok(parsed.with_tag(version));
        }
        let tags = self.client.tags(reference).await?;
        let matched = version::resolve_tag(&tags, version)?;
        Ok(parsed.with_tag(&matched))
    }

    /// Retrieve an extension and write it into `dest_dir`.
    ///
    /// Returns the path the artifact was materialized at, named
    /// `<repository-basename>-<tag>.wasm`.
    pub async fn download_to(
        &self,
        reference: &str,
        version: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf> {
        let resolved = self.resolve_version(reference, version).await?;
        debug!(reference = %resolved, "resolved download target");

        let scheme = reference.split_once("://").map(|(s, _)| s).unwrap_or_default();
        let provider = self.providers.by_scheme(scheme)?;
        let data = provider.fetch(&resolved.url()).await?;

        let file_name = format!(
            "{}-{}.wasm",
            resolved.repository_basename(),
            decode_tag(&resolved.tag)
        );
        let destination = dest_dir.join(file_name);
        atomic_write_file(&destination, &data, DOWNLOAD_FILE_MODE)?;

        if self.verify != VerifyStrategy::Never {
            // TODO: provenance verification once signature data is
            // published alongside extension artifacts.
        }

        Ok(destination)
    }
}
