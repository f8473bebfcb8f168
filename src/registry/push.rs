//! The push content pipeline: build descriptors and a manifest for an
//! extension payload, then upload the blobs and the manifest.

use bytes::Bytes;
use serde::Serialize;

use crate::error::{DistributorError, Result};
use crate::metadata::Metadata;
use crate::reference::Reference;
use crate::registry::annotations::generate_annotations;
use crate::registry::manifest::{Descriptor, Manifest};
use crate::registry::transport::RegistryTransport;
use crate::registry::{MANIFEST_MEDIA_TYPE, WASM_LAYER_MEDIA_TYPE, WASM_METADATA_MEDIA_TYPE};

/// Options applied to a single push.
#[derive(Debug, Clone, Copy, Default)]
pub struct PushOptions {
    /// Skip the creation-timestamp annotation so identical input yields
    /// identical manifest bytes.
    pub reproducible: bool,
}

/// Digest and size of one uploaded descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub digest: String,
    pub size: i64,
}

impl From<&Descriptor> for PushSummary {
    fn from(descriptor: &Descriptor) -> Self {
        Self {
            digest: descriptor.digest.clone(),
            size: descriptor.size,
        }
    }
}

/// The result returned upon successful push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushResult {
    pub manifest: PushSummary,
    pub config: PushSummary,
    #[serde(rename = "wasm")]
    pub extension: PushSummary,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Upload an extension payload and its metadata as an OCI artifact.
///
/// A mid-copy failure leaves remote registry state undefined; there is no
/// rollback, the error is reported as-is.
pub async fn push_artifact(
    transport: &dyn RegistryTransport,
    payload: &[u8],
    metadata: &Metadata,
    reference: &Reference,
    options: PushOptions,
) -> Result<PushResult> {
    if reference.tag.is_empty() {
        return Err(DistributorError::invalid_reference(
            reference.url(),
            "pushing requires a tag",
        ));
    }

    let layer_descriptor = Descriptor::from_bytes(WASM_LAYER_MEDIA_TYPE, payload);

    let metadata_bytes = serde_json::to_vec(metadata)?;
    let config_descriptor = Descriptor::from_bytes(WASM_METADATA_MEDIA_TYPE, &metadata_bytes);

    let annotations = generate_annotations(metadata, options.reproducible);
    let manifest = Manifest::new(
        config_descriptor.clone(),
        vec![layer_descriptor.clone()],
        annotations,
    );
    let manifest_bytes = manifest.to_json()?;
    let manifest_descriptor = Descriptor::from_bytes(MANIFEST_MEDIA_TYPE, &manifest_bytes);

    // Referenced blobs must exist before the manifest that names them.
    transport
        .push_blob(
            reference,
            &config_descriptor.digest,
            Bytes::from(metadata_bytes),
        )
        .await?;
    transport
        .push_blob(
            reference,
            &layer_descriptor.digest,
            Bytes::copy_from_slice(payload),
        )
        .await?;
    transport
        .push_manifest(reference, MANIFEST_MEDIA_TYPE, Bytes::from(manifest_bytes))
        .await?;

    Ok(PushResult {
        manifest: PushSummary::from(&manifest_descriptor),
        config: PushSummary::from(&config_descriptor),
        extension: PushSummary::from(&layer_descriptor),
        reference: reference.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::transport::mock::MockRegistry;

    fn metadata() -> Metadata {
        Metadata {
            name: "auth-filter".to_string(),
            version: "1.0.0".to_string(),
            api_version: "v1".to_string(),
            ..Metadata::default()
        }
    }

    #[tokio::test]
    async fn test_push_uploads_blobs_and_manifest() {
        let registry = MockRegistry::new();
        let reference = Reference::parse("oci://registry.io/ext/auth-filter:1.0.0").unwrap();

        let result = push_artifact(
            &registry,
            b"\0asm payload",
            &metadata(),
            &reference,
            PushOptions { reproducible: true },
        )
        .await
        .unwrap();

        assert_eq!(result.reference, "registry.io/ext/auth-filter:1.0.0");
        assert!(registry.has_blob(&result.config.digest));
        assert!(registry.has_blob(&result.extension.digest));
        assert_eq!(
            registry.tags_of("ext/auth-filter"),
            vec!["1.0.0".to_string()]
        );
    }

    #[tokio::test]
    async fn test_push_requires_tag() {
        let registry = MockRegistry::new();
        let reference = Reference::parse("oci://registry.io/ext/auth-filter").unwrap();
        let err = push_artifact(
            &registry,
            b"\0asm",
            &metadata(),
            &reference,
            PushOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DistributorError::InvalidReference { .. }));
    }

    #[tokio::test]
    async fn test_push_failure_reported_unretried() {
        let registry = MockRegistry::new();
        registry.fail_pushes();
        let reference = Reference::parse("oci://registry.io/ext/auth-filter:1.0.0").unwrap();
        let err = push_artifact(
            &registry,
            b"\0asm",
            &metadata(),
            &reference,
            PushOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DistributorError::Transport(_)));
        assert_eq!(registry.push_attempts(), 1);
    }
}
