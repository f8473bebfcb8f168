//! The pull content pipeline: copy a manifest and its blobs into an
//! ephemeral content store, validate the artifact's content model, and
//! hand back metadata plus payload.

use std::collections::HashMap;

use bytes::Bytes;
use futures::future::try_join_all;
use serde::Serialize;

use crate::error::{DistributorError, Result};
use crate::metadata::Metadata;
use crate::reference::Reference;
use crate::registry::manifest::{Descriptor, Manifest, compute_digest};
use crate::registry::transport::RegistryTransport;
use crate::registry::{WASM_LAYER_MEDIA_TYPE, WASM_METADATA_MEDIA_TYPE};

/// Digest, size, and raw bytes of one pulled descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullSummary {
    pub digest: String,
    pub size: i64,
    #[serde(skip)]
    pub data: Bytes,
}

/// The result returned upon successful pull.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullResult {
    pub manifest: PullSummary,
    pub config: PullSummary,
    #[serde(rename = "wasm")]
    pub extension: PullSummary,
    #[serde(rename = "meta")]
    pub metadata: Metadata,
    #[serde(rename = "ref")]
    pub reference: String,
}

/// Content-addressed store local to a single pull.
///
/// Bytes are keyed by their computed digest, so corrupted transport data
/// simply never materializes under the digest a descriptor expects.
#[derive(Default)]
struct MemoryStore {
    blobs: HashMap<String, Bytes>,
}

impl MemoryStore {
    fn add(&mut self, data: Bytes) -> String {
        let digest = compute_digest(&data);
        self.blobs.insert(digest.clone(), data);
        digest
    }

    fn get(&self, digest: &str) -> Result<Bytes> {
        self.blobs
            .get(digest)
            .cloned()
            .ok_or_else(|| DistributorError::BlobRetrieval {
                digest: digest.to_string(),
            })
    }
}

/// Download and validate an OCI artifact already resolved to a concrete
/// tag.
pub async fn pull_artifact(
    transport: &dyn RegistryTransport,
    reference: &Reference,
) -> Result<PullResult> {
    if reference.tag.is_empty() {
        return Err(DistributorError::invalid_reference(
            reference.url(),
            "pulling requires a tag",
        ));
    }

    let mut store = MemoryStore::default();

    let manifest_bytes = transport.fetch_manifest(reference).await?;
    let manifest: Manifest = serde_json::from_slice(&manifest_bytes)?;
    let manifest_digest = store.add(manifest_bytes);

    let mut descriptors: Vec<Descriptor> = Vec::with_capacity(manifest.layers.len() + 1);
    descriptors.push(manifest.config.clone());
    descriptors.extend(manifest.layers.iter().cloned());

    // Copy only blobs carrying the reserved media types, mirroring the
    // allowed-media-type filter applied on the wire.
    let wanted: Vec<&Descriptor> = descriptors
        .iter()
        .filter(|d| {
            d.media_type == WASM_METADATA_MEDIA_TYPE || d.media_type == WASM_LAYER_MEDIA_TYPE
        })
        .collect();
    let copied = try_join_all(
        wanted
            .iter()
            .map(|descriptor| transport.fetch_blob(reference, &descriptor.digest)),
    )
    .await?;
    for data in copied {
        store.add(data);
    }

    let config_descriptor = descriptors
        .iter()
        .find(|d| d.media_type == WASM_METADATA_MEDIA_TYPE)
        .ok_or_else(|| DistributorError::MalformedArtifact {
            media_type: WASM_METADATA_MEDIA_TYPE.to_string(),
        })?;
    let layer_descriptor = descriptors
        .iter()
        .find(|d| d.media_type == WASM_LAYER_MEDIA_TYPE)
        .ok_or_else(|| DistributorError::MalformedArtifact {
            media_type: WASM_LAYER_MEDIA_TYPE.to_string(),
        })?;

    let manifest_data = store.get(&manifest_digest)?;
    let config_data = store.get(&config_descriptor.digest)?;
    let extension_data = store.get(&layer_descriptor.digest)?;

    let metadata: Metadata = serde_json::from_slice(&config_data)?;

    Ok(PullResult {
        manifest: PullSummary {
            digest: manifest_digest,
            size: manifest_data.len() as i64,
            data: manifest_data,
        },
        config: PullSummary {
            digest: config_descriptor.digest.clone(),
            size: config_descriptor.size,
            data: config_data,
        },
        extension: PullSummary {
            digest: layer_descriptor.digest.clone(),
            size: layer_descriptor.size,
            data: extension_data,
        },
        metadata,
        reference: reference.to_string(),
    })
}
