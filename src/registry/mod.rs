//! OCI artifact layer: manifest construction, annotation generation, the
//! registry transport seam, and the push/pull content pipelines.

pub mod annotations;
pub mod client;
pub mod http;
pub mod manifest;
pub mod pull;
pub mod push;
pub mod transport;

pub use client::RegistryClient;
pub use manifest::{Descriptor, Manifest, compute_digest};
pub use pull::{PullResult, PullSummary};
pub use push::{PushOptions, PushResult, PushSummary};
pub use transport::RegistryTransport;

/// Reserved media type for the metadata config blob.
pub const WASM_METADATA_MEDIA_TYPE: &str = "application/vnd.wasm.config.v1+json";

/// Reserved media type for the extension binary layer.
pub const WASM_LAYER_MEDIA_TYPE: &str = "application/vnd.wasm.content.layer.v1+wasm";

/// Media type of the OCI image manifest itself.
pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
