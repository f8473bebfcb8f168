//! OCI manifest annotation generation from extension metadata.

use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};

use crate::metadata::Metadata;

pub const ANNOTATION_CREATED: &str = "org.opencontainers.image.created";
pub const ANNOTATION_AUTHORS: &str = "org.opencontainers.image.authors";
pub const ANNOTATION_URL: &str = "org.opencontainers.image.url";
pub const ANNOTATION_SOURCE: &str = "org.opencontainers.image.source";
pub const ANNOTATION_VERSION: &str = "org.opencontainers.image.version";
pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
pub const ANNOTATION_DESCRIPTION: &str = "org.opencontainers.image.description";

/// Annotation keys callers may never override.
const IMMUTABLE_ANNOTATIONS: [&str; 2] = [ANNOTATION_VERSION, ANNOTATION_TITLE];

/// Generate the OCI annotations to include within a manifest.
///
/// Metadata-derived annotations come first; the metadata's free-form
/// annotations are merged on top, except for the immutable title and
/// version keys. `reproducible` skips the creation timestamp so the same
/// input always yields the same manifest bytes.
pub fn generate_annotations(meta: &Metadata, reproducible: bool) -> BTreeMap<String, String> {
    let mut annotations = generate_metadata_annotations(meta, reproducible);

    for (key, value) in &meta.annotations {
        if IMMUTABLE_ANNOTATIONS.contains(&key.as_str()) {
            continue;
        }
        annotations.insert(key.clone(), value.clone());
    }

    annotations
}

fn generate_metadata_annotations(meta: &Metadata, reproducible: bool) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();

    add_non_empty(&mut annotations, ANNOTATION_DESCRIPTION, &meta.description);
    add_non_empty(&mut annotations, ANNOTATION_TITLE, &meta.name);
    add_non_empty(&mut annotations, ANNOTATION_VERSION, &meta.version);
    add_non_empty(&mut annotations, ANNOTATION_URL, &meta.home);

    if !reproducible {
        annotations.insert(
            ANNOTATION_CREATED.to_string(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
    }

    if let Some(source) = meta.sources.first() {
        add_non_empty(&mut annotations, ANNOTATION_SOURCE, source);
    }

    if !meta.maintainers.is_empty() {
        let authors = meta
            .maintainers
            .iter()
            .map(|maintainer| {
                if maintainer.email.is_empty() {
                    maintainer.name.clone()
                } else {
                    format!("{} ({})", maintainer.name, maintainer.email)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        add_non_empty(&mut annotations, ANNOTATION_AUTHORS, &authors);
    }

    annotations
}

fn add_non_empty(annotations: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if !value.trim().is_empty() {
        annotations.insert(key.to_string(), value.to_string());
    }
}
