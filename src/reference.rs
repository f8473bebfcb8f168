//! Artifact reference parsing and normalization.
//!
//! A reference names one version of an extension inside a registry:
//! `oci://registry.example.com/path/to/extension:1.0.0`. Registry tag
//! grammar forbids the `+` used by semver build metadata, so a `+` in the
//! tag is substituted with `_` before transmission. The substitution is
//! one-directional on write; [`decode_tag`] restores the original form
//! whenever a tag is read back for version comparison.

use std::fmt;

use crate::error::{DistributorError, Result};

/// URL scheme for OCI-based references.
pub const OCI_SCHEME: &str = "oci";

/// Maximum length the registry grammar allows for a tag.
const MAX_TAG_LENGTH: usize = 128;

/// Whether a URL is to be treated as an OCI reference.
pub fn is_oci(url: &str) -> bool {
    url.starts_with(&format!("{}://", OCI_SCHEME))
}

/// Substitute `+` with `_` so a semver tag fits the registry grammar.
pub fn encode_tag(tag: &str) -> String {
    tag.replace('+', "_")
}

/// Restore `+` from the `_` substitution applied on write.
pub fn decode_tag(tag: &str) -> String {
    tag.replace('_', "+")
}

/// A parsed `{registry, repository, tag}` triple.
///
/// The tag is stored in its registry-encoded form (`_` in place of `+`).
/// An empty tag means the reference does not pin a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl Reference {
    /// Parse a scheme-qualified reference string.
    ///
    /// The trailing `:` segment is treated as a tag only when it contains
    /// no `/`, which keeps `host:port` prefixes intact. A `+` inside the
    /// tag is substituted with `_` before the grammar check.
    pub fn parse(raw: &str) -> Result<Self> {
        let scheme_prefix = format!("{}://", OCI_SCHEME);
        let rest = raw.strip_prefix(&scheme_prefix).ok_or_else(|| {
            DistributorError::invalid_reference(raw, format!("missing {scheme_prefix} scheme prefix"))
        })?;
        let rest = substitute_tag(rest);

        let (registry, remainder) = rest
            .split_once('/')
            .ok_or_else(|| DistributorError::invalid_reference(raw, "missing repository path"))?;

        let (repository, tag) = match remainder.rsplit_once(':') {
            Some((repository, tag)) if !tag.contains('/') => (repository, tag),
            _ => (remainder, ""),
        };

        validate_registry(raw, registry)?;
        validate_repository(raw, repository)?;
        if !tag.is_empty() {
            validate_tag(raw, tag)?;
        }

        Ok(Self {
            registry: registry.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        })
    }

    /// Last path segment of the repository.
    pub fn repository_basename(&self) -> &str {
        self.repository.rsplit('/').next().unwrap_or(&self.repository)
    }

    /// The scheme-qualified URL form of this reference.
    pub fn url(&self) -> String {
        format!("{}://{}", OCI_SCHEME, self)
    }

    /// Copy of this reference pointing at a different tag.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: encode_tag(tag),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}/{}", self.registry, self.repository)
        } else {
            write!(f, "{}/{}:{}", self.registry, self.repository, self.tag)
        }
    }
}

/// Replace `+` with `_` in the trailing tag segment, if one is present.
///
/// The whole string cannot be substituted blindly: `+` is only invalid
/// inside the tag, and a final `:` segment containing `/` is a host:port
/// boundary rather than a tag.
fn substitute_tag(raw: &str) -> String {
    match raw.rsplit_once(':') {
        Some((head, tail)) if !tail.is_empty() && !tail.contains('/') => {
            format!("{}:{}", head, encode_tag(tail))
        }
        _ => raw.to_string(),
    }
}

fn validate_registry(raw: &str, registry: &str) -> Result<()> {
    if registry.is_empty() {
        return Err(DistributorError::invalid_reference(raw, "empty registry host"));
    }
    let (host, port) = match registry.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };
    if host.is_empty()
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
    {
        return Err(DistributorError::invalid_reference(raw, "invalid registry host"));
    }
    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(DistributorError::invalid_reference(raw, "invalid registry port"));
        }
    }
    Ok(())
}

fn validate_repository(raw: &str, repository: &str) -> Result<()> {
    if repository.is_empty() {
        return Err(DistributorError::invalid_reference(raw, "empty repository path"));
    }
    let valid = repository.split('/').all(|segment| {
        !segment.is_empty()
            && segment
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
    });
    if !valid {
        return Err(DistributorError::invalid_reference(raw, "invalid repository path"));
    }
    Ok(())
}

fn validate_tag(raw: &str, tag: &str) -> Result<()> {
    if tag.len() > MAX_TAG_LENGTH {
        return Err(DistributorError::invalid_reference(raw, "tag exceeds maximum length"));
    }
    let mut chars = tag.chars();
    let first_valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
    if !first_valid || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')) {
        return Err(DistributorError::invalid_reference(raw, "invalid tag"));
    }
    Ok(())
}
