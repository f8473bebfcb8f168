//! Extension metadata: the structured record shipped as the artifact's
//! config blob. Models the contents of a `Wasm.yaml` file.

use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{DistributorError, Result};

/// A name and URL/email address combination for an extension maintainer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    /// User name or organization name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Optional email address to contact the named maintainer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Optional URL to an address for the named maintainer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl Maintainer {
    fn validate(&mut self) -> Result<()> {
        self.name = sanitize_string(&self.name);
        self.email = sanitize_string(&self.email);
        self.url = sanitize_string(&self.url);
        Ok(())
    }
}

/// Descriptive metadata for a WASM extension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// The name of the extension. Required.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// URL to a relevant project page, git repo, or contact person.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub home: String,
    /// URLs to the source code of this extension.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<String>,
    /// A SemVer 2 conformant version string. Required.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    /// A one-sentence description of the extension.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,
    /// URL to an icon file.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon: String,
    /// The API version of this extension. Required.
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    /// Condition to check to enable the extension.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub condition: String,
    /// Tags to check to enable the extension.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tags: String,
    /// Whether this extension is deprecated.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    /// Additional mappings made available for inspection by other
    /// applications.
    #[serde(default, skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub annotations: std::collections::BTreeMap<String, String>,
    /// The extension type.
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub extension_type: String,
}

impl Metadata {
    /// Load metadata from a YAML or JSON file, selected by extension.
    pub fn from_file(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension {
            "yaml" | "yml" => {
                let data = std::fs::read(path)?;
                Ok(serde_yaml::from_slice(&data)?)
            }
            "json" => {
                let data = std::fs::read(path)?;
                Ok(serde_json::from_slice(&data)?)
            }
            _ => Err(DistributorError::validation("unsupported file extension")),
        }
    }

    /// Check the metadata for known issues and sanitize string fields.
    ///
    /// Sanitization runs before the required-field checks so validation
    /// operates on the values that will actually be serialized.
    pub fn validate(&mut self) -> Result<()> {
        self.name = sanitize_string(&self.name);
        self.description = sanitize_string(&self.description);
        self.home = sanitize_string(&self.home);
        self.icon = sanitize_string(&self.icon);
        self.condition = sanitize_string(&self.condition);
        self.tags = sanitize_string(&self.tags);
        for source in &mut self.sources {
            *source = sanitize_string(source);
        }
        for keyword in &mut self.keywords {
            *keyword = sanitize_string(keyword);
        }

        if self.api_version.is_empty() {
            return Err(DistributorError::validation("'apiVersion' is required"));
        }
        if self.name.is_empty() {
            return Err(DistributorError::validation("'name' is required"));
        }
        if self.version.is_empty() {
            return Err(DistributorError::validation("'version' is required"));
        }
        if Version::parse(&self.version).is_err() {
            return Err(DistributorError::Validation(format!(
                "'version' {:?} is invalid",
                self.version
            )));
        }
        if !is_valid_extension_type(&self.extension_type) {
            return Err(DistributorError::Validation(format!(
                "'type' {:?} is invalid",
                self.extension_type
            )));
        }

        for maintainer in &mut self.maintainers {
            maintainer.validate()?;
        }

        Ok(())
    }
}

fn is_valid_extension_type(extension_type: &str) -> bool {
    matches!(extension_type, "" | "authn" | "authz")
}

/// Normalize whitespace to single spaces and drop non-printable
/// characters.
fn sanitize_string(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if c.is_control() {
                None
            } else {
                Some(c)
            }
        })
        .collect()
}
