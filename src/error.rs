//! Error types for reference resolution, registry transfer, and download
//! operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DistributorError>;

#[derive(Error, Debug)]
pub enum DistributorError {
    /// The reference is missing its scheme or violates the registry grammar.
    #[error("invalid reference {reference:?}: {reason}")]
    InvalidReference { reference: String, reason: String },

    /// The requested version string is not a valid semver constraint.
    #[error("invalid version constraint {constraint:?}: {reason}")]
    InvalidVersionConstraint { constraint: String, reason: String },

    /// No tag satisfied the requested version or constraint.
    #[error("could not locate a version matching provided version string {0:?}")]
    NoMatchingVersion(String),

    /// A pulled artifact lacks a descriptor with a required media type.
    #[error("manifest does not contain a descriptor with media type {media_type}")]
    MalformedArtifact { media_type: String },

    /// A blob expected by the manifest could not be retrieved from the
    /// content store. Hard integrity failure, never retried.
    #[error("unable to retrieve blob with digest {digest}")]
    BlobRetrieval { digest: String },

    /// Network or registry failure passed through from the transport.
    #[error("registry transport error: {0}")]
    Transport(String),

    /// Metadata field violations.
    #[error("validation: {0}")]
    Validation(String),

    /// No artifact provider is registered for the reference scheme.
    #[error("no provider registered for scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("metadata file error: {0}")]
    MetadataFile(#[from] serde_yaml::Error),
}

impl DistributorError {
    pub fn invalid_reference(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        DistributorError::InvalidReference {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        DistributorError::Validation(message.into())
    }
}

impl From<reqwest::Error> for DistributorError {
    fn from(err: reqwest::Error) -> Self {
        DistributorError::Transport(err.to_string())
    }
}

impl From<url::ParseError> for DistributorError {
    fn from(err: url::ParseError) -> Self {
        DistributorError::Transport(err.to_string())
    }
}
