//! Configuration values for the CLI, server, and registry transport.
//!
//! Everything here is plain immutable data passed explicitly to
//! constructors. Environment variables (`WOD_*`) provide defaults for the
//! global settings; command-line flags override them.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default port for the HTTP download bridge.
pub const DEFAULT_LISTEN_PORT: u16 = 15111;

/// Default timeout applied to registry transport operations.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Process-wide settings derived from the environment.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    /// Enable verbose diagnostics.
    pub debug: bool,
    /// Port the download bridge listens on.
    pub listen_port: u16,
}

impl GlobalSettings {
    pub fn from_env() -> Self {
        Self {
            debug: env_bool_or("WOD_DEBUG", false),
            listen_port: env_u16_or("WOD_PORT", DEFAULT_LISTEN_PORT),
        }
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            debug: false,
            listen_port: DEFAULT_LISTEN_PORT,
        }
    }
}

/// Credentials for registry authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthConfig {
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Connection parameters for a registry transport.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub auth: AuthConfig,
    /// PEM bundle with additional trusted CA certificates.
    pub ca_file: Option<PathBuf>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Talk to the registry over plain HTTP instead of HTTPS.
    pub plain_http: bool,
    /// Deadline for individual transport operations.
    pub timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            auth: AuthConfig::default(),
            ca_file: None,
            insecure: false,
            plain_http: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_bool_or(name: &str, default: bool) -> bool {
    env_or(name, &default.to_string())
        .parse()
        .unwrap_or(default)
}

fn env_u16_or(name: &str, default: u16) -> u16 {
    env_or(name, &default.to_string())
        .parse()
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_settings_defaults() {
        let settings = GlobalSettings::default();
        assert!(!settings.debug);
        assert_eq!(settings.listen_port, DEFAULT_LISTEN_PORT);
    }

    #[test]
    fn test_auth_config_credentials() {
        let anonymous = AuthConfig::default();
        assert!(!anonymous.has_credentials());

        let basic = AuthConfig {
            username: Some("user".to_string()),
            password: Some("secret".to_string()),
        };
        assert!(basic.has_credentials());
    }
}
