//! Command-line argument parsing

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{AuthConfig, DEFAULT_LISTEN_PORT, DEFAULT_TIMEOUT_SECS, RegistryConfig};

#[derive(Parser)]
#[command(name = "wasm-oci-distributor")]
#[command(about = "Distribute Proxy-WASM extensions through OCI-compliant registries")]
#[command(version, author)]
pub struct Cli {
    /// Enable verbose output
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Publish a WASM extension to an OCI registry
    ///
    /// The artifact is pushed to `<remote>/<name>:<version>`, both taken
    /// from the metadata file.
    #[command(visible_alias = "push")]
    Publish {
        /// Path to the extension binary
        wasm: PathBuf,

        /// Destination repository, e.g. oci://registry.io/extensions
        remote: String,

        /// Filename of the metadata file (Wasm.yaml) to use
        #[arg(long)]
        metadata: Option<PathBuf>,

        #[command(flatten)]
        registry: RegistryArgs,
    },

    /// Download a WASM extension from an OCI registry into a local
    /// directory
    #[command(visible_aliases = ["fetch", "pull"])]
    Download {
        /// Extension reference, e.g. oci://registry.io/ext/filter:1.0.0
        remote: String,

        /// Directory to download into
        #[arg(long, default_value = ".")]
        dest: PathBuf,

        /// Version or semver constraint to resolve; defaults to the
        /// reference's tag
        #[arg(long)]
        version: Option<String>,

        #[command(flatten)]
        registry: RegistryArgs,
    },

    /// Serve WASM extensions from OCI registries through HTTP
    #[command(visible_alias = "server")]
    Serve {
        /// Port to listen at
        #[arg(long, default_value_t = DEFAULT_LISTEN_PORT)]
        port: u16,

        #[command(flatten)]
        registry: RegistryArgs,
    },
}

#[derive(Args)]
pub struct RegistryArgs {
    /// Username for registry authentication
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Password for registry authentication
    #[arg(long, short = 'p')]
    pub password: Option<String>,

    /// PEM bundle with additional trusted CA certificates
    #[arg(long)]
    pub ca_file: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, short = 'k')]
    pub insecure: bool,

    /// Talk to the registry over plain HTTP
    #[arg(long)]
    pub plain_http: bool,

    /// Timeout for registry operations in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

impl RegistryArgs {
    pub fn to_config(&self) -> RegistryConfig {
        RegistryConfig {
            auth: AuthConfig {
                username: self.username.clone(),
                password: self.password.clone(),
            },
            ca_file: self.ca_file.clone(),
            insecure: self.insecure,
            plain_http: self.plain_http,
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_download() {
        let cli = Cli::parse_from([
            "wasm-oci-distributor",
            "download",
            "oci://registry.io/ext/filter:1.0.0",
            "--dest",
            "/tmp",
            "--plain-http",
        ]);
        match cli.command {
            Command::Download {
                remote,
                dest,
                registry,
                ..
            } => {
                assert_eq!(remote, "oci://registry.io/ext/filter:1.0.0");
                assert_eq!(dest, PathBuf::from("/tmp"));
                assert!(registry.plain_http);
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_registry_args_to_config() {
        let cli = Cli::parse_from([
            "wasm-oci-distributor",
            "serve",
            "--port",
            "17000",
            "-u",
            "user",
            "-p",
            "secret",
            "--timeout",
            "30",
        ]);
        match cli.command {
            Command::Serve { port, registry } => {
                assert_eq!(port, 17000);
                let config = registry.to_config();
                assert!(config.auth.has_credentials());
                assert_eq!(config.timeout, Duration::from_secs(30));
            }
            _ => panic!("expected serve command"),
        }
    }
}
