//! Command dispatch: translates parsed arguments into the publish,
//! download, and serve actions.

use std::sync::Arc;

use anyhow::Context;

use crate::cli::args::{Cli, Command};
use crate::config::GlobalSettings;
use crate::download::{DownloadCoordinator, Downloader, version_from_reference};
use crate::output::OutputManager;
use crate::publish::{Publisher, guess_metadata_path};
use crate::server;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli { debug, command } = cli;
    let output = OutputManager::new(debug);

    match command {
        Command::Publish {
            wasm,
            remote,
            metadata,
            registry,
        } => {
            let metadata_path = match metadata {
                Some(path) => path,
                None => guess_metadata_path(&wasm).with_context(|| {
                    format!("no metadata file (Wasm.yaml) found for {}", wasm.display())
                })?,
            };

            let publisher = Publisher::new(&registry.to_config())?;
            let result = publisher.run(&wasm, &metadata_path, &remote).await?;

            output.success(&format!("Pushed: {}", result.reference));
            output.info(&format!("Digest: {}", result.manifest.digest));
            output.detail(&format!(
                "config {} ({}), wasm {} ({})",
                result.config.digest,
                output.format_size(result.config.size as u64),
                result.extension.digest,
                output.format_size(result.extension.size as u64)
            ));
            Ok(())
        }

        Command::Download {
            remote,
            dest,
            version,
            registry,
        } => {
            let version = version.unwrap_or_else(|| version_from_reference(&remote));
            let downloader = Downloader::new(&registry.to_config())?;
            let saved = downloader.download_to(&remote, &version, &dest).await?;

            output.success(&format!("File downloaded to {}", saved.display()));
            output.detail(&format!(
                "the server serves this as GET {}?ref={}",
                server::WASM_DOWNLOAD_PATH,
                remote
            ));
            Ok(())
        }

        Command::Serve { port, registry } => {
            let mut settings = GlobalSettings::from_env();
            settings.listen_port = port;

            let downloader = Downloader::new(&registry.to_config())?;
            let coordinator = Arc::new(DownloadCoordinator::new(downloader));
            server::serve(&settings, coordinator).await?;
            Ok(())
        }
    }
}
