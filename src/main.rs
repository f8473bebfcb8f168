use clap::Parser;

use wasm_oci_distributor::GlobalSettings;
use wasm_oci_distributor::cli::{self, Cli};
use wasm_oci_distributor::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = GlobalSettings::from_env();
    logging::init(cli.debug || settings.debug);
    cli::run(cli).await
}
