//! Tracing subscriber setup shared by the CLI and the server.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `WOD_LOG` (or the standard `RUST_LOG`) overrides the level; `debug`
/// raises the default from `info` to `debug`.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = std::env::var("WOD_LOG")
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
