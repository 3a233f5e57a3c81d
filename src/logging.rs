use std::io;

use color_eyre::eyre::{Result, eyre};
use tracing::Level;

/// Installs the global tracing subscriber. Output goes to stderr so stdout
/// carries only snapshot output.
pub fn init_tracing(level: Level, json: bool) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr);

    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}
