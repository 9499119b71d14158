//! Subcommand implementations

mod dump;
mod import;
mod info;

use crate::settings::Commands;
use mapsend_lib::MapError;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GPX parse error in {path}: {source}")]
    Gpx {
        path: String,
        source: gpx::errors::GpxError,
    },

    #[error("No tracks or waypoints found in the input files")]
    NothingToImport,
}

pub type Result<T> = std::result::Result<T, ToolError>;

pub fn run(command: Commands) -> Result<()> {
    // Profile the whole subcommand
    #[cfg(feature = "profiling")]
    profiling::scope!("commands::run");

    match command {
        Commands::Info { dir, filename } => info::run(&dir, &filename),
        Commands::Dump {
            dir,
            filename,
            limit,
        } => dump::run(&dir, &filename, limit),
        Commands::ImportGpx { gpx, out, layer } => import::run(gpx.as_slice(), &out, &layer.to_config()),
    }
}
