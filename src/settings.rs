use clap::{Args, Parser, Subcommand, ValueEnum};
use mapsend_lib::{CellStorage, Config, Endian, EstimatorLimits};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
/// MapSend Tool - Inspect, dump and build MapSend GPS map layer files
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the header summary of a layer and check its consistency
    Info {
        /// Directory holding the layer files
        dir: PathBuf,
        /// Layer filename without extension
        filename: String,
    },
    /// List every element of a layer with its cell reference
    Dump {
        dir: PathBuf,
        filename: String,
        /// Stop after this many elements
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Build a polyline layer from GPX tracks and a point layer from GPX waypoints
    ImportGpx {
        /// GPX files to read
        #[arg(required = true)]
        gpx: Vec<PathBuf>,
        /// Output directory
        #[arg(long)]
        out: PathBuf,
        #[command(flatten)]
        layer: LayerArgs,
    },
}

/// Options applied to newly written layers
#[derive(Args, Debug, Clone)]
pub struct LayerArgs {
    /// Write big endian `.yal`/`.tlc` files instead of `.lay`/`.clt`
    #[arg(long)]
    pub big_endian: bool,
    /// Also write the `.drc` index copy
    #[arg(long)]
    pub drc: bool,
    /// Where cells are kept while the layer is written
    #[arg(long, value_enum, default_value_t = StorageArg::InMemory)]
    pub storage: StorageArg,
    /// Maximum number of elements in one cell
    #[arg(long, default_value_t = EstimatorLimits::default().max_cell_elements)]
    pub max_cell_elements: usize,
    /// Deepest quadtree level the estimator may choose
    #[arg(long, default_value_t = EstimatorLimits::default().max_levels)]
    pub max_levels: u32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageArg {
    InMemory,
    TempFile,
    PerCell,
    Shared,
    Auto,
}

impl From<StorageArg> for CellStorage {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::InMemory => CellStorage::InMemory,
            StorageArg::TempFile => CellStorage::TempFile,
            StorageArg::PerCell => CellStorage::PerCellStore,
            StorageArg::Shared => CellStorage::SharedStore,
            StorageArg::Auto => CellStorage::Auto,
        }
    }
}

impl LayerArgs {
    pub fn to_config(&self) -> Config {
        let defaults = Config::default();
        Config {
            endian: if self.big_endian {
                Endian::Big
            } else {
                Endian::Little
            },
            storage: self.storage.into(),
            write_drc: self.drc,
            estimator: EstimatorLimits {
                max_cell_elements: self.max_cell_elements,
                max_levels: self.max_levels,
                ..defaults.estimator
            },
            ..defaults
        }
    }
}
