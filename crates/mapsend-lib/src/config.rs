//! Layer configuration

use crate::codec::Endian;
use crate::coords::DEFAULT_SCALE;
use geo::{Coord, coord};
use serde::{Deserialize, Serialize};

/// Where a writable layer keeps the records of its cells until it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CellStorage {
    /// Everything in memory
    #[default]
    InMemory,
    /// Encoded records spooled to an anonymous temporary file per cell.
    /// Requires the layer bbox up front and does not support updates.
    TempFile,
    /// One temporary keyed store per cell
    PerCellStore,
    /// One temporary keyed store shared by all cells of the layer
    SharedStore,
    /// Per-cell store for single-cell layers, shared store otherwise
    Auto,
}

/// Limits the level estimator must satisfy for every cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimatorLimits {
    /// Maximum number of elements in one cell
    pub max_cell_elements: usize,
    /// Maximum estimated encoded size of one cell, in bytes
    pub max_cell_data_size: f64,
    /// Deepest level to try
    pub max_levels: u32,
}

impl Default for EstimatorLimits {
    fn default() -> Self {
        Self {
            max_cell_elements: 2000,
            max_cell_data_size: 100_000.0,
            max_levels: 10,
        }
    }
}

/// Configuration for creating and opening layers.
///
/// Scale, reference point and byte order only apply to new layers; opened layers take
/// them from their files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Byte order of new layer files. Default: little endian
    pub endian: Endian,
    /// Size of one discrete unit in degrees. Default: 9e-6 on both axes
    pub scale: Coord<f64>,
    /// Reference point of the discrete grid. Default: (0, 0)
    pub refpoint: Coord<f64>,
    /// Cell storage used while writing
    pub storage: CellStorage,
    /// Number of unmodified cells kept decoded. Default: 32
    pub cell_cache_size: usize,
    pub estimator: EstimatorLimits,
    /// Also write a `.drc` copy of the cell index on close
    pub write_drc: bool,
    /// Category field of the layer header
    pub category: i32,
    /// File identifier; `None` uses 0xC000
    pub file_id: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            scale: coord! { x: DEFAULT_SCALE, y: DEFAULT_SCALE },
            refpoint: coord! { x: 0.0, y: 0.0 },
            storage: CellStorage::InMemory,
            cell_cache_size: 32,
            estimator: EstimatorLimits::default(),
            write_drc: false,
            category: 0,
            file_id: None,
        }
    }
}
