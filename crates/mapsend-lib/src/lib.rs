//! MapSend Library - Layer Storage for MapSend GPS Map Files
//!
//! This library reads and writes the layer files used by MapSend-class GPS devices. A layer
//! holds geometry of one kind (points, areas, polylines, POIs, labels or routing edges) split
//! into cells of an implicit quadtree with a staggered overlay grid, and every record inside a
//! cell is stored with a compact cell-relative binary encoding.
//!
//! # Architecture
//!
//! - **[`coords`]**: Float <-> discrete conversions and rectangle helpers
//! - **[`quadtree`]**: Cell numbering, cell extents and "deepest cell containing a box"
//! - **[`Element`]**: Closed set of geometry records stored in a layer
//! - **[`codec`]**: Byte-level record and cell-block encoding
//! - **[`Cell`]**: Ordered record container with pluggable storage strategies
//! - **[`Layer`]**: File pair orchestration, caching, level estimation and optimisation
//!
//! # Coordinates
//!
//! Records are handed to the library as geographic `(lon, lat)` coordinates. Internally the
//! Y axis is negated (north-up screen space) and discretised with the layer scale, and every
//! vertex is finally expressed relative to the minimum corner of its cell.

pub mod cell;
pub mod codec;
mod config;
pub mod coords;
mod element;
pub mod external;
pub mod layer;
pub mod quadtree;

// Public API exports
pub use cell::{Cell, CellStore};
pub use codec::Endian;
pub use config::{CellStorage, Config, EstimatorLimits};
pub use coords::{CoordinateSystem, RectExt};
pub use element::{
    AreaElement, CornerData, Element, LabelElement, LayerType, PoiElement, PointElement,
    PolylineElement, RoutingEdge, SegmentClass, TextSlot,
};
pub use external::{BlockUnpacker, MemoryTextTable, TextTable};
pub use layer::{CellRef, Layer, LayerMode, RemapTable};

/// Error types for the layer library
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cell store error: {0}")]
    Store(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unexpected end of record data: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Cell {cellnum} block requires external decompression (skip count {skip})")]
    CompressedBlock { cellnum: u32, skip: u16 },

    #[error("Element of kind {found:?} cannot be stored in a {expected:?} layer")]
    ElementTypeMismatch { expected: LayerType, found: LayerType },

    #[error("Coordinate value {0} exceeds the 32-bit encodable range")]
    CoordinateOverflow(i64),

    #[error("Coordinate value {0} is negative relative to its cell")]
    NegativeCoordinate(i64),

    #[error("Unrecognized sub-polygon type {0}")]
    UnknownPolyType(u8),

    #[error("Unrecognized routing point corner code {0}")]
    UnknownCornerCode(u8),

    #[error("Invalid record size field {0}")]
    InvalidRecordSize(u16),

    #[error("{0} unexpected trailing bytes in text slot")]
    ExcessData(usize),

    #[error("Too many vertices for a single chain: {0}")]
    TooManyVertices(usize),

    #[error("Invalid layer header: {0}")]
    InvalidHeader(String),

    #[error("Invalid cell index: {0}")]
    InvalidIndex(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Operation not supported: {0}")]
    UnsupportedOperation(&'static str),

    #[error("{0} has no bounding box")]
    MissingBoundingBox(String),

    #[error("Text slot {offset:#04x}:{index:#x} is not addressable")]
    InvalidTextSlot { offset: u8, index: u32 },

    #[error("Element with discrete box {bbox:?} lies outside the box of layer {layer}")]
    OutsideLayer { layer: String, bbox: geo::Rect<i64> },

    #[error("Layer {0} is opened read-only")]
    ReadOnly(String),

    #[error("Invalid layer filename {0:?}: at most 8 characters are allowed")]
    InvalidFilename(String),

    #[error("Could not determine level count for layer {layer} within {max_levels} levels")]
    LevelCountNotFound { layer: String, max_levels: u32 },

    #[error("Element {index} not found in cell {cellnum} of layer {layer}")]
    ElementNotFound {
        layer: String,
        cellnum: u32,
        index: usize,
    },

    #[error("Index {index} out of range for cell with {len} elements")]
    IndexOutOfRange { index: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, MapError>;
