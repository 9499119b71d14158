//! Layer - One typed layer file pair
//!
//! A layer owns the coordinate system, the cell index and the cells themselves. Cells are
//! kept in two separate maps:
//!
//! - `modified`: every cell that was written to since the layer was opened. These are the
//!   authoritative copies and stay resident until [`Layer::close`] flushes them.
//! - `cache`: a bounded LRU of clean cells decoded from the data file. A cell is moved out of
//!   the cache into `modified` before it is changed, so it never lives in both.

mod estimator;
pub mod header;
pub mod index;

use crate::cell::{Cell, CellStore, InMemoryStore, KeyedStore, TempFileStore};
use crate::codec::{CellFrame, Endian};
use crate::config::{CellStorage, Config};
use crate::coords::{CoordinateSystem, RectExt};
use crate::element::{Element, LayerType};
use crate::external::BlockUnpacker;
use crate::quadtree::{MAX_LEVEL, calc_cell_extents, cell_for_discrete_bbox};
use crate::{MapError, Result};
use estimator::Estimator;
use geo::{Rect, coord};
use header::{DEFAULT_FILE_ID, HEADER_SIZE, LayerHeader};
use index::{CellIndex, Span};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Longest allowed layer filename, without extension
pub const MAX_FILENAME_LEN: usize = 8;

/// Stable reference to a record: cell number and position inside the cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CellRef {
    pub cellnum: u32,
    pub index: usize,
}

impl CellRef {
    pub fn new(cellnum: u32, index: usize) -> Self {
        Self { cellnum, index }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.cellnum, self.index)
    }
}

/// Old reference to new reference, for every record moved by a re-bucketing pass
pub type RemapTable = BTreeMap<CellRef, CellRef>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerMode {
    Read,
    Write,
    Append,
}

fn validate_filename(filename: &str) -> Result<()> {
    let len = filename.chars().count();
    if len == 0 || len > MAX_FILENAME_LEN {
        return Err(MapError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

fn not_found(layer: &str, cellref: CellRef) -> MapError {
    MapError::ElementNotFound {
        layer: layer.to_string(),
        cellnum: cellref.cellnum,
        index: cellref.index,
    }
}

/// Map lookup failures of a cell into errors naming the layer
fn in_layer(layer: &str, cellref: CellRef, err: MapError) -> MapError {
    match err {
        MapError::IndexOutOfRange { .. } => not_found(layer, cellref),
        other => other,
    }
}

fn zero_rect<T: geo::CoordNum>() -> Rect<T> {
    let zero = coord! { x: T::zero(), y: T::zero() };
    Rect::new(zero, zero)
}

/// Open data file and byte order, trying the little endian name first.
fn open_detecting_endian(dir: &Path, filename: &str) -> Result<(File, Endian)> {
    let path = |e: Endian| dir.join(format!("{filename}.{}", e.data_extension()));
    match File::open(path(Endian::Little)) {
        Ok(file) => Ok((file, Endian::Little)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Ok((File::open(path(Endian::Big))?, Endian::Big))
        }
        Err(e) => Err(e.into()),
    }
}

/// A layer opened for reading, writing or appending.
pub struct Layer {
    name: String,
    filename: String,
    dir: PathBuf,
    kind: LayerType,
    mode: LayerMode,
    endian: Endian,
    coords: CoordinateSystem,
    /// Continuous box in the Y-negated space, as stored in the header
    bbox: Option<Rect<f64>>,
    dbbox: Option<Rect<i64>>,
    nlevels: u32,
    nobjects: u32,
    category: i32,
    file_id: Option<u16>,
    /// Data file the index points into
    source: Option<File>,
    index: CellIndex,
    cellnumbers: BTreeSet<u32>,
    modified: BTreeMap<u32, Cell>,
    cache: LruCache<u32, Cell>,
    estimator: Option<Estimator>,
    shared_db: Option<sled::Db>,
    unpacker: Option<Box<dyn BlockUnpacker>>,
    config: Config,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Layer {
    fn empty(dir: &Path, filename: &str, kind: LayerType, mode: LayerMode, config: Config) -> Self {
        let cache_size = NonZeroUsize::new(config.cell_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            name: filename.to_string(),
            filename: filename.to_string(),
            dir: dir.to_path_buf(),
            kind,
            mode,
            endian: config.endian,
            coords: CoordinateSystem::new(config.refpoint, config.scale),
            bbox: None,
            dbbox: None,
            nlevels: 0,
            nobjects: 0,
            category: config.category,
            file_id: config.file_id,
            source: None,
            index: CellIndex::new(),
            cellnumbers: BTreeSet::new(),
            modified: BTreeMap::new(),
            cache: LruCache::new(cache_size),
            estimator: None,
            shared_db: None,
            unpacker: None,
            config,
        }
    }

    /// Start a new layer in write mode.
    ///
    /// Without a bounding box every element goes to cell 1 and the box and level count
    /// are estimated by [`Layer::optimize`], at the latest when the layer is closed.
    pub fn create(
        dir: impl AsRef<Path>,
        name: &str,
        filename: &str,
        kind: LayerType,
        bbox: Option<Rect<f64>>,
        config: Config,
    ) -> Result<Self> {
        validate_filename(filename)?;
        let mut layer = Self::empty(dir.as_ref(), filename, kind, LayerMode::Write, config);
        layer.name = name.to_string();
        match bbox {
            Some(rect) => {
                let dbbox = layer.coords.rect_to_discrete(rect);
                layer.fix_bbox(dbbox);
            }
            None => layer.estimator = Some(Estimator::new(layer.config.estimator)),
        }
        tracing::debug!(
            "Created {} layer {} ({})",
            kind.name(),
            layer.name,
            layer.filename
        );
        Ok(layer)
    }

    /// Open an existing layer for reading or appending.
    pub fn open(
        dir: impl AsRef<Path>,
        filename: &str,
        mode: LayerMode,
        config: Config,
    ) -> Result<Self> {
        validate_filename(filename)?;
        if mode == LayerMode::Write {
            return Err(MapError::UnsupportedOperation(
                "opening in write mode, use Layer::create",
            ));
        }
        let dir = dir.as_ref();
        let (mut source, endian) = open_detecting_endian(dir, filename)?;
        let mut raw = Vec::with_capacity(HEADER_SIZE);
        std::io::Read::by_ref(&mut source).take(HEADER_SIZE as u64).read_to_end(&mut raw)?;
        let header = LayerHeader::decode(&raw, endian)?;
        let index_path = dir.join(format!("{filename}.{}", endian.index_extension()));
        let index = index::decode(&fs::read(index_path)?, endian)?;

        let mut layer = Self::empty(dir, filename, header.kind, mode, config);
        layer.endian = endian;
        layer.coords = CoordinateSystem::new(header.refpoint, header.scale);
        layer.bbox = Some(header.bbox);
        layer.dbbox = Some(header.dbbox);
        layer.nlevels = header.nlevels;
        layer.nobjects = header.nobjects;
        layer.category = header.category;
        layer.file_id = Some(header.file_id);
        layer.cellnumbers = index.keys().copied().collect();
        layer.index = index;
        layer.source = Some(source);
        tracing::debug!(
            "Opened {} layer {} with {} cells",
            layer.kind.name(),
            filename,
            layer.cellnumbers.len()
        );
        Ok(layer)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> LayerType {
        self.kind
    }

    pub fn mode(&self) -> LayerMode {
        self.mode
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn coords(&self) -> &CoordinateSystem {
        &self.coords
    }

    pub fn nlevels(&self) -> u32 {
        self.nlevels
    }

    pub fn nobjects(&self) -> u32 {
        self.nobjects
    }

    pub fn ncells(&self) -> usize {
        self.cellnumbers.len()
    }

    /// Populated cell numbers in ascending order
    pub fn cell_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.cellnumbers.iter().copied()
    }

    /// Geographic layer box, `None` while it is deferred
    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.dbbox.map(|d| self.coords.rect_to_geographic(d))
    }

    pub fn dbbox(&self) -> Option<Rect<i64>> {
        self.dbbox
    }

    pub fn category(&self) -> i32 {
        self.category
    }

    pub fn file_id(&self) -> u16 {
        self.file_id.unwrap_or(DEFAULT_FILE_ID)
    }

    /// Set the level count of an empty writable layer.
    pub fn set_nlevels(&mut self, nlevels: u32) -> Result<()> {
        self.check_writable()?;
        if nlevels > MAX_LEVEL {
            return Err(MapError::UnsupportedOperation("level counts above 15"));
        }
        if !self.cellnumbers.is_empty() {
            return Err(MapError::UnsupportedOperation(
                "changing the level count of a populated layer",
            ));
        }
        self.nlevels = nlevels;
        Ok(())
    }

    /// Route raw cell blocks through `unpacker` before parsing them.
    pub fn set_unpacker(&mut self, unpacker: Box<dyn BlockUnpacker>) {
        self.unpacker = Some(unpacker);
        // Cached cells were decoded without it
        self.cache.clear();
    }

    pub fn is_packed(&self) -> bool {
        self.unpacker.is_some()
    }

    fn check_writable(&self) -> Result<()> {
        match self.mode {
            LayerMode::Read => Err(MapError::ReadOnly(self.name.clone())),
            LayerMode::Write | LayerMode::Append => Ok(()),
        }
    }

    fn check_kind(&self, element: &Element) -> Result<()> {
        if element.kind() == self.kind {
            Ok(())
        } else {
            Err(MapError::ElementTypeMismatch {
                expected: self.kind,
                found: element.kind(),
            })
        }
    }

    fn data_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.filename, self.endian.data_extension()))
    }

    fn index_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.filename, self.endian.index_extension()))
    }

    fn frame(&self, cellnum: u32) -> Option<CellFrame> {
        self.dbbox
            .map(|d| CellFrame::new(calc_cell_extents(d, cellnum), self.coords, self.endian))
    }

    /// Fix the discrete layer box and re-frame the resident cells.
    fn fix_bbox(&mut self, dbbox: Rect<i64>) {
        self.dbbox = Some(dbbox);
        self.bbox = Some(self.coords.rect_to_internal(dbbox));
        let frames: Vec<(u32, Option<CellFrame>)> =
            self.modified.keys().map(|&n| (n, self.frame(n))).collect();
        for (cellnum, frame) in frames {
            if let (Some(cell), Some(frame)) = (self.modified.get_mut(&cellnum), frame) {
                cell.set_frame(frame);
            }
        }
    }

    fn shared_db(&mut self) -> Result<sled::Db> {
        if let Some(db) = &self.shared_db {
            return Ok(db.clone());
        }
        let db = sled::Config::new().temporary(true).open()?;
        self.shared_db = Some(db.clone());
        Ok(db)
    }

    fn new_cell(&mut self, cellnum: u32) -> Result<Cell> {
        let frame = self.frame(cellnum);
        let storage = match (self.mode, self.config.storage) {
            (LayerMode::Read, _) => CellStorage::InMemory,
            (_, CellStorage::Auto) if self.nlevels == 0 => CellStorage::PerCellStore,
            (_, CellStorage::Auto) => CellStorage::SharedStore,
            (_, storage) => storage,
        };
        let store: Box<dyn CellStore> = match (storage, frame) {
            (CellStorage::TempFile, Some(frame)) => Box::new(TempFileStore::new(frame, self.kind)?),
            (CellStorage::TempFile, None) => {
                tracing::debug!("Cell {cellnum} of {} kept in memory until the layer box is known", self.name);
                Box::new(InMemoryStore::new())
            }
            (CellStorage::PerCellStore, _) => Box::new(KeyedStore::per_cell()?),
            (CellStorage::SharedStore, _) => Box::new(KeyedStore::shared(self.shared_db()?, cellnum)),
            (CellStorage::InMemory | CellStorage::Auto, _) => Box::new(InMemoryStore::new()),
        };
        Ok(Cell::new(cellnum, self.kind, frame, store))
    }

    fn read_span(&self, span: Span) -> Result<Vec<u8>> {
        let mut file = self
            .source
            .as_ref()
            .ok_or_else(|| MapError::InvalidIndex(format!("layer {} has no data file", self.name)))?;
        file.seek(SeekFrom::Start(span.offset as u64))?;
        let mut data = vec![0; span.length as usize];
        file.read_exact(&mut data)?;
        Ok(data)
    }

    fn load_cell(&mut self, cellnum: u32) -> Result<Cell> {
        let mut cell = self.new_cell(cellnum)?;
        if let Some(span) = self.index.get(&cellnum).copied() {
            let raw = self.read_span(span)?;
            let data = match &self.unpacker {
                Some(unpacker) => unpacker.unpack(cellnum, &raw)?,
                None => raw,
            };
            cell.deserialize(&data)?;
        }
        Ok(cell)
    }

    /// Cell for reading: the modified copy if any, otherwise a cached decode.
    fn cell_mut(&mut self, cellnum: u32) -> Result<&mut Cell> {
        if self.modified.contains_key(&cellnum) {
            return self
                .modified
                .get_mut(&cellnum)
                .ok_or_else(|| MapError::InvalidIndex(format!("cell {cellnum} vanished")));
        }
        if !self.cache.contains(&cellnum) {
            let cell = self.load_cell(cellnum)?;
            self.cache.put(cellnum, cell);
        }
        self.cache
            .get_mut(&cellnum)
            .ok_or_else(|| MapError::InvalidIndex(format!("cell {cellnum} vanished")))
    }

    /// Cell for writing, moved out of the cache into the modified map.
    fn modified_cell(&mut self, cellnum: u32) -> Result<&mut Cell> {
        if !self.modified.contains_key(&cellnum) {
            let cell = match self.cache.pop(&cellnum) {
                Some(cell) => cell,
                None => self.load_cell(cellnum)?,
            };
            self.modified.insert(cellnum, cell);
        }
        self.modified
            .get_mut(&cellnum)
            .ok_or_else(|| MapError::InvalidIndex(format!("cell {cellnum} vanished")))
    }

    fn clear_cells(&mut self) {
        self.modified.clear();
        self.cache.clear();
        self.cellnumbers.clear();
        self.index.clear();
    }

    /// Discrete box of an element, which must lie within `dbbox`.
    fn inside(&self, element: &Element, dbbox: Rect<i64>) -> Result<Rect<i64>> {
        let bbox = element.discrete_bbox(&self.coords)?;
        if !bbox.is_covered_by(&dbbox, 0) {
            return Err(MapError::OutsideLayer {
                layer: self.name.clone(),
                bbox,
            });
        }
        Ok(bbox)
    }

    /// Store an element in its cell without touching the object count.
    fn place(&mut self, element: Element) -> Result<CellRef> {
        let cellnum = match self.dbbox {
            Some(dbbox) => {
                let bbox = self.inside(&element, dbbox)?;
                cell_for_discrete_bbox(dbbox, bbox, self.nlevels)
            }
            None => {
                if self.nlevels > 0 {
                    return Err(MapError::MissingBoundingBox(format!("layer {}", self.name)));
                }
                let estimator = self
                    .estimator
                    .get_or_insert_with(|| Estimator::new(self.config.estimator));
                estimator.add(&element, &self.coords)?;
                1
            }
        };
        let index = self.modified_cell(cellnum)?.append(element)?;
        self.cellnumbers.insert(cellnum);
        Ok(CellRef::new(cellnum, index))
    }

    /// Add an element and return its reference.
    pub fn add_element(&mut self, element: Element) -> Result<CellRef> {
        self.check_writable()?;
        self.check_kind(&element)?;
        let cellref = self.place(element)?;
        self.nobjects += 1;
        Ok(cellref)
    }

    /// Copy of the element at `cellref`.
    pub fn get_element(&mut self, cellref: CellRef) -> Result<Element> {
        if !self.cellnumbers.contains(&cellref.cellnum) {
            return Err(not_found(&self.name, cellref));
        }
        let result = self.cell_mut(cellref.cellnum)?.get(cellref.index);
        result.map_err(|e| in_layer(&self.name, cellref, e))
    }

    /// Replace the element at `cellref`; the cell is written back on close.
    pub fn update_element(&mut self, cellref: CellRef, element: Element) -> Result<()> {
        self.check_writable()?;
        self.check_kind(&element)?;
        if !self.cellnumbers.contains(&cellref.cellnum) {
            return Err(not_found(&self.name, cellref));
        }
        let result = self
            .modified_cell(cellref.cellnum)?
            .update(cellref.index, element);
        result.map_err(|e| in_layer(&self.name, cellref, e))
    }

    /// Every element with its reference, in ascending cell order.
    pub fn elements_and_refs(&mut self) -> Result<Vec<(CellRef, Element)>> {
        let cellnumbers: Vec<u32> = self.cellnumbers.iter().copied().collect();
        let mut out = Vec::with_capacity(self.nobjects as usize);
        for cellnum in cellnumbers {
            let elements = self.cell_mut(cellnum)?.elements()?;
            out.extend(
                elements
                    .into_iter()
                    .enumerate()
                    .map(|(index, e)| (CellRef::new(cellnum, index), e)),
            );
        }
        Ok(out)
    }

    /// Estimate the layer box and level count of a layer created without a box, then move
    /// every element from cell 1 to its final cell.
    ///
    /// Returns the old to new reference of every element. Layers whose box is already
    /// fixed are left untouched and yield an empty table.
    pub fn optimize(&mut self) -> Result<RemapTable> {
        // Profile estimation plus re-bucketing
        #[cfg(feature = "profiling")]
        profiling::scope!("layer::optimize");

        let mut remap = RemapTable::new();
        if self.mode != LayerMode::Write || self.dbbox.is_some() {
            return Ok(remap);
        }
        let Some(estimator) = self.estimator.as_ref() else {
            return Ok(remap);
        };
        let Some(dbbox) = estimator.dbbox() else {
            return Ok(remap);
        };
        tracing::debug!("Optimizing layer {} with {} elements", self.name, estimator.len());
        let nlevels = estimator.calculate_nlevels(dbbox, &self.name)?;
        self.estimator = None;
        self.nlevels = nlevels;
        self.fix_bbox(dbbox);

        if nlevels == 0 {
            let count = self.modified.get(&1).map_or(0, Cell::len);
            remap.extend((0..count).map(|i| (CellRef::new(1, i), CellRef::new(1, i))));
            return Ok(remap);
        }

        let Some(mut old) = self.modified.remove(&1) else {
            return Ok(remap);
        };
        // Pop from the end so the remaining indices stay valid
        let mut drained = Vec::with_capacity(old.len());
        for index in (0..old.len()).rev() {
            drained.push((index, old.pop(index)?));
        }
        // The new cell 1 may reuse the same shared store keys
        drop(old);
        self.clear_cells();
        for (index, element) in drained {
            remap.insert(CellRef::new(1, index), self.place(element)?);
        }
        tracing::debug!(
            "Layer {}: {} levels, {} cells after optimization",
            self.name,
            self.nlevels,
            self.cellnumbers.len()
        );
        Ok(remap)
    }

    /// Set the geographic layer box and re-bucket every stored element.
    pub fn set_bbox(&mut self, rect: Rect<f64>) -> Result<RemapTable> {
        self.check_writable()?;
        let dbbox = self.coords.rect_to_discrete(rect);
        let entries = self.elements_and_refs()?;
        for (_, element) in &entries {
            self.inside(element, dbbox)?;
        }
        self.estimator = None;
        self.clear_cells();
        self.fix_bbox(dbbox);
        let mut remap = RemapTable::new();
        for (old, element) in entries {
            remap.insert(old, self.place(element)?);
        }
        Ok(remap)
    }

    fn header(&self) -> LayerHeader {
        LayerHeader {
            category: self.category,
            file_id: self.file_id(),
            bbox: self.bbox.unwrap_or_else(zero_rect),
            nlevels: self.nlevels,
            nobjects: self.nobjects,
            scale: self.coords.scale,
            refpoint: self.coords.refpoint,
            dbbox: self.dbbox.unwrap_or_else(zero_rect),
            kind: self.kind,
            largest_cell: self.index.values().map(|s| s.length).max().unwrap_or(0),
            first_cell: self.cellnumbers.first().copied().unwrap_or(0),
            last_cell: self.cellnumbers.last().copied().unwrap_or(0),
        }
    }

    /// Header format version (1, 2 or 3) the layer boxes are consistent with.
    pub fn check(&self) -> Result<u8> {
        if self.bbox.is_none() {
            return Err(MapError::MissingBoundingBox(format!("layer {}", self.name)));
        }
        self.header().format_version()
    }

    /// Write the layer files. Read-only layers and unchanged appended layers are just
    /// released.
    pub fn close(mut self) -> Result<()> {
        // Profile the final flush of all cells
        #[cfg(feature = "profiling")]
        profiling::scope!("layer::close");

        match self.mode {
            LayerMode::Read => return Ok(()),
            LayerMode::Append if self.modified.is_empty() => return Ok(()),
            LayerMode::Write | LayerMode::Append => {}
        }
        if self.dbbox.is_none() {
            let remap = self.optimize()?;
            tracing::debug!("Layer {} optimized on close, {} references moved", self.name, remap.len());
        }
        if self.dbbox.is_none() && !self.cellnumbers.is_empty() {
            return Err(MapError::MissingBoundingBox(format!("layer {}", self.name)));
        }

        let mut out = tempfile::NamedTempFile::new_in(&self.dir)?;
        out.write_all(&self.header().encode(self.endian)?)?;
        let mut offset = HEADER_SIZE;
        let mut index = CellIndex::new();
        for &cellnum in &self.cellnumbers {
            let block = match self.modified.get(&cellnum) {
                Some(cell) => cell.serialize()?,
                None => {
                    let span = self.index.get(&cellnum).copied().ok_or_else(|| {
                        MapError::InvalidIndex(format!("cell {cellnum} has no stored block"))
                    })?;
                    self.read_span(span)?
                }
            };
            let span = Span {
                offset: u32::try_from(offset)
                    .map_err(|_| MapError::InvalidIndex(format!("offset {offset} too large")))?,
                length: block.len() as u32,
            };
            index.insert(cellnum, span);
            out.write_all(&block)?;
            offset += block.len();
        }

        self.index = index;
        out.seek(SeekFrom::Start(0))?;
        out.write_all(&self.header().encode(self.endian)?)?;
        out.flush()?;
        self.source = None;
        out.persist(self.data_path()).map_err(|e| e.error)?;

        fs::write(self.index_path(), index::encode(&self.index, self.endian))?;
        if self.config.write_drc {
            let drc = self.dir.join(format!("{}.drc", self.filename));
            fs::write(drc, index::encode_drc(&self.index, self.endian))?;
        }
        tracing::info!(
            "Wrote layer {}: {} objects in {} cells, {} levels, {} bytes",
            self.name,
            self.nobjects,
            self.index.len(),
            self.nlevels,
            offset
        );
        Ok(())
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = self.header();
        let rect = |r: Rect<f64>| {
            format!("({}, {}) - ({}, {})", r.min().x, r.min().y, r.max().x, r.max().y)
        };
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Number of objects: {}", self.nobjects)?;
        writeln!(f, "Number of cells: {}", self.cellnumbers.len())?;
        writeln!(f, "Reference point: ({}, {})", h.refpoint.x, h.refpoint.y)?;
        writeln!(f, "Scale: ({}, {})", h.scale.x, h.scale.y)?;
        match (self.bbox, self.dbbox) {
            (Some(bbox), Some(d)) => {
                writeln!(f, "Boundaries: {}", rect(bbox))?;
                writeln!(
                    f,
                    "Discrete boundaries: ({}, {}) - ({}, {})",
                    d.min().x,
                    d.min().y,
                    d.max().x,
                    d.max().y
                )?;
            }
            _ => writeln!(f, "Boundaries: deferred")?,
        }
        writeln!(f, "Identifier: 0x{:x}", h.file_id)?;
        writeln!(f, "Levels: {}", self.nlevels)?;
        writeln!(f, "Category: {}", self.category)?;
        writeln!(f, "Layer type: {} (0x{:02x})", self.kind.name(), self.kind.code())?;
        if h.first_cell != 0 {
            writeln!(f, "First cell: {}", h.first_cell)?;
            writeln!(f, "Last cell: {}", h.last_cell)?;
        }
        Ok(())
    }
}
