//! Cell - Ordered record container of one quadtree node
//!
//! A cell only knows its number, the layer type it belongs to and, once the layer box is
//! fixed, the [`CellFrame`] its records are encoded against. The records themselves live in
//! a [`CellStore`] picked by the owning layer.

mod store;

pub use store::{CellStore, InMemoryStore, KeySpace, KeyedStore, TempFileStore};

use crate::codec::{self, CellFrame};
use crate::element::{Element, LayerType};
use crate::{MapError, Result};

/// Largest number of records a cell block can count.
pub const MAX_RECORDS: usize = u16::MAX as usize;

/// Records of one cell with their storage strategy.
#[derive(Debug)]
pub struct Cell {
    cellnum: u32,
    kind: LayerType,
    frame: Option<CellFrame>,
    store: Box<dyn CellStore>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Cell {
    pub fn new(
        cellnum: u32,
        kind: LayerType,
        frame: Option<CellFrame>,
        store: Box<dyn CellStore>,
    ) -> Self {
        Self {
            cellnum,
            kind,
            frame,
            store,
        }
    }

    /// Cell backed by an [`InMemoryStore`]
    pub fn in_memory(cellnum: u32, kind: LayerType, frame: Option<CellFrame>) -> Self {
        Self::new(cellnum, kind, frame, Box::new(InMemoryStore::new()))
    }

    pub fn cellnum(&self) -> u32 {
        self.cellnum
    }

    pub fn kind(&self) -> LayerType {
        self.kind
    }

    pub fn frame(&self) -> Option<&CellFrame> {
        self.frame.as_ref()
    }

    /// Place the cell on the layer grid once the layer box is known.
    pub fn set_frame(&mut self, frame: CellFrame) {
        self.frame = Some(frame);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
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

    /// Append a record and return its index in the cell.
    pub fn append(&mut self, element: Element) -> Result<usize> {
        self.check_kind(&element)?;
        if self.store.len() >= MAX_RECORDS {
            return Err(MapError::InvalidIndex(format!(
                "cell {} already holds {MAX_RECORDS} records",
                self.cellnum
            )));
        }
        self.store.append(element)
    }

    /// Copy of the record at `index`
    pub fn get(&self, index: usize) -> Result<Element> {
        self.store.get(index)
    }

    pub fn update(&mut self, index: usize, element: Element) -> Result<()> {
        self.check_kind(&element)?;
        self.store.update(index, element)
    }

    pub fn pop(&mut self, index: usize) -> Result<Element> {
        self.store.pop(index)
    }

    /// All records in index order
    pub fn elements(&self) -> Result<Vec<Element>> {
        self.store.all()
    }

    /// Encode the cell as a block.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let frame = self.frame.ok_or_else(|| self.missing_frame())?;
        let mut records = frame.writer();
        self.store.write_records(&frame, &mut records)?;
        codec::encode_block(self.store.len(), &records.into_inner(), frame.endian)
    }

    /// Append every record of an (unpacked) cell block.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<()> {
        let frame = self.frame.ok_or_else(|| self.missing_frame())?;
        for element in codec::parse_block(data, self.cellnum, self.kind, &frame)? {
            self.append(element)?;
        }
        Ok(())
    }

    fn missing_frame(&self) -> MapError {
        MapError::MissingBoundingBox(format!("cell {}", self.cellnum))
    }
}
