//! Interfaces to collaborators living outside the layer storage
//!
//! The map database owns the text tables and the device compression scheme; layers only
//! carry text slots and may need their cell blocks unpacked before parsing.

use crate::element::TextSlot;
use crate::{MapError, Result};
use std::collections::HashMap;

/// Text storage addressed by [`TextSlot`]s.
pub trait TextTable {
    /// Store a string and return the slot referencing it
    fn append_text(&mut self, text: &str) -> Result<TextSlot>;

    fn lookup_text(&self, slot: TextSlot) -> Option<&str>;
}

/// Decompressor for packed cell blocks.
pub trait BlockUnpacker {
    fn unpack(&self, cellnum: u32, data: &[u8]) -> Result<Vec<u8>>;
}

/// In-memory text table using a single offset.
#[derive(Debug, Clone, Default)]
pub struct MemoryTextTable {
    offset: u8,
    entries: Vec<String>,
    positions: HashMap<String, u32>,
}

impl MemoryTextTable {
    pub fn new(offset: u8) -> Self {
        Self {
            offset,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TextTable for MemoryTextTable {
    fn append_text(&mut self, text: &str) -> Result<TextSlot> {
        if let Some(&index) = self.positions.get(text) {
            return TextSlot::new(self.offset, index);
        }
        let index = u32::try_from(self.entries.len())
            .map_err(|_| MapError::UnsupportedOperation("text table is full"))?;
        let slot = TextSlot::new(self.offset, index)?;
        self.entries.push(text.to_string());
        self.positions.insert(text.to_string(), index);
        Ok(slot)
    }

    fn lookup_text(&self, slot: TextSlot) -> Option<&str> {
        if slot.offset() != self.offset {
            return None;
        }
        self.entries.get(slot.index() as usize).map(String::as_str)
    }
}
