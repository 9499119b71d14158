//! Cell index files
//!
//! The index is a flat array of `(i32 cellnum, i32 offset, i32 length)` triples in
//! ascending cell number order. The DRC file used by the desktop software holds the same
//! triples after a `u32` count.

use crate::codec::{ByteReader, ByteWriter, Endian};
use crate::{MapError, Result};
use std::collections::BTreeMap;

const ENTRY_SIZE: usize = 12;

/// Position of a cell block in the data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub offset: u32,
    pub length: u32,
}

/// Cell number to block position, iterated in ascending cell order
pub type CellIndex = BTreeMap<u32, Span>;

fn non_negative(v: i32, what: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| MapError::InvalidIndex(format!("negative {what} {v}")))
}

pub fn decode(data: &[u8], endian: Endian) -> Result<CellIndex> {
    if data.len() % ENTRY_SIZE != 0 {
        return Err(MapError::InvalidIndex(format!(
            "{} bytes is not a whole number of entries",
            data.len()
        )));
    }
    let mut r = ByteReader::new(data, endian);
    let mut index = CellIndex::new();
    while r.remaining() > 0 {
        let cellnum = non_negative(r.i32()?, "cell number")?;
        let span = Span {
            offset: non_negative(r.i32()?, "offset")?,
            length: non_negative(r.i32()?, "length")?,
        };
        if cellnum == 0 || index.insert(cellnum, span).is_some() {
            return Err(MapError::InvalidIndex(format!("bad cell number {cellnum}")));
        }
    }
    Ok(index)
}

fn write_entries(index: &CellIndex, w: &mut ByteWriter) {
    for (&cellnum, span) in index {
        w.u32(cellnum);
        w.u32(span.offset);
        w.u32(span.length);
    }
}

pub fn encode(index: &CellIndex, endian: Endian) -> Vec<u8> {
    let mut w = ByteWriter::new(endian);
    write_entries(index, &mut w);
    w.into_inner()
}

pub fn encode_drc(index: &CellIndex, endian: Endian) -> Vec<u8> {
    let mut w = ByteWriter::new(endian);
    w.u32(index.len() as u32);
    write_entries(index, &mut w);
    w.into_inner()
}
