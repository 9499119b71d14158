//! Text slot encodings
//!
//! A slot is an 8-bit offset and a 24-bit index. The offset byte is usually written early
//! in a record and the index later, in one of two shapes:
//!
//! - **compact**: the last field of a record; 1, 2 or 3 bytes, the width is recovered from
//!   the number of bytes left in the record.
//! - **trailing**: more data follows; the offset byte doubles as a marker, `0xFB` for no
//!   text and `0xFC` for a full 4-byte slot, otherwise a 16-bit index follows.

use super::{ByteReader, ByteWriter};
use crate::element::TextSlot;
use crate::{MapError, Result};

pub const MARKER_NONE: u8 = 0xFB;
pub const MARKER_FULL: u8 = 0xFC;

/// Offset byte of a slot whose index is written in compact form.
pub fn offset_byte(slot: Option<TextSlot>) -> u8 {
    (TextSlot::to_raw(slot) >> 24) as u8
}

/// Write a compact index tail. The single byte form is only used when `allow_byte` is set.
pub fn write_compact(slot: Option<TextSlot>, allow_byte: bool, w: &mut ByteWriter) {
    let raw = TextSlot::to_raw(slot);
    if allow_byte && raw & 0x00FF_FF00 == 0 {
        w.u8(raw as u8);
    } else if raw & 0x00FF_0000 == 0 {
        w.u16(raw as u16);
    } else {
        w.u16(((raw & 0x00FF_FF00) >> 8) as u16);
        w.u8(raw as u8);
    }
}

/// Read a compact index tail that runs to the end of the record.
pub fn read_compact(offset: u8, r: &mut ByteReader<'_>) -> Result<Option<TextSlot>> {
    let high = (offset as u32) << 24;
    let raw = match r.remaining() {
        0 => return Ok(None),
        1 => high | r.u8()? as u32,
        2 => high | r.u16()? as u32,
        3 => high | ((r.u16()? as u32) << 8) | r.u8()? as u32,
        n => return Err(MapError::ExcessData(n - 3)),
    };
    Ok(TextSlot::from_raw(raw))
}

/// Offset byte followed by a compact tail.
pub fn write_full(slot: Option<TextSlot>, allow_byte: bool, w: &mut ByteWriter) {
    w.u8(offset_byte(slot));
    write_compact(slot, allow_byte, w);
}

pub fn read_full(r: &mut ByteReader<'_>) -> Result<Option<TextSlot>> {
    let offset = r.u8()?;
    read_compact(offset, r)
}

/// Whether a slot cannot be expressed as offset byte plus 16-bit index.
fn needs_full(slot: TextSlot) -> bool {
    matches!(slot.offset(), MARKER_NONE | MARKER_FULL) || slot.index() > 0xFFFF
}

/// Offset marker of a slot whose index is written in trailing form.
pub fn trailing_marker(slot: Option<TextSlot>) -> u8 {
    match slot {
        None => MARKER_NONE,
        Some(s) if needs_full(s) => MARKER_FULL,
        Some(s) => s.offset(),
    }
}

/// Write a trailing index matching [`trailing_marker`].
pub fn write_trailing(slot: Option<TextSlot>, w: &mut ByteWriter) {
    match slot {
        None => {}
        Some(s) if needs_full(s) => w.u32(s.raw()),
        Some(s) => w.u16(s.index() as u16),
    }
}

pub fn read_trailing(marker: u8, r: &mut ByteReader<'_>) -> Result<Option<TextSlot>> {
    match marker {
        MARKER_NONE => Ok(None),
        MARKER_FULL => Ok(TextSlot::from_raw(r.u32()?)),
        offset => {
            let high = (offset as u32) << 24;
            let raw = if r.remaining() >= 2 {
                high | r.u16()? as u32
            } else {
                high
            };
            Ok(TextSlot::from_raw(raw))
        }
    }
}
