//! Adaptive-precision bounding box that opens every record
//!
//! One precision byte holds a 2-bit width selector for each of x, y, width and height
//! (bits 0-1, 2-3, 4-5, 6-7), followed by the four values at those widths.

use super::{ByteReader, ByteWriter};
use crate::{MapError, Result};
use geo::{Rect, coord};

/// Byte width for each selector value.
const FIELD_WIDTHS: [usize; 4] = [4, 2, 1, 0];

/// Smallest selector able to hold `value`.
///
/// `0 -> 3` (omitted), `< 256 -> 2`, `< 65536 -> 1`, `< 2^32 -> 0`.
pub fn selector_for(value: i64) -> Result<u8> {
    match value {
        v if v < 0 => Err(MapError::NegativeCoordinate(v)),
        0 => Ok(3),
        1..=0xFF => Ok(2),
        0x100..=0xFFFF => Ok(1),
        0x1_0000..=0xFFFF_FFFF => Ok(0),
        v => Err(MapError::CoordinateOverflow(v)),
    }
}

/// The precision byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision(pub u8);

impl Precision {
    fn selector(self, field: usize) -> u8 {
        (self.0 >> (2 * field)) & 0x3
    }

    /// Bytes used by the four value fields
    pub fn encoded_len(self) -> usize {
        (0..4).map(|f| FIELD_WIDTHS[self.selector(f) as usize]).sum()
    }
}

/// Encode a cell-relative box at the narrowest widths that hold its values.
pub fn write(bbox: Rect<i64>, w: &mut ByteWriter) -> Result<()> {
    let values = [bbox.min().x, bbox.min().y, bbox.width(), bbox.height()];
    let mut precision = 0u8;
    let mut selectors = [0u8; 4];
    for (field, &v) in values.iter().enumerate() {
        selectors[field] = selector_for(v)?;
        precision |= selectors[field] << (2 * field);
    }
    w.u8(precision);
    for (&v, &sel) in values.iter().zip(&selectors) {
        match sel {
            0 => w.u32(v as u32),
            1 => w.u16(v as u16),
            2 => w.u8(v as u8),
            _ => {}
        }
    }
    Ok(())
}

pub fn read(r: &mut ByteReader<'_>) -> Result<Rect<i64>> {
    let precision = Precision(r.u8()?);
    let mut values = [0i64; 4];
    for (field, value) in values.iter_mut().enumerate() {
        *value = match precision.selector(field) {
            0 => r.u32()? as i64,
            1 => r.u16()? as i64,
            2 => r.u8()? as i64,
            _ => 0,
        };
    }
    let [x, y, w, h] = values;
    Ok(Rect::new(coord! { x: x, y: y }, coord! { x: x + w, y: y + h }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endian;

    #[test]
    fn test_selector_boundaries() {
        let expected = [(0, 3), (1, 2), (255, 2), (256, 1), (65535, 1), (65536, 0)];
        for (value, selector) in expected {
            assert_eq!(selector_for(value).unwrap(), selector, "value {value}");
        }
    }

    #[test]
    fn test_selector_rejects_out_of_range() {
        assert!(matches!(selector_for(-1), Err(MapError::NegativeCoordinate(-1))));
        assert!(matches!(
            selector_for(1 << 32),
            Err(MapError::CoordinateOverflow(_))
        ));
    }

    #[test]
    fn test_bbox_mixed_widths() {
        let bbox = Rect::new(coord! { x: 300, y: 0 }, coord! { x: 70_300, y: 17 });
        let mut w = ByteWriter::new(Endian::Little);
        write(bbox, &mut w).unwrap();
        let bytes = w.into_inner();
        // x: u16, y: omitted, width: u32, height: u8
        assert_eq!(bytes[0], 0b10_00_11_01);
        assert_eq!(bytes.len(), 1 + 2 + 4 + 1);
        assert_eq!(Precision(bytes[0]).encoded_len(), 7);

        let mut r = ByteReader::new(&bytes, Endian::Little);
        assert_eq!(read(&mut r).unwrap(), bbox);
        assert_eq!(r.remaining(), 0);
    }
}
