//! Area records
//!
//! ```text
//! bbox | offset | objtype | u16 total vertices | u16 (rings | polytype0 << 13)
//!      | u16 (offset_i | polytype_i << 13) for each further ring
//!      | ring chains | corner marker (0xFF = none) [+ one byte per vertex]
//!      | pad | text index (2 or 3 bytes)
//! ```
//!
//! Ring offsets are cumulative: ring `i` spans `offset[i+1] - offset[i] - 1` vertices and
//! the last ring takes whatever is left of the total.

use super::chain::{self, DeltaChain};
use super::{ByteReader, ByteWriter, CellFrame, bbox, textslot};
use crate::coords::{RectExt, bounding_box};
use crate::element::{AreaElement, CornerData};
use crate::{MapError, Result};
use geo::{Coord, LineString, Rect, coord};
use smallvec::SmallVec;

const FIELD_MASK: u16 = 0x1FFF;
const NO_CORNER_DATA: u8 = 0xFF;

/// Encoded form of one ring, ready to be written after all ring headers.
struct RingChain {
    polytype: u8,
    nvertices: usize,
    anchor: Coord<i64>,
    deltas: DeltaChain,
}

fn encode_ring(ring: &[Coord<i64>], rect: Rect<i64>) -> Result<RingChain> {
    let (first, last) = match (ring.first(), ring.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => return Err(MapError::InvalidGeometry("empty area ring".to_string())),
    };
    let (min, max) = (rect.ll(), rect.ur());
    let (polytype, implied_end) = if first == max && last == min {
        (5, true)
    } else if first == rect.lr() && last == rect.ul() {
        (7, true)
    } else if first == max {
        (3, false)
    } else if first == min {
        (6, false)
    } else {
        let offset = first - min;
        match offset.x.max(offset.y) {
            d if d > 0xFFFF => (0, false),
            d if d > 0xFF => (2, false),
            _ => (4, false),
        }
    };
    let path = if implied_end { &ring[..ring.len() - 1] } else { ring };
    let deltas = DeltaChain::encode(path);
    let nvertices = ring.len() + deltas.inserted;
    if nvertices > FIELD_MASK as usize {
        return Err(MapError::TooManyVertices(nvertices));
    }
    Ok(RingChain {
        polytype,
        nvertices,
        anchor: first - min,
        deltas,
    })
}

pub fn encode(a: &AreaElement, frame: &CellFrame, w: &mut ByteWriter) -> Result<()> {
    let rings: Vec<Vec<Coord<i64>>> = a
        .rings
        .iter()
        .map(|r| r.0.iter().map(|&c| frame.to_relative(c)).collect())
        .collect();
    let rect = bounding_box(rings.iter().flatten().copied())
        .ok_or_else(|| MapError::InvalidGeometry("area without vertices".to_string()))?;
    bbox::write(rect, w)?;
    w.u8(textslot::offset_byte(a.textslot));
    w.u8(a.objtype);

    let chains = rings
        .iter()
        .map(|ring| encode_ring(ring, rect))
        .collect::<Result<SmallVec<[RingChain; 4]>>>()?;
    let total: usize = chains.iter().map(|c| c.nvertices).sum();
    if total > u16::MAX as usize {
        return Err(MapError::TooManyVertices(total));
    }
    if chains.is_empty() || chains.len() > FIELD_MASK as usize {
        return Err(MapError::InvalidGeometry(format!("area with {} rings", chains.len())));
    }

    w.u16(total as u16);
    w.u16(chains.len() as u16 | ((chains[0].polytype as u16) << 13));
    let mut offset = chains[0].nvertices + 1;
    for chain in &chains[1..] {
        if offset > FIELD_MASK as usize {
            return Err(MapError::TooManyVertices(offset));
        }
        w.u16(offset as u16 | ((chain.polytype as u16) << 13));
        offset += chain.nvertices + 1;
    }

    for chain in &chains {
        match chain.polytype {
            0 => {
                w.u32(chain.anchor.x as u32);
                w.u32(chain.anchor.y as u32);
            }
            2 => {
                w.u16(chain.anchor.x as u16);
                w.u16(chain.anchor.y as u16);
            }
            4 => {
                w.u8(chain.anchor.x as u8);
                w.u8(chain.anchor.y as u8);
            }
            _ => {}
        }
        chain.deltas.write(w);
    }

    match &a.corner_data {
        Some(cd) if cd.marker != NO_CORNER_DATA && cd.values.len() == total => {
            w.u8(cd.marker);
            w.bytes(&cd.values);
        }
        Some(cd) => {
            tracing::warn!(
                "Dropping corner data with {} values for an area of {} vertices",
                cd.values.len(),
                total
            );
            w.u8(NO_CORNER_DATA);
        }
        None => w.u8(NO_CORNER_DATA),
    }

    w.u8(0);
    textslot::write_compact(a.textslot, false, w);
    Ok(())
}

fn decode_ring(
    polytype: u8,
    nvertices: usize,
    rect: Rect<i64>,
    r: &mut ByteReader<'_>,
) -> Result<Vec<Coord<i64>>> {
    let min = rect.min();
    let (start, end) = match polytype {
        0 => (min + coord! { x: r.u32()? as i64, y: r.u32()? as i64 }, None),
        2 => (min + coord! { x: r.u16()? as i64, y: r.u16()? as i64 }, None),
        4 => (min + coord! { x: r.u8()? as i64, y: r.u8()? as i64 }, None),
        6 => (min, None),
        3 => (rect.max(), None),
        5 => (rect.max(), Some(min)),
        7 => (rect.lr(), Some(rect.ul())),
        other => return Err(MapError::UnknownPolyType(other)),
    };
    let implied = 1 + end.is_some() as usize;
    let ndeltas = nvertices.checked_sub(implied).ok_or_else(|| {
        MapError::InvalidGeometry(format!("area ring type {polytype} with {nvertices} vertices"))
    })?;
    let mut ring = Vec::with_capacity(nvertices);
    ring.push(start);
    ring.extend(chain::read(start, ndeltas, r)?);
    ring.extend(end);
    Ok(ring)
}

pub fn decode(frame: &CellFrame, r: &mut ByteReader<'_>) -> Result<AreaElement> {
    let rect = bbox::read(r)?;
    let offset_byte = r.u8()?;
    let objtype = r.u8()?;
    let total = r.u16()? as usize;

    let first = r.u16()?;
    let nrings = (first & FIELD_MASK) as usize;
    if nrings == 0 {
        return Err(MapError::InvalidGeometry("area without rings".to_string()));
    }
    let mut headers: SmallVec<[(u8, usize); 4]> = SmallVec::with_capacity(nrings);
    let mut pending_type = (first >> 13) as u8;
    let mut last_offset = 0usize;
    for _ in 1..nrings {
        let word = r.u16()?;
        let offset = (word & FIELD_MASK) as usize;
        let count = offset
            .checked_sub(last_offset + 1)
            .ok_or_else(|| MapError::InvalidGeometry(format!("ring offset {offset}")))?;
        headers.push((pending_type, count));
        pending_type = (word >> 13) as u8;
        last_offset = offset;
    }
    let used: usize = headers.iter().map(|&(_, n)| n).sum();
    let remaining = total
        .checked_sub(used)
        .ok_or_else(|| MapError::InvalidGeometry(format!("{total} vertices in area")))?;
    headers.push((pending_type, remaining));

    let rings = headers
        .iter()
        .map(|&(polytype, n)| {
            let ring = decode_ring(polytype, n, rect, r)?;
            Ok(LineString::new(ring.into_iter().map(|v| frame.to_geographic(v)).collect()))
        })
        .collect::<Result<Vec<_>>>()?;

    let marker = r.u8()?;
    let corner_data = if marker != NO_CORNER_DATA {
        Some(CornerData {
            marker,
            values: r.take(total)?.to_vec(),
        })
    } else {
        None
    };

    if r.remaining() % 2 == 1 || r.remaining() == 4 {
        r.skip(1)?;
    }
    let textslot = textslot::read_compact(offset_byte, r)?;

    Ok(AreaElement {
        rings,
        objtype,
        textslot,
        corner_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::test_frame;
    use crate::codec::{Endian, decode_element, encode_element};
    use crate::element::{Element, LayerType, TextSlot};

    fn rel_ring(frame: &CellFrame, pts: &[(i64, i64)]) -> LineString<f64> {
        let base = frame.bbox.min();
        LineString::new(
            pts.iter()
                .map(|&(x, y)| frame.coords.to_geographic(base + coord! { x: x, y: y }))
                .collect(),
        )
    }

    fn roundtrip(a: &AreaElement, frame: &CellFrame) -> (Vec<u8>, AreaElement) {
        let data = encode_element(&Element::Area(a.clone()), frame).unwrap();
        let Element::Area(back) = decode_element(LayerType::Polygon, frame, &data).unwrap() else {
            panic!("expected an area");
        };
        (data, back)
    }

    fn assert_rings_close(a: &AreaElement, b: &AreaElement) {
        assert_eq!(a.rings.len(), b.rings.len());
        for (ra, rb) in a.rings.iter().zip(&b.rings) {
            assert_eq!(ra.0.len(), rb.0.len());
            for (ca, cb) in ra.0.iter().zip(&rb.0) {
                assert!((ca.x - cb.x).abs() < 1e-5 && (ca.y - cb.y).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_multi_ring_roundtrip() {
        let frame = test_frame(Endian::Little);
        let outer = rel_ring(&frame, &[(1000, 1000), (1100, 1000), (1100, 1100), (1000, 1100)]);
        let hole = rel_ring(&frame, &[(1040, 1040), (1060, 1040), (1050, 1060)]);
        let mut area = AreaElement::new(vec![outer, hole]).unwrap();
        area.objtype = 0x21;
        area.textslot = Some(TextSlot::new(0, 0x0777).unwrap());
        let (_, back) = roundtrip(&area, &frame);
        assert_eq!(back.objtype, 0x21);
        assert_eq!(back.textslot, area.textslot);
        assert!(back.corner_data.is_none());
        assert_rings_close(&area, &back);
    }

    #[test]
    fn test_ring_offsets_in_header() {
        let frame = test_frame(Endian::Big);
        let a = rel_ring(&frame, &[(0, 0), (10, 0), (10, 10), (0, 10)]);
        let b = rel_ring(&frame, &[(2, 2), (4, 2), (3, 4)]);
        let c = rel_ring(&frame, &[(6, 6), (8, 6), (7, 8)]);
        let area = AreaElement::new(vec![a, b, c]).unwrap();
        let (data, back) = roundtrip(&area, &frame);
        let mut r = ByteReader::new(&data, Endian::Big);
        bbox::read(&mut r).unwrap();
        r.skip(2).unwrap();
        assert_eq!(r.u16().unwrap(), 10);
        assert_eq!(r.u16().unwrap() & FIELD_MASK, 3);
        assert_eq!(r.u16().unwrap() & FIELD_MASK, 5);
        assert_eq!(r.u16().unwrap() & FIELD_MASK, 9);
        assert_rings_close(&area, &back);
    }

    #[test]
    fn test_ring_polytypes() {
        let frame = test_frame(Endian::Little);
        let cases: [(&[(i64, i64)], u8); 6] = [
            (&[(50, 50), (20, 40), (10, 10)], 5),
            (&[(50, 10), (40, 30), (10, 50)], 7),
            (&[(50, 50), (10, 20), (30, 10)], 3),
            (&[(10, 10), (50, 20), (30, 50)], 6),
            (&[(30, 10), (50, 50), (10, 40)], 4),
            (&[(600, 10), (560, 90), (480, 40), (400, 60), (330, 20), (300, 50)], 2),
        ];
        for (pts, polytype) in cases {
            let area = AreaElement::new(vec![rel_ring(&frame, pts)]).unwrap();
            let (data, back) = roundtrip(&area, &frame);
            let mut r = ByteReader::new(&data, Endian::Little);
            bbox::read(&mut r).unwrap();
            r.skip(4).unwrap();
            assert_eq!((r.u16().unwrap() >> 13) as u8, polytype, "{pts:?}");
            assert_rings_close(&area, &back);
        }
    }

    #[test]
    fn test_wide_textslot_and_corner_data() {
        let frame = test_frame(Endian::Little);
        let ring = rel_ring(&frame, &[(5, 5), (25, 5), (25, 30)]);
        let mut area = AreaElement::new(vec![ring]).unwrap();
        area.textslot = Some(TextSlot::new(1, 0x02_0304).unwrap());
        area.corner_data = Some(CornerData {
            marker: 1,
            values: vec![9, 8, 7],
        });
        let (_, back) = roundtrip(&area, &frame);
        assert_eq!(back.textslot, area.textslot);
        assert_eq!(back.corner_data, area.corner_data);
    }

    #[test]
    fn test_tail_without_pad_decodes() {
        let frame = test_frame(Endian::Little);
        let ring = rel_ring(&frame, &[(5, 5), (25, 5), (25, 30)]);
        let mut area = AreaElement::new(vec![ring]).unwrap();
        area.textslot = Some(TextSlot::new(0, 0x0102).unwrap());
        let data = encode_element(&Element::Area(area.clone()), &frame).unwrap();
        // Drop the pad byte in front of the 2-byte index
        let mut unpadded = data[..data.len() - 3].to_vec();
        unpadded.extend_from_slice(&data[data.len() - 2..]);
        let Element::Area(back) = decode_element(LayerType::Polygon, &frame, &unpadded).unwrap()
        else {
            panic!("expected an area");
        };
        assert_eq!(back.textslot, area.textslot);
    }

    #[test]
    fn test_unknown_ring_type_is_rejected() {
        let frame = test_frame(Endian::Little);
        let ring = rel_ring(&frame, &[(5, 5), (25, 5), (25, 30)]);
        let area = AreaElement::new(vec![ring]).unwrap();
        let mut data = encode_element(&Element::Area(area), &frame).unwrap();
        let mut r = ByteReader::new(&data, Endian::Little);
        bbox::read(&mut r).unwrap();
        let word_at = data.len() - r.remaining() + 4;
        // Little endian: the polytype lives in the high bits of the second byte
        data[word_at + 1] = (data[word_at + 1] & 0x1F) | (1 << 5);
        assert!(matches!(
            decode_element(LayerType::Polygon, &frame, &data),
            Err(MapError::UnknownPolyType(1))
        ));
    }
}
