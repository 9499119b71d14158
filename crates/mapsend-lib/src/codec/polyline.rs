//! Polyline records
//!
//! ```text
//! bbox | offset/marker | objtype | u16 (polytype << 13 | nvertices) | anchor | deltas
//!      | text index | routing bytes
//! ```
//!
//! The polytype says where the chain starts and whether its last vertex is implied by a
//! bbox corner. The text index uses the trailing form whenever routing bytes follow it.

use super::chain::{self, DeltaChain, MAX_VERTICES};
use super::{ByteReader, ByteWriter, CellFrame, bbox, textslot};
use crate::coords::{RectExt, bounding_box};
use crate::element::PolylineElement;
use crate::{MapError, Result};
use geo::{Coord, LineString, Rect, coord};

/// Start of a chain and, for corner patterns, its implied end.
struct Anchor {
    polytype: u8,
    end: Option<Coord<i64>>,
}

fn select_anchor(first: Coord<i64>, last: Coord<i64>, bbox: Rect<i64>) -> Anchor {
    let corner = |polytype, end| Anchor {
        polytype,
        end: Some(end),
    };
    let (min, max) = (bbox.ll(), bbox.ur());
    if first == min && last == max {
        return corner(4, max);
    }
    if first == max && last == min {
        return corner(5, min);
    }
    if first == bbox.ul() && last == bbox.lr() {
        return corner(6, bbox.lr());
    }
    if first == bbox.lr() && last == bbox.ul() {
        return corner(7, bbox.ul());
    }
    let offset = first - min;
    let polytype = if first == min {
        3
    } else {
        match offset.x.max(offset.y) {
            d if d > 0xFFFF => 0,
            d if d > 0xFF => 1,
            _ => 2,
        }
    };
    Anchor {
        polytype,
        end: None,
    }
}

pub fn encode(p: &PolylineElement, frame: &CellFrame, w: &mut ByteWriter) -> Result<()> {
    let rel: Vec<Coord<i64>> = p.line.0.iter().map(|&c| frame.to_relative(c)).collect();
    let (Some(&first), Some(&last)) = (rel.first(), rel.last()) else {
        return Err(MapError::InvalidGeometry("empty polyline".to_string()));
    };
    let rect = bounding_box(rel.iter().copied())
        .ok_or_else(|| MapError::InvalidGeometry("empty polyline".to_string()))?;
    bbox::write(rect, w)?;

    let needs_full = p
        .textslot
        .is_some_and(|s| textslot::trailing_marker(Some(s)) == textslot::MARKER_FULL);
    let trailing = !p.excess.is_empty() || needs_full;
    w.u8(if trailing {
        textslot::trailing_marker(p.textslot)
    } else {
        textslot::offset_byte(p.textslot)
    });
    w.u8(p.objtype);

    let anchor = select_anchor(first, last, rect);
    let path = if anchor.end.is_some() {
        &rel[..rel.len() - 1]
    } else {
        &rel[..]
    };
    let deltas = DeltaChain::encode(path);
    let nvertices = rel.len() + deltas.inserted;
    if nvertices > MAX_VERTICES {
        return Err(MapError::TooManyVertices(nvertices));
    }
    w.u16(((anchor.polytype as u16) << 13) | nvertices as u16);

    let offset = first - rect.min();
    match anchor.polytype {
        0 => {
            w.i32(first.x as i32);
            w.i32(first.y as i32);
        }
        1 => {
            w.u16(offset.x as u16);
            w.u16(offset.y as u16);
        }
        2 => {
            w.u8(offset.x as u8);
            w.u8(offset.y as u8);
        }
        _ => {}
    }
    deltas.write(w);

    if trailing {
        textslot::write_trailing(p.textslot, w);
    } else {
        textslot::write_compact(p.textslot, false, w);
    }
    w.bytes(&p.excess);
    Ok(())
}

pub fn decode(frame: &CellFrame, r: &mut ByteReader<'_>) -> Result<PolylineElement> {
    let rect = bbox::read(r)?;
    let marker = r.u8()?;
    let objtype = r.u8()?;
    let word = r.u16()?;
    let polytype = (word >> 13) as u8;
    let nvertices = (word & 0x1FFF) as usize;

    let min = rect.min();
    let (start, end) = match polytype {
        0 => (coord! { x: r.i32()? as i64, y: r.i32()? as i64 }, None),
        1 => (min + coord! { x: r.u16()? as i64, y: r.u16()? as i64 }, None),
        2 => (min + coord! { x: r.u8()? as i64, y: r.u8()? as i64 }, None),
        3 => (min, None),
        4 => (min, Some(rect.max())),
        5 => (rect.max(), Some(min)),
        6 => (rect.ul(), Some(rect.lr())),
        _ => (rect.lr(), Some(rect.ul())),
    };
    let implied = 1 + end.is_some() as usize;
    let ndeltas = nvertices.checked_sub(implied).ok_or_else(|| {
        MapError::InvalidGeometry(format!("polyline type {polytype} with {nvertices} vertices"))
    })?;

    let mut vertices = Vec::with_capacity(nvertices);
    vertices.push(start);
    vertices.extend(chain::read(start, ndeltas, r)?);
    vertices.extend(end);

    let textslot = textslot::read_trailing(marker, r)?;
    let excess = r.rest().to_vec();

    Ok(PolylineElement {
        line: LineString::new(vertices.into_iter().map(|v| frame.to_geographic(v)).collect()),
        objtype,
        textslot,
        excess,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Endian, decode_element, encode_element};
    use crate::coords::CoordinateSystem;
    use crate::element::{Element, LayerType, TextSlot};
    use geo::line_string;

    fn frame_1e5() -> CellFrame {
        let coords = CoordinateSystem::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1e-5, y: 1e-5 });
        let cell = coords.rect_to_discrete(Rect::new(
            coord! { x: 16.0, y: 58.0 },
            coord! { x: 16.5, y: 58.7 },
        ));
        CellFrame::new(cell, coords, Endian::Little)
    }

    fn roundtrip(p: &PolylineElement, frame: &CellFrame) -> (Vec<u8>, PolylineElement) {
        let data = encode_element(&Element::Polyline(p.clone()), frame).unwrap();
        let Element::Polyline(back) = decode_element(LayerType::Polyline, frame, &data).unwrap()
        else {
            panic!("expected a polyline");
        };
        (data, back)
    }

    fn near(a: Coord<f64>, b: Coord<f64>, tol: f64) -> bool {
        (a.x - b.x).abs() <= tol && (a.y - b.y).abs() <= tol
    }

    #[test]
    fn test_known_track_roundtrip() {
        let frame = frame_1e5();
        let mut p = PolylineElement::new(line_string![
            (x: 16.1757486998, y: 58.5899908940),
            (x: 16.1770312736, y: 58.5900255253),
            (x: 16.1780996471, y: 58.5896660251),
        ])
        .unwrap();
        p.objtype = 3;
        let (_, back) = roundtrip(&p, &frame);
        assert_eq!(back.objtype, 3);
        assert_eq!(back.textslot, None);
        assert!(back.excess.is_empty());

        // The first step is 128 units long, so one synthetic vertex sits between the
        // first two original vertices
        assert_eq!(back.line.0.len(), 4);
        let originals = &p.line.0;
        assert!(near(back.line.0[0], originals[0], 1e-5));
        assert!(near(back.line.0[2], originals[1], 1e-5));
        assert!(near(back.line.0[3], originals[2], 1e-5));
    }

    #[test]
    fn test_anchor_polytypes() {
        let frame = frame_1e5();
        let coords = frame.coords;
        let base = frame.bbox.min();
        let geo = |x: i64, y: i64| coords.to_geographic(base + coord! { x: x, y: y });
        // relative vertices (first, middle, last) with the expected polytype
        let cases = [
            ([(10, 10), (15, 40), (30, 50)], 4u8),
            ([(30, 50), (15, 40), (10, 10)], 5),
            ([(10, 50), (15, 40), (30, 10)], 6),
            ([(30, 10), (15, 40), (10, 50)], 7),
            ([(10, 10), (30, 50), (15, 40)], 3),
            ([(20, 10), (10, 50), (15, 40)], 2),
            ([(900, 10), (10, 50), (15, 40)], 1),
        ];
        for (rel, polytype) in cases {
            let line = LineString::new(rel.iter().map(|&(x, y)| geo(x, y)).collect());
            let p = PolylineElement::new(line).unwrap();
            let (data, back) = roundtrip(&p, &frame);
            // precision | bbox (4 x u8 or u16) | marker | objtype | word
            let mut r = ByteReader::new(&data, Endian::Little);
            bbox::read(&mut r).unwrap();
            r.skip(2).unwrap();
            assert_eq!((r.u16().unwrap() >> 13) as u8, polytype, "{rel:?}");
            assert!(near(back.line.0[0], p.line.0[0], 1e-5));
            for v in &p.line.0 {
                assert!(back.line.0.iter().any(|b| near(*b, *v, 1e-5)));
            }
        }
    }

    #[test]
    fn test_far_anchor_uses_absolute_position() {
        let coords = CoordinateSystem::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let frame = CellFrame::new(
            Rect::new(coord! { x: 0, y: -200_000 }, coord! { x: 200_000, y: 0 }),
            coords,
            Endian::Big,
        );
        let p = PolylineElement::new(line_string![
            (x: 100_000.0, y: 10.0),
            (x: 5.0, y: 20.0),
            (x: 100_010.0, y: 30.0),
        ])
        .unwrap();
        let (_, back) = roundtrip(&p, &frame);
        assert_eq!(back.line.0.first(), p.line.0.first());
        assert_eq!(back.line.0.last(), p.line.0.last());
    }

    #[test]
    fn test_routing_bytes_and_textslot_survive() {
        let frame = frame_1e5();
        let mut p = PolylineElement::new(line_string![
            (x: 16.2, y: 58.4),
            (x: 16.2001, y: 58.4002),
        ])
        .unwrap();
        p.textslot = Some(TextSlot::new(1, 0x0456).unwrap());
        p.excess = vec![0x09, 0x80, 0x01];
        let (_, back) = roundtrip(&p, &frame);
        assert_eq!(back.textslot, p.textslot);
        assert_eq!(back.excess, p.excess);
        assert_eq!(back.routing_vertex_indices().as_slice(), &[0, 15]);

        p.excess.clear();
        p.textslot = Some(TextSlot::new(1, 0x12_0456).unwrap());
        let (_, back) = roundtrip(&p, &frame);
        assert_eq!(back.textslot, p.textslot);
        assert!(back.excess.is_empty());

        p.textslot = None;
        p.excess = vec![0x02, 0x00];
        let (_, back) = roundtrip(&p, &frame);
        assert_eq!(back.textslot, None);
        assert_eq!(back.excess, vec![0x02, 0x00]);
    }
}
