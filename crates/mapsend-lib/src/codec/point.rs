//! Point, label and POI records
//!
//! All three start with a zero-size bbox whose origin is the position.

use super::{ByteReader, ByteWriter, CellFrame, bbox, textslot};
use crate::Result;
use crate::element::{LabelElement, PoiElement, PointElement};
use geo::{Coord, Rect};

fn write_position(coord: Coord<f64>, frame: &CellFrame, w: &mut ByteWriter) -> Result<()> {
    let rel = frame.to_relative(coord);
    bbox::write(Rect::new(rel, rel), w)
}

fn read_position(frame: &CellFrame, r: &mut ByteReader<'_>) -> Result<Coord<f64>> {
    Ok(frame.to_geographic(bbox::read(r)?.min()))
}

/// bbox | offset | objtype | index (2 or 3 bytes)
pub fn encode_point(p: &PointElement, frame: &CellFrame, w: &mut ByteWriter) -> Result<()> {
    write_position(p.coord, frame, w)?;
    w.u8(textslot::offset_byte(p.textslot));
    w.u8(p.objtype);
    textslot::write_compact(p.textslot, false, w);
    Ok(())
}

pub fn decode_point(frame: &CellFrame, r: &mut ByteReader<'_>) -> Result<PointElement> {
    let coord = read_position(frame, r)?;
    let offset = r.u8()?;
    let objtype = r.u8()?;
    let textslot = textslot::read_compact(offset, r)?;
    Ok(PointElement {
        coord,
        objtype,
        textslot,
    })
}

/// bbox | category | subcategory | offset | index (1, 2 or 3 bytes)
pub fn encode_poi(p: &PoiElement, frame: &CellFrame, w: &mut ByteWriter) -> Result<()> {
    write_position(p.coord, frame, w)?;
    w.u8(p.category);
    w.u8(p.subcategory);
    textslot::write_full(p.textslot, true, w);
    Ok(())
}

pub fn decode_poi(frame: &CellFrame, r: &mut ByteReader<'_>) -> Result<PoiElement> {
    let coord = read_position(frame, r)?;
    let category = r.u8()?;
    let subcategory = r.u8()?;
    let textslot = textslot::read_full(r)?;
    Ok(PoiElement {
        coord,
        category,
        subcategory,
        textslot,
    })
}

/// bbox | offset | index (1, 2 or 3 bytes)
pub fn encode_label(l: &LabelElement, frame: &CellFrame, w: &mut ByteWriter) -> Result<()> {
    write_position(l.coord, frame, w)?;
    textslot::write_full(l.textslot, true, w);
    Ok(())
}

pub fn decode_label(frame: &CellFrame, r: &mut ByteReader<'_>) -> Result<LabelElement> {
    let coord = read_position(frame, r)?;
    let textslot = textslot::read_full(r)?;
    Ok(LabelElement { coord, textslot })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::test_frame;
    use crate::codec::{Endian, decode_element, encode_element};
    use crate::element::{Element, LayerType, TextSlot};
    use crate::MapError;
    use geo::coord;

    fn close(a: Coord<f64>, b: Coord<f64>) -> bool {
        (a.x - b.x).abs() < 1e-5 && (a.y - b.y).abs() < 1e-5
    }

    #[test]
    fn test_point_tail_widths() {
        let frame = test_frame(Endian::Little);
        for (slot, tail) in [
            (None, 2usize),
            (Some(TextSlot::new(1, 0x0102).unwrap()), 2),
            (Some(TextSlot::new(1, 0x01_0203).unwrap()), 3),
        ] {
            let mut p = PointElement::new(coord! { x: 12.5, y: 57.7 });
            p.objtype = 7;
            p.textslot = slot;
            let data = encode_element(&Element::Point(p.clone()), &frame).unwrap();
            // precision + x + y + offset + objtype + tail
            assert_eq!(data.len(), 1 + 4 + 4 + 2 + tail);
            let Element::Point(back) = decode_element(LayerType::Point, &frame, &data).unwrap()
            else {
                panic!("expected a point");
            };
            assert!(close(back.coord, p.coord));
            assert_eq!((back.objtype, back.textslot), (7, slot));
        }
    }

    #[test]
    fn test_point_single_byte_tail_decodes() {
        let frame = test_frame(Endian::Little);
        let data = encode_element(&Element::Point(PointElement::new(coord! { x: 1.0, y: 1.0 })), &frame)
            .unwrap();
        // Replace the 2-byte tail by a 1-byte one with offset 4
        let mut short = data[..data.len() - 4].to_vec();
        short.extend_from_slice(&[4, 0, 0x2a]);
        let Element::Point(back) = decode_element(LayerType::Point, &frame, &short).unwrap() else {
            panic!("expected a point");
        };
        assert_eq!(back.textslot, Some(TextSlot::new(4, 0x2a).unwrap()));
    }

    #[test]
    fn test_poi_tail_widths() {
        let frame = test_frame(Endian::Big);
        for (slot, tail) in [
            (None, 1usize),
            (Some(TextSlot::new(0, 0x33).unwrap()), 1),
            (Some(TextSlot::new(0, 0x3344).unwrap()), 2),
            (Some(TextSlot::new(0, 0x33_4455).unwrap()), 3),
        ] {
            let poi = PoiElement {
                coord: coord! { x: 18.06, y: 59.33 },
                category: 3,
                subcategory: 9,
                textslot: slot,
            };
            let data = encode_element(&Element::Poi(poi.clone()), &frame).unwrap();
            assert_eq!(data.len(), 1 + 4 + 4 + 2 + 1 + tail);
            let Element::Poi(back) = decode_element(LayerType::Poi, &frame, &data).unwrap() else {
                panic!("expected a poi");
            };
            assert!(close(back.coord, poi.coord));
            assert_eq!((back.category, back.subcategory, back.textslot), (3, 9, slot));
        }
    }

    #[test]
    fn test_label_roundtrip() {
        let frame = test_frame(Endian::Little);
        let label = LabelElement {
            coord: coord! { x: 10.0, y: 60.0 },
            textslot: Some(TextSlot::new(2, 0x1_0000).unwrap()),
        };
        let data = encode_element(&Element::Label(label.clone()), &frame).unwrap();
        let Element::Label(back) = decode_element(LayerType::Label, &frame, &data).unwrap() else {
            panic!("expected a label");
        };
        assert_eq!(back.textslot, label.textslot);
        assert!(close(back.coord, label.coord));
    }

    #[test]
    fn test_point_outside_cell_is_rejected() {
        let frame = test_frame(Endian::Little);
        let p = Element::Point(PointElement::new(coord! { x: -1.0, y: 60.0 }));
        assert!(matches!(
            encode_element(&p, &frame),
            Err(MapError::NegativeCoordinate(_))
        ));
    }
}
