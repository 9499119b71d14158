//! Routing edge records and their packed fields
//!
//! ```text
//! bbox | EdgeWord | RefWord | u32 cellnum ref | u16 index ref + 1 | 4 restriction bytes
//!      | DirectionByte | OrientationByte | [segment type] [flags << 4 | speed category]
//! ```
//!
//! The endpoints are not stored: they sit on two opposite corners of the bbox and the
//! corner code in [`EdgeWord`] says which ones.

use super::{ByteReader, ByteWriter, CellFrame, bbox};
use crate::coords::{RectExt, bounding_box};
use crate::element::{RoutingEdge, SegmentClass};
use crate::{MapError, Result};
use geo::{Coord, Rect};

/// Corner code for the endpoint pair of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointCorners {
    /// start `ll`, end `ur`
    LowerLeft = 0,
    /// start `lr`, end `ul`
    LowerRight = 2,
    /// start `ul`, end `lr`
    UpperLeft = 4,
    /// start `ur`, end `ll`
    UpperRight = 6,
}

impl PointCorners {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::LowerLeft),
            2 => Ok(Self::LowerRight),
            4 => Ok(Self::UpperLeft),
            6 => Ok(Self::UpperRight),
            other => Err(MapError::UnknownCornerCode(other)),
        }
    }

    /// Corner pattern matching two cell-relative endpoints, if any.
    pub fn detect(start: Coord<i64>, end: Coord<i64>, rect: Rect<i64>) -> Option<Self> {
        [Self::UpperRight, Self::UpperLeft, Self::LowerRight, Self::LowerLeft]
            .into_iter()
            .find(|c| c.endpoints(rect) == (start, end))
    }

    pub fn endpoints(self, rect: Rect<i64>) -> (Coord<i64>, Coord<i64>) {
        match self {
            Self::LowerLeft => (rect.ll(), rect.ur()),
            Self::LowerRight => (rect.lr(), rect.ul()),
            Self::UpperLeft => (rect.ul(), rect.lr()),
            Self::UpperRight => (rect.ur(), rect.ll()),
        }
    }
}

/// `corners:3 | unk1:5 | distance:24`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeWord(pub u32);

impl EdgeWord {
    pub fn new(corners: PointCorners, unk1: u8, distance: u32) -> Self {
        Self(((corners as u32) << 29) | (((unk1 & 0x1F) as u32) << 24) | (distance & 0xFF_FFFF))
    }

    pub fn corner_code(self) -> u8 {
        (self.0 >> 29) as u8
    }

    pub fn unk1(self) -> u8 {
        ((self.0 >> 24) & 0x1F) as u8
    }

    pub fn distance(self) -> u32 {
        self.0 & 0xFF_FFFF
    }
}

/// `layer_ref + 8:4 | unk2:4 | start vertex:11 | end vertex:13`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefWord(pub u32);

impl RefWord {
    pub fn new(layer_ref: i8, unk2: u8, vertices: (u16, u16)) -> Self {
        let layer = ((layer_ref as i32 + 8) as u32) & 0xF;
        Self(
            (layer << 28)
                | (((unk2 & 0xF) as u32) << 24)
                | (((vertices.0 & 0x7FF) as u32) << 13)
                | (vertices.1 & 0x1FFF) as u32,
        )
    }

    pub fn layer_ref(self) -> i8 {
        ((self.0 >> 28) as i32 - 8) as i8
    }

    pub fn unk2(self) -> u8 {
        ((self.0 >> 24) & 0xF) as u8
    }

    pub fn vertices(self) -> (u16, u16) {
        (((self.0 >> 13) & 0x7FF) as u16, (self.0 & 0x1FFF) as u16)
    }
}

/// `bidirectional:1 | reverse:1 | edge index 1:3 | edge index 0:3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionByte(pub u8);

impl DirectionByte {
    pub fn new(bidirectional: bool, reverse: bool, edge_indices: (u8, u8)) -> Self {
        Self(
            ((bidirectional as u8) << 7)
                | ((reverse as u8) << 6)
                | ((edge_indices.1 & 0x7) << 3)
                | (edge_indices.0 & 0x7),
        )
    }

    pub fn bidirectional(self) -> bool {
        self.0 & 0x80 != 0
    }

    pub fn reverse(self) -> bool {
        self.0 & 0x40 != 0
    }

    pub fn edge_indices(self) -> (u8, u8) {
        (self.0 & 0x7, (self.0 >> 3) & 0x7)
    }
}

/// `end orientation:3 | start orientation:3`, each an eighth of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrientationByte(pub u8);

impl OrientationByte {
    pub fn new(orientations: (u8, u8)) -> Self {
        Self(((orientations.1 & 0x7) << 3) | (orientations.0 & 0x7))
    }

    pub fn orientations(self) -> (u8, u8) {
        (self.0 & 0x7, (self.0 >> 3) & 0x7)
    }
}

/// Reject values that do not fit their packed field.
fn check_field(name: &str, value: i64, max: i64) -> Result<()> {
    if (0..=max).contains(&value) {
        Ok(())
    } else {
        Err(MapError::InvalidGeometry(format!(
            "routing {name} {value} does not fit in 0..={max}"
        )))
    }
}

fn check_fields(e: &RoutingEdge) -> Result<()> {
    check_field("distance", e.distance as i64, 0xFF_FFFF)?;
    check_field("start vertex", e.vertices.0 as i64, 0x7FF)?;
    check_field("end vertex", e.vertices.1 as i64, 0x1FFF)?;
    check_field("element reference", e.index_ref as i64 + 1, u16::MAX as i64)?;
    check_field("unk1", e.unk1 as i64, 0x1F)?;
    check_field("unk2", e.unk2 as i64, 0xF)?;
    for v in [e.edge_indices.0, e.edge_indices.1, e.orientations.0, e.orientations.1] {
        check_field("edge index or orientation", v as i64, 0x7)?;
    }
    if let Some(class) = e.segment_class {
        check_field("segment flags", class.flags as i64, 0xF)?;
        check_field("speed category", class.speed_category as i64, 0xF)?;
    }
    Ok(())
}

pub fn encode(e: &RoutingEdge, frame: &CellFrame, w: &mut ByteWriter) -> Result<()> {
    let start = frame.to_relative(e.start);
    let end = frame.to_relative(e.end);
    let rect = bounding_box([start, end])
        .ok_or_else(|| MapError::InvalidGeometry("routing edge".to_string()))?;
    // Always found: two points are opposite corners of their own bbox
    let corners = PointCorners::detect(start, end, rect).ok_or_else(|| {
        MapError::InvalidGeometry("routing edge endpoints are not bbox corners".to_string())
    })?;
    if !(-8..=7).contains(&e.layer_ref) {
        return Err(MapError::InvalidGeometry(format!(
            "routing layer reference {}",
            e.layer_ref
        )));
    }
    check_fields(e)?;
    if e.segment_type.is_some() && e.segment_class.is_none() {
        return Err(MapError::InvalidGeometry(
            "routing segment type requires a segment class".to_string(),
        ));
    }

    bbox::write(rect, w)?;
    w.u32(EdgeWord::new(corners, e.unk1, e.distance).0);
    w.u32(RefWord::new(e.layer_ref, e.unk2, e.vertices).0);
    w.u32(e.cellnum_ref);
    w.u16((e.index_ref + 1) as u16); // range checked above
    w.bytes(&e.restrictions);
    w.u8(DirectionByte::new(e.bidirectional, e.reverse, e.edge_indices).0);
    w.u8(OrientationByte::new(e.orientations).0);
    if let Some(segment_type) = e.segment_type {
        w.u8(segment_type);
    }
    if let Some(class) = e.segment_class {
        w.u8((class.flags << 4) | (class.speed_category & 0xF));
    }
    Ok(())
}

pub fn decode(frame: &CellFrame, r: &mut ByteReader<'_>) -> Result<RoutingEdge> {
    let rect = bbox::read(r)?;
    let edge = EdgeWord(r.u32()?);
    let refs = RefWord(r.u32()?);
    let cellnum_ref = r.u32()?;
    let index_ref = r.u16()? as i32 - 1;
    let mut restrictions = [0u8; 4];
    restrictions.copy_from_slice(r.take(4)?);
    let direction = DirectionByte(r.u8()?);
    let orientation = OrientationByte(r.u8()?);

    let (start, end) = PointCorners::from_code(edge.corner_code())?.endpoints(rect);

    let tail = r.rest();
    if tail.len() > 2 {
        return Err(MapError::ExcessData(tail.len() - 2));
    }
    let segment_class = tail.last().map(|&b| SegmentClass {
        flags: b >> 4,
        speed_category: b & 0xF,
    });
    let segment_type = (tail.len() == 2).then(|| tail[0]);

    Ok(RoutingEdge {
        start: frame.to_geographic(start),
        end: frame.to_geographic(end),
        distance: edge.distance(),
        layer_ref: refs.layer_ref(),
        cellnum_ref,
        index_ref,
        vertices: refs.vertices(),
        bidirectional: direction.bidirectional(),
        reverse: direction.reverse(),
        edge_indices: direction.edge_indices(),
        orientations: orientation.orientations(),
        restrictions,
        unk1: edge.unk1(),
        unk2: refs.unk2(),
        segment_type,
        segment_class,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::tests::test_frame;
    use crate::codec::{Endian, decode_element, encode_element};
    use crate::element::{Element, LayerType};
    use geo::coord;

    fn edge(start: (f64, f64), end: (f64, f64)) -> RoutingEdge {
        RoutingEdge::new(coord! { x: start.0, y: start.1 }, coord! { x: end.0, y: end.1 })
    }

    fn roundtrip(e: &RoutingEdge) -> RoutingEdge {
        let frame = test_frame(Endian::Big);
        let data = encode_element(&Element::RoutingEdge(e.clone()), &frame).unwrap();
        let Element::RoutingEdge(back) =
            decode_element(LayerType::Routing, &frame, &data).unwrap()
        else {
            panic!("expected a routing edge");
        };
        back
    }

    #[test]
    fn test_packed_words() {
        let w = EdgeWord::new(PointCorners::UpperLeft, 0x3F, 0x1234_5678);
        assert_eq!(w.corner_code(), 4);
        assert_eq!(w.unk1(), 0x1F);
        assert_eq!(w.distance(), 0x34_5678);

        let r = RefWord::new(-3, 2, (0x7FF, 0x1ABC));
        assert_eq!(r.layer_ref(), -3);
        assert_eq!(r.unk2(), 2);
        assert_eq!(r.vertices(), (0x7FF, 0x1ABC));
        assert_eq!(r.0 >> 28, 5);

        let d = DirectionByte::new(true, false, (5, 2));
        assert_eq!(d.0, 0x80 | (2 << 3) | 5);
        assert_eq!(d.edge_indices(), (5, 2));
        assert_eq!(OrientationByte::new((6, 1)).0, (1 << 3) | 6);
    }

    #[test]
    fn test_every_corner_pattern() {
        let cases = [
            ((5.0, 60.0), (5.1, 60.1)),
            ((5.1, 60.1), (5.0, 60.0)),
            ((5.0, 60.1), (5.1, 60.0)),
            ((5.1, 60.0), (5.0, 60.1)),
        ];
        for (a, b) in cases {
            let back = roundtrip(&edge(a, b));
            assert!((back.start.x - a.0).abs() < 1e-5 && (back.start.y - a.1).abs() < 1e-5);
            assert!((back.end.x - b.0).abs() < 1e-5 && (back.end.y - b.1).abs() < 1e-5);
        }
    }

    #[test]
    fn test_fields_roundtrip() {
        let mut e = edge((5.0, 60.0), (5.01, 60.02));
        e.distance = 1234;
        e.layer_ref = -1;
        e.cellnum_ref = 77;
        e.index_ref = 12;
        e.vertices = (3, 9);
        e.bidirectional = false;
        e.reverse = true;
        e.edge_indices = (1, 4);
        e.orientations = (6, 2);
        e.restrictions = [3, 12, 0, 3];
        e.unk1 = 7;
        e.unk2 = 1;
        e.segment_type = Some(4);
        e.segment_class = Some(SegmentClass {
            flags: 8,
            speed_category: 5,
        });
        let back = roundtrip(&e);
        assert_eq!(
            RoutingEdge {
                start: back.start,
                end: back.end,
                ..e.clone()
            },
            back
        );
    }

    #[test]
    fn test_optional_tail_bytes() {
        let mut e = edge((5.0, 60.0), (5.01, 60.02));
        assert_eq!(roundtrip(&e).segment_class, None);
        assert_eq!(roundtrip(&e).index_ref, -1);

        e.segment_class = Some(SegmentClass {
            flags: 4,
            speed_category: 2,
        });
        let back = roundtrip(&e);
        assert_eq!(back.segment_class, e.segment_class);
        assert_eq!(back.segment_type, None);

        e.segment_class = None;
        e.segment_type = Some(1);
        let frame = test_frame(Endian::Big);
        assert!(encode_element(&Element::RoutingEdge(e), &frame).is_err());
    }

    #[test]
    fn test_oversized_fields_are_rejected() {
        let frame = test_frame(Endian::Little);
        let base = edge((5.0, 60.0), (5.01, 60.02));
        let mutations: [fn(&mut RoutingEdge); 7] = [
            |e| e.distance = 0x100_0000,
            |e| e.vertices = (0x800, 0),
            |e| e.vertices = (0, 0x2000),
            |e| e.index_ref = 65_535,
            |e| e.index_ref = -2,
            |e| e.edge_indices = (8, 0),
            |e| {
                e.segment_class = Some(SegmentClass {
                    flags: 16,
                    speed_category: 0,
                })
            },
        ];
        for mutate in mutations {
            let mut e = base.clone();
            mutate(&mut e);
            assert!(matches!(
                encode_element(&Element::RoutingEdge(e), &frame),
                Err(MapError::InvalidGeometry(_))
            ));
        }
        let mut e = base;
        e.index_ref = 65_534;
        e.vertices = (0x7FF, 0x1FFF);
        assert_eq!(roundtrip(&e).index_ref, 65_534);
    }

    #[test]
    fn test_unknown_corner_code() {
        assert!(matches!(
            PointCorners::from_code(3),
            Err(MapError::UnknownCornerCode(3))
        ));
    }
}
