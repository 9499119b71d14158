//! Geometry records stored in layer cells
//!
//! A layer stores records of exactly one kind, identified by its [`LayerType`]. All
//! coordinates are geographic `(lon, lat)`; the codec takes care of the cell-relative
//! integer representation.

use crate::coords::{CoordinateSystem, bounding_box};
use crate::{MapError, Result};
use geo::{Coord, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Layer type code written in layer headers; each code is bound to one record kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    Point,
    Polygon,
    Polyline,
    Label,
    Poi,
    Routing,
}

impl LayerType {
    pub const ALL: [LayerType; 6] = [
        LayerType::Point,
        LayerType::Polygon,
        LayerType::Polyline,
        LayerType::Label,
        LayerType::Poi,
        LayerType::Routing,
    ];

    pub fn code(self) -> u8 {
        match self {
            LayerType::Point => 0x0b,
            LayerType::Polygon => 0x0c,
            LayerType::Polyline => 0x0d,
            LayerType::Label => 0x0f,
            LayerType::Poi => 0x10,
            LayerType::Routing => 0x11,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerType::Point => "point",
            LayerType::Polygon => "polygon",
            LayerType::Polyline => "polyline",
            LayerType::Label => "label",
            LayerType::Poi => "poi",
            LayerType::Routing => "routing",
        }
    }

    /// Linear size model `(base, per vertex)` in bytes used for level estimation.
    pub(crate) fn size_model(self) -> (f64, f64) {
        match self {
            LayerType::Routing => (28.0, 0.0),
            _ => (10.0, 1.3),
        }
    }
}

/// Reference into an external text table: 8-bit offset and 24-bit index.
///
/// The raw value `0xFF000000` means "no text" and is represented as `None` wherever an
/// `Option<TextSlot>` is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSlot(u32);

impl TextSlot {
    pub const NONE_RAW: u32 = 0xFF00_0000;

    /// Slot for `index` in the table at `offset`. Offset `0xFF` is reserved for the
    /// "no text" sentinel and the index must fit in 24 bits.
    pub fn new(offset: u8, index: u32) -> Result<Self> {
        if offset == 0xFF || index > 0x00FF_FFFF {
            return Err(MapError::InvalidTextSlot { offset, index });
        }
        Ok(Self(((offset as u32) << 24) | index))
    }

    /// Wrap a raw value, mapping the "no text" sentinel to `None`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != Self::NONE_RAW).then_some(Self(raw))
    }

    pub fn to_raw(slot: Option<TextSlot>) -> u32 {
        slot.map_or(Self::NONE_RAW, |s| s.0)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn offset(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn index(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }
}

/// Plain map point with an object type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointElement {
    pub coord: Coord<f64>,
    pub objtype: u8,
    pub textslot: Option<TextSlot>,
}

impl PointElement {
    pub fn new(coord: Coord<f64>) -> Self {
        Self {
            coord,
            objtype: 0,
            textslot: None,
        }
    }
}

/// Text label anchored at a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelElement {
    pub coord: Coord<f64>,
    pub textslot: Option<TextSlot>,
}

/// Point of interest with category ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiElement {
    pub coord: Coord<f64>,
    pub category: u8,
    pub subcategory: u8,
    pub textslot: Option<TextSlot>,
}

/// Per-vertex corner data found in some device-generated areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CornerData {
    pub marker: u8,
    pub values: Vec<u8>,
}

/// Area made of one or more rings, stored without the closing vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaElement {
    pub rings: Vec<LineString<f64>>,
    pub objtype: u8,
    pub textslot: Option<TextSlot>,
    pub corner_data: Option<CornerData>,
}

impl AreaElement {
    /// Build an area, dropping a repeated closing vertex from every ring.
    ///
    /// Every ring must keep at least three vertices.
    pub fn new(rings: Vec<LineString<f64>>) -> Result<Self> {
        if rings.is_empty() {
            return Err(MapError::InvalidGeometry("area without rings".to_string()));
        }
        let rings = rings
            .into_iter()
            .map(|ring| {
                let mut coords = ring.0;
                if coords.len() > 1 && coords.first() == coords.last() {
                    coords.pop();
                }
                if coords.len() < 3 {
                    return Err(MapError::InvalidGeometry(format!(
                        "area ring with {} vertices",
                        coords.len()
                    )));
                }
                Ok(LineString::new(coords))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            rings,
            objtype: 0,
            textslot: None,
            corner_data: None,
        })
    }

    /// Closed polygon view: first ring as exterior, the rest as holes.
    pub fn to_polygon(&self) -> Polygon<f64> {
        let close = |ring: &LineString<f64>| {
            let mut ring = ring.clone();
            ring.close();
            ring
        };
        let mut rings = self.rings.iter().map(close);
        let exterior = rings.next().unwrap_or_else(|| LineString::new(vec![]));
        Polygon::new(exterior, rings.collect())
    }
}

/// Open line such as a road or a track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineElement {
    pub line: LineString<f64>,
    pub objtype: u8,
    pub textslot: Option<TextSlot>,
    /// Trailing routing bytes, kept verbatim
    pub excess: Vec<u8>,
}

impl PolylineElement {
    pub fn new(line: LineString<f64>) -> Result<Self> {
        if line.0.len() < 2 {
            return Err(MapError::InvalidGeometry(format!(
                "polyline with {} vertices",
                line.0.len()
            )));
        }
        Ok(Self {
            line,
            objtype: 0,
            textslot: None,
            excess: Vec::new(),
        })
    }

    /// Unknown leading byte of the routing bytes, present when their count is odd.
    pub fn routing_unknown(&self) -> Option<u8> {
        (self.excess.len() % 2 == 1).then(|| self.excess[0])
    }

    /// Vertex indices flagged as routing nodes in the trailing bitset.
    ///
    /// The bitset bytes are stored most significant first; bit `i` of the `k`-th byte
    /// counted from the end marks vertex `8k + i`.
    pub fn routing_vertex_indices(&self) -> SmallVec<[usize; 8]> {
        let bits = &self.excess[self.excess.len() % 2..];
        bits.iter()
            .rev()
            .enumerate()
            .flat_map(|(k, &byte)| (0..8).filter(move |i| byte & (1 << i) != 0).map(move |i| 8 * k + i))
            .collect()
    }
}

/// Segment flags and speed category of a routing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentClass {
    /// Road flags: 4 freeway, 8 roundabout
    pub flags: u8,
    pub speed_category: u8,
}

/// Edge of the routing network, pointing back at the polyline vertices it joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEdge {
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    /// Length of the edge, 24 bits
    pub distance: u32,
    /// Layer of the referenced polyline, relative index in -8..=7
    pub layer_ref: i8,
    pub cellnum_ref: u32,
    /// Index of the referenced polyline inside its cell, -1 if none
    pub index_ref: i32,
    /// Start and end vertex indices inside the referenced polyline
    pub vertices: (u16, u16),
    pub bidirectional: bool,
    pub reverse: bool,
    pub edge_indices: (u8, u8),
    pub orientations: (u8, u8),
    pub restrictions: [u8; 4],
    pub unk1: u8,
    pub unk2: u8,
    pub segment_type: Option<u8>,
    pub segment_class: Option<SegmentClass>,
}

impl RoutingEdge {
    pub fn new(start: Coord<f64>, end: Coord<f64>) -> Self {
        Self {
            start,
            end,
            distance: 0,
            layer_ref: 0,
            cellnum_ref: 0,
            index_ref: -1,
            vertices: (0, 0),
            bidirectional: true,
            reverse: false,
            edge_indices: (0, 0),
            orientations: (0, 0),
            restrictions: [0; 4],
            unk1: 0,
            unk2: 0,
            segment_type: None,
            segment_class: None,
        }
    }
}

/// One geometry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Point(PointElement),
    Label(LabelElement),
    Poi(PoiElement),
    Area(AreaElement),
    Polyline(PolylineElement),
    RoutingEdge(RoutingEdge),
}

impl Element {
    /// Layer type able to hold this record
    pub fn kind(&self) -> LayerType {
        match self {
            Element::Point(_) => LayerType::Point,
            Element::Label(_) => LayerType::Label,
            Element::Poi(_) => LayerType::Poi,
            Element::Area(_) => LayerType::Polygon,
            Element::Polyline(_) => LayerType::Polyline,
            Element::RoutingEdge(_) => LayerType::Routing,
        }
    }

    pub fn textslot(&self) -> Option<TextSlot> {
        match self {
            Element::Point(p) => p.textslot,
            Element::Label(l) => l.textslot,
            Element::Poi(p) => p.textslot,
            Element::Area(a) => a.textslot,
            Element::Polyline(p) => p.textslot,
            Element::RoutingEdge(_) => None,
        }
    }

    /// All vertices in storage order
    pub fn coords(&self) -> Box<dyn Iterator<Item = Coord<f64>> + '_> {
        match self {
            Element::Point(p) => Box::new(std::iter::once(p.coord)),
            Element::Label(l) => Box::new(std::iter::once(l.coord)),
            Element::Poi(p) => Box::new(std::iter::once(p.coord)),
            Element::Area(a) => Box::new(a.rings.iter().flat_map(|r| r.0.iter().copied())),
            Element::Polyline(p) => Box::new(p.line.0.iter().copied()),
            Element::RoutingEdge(e) => Box::new([e.start, e.end].into_iter()),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.coords().count()
    }

    /// Discrete box of the record on the layer grid.
    pub fn discrete_bbox(&self, coords: &CoordinateSystem) -> Result<Rect<i64>> {
        bounding_box(self.coords().map(|c| coords.to_discrete(c)))
            .ok_or_else(|| MapError::InvalidGeometry("element without vertices".to_string()))
    }

    /// Approximate encoded size in bytes.
    pub fn estimated_size(&self) -> f64 {
        let (base, per_vertex) = self.kind().size_model();
        base + per_vertex * self.vertex_count() as f64
    }
}
