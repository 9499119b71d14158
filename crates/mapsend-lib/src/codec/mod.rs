//! Binary encoding of geometry records and cell blocks
//!
//! Every record is written relative to the discrete box of the cell that holds it, so the
//! same [`CellFrame`] has to be available to decode it again. A cell block is laid out as
//!
//! ```text
//! u16 count | u16 skip | (u16 size | record data)* | pad to even length
//! ```
//!
//! where the record data always starts with the adaptive-precision bounding box.

pub mod bbox;
pub mod chain;
pub mod routing;
pub mod textslot;

mod area;
mod point;
mod polyline;

use crate::coords::CoordinateSystem;
use crate::element::{Element, LayerType};
use crate::{MapError, Result};
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Size of the record size field plus the full-width bbox the size field is based on.
const RECORD_SIZE_BIAS: usize = 15 + 2;

/// Byte order of a layer file pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Extension of the data file
    pub fn data_extension(self) -> &'static str {
        match self {
            Endian::Little => "lay",
            Endian::Big => "yal",
        }
    }

    /// Extension of the cell index file
    pub fn index_extension(self) -> &'static str {
        match self {
            Endian::Little => "clt",
            Endian::Big => "tlc",
        }
    }
}

/// Everything needed to place records of one cell on the discrete grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellFrame {
    /// Discrete box of the cell
    pub bbox: Rect<i64>,
    pub coords: CoordinateSystem,
    pub endian: Endian,
}

impl CellFrame {
    pub fn new(bbox: Rect<i64>, coords: CoordinateSystem, endian: Endian) -> Self {
        Self {
            bbox,
            coords,
            endian,
        }
    }

    /// Geographic coordinate to cell-relative discrete coordinate.
    #[inline]
    pub fn to_relative(&self, c: Coord<f64>) -> Coord<i64> {
        self.coords.to_discrete(c) - self.bbox.min()
    }

    /// Cell-relative discrete coordinate back to geographic.
    #[inline]
    pub fn to_geographic(&self, rel: Coord<i64>) -> Coord<f64> {
        self.coords.to_geographic(rel + self.bbox.min())
    }

    pub fn reader<'a>(&self, data: &'a [u8]) -> ByteReader<'a> {
        ByteReader::new(data, self.endian)
    }

    pub fn writer(&self) -> ByteWriter {
        ByteWriter::new(self.endian)
    }
}

macro_rules! read_as {
    ($self:ident, $n:expr, $f:ident) => {{
        let bytes = $self.take($n)?;
        Ok(match $self.endian {
            Endian::Little => LittleEndian::$f(bytes),
            Endian::Big => BigEndian::$f(bytes),
        })
    }};
}

/// Bounds-checked cursor over record bytes.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, endian }
    }

    /// Bytes left to read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(MapError::Truncated {
                needed: n,
                available: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Consume everything left
    pub fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.buf)
    }

    pub fn peek_u8(&self) -> Result<u8> {
        self.buf.first().copied().ok_or(MapError::Truncated {
            needed: 1,
            available: 0,
        })
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.u8()? as i8)
    }

    pub fn u16(&mut self) -> Result<u16> {
        read_as!(self, 2, read_u16)
    }

    pub fn i16(&mut self) -> Result<i16> {
        read_as!(self, 2, read_i16)
    }

    pub fn u32(&mut self) -> Result<u32> {
        read_as!(self, 4, read_u32)
    }

    pub fn i32(&mut self) -> Result<i32> {
        read_as!(self, 4, read_i32)
    }

    pub fn f32(&mut self) -> Result<f32> {
        read_as!(self, 4, read_f32)
    }

    pub fn f64(&mut self) -> Result<f64> {
        read_as!(self, 8, read_f64)
    }
}

macro_rules! write_as {
    ($self:ident, $n:expr, $f:ident, $v:expr) => {{
        let mut bytes = [0u8; $n];
        match $self.endian {
            Endian::Little => LittleEndian::$f(&mut bytes, $v),
            Endian::Big => BigEndian::$f(&mut bytes, $v),
        }
        $self.buf.extend_from_slice(&bytes);
    }};
}

/// Growable output buffer with the layer byte order.
#[derive(Debug, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl ByteWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn u16(&mut self, v: u16) {
        write_as!(self, 2, write_u16, v)
    }

    pub fn i16(&mut self, v: i16) {
        write_as!(self, 2, write_i16, v)
    }

    pub fn u32(&mut self, v: u32) {
        write_as!(self, 4, write_u32, v)
    }

    pub fn i32(&mut self, v: i32) {
        write_as!(self, 4, write_i32, v)
    }

    pub fn f32(&mut self, v: f32) {
        write_as!(self, 4, write_f32, v)
    }

    pub fn f64(&mut self, v: f64) {
        write_as!(self, 8, write_f64, v)
    }

    /// Append zero bytes until the length is even
    pub fn pad_even(&mut self) {
        if self.buf.len() % 2 == 1 {
            self.buf.push(0);
        }
    }
}

/// Encode the record data of an element, without the size field.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn encode_element(element: &Element, frame: &CellFrame) -> Result<Vec<u8>> {
    let mut w = frame.writer();
    match element {
        Element::Point(p) => point::encode_point(p, frame, &mut w)?,
        Element::Label(l) => point::encode_label(l, frame, &mut w)?,
        Element::Poi(p) => point::encode_poi(p, frame, &mut w)?,
        Element::Area(a) => area::encode(a, frame, &mut w)?,
        Element::Polyline(p) => polyline::encode(p, frame, &mut w)?,
        Element::RoutingEdge(e) => routing::encode(e, frame, &mut w)?,
    }
    Ok(w.into_inner())
}

/// Decode the record data of an element of the given layer type.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn decode_element(kind: LayerType, frame: &CellFrame, data: &[u8]) -> Result<Element> {
    let mut r = frame.reader(data);
    Ok(match kind {
        LayerType::Point => Element::Point(point::decode_point(frame, &mut r)?),
        LayerType::Label => Element::Label(point::decode_label(frame, &mut r)?),
        LayerType::Poi => Element::Poi(point::decode_poi(frame, &mut r)?),
        LayerType::Polygon => Element::Area(area::decode(frame, &mut r)?),
        LayerType::Polyline => Element::Polyline(polyline::decode(frame, &mut r)?),
        LayerType::Routing => Element::RoutingEdge(routing::decode(frame, &mut r)?),
    })
}

/// Size field of a record: the data length corrected for the bbox fields that the
/// precision byte left out or narrowed.
pub fn record_size_field(data: &[u8]) -> Result<u16> {
    let precision = bbox::Precision(data.first().copied().unwrap_or(0));
    let size = data.len() + RECORD_SIZE_BIAS - precision.encoded_len();
    u16::try_from(size).map_err(|_| MapError::InvalidGeometry(format!("record of {size} bytes")))
}

/// Write one framed record.
pub fn write_record(element: &Element, frame: &CellFrame, out: &mut ByteWriter) -> Result<()> {
    let data = encode_element(element, frame)?;
    out.u16(record_size_field(&data)?);
    out.bytes(&data);
    Ok(())
}

/// Read one framed record, returning its raw data.
pub fn read_record<'a>(r: &mut ByteReader<'a>) -> Result<&'a [u8]> {
    let size = r.u16()?;
    let precision = bbox::Precision(r.peek_u8()?);
    let len = (size as usize + precision.encoded_len())
        .checked_sub(RECORD_SIZE_BIAS)
        .ok_or(MapError::InvalidRecordSize(size))?;
    r.take(len)
}

/// Frame already encoded records as a cell block.
pub fn encode_block(count: usize, records: &[u8], endian: Endian) -> Result<Vec<u8>> {
    let count = u16::try_from(count)
        .map_err(|_| MapError::InvalidGeometry(format!("{count} records in one cell")))?;
    let mut w = ByteWriter::new(endian);
    w.u16(count);
    w.u16(0);
    w.bytes(records);
    w.pad_even();
    Ok(w.into_inner())
}

/// Decode every record of a cell block.
///
/// Blocks with a non-zero skip count were compressed by the device toolchain and must be
/// unpacked before they reach this function.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn parse_block(
    data: &[u8],
    cellnum: u32,
    kind: LayerType,
    frame: &CellFrame,
) -> Result<Vec<Element>> {
    let mut r = frame.reader(data);
    let count = r.u16()?;
    let skip = r.u16()?;
    if skip != 0 {
        return Err(MapError::CompressedBlock { cellnum, skip });
    }
    (0..count)
        .map(|_| {
            let record = read_record(&mut r)?;
            decode_element(kind, frame, record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PointElement;
    use geo::coord;

    pub(crate) fn test_frame(endian: Endian) -> CellFrame {
        let coords = CoordinateSystem::default();
        let bbox = Rect::new(coord! { x: 0, y: -7_000_000 }, coord! { x: 2_000_000, y: 0 });
        CellFrame::new(bbox, coords, endian)
    }

    #[test]
    fn test_reader_truncation_is_an_error() {
        let mut r = ByteReader::new(&[1, 2, 3], Endian::Little);
        assert_eq!(r.u16().ok(), Some(0x0201));
        assert!(matches!(
            r.u16(),
            Err(MapError::Truncated {
                needed: 2,
                available: 1
            })
        ));
    }

    #[test]
    fn test_writer_endianness() {
        let mut le = ByteWriter::new(Endian::Little);
        le.u32(0x0102_0304);
        assert_eq!(le.into_inner(), vec![4, 3, 2, 1]);
        let mut be = ByteWriter::new(Endian::Big);
        be.u32(0x0102_0304);
        assert_eq!(be.into_inner(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_point_record_bytes() {
        let frame = CellFrame::new(
            Rect::new(coord! { x: 0, y: 0 }, coord! { x: 1_000_000, y: 1_000_000 }),
            CoordinateSystem::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }),
            Endian::Little,
        );
        let point = Element::Point(PointElement::new(coord! { x: 111111.0, y: -444446.0 }));
        let mut w = frame.writer();
        write_record(&point, &frame, &mut w).unwrap();
        assert_eq!(
            w.into_inner(),
            vec![
                0x16, 0x00, 0xf0, 0x07, 0xb2, 0x01, 0x00, 0x1e, 0xc8, 0x06, 0x00, 0xff, 0x00, 0x00,
                0x00
            ]
        );
    }

    #[test]
    fn test_block_roundtrip_and_padding() {
        let frame = test_frame(Endian::Big);
        let points: Vec<Element> = [(5.0, 60.0), (5.1, 60.1), (7.5, 61.0)]
            .iter()
            .map(|&(x, y)| Element::Point(PointElement::new(coord! { x: x, y: y })))
            .collect();
        let mut w = frame.writer();
        for p in &points {
            write_record(p, &frame, &mut w).unwrap();
        }
        let block = encode_block(points.len(), &w.into_inner(), Endian::Big).unwrap();
        assert_eq!(block.len() % 2, 0);
        let decoded = parse_block(&block, 1, LayerType::Point, &frame).unwrap();
        assert_eq!(decoded.len(), 3);
        for (a, b) in points.iter().zip(&decoded) {
            let (Element::Point(a), Element::Point(b)) = (a, b) else {
                panic!("kind changed");
            };
            assert!((a.coord.x - b.coord.x).abs() < 1e-5);
            assert!((a.coord.y - b.coord.y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_nonzero_skip_is_rejected() {
        let frame = test_frame(Endian::Little);
        let block = [1u8, 0, 1, 0, 0, 0];
        assert!(matches!(
            parse_block(&block, 9, LayerType::Point, &frame),
            Err(MapError::CompressedBlock { cellnum: 9, skip: 1 })
        ));
    }

    #[test]
    fn test_invalid_size_field() {
        let mut r = ByteReader::new(&[0x01, 0x00, 0xff], Endian::Little);
        assert!(matches!(read_record(&mut r), Err(MapError::InvalidRecordSize(1))));
    }
}
