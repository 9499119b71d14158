//! Fixed 128-byte header at the start of every layer data file
//!
//! ```text
//! 0x00 "MHGO"          0x1c i32 object count    0x48 i8  layer type
//! 0x04 i32 category    0x20 f64 x scale         0x49 i8  0
//! 0x08 u16 file id     0x28 f64 y scale         0x4a i32 largest cell size
//! 0x0a 4 x f32 bbox    0x30 2 x f32 refpoint    0x4e i32 first cell
//! 0x1a i16 levels      0x38 4 x i32 dbbox       0x52 i32 last cell
//! ```
//!
//! The float box is stored as `minx, maxx, miny, maxy` in the Y-negated space, the
//! discrete one as `minx, miny, maxx, maxy`.

use crate::codec::{ByteReader, ByteWriter, Endian};
use crate::element::LayerType;
use crate::{MapError, Result};
use geo::{Coord, Rect, coord};

pub const HEADER_SIZE: usize = 0x80;
pub const MAGIC: &[u8; 4] = b"MHGO";
/// File id written when none is configured
pub const DEFAULT_FILE_ID: u16 = 0xC000;

/// Tolerances, in percent, of header format versions 1, 2 and 3.
const VERSION_TOLERANCES: [f64; 3] = [0.1, 1.0, 5.0];

#[derive(Debug, Clone, PartialEq)]
pub struct LayerHeader {
    pub category: i32,
    pub file_id: u16,
    /// Continuous layer box, Y negated
    pub bbox: Rect<f64>,
    pub nlevels: u32,
    pub nobjects: u32,
    pub scale: Coord<f64>,
    pub refpoint: Coord<f64>,
    pub dbbox: Rect<i64>,
    pub kind: LayerType,
    pub largest_cell: u32,
    pub first_cell: u32,
    pub last_cell: u32,
}

fn to_i32(v: i64) -> Result<i32> {
    i32::try_from(v).map_err(|_| MapError::CoordinateOverflow(v))
}

fn to_u32(v: i32, field: &str) -> Result<u32> {
    u32::try_from(v).map_err(|_| MapError::InvalidHeader(format!("negative {field} {v}")))
}

impl LayerHeader {
    pub fn encode(&self, endian: Endian) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new(endian);
        w.bytes(MAGIC);
        w.i32(self.category);
        w.u16(self.file_id);
        w.f32(self.bbox.min().x as f32);
        w.f32(self.bbox.max().x as f32);
        w.f32(self.bbox.min().y as f32);
        w.f32(self.bbox.max().y as f32);
        w.i16(self.nlevels as i16);
        w.i32(self.nobjects as i32);
        w.f64(self.scale.x);
        w.f64(self.scale.y);
        w.f32(self.refpoint.x as f32);
        w.f32(self.refpoint.y as f32);
        w.i32(to_i32(self.dbbox.min().x)?);
        w.i32(to_i32(self.dbbox.min().y)?);
        w.i32(to_i32(self.dbbox.max().x)?);
        w.i32(to_i32(self.dbbox.max().y)?);
        w.u8(self.kind.code());
        w.u8(0);
        w.i32(self.largest_cell as i32);
        w.i32(self.first_cell as i32);
        w.i32(self.last_cell as i32);
        let mut data = w.into_inner();
        data.resize(HEADER_SIZE, 0);
        Ok(data)
    }

    pub fn decode(data: &[u8], endian: Endian) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(MapError::InvalidHeader(format!("{} bytes", data.len())));
        }
        let mut r = ByteReader::new(data, endian);
        if r.take(4)? != MAGIC {
            return Err(MapError::InvalidHeader("missing MHGO magic".to_string()));
        }
        let category = r.i32()?;
        let file_id = r.u16()?;
        let (minx, maxx, miny, maxy) = (r.f32()?, r.f32()?, r.f32()?, r.f32()?);
        let bbox = Rect::new(
            coord! { x: minx as f64, y: miny as f64 },
            coord! { x: maxx as f64, y: maxy as f64 },
        );
        let nlevels = r.i16()?;
        let nlevels = u32::try_from(nlevels)
            .map_err(|_| MapError::InvalidHeader(format!("negative level count {nlevels}")))?;
        let nobjects = to_u32(r.i32()?, "object count")?;
        let scale = coord! { x: r.f64()?, y: r.f64()? };
        let refpoint = coord! { x: r.f32()? as f64, y: r.f32()? as f64 };
        let (dminx, dminy, dmaxx, dmaxy) = (r.i32()?, r.i32()?, r.i32()?, r.i32()?);
        let dbbox = Rect::new(
            coord! { x: dminx as i64, y: dminy as i64 },
            coord! { x: dmaxx as i64, y: dmaxy as i64 },
        );
        let code = r.u8()?;
        let kind = LayerType::from_code(code)
            .ok_or_else(|| MapError::InvalidHeader(format!("unknown layer type 0x{code:02x}")))?;
        let reserved = r.u8()?;
        if reserved != 0 {
            tracing::warn!("Layer header byte 0x49 is {reserved}, expected 0");
        }
        Ok(Self {
            category,
            file_id,
            bbox,
            nlevels,
            nobjects,
            scale,
            refpoint,
            dbbox,
            kind,
            largest_cell: to_u32(r.i32()?, "cell size")?,
            first_cell: to_u32(r.i32()?, "first cell")?,
            last_cell: to_u32(r.i32()?, "last cell")?,
        })
    }

    /// Inconsistencies between the float and discrete boxes at a tolerance in percent.
    ///
    /// Bit 1: height mismatch, 2: width mismatch, 4 and 8: Y and X reference point away
    /// from the box center.
    pub fn mismatch_flags(&self, percent: f64) -> u8 {
        let tolerance = percent / 100.0;
        let (dw, dh) = (self.dbbox.width() as f64, self.dbbox.height() as f64);
        let center = self.bbox.center();
        let mut flags = 0;
        if (self.bbox.height() / self.scale.y - dh).abs() > tolerance * dh {
            flags |= 1;
        }
        if (self.bbox.width() / self.scale.x - dw).abs() > tolerance * dw {
            flags |= 2;
        }
        if self.refpoint.y != 0.0 && (center.y - self.refpoint.y).abs() / self.scale.y > 0.75 {
            flags |= 4;
        }
        if self.refpoint.x != 0.0 && (center.x - self.refpoint.x).abs() / self.scale.x > 0.75 {
            flags |= 8;
        }
        flags
    }

    /// Header format version 1, 2 or 3: the first whose tolerance the header meets.
    pub fn format_version(&self) -> Result<u8> {
        let mut flags = 0;
        for (version, percent) in (1u8..).zip(VERSION_TOLERANCES) {
            flags = self.mismatch_flags(percent);
            if flags == 0 {
                return Ok(version);
            }
        }
        Err(MapError::InvalidHeader(format!(
            "inconsistent boxes (flags {flags}) at 5% tolerance"
        )))
    }
}
