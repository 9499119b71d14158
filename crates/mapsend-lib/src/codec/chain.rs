//! Signed-byte delta chains
//!
//! Consecutive vertices are stored as `(i8, i8)` steps. A step larger than 127 on either
//! axis is split by inserting synthetic vertices: the dominant axis moves by exactly 127
//! and the other axis proportionally, rounded towards negative infinity. Synthetic vertices are
//! real vertices for the decoder and count towards the stored vertex total.

use super::{ByteReader, ByteWriter};
use crate::Result;
use geo::{Coord, coord};

pub const MAX_STEP: i64 = 127;

/// Largest vertex count of one stored chain, synthetic vertices included.
pub const MAX_VERTICES: usize = 0x1FFF;

/// Deltas of a chain plus the number of synthetic vertices they introduced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaChain {
    pub steps: Vec<(i8, i8)>,
    pub inserted: usize,
}

impl DeltaChain {
    /// Encode the path through `vertices`, starting at the first one.
    pub fn encode(vertices: &[Coord<i64>]) -> Self {
        let mut chain = Self::default();
        let Some((&first, rest)) = vertices.split_first() else {
            return chain;
        };
        let mut pos = first;
        for &target in rest {
            loop {
                let step = clamp_step(target - pos);
                chain.steps.push((step.x as i8, step.y as i8));
                pos = pos + step;
                if pos == target {
                    break;
                }
                chain.inserted += 1;
            }
        }
        chain
    }

    pub fn write(&self, w: &mut ByteWriter) {
        for &(dx, dy) in &self.steps {
            w.i8(dx);
            w.i8(dy);
        }
    }
}

/// Number of stored steps needed to move by `delta`, one per vertex reached.
pub fn step_count(delta: Coord<i64>) -> usize {
    let dominant = delta.x.abs().max(delta.y.abs());
    ((dominant as u64).div_ceil(MAX_STEP as u64) as usize).max(1)
}

/// Largest step towards `delta` that fits in a signed byte on both axes.
fn clamp_step(delta: Coord<i64>) -> Coord<i64> {
    let dominant = delta.x.abs().max(delta.y.abs());
    if dominant <= MAX_STEP {
        return delta;
    }
    coord! {
        x: (delta.x * MAX_STEP).div_euclid(dominant),
        y: (delta.y * MAX_STEP).div_euclid(dominant),
    }
}

/// Read `count` steps and return the visited positions, excluding `start`.
pub fn read(start: Coord<i64>, count: usize, r: &mut ByteReader<'_>) -> Result<Vec<Coord<i64>>> {
    let mut pos = start;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let dx = r.i8()? as i64;
        let dy = r.i8()? as i64;
        pos = pos + coord! { x: dx, y: dy };
        out.push(pos);
    }
    Ok(out)
}
