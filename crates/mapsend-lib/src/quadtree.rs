//! Implicit quadtree cell addressing
//!
//! Cells are numbered level by level starting at 1 for the whole layer. Level `L` holds
//! an aligned grid of `2^L x 2^L` cells followed by a staggered grid of
//! `(2^L + 1) x (2^L + 1)` cells shifted by half a cell, so geometry straddling an
//! aligned boundary can still live at a deep level. Nothing about the tree is stored:
//! every cell box is derived from the layer box and the cell number.

use crate::coords::{RectExt, rect_as_f64};
use geo::{Rect, coord};

/// Deepest level whose cell numbers fit in the 32-bit index entries.
pub const MAX_LEVEL: u32 = 15;

/// Total number of cells in levels `0..=level`; zero for negative levels.
///
/// `T(L) = (-17 + 2*4^(L+1) + 6*2^(L+1) + 3L) / 3`
pub fn totcells_at_level(level: i32) -> u64 {
    if level < 0 {
        return 0;
    }
    let l = level as i64;
    let total = -17 + 2 * (1i64 << (2 * (l + 1))) + 6 * (1i64 << (l + 1)) + 3 * l;
    (total / 3) as u64
}

/// Level a cell number belongs to, `None` for the invalid cell number 0.
pub fn level_of_cell(cellnum: u32) -> Option<u32> {
    if cellnum == 0 {
        return None;
    }
    (0..=MAX_LEVEL + 1).find(|&l| cellnum as u64 <= totcells_at_level(l as i32))
}

/// Discrete box of a cell inside the discrete layer box.
///
/// Integer division mirrors the on-device computation: the cell size at level `L` is
/// `layer size / 2^L` per axis, staggered cells start half a cell earlier and are
/// clipped to the layer. Cell number 0 is treated as the root.
pub fn calc_cell_extents(layer: Rect<i64>, cellnum: u32) -> Rect<i64> {
    let cellnum = cellnum.max(1);
    let level = level_of_cell(cellnum).unwrap_or(0);
    let n = 1i64 << level;
    let rel = cellnum as i64 - totcells_at_level(level as i32 - 1) as i64 - 1;

    let (w, h) = (layer.width(), layer.height());
    let size = coord! { x: w / n, y: h / n };

    let (min, max) = if rel < n * n {
        let min = coord! { x: (rel % n) * size.x, y: (rel / n) * size.y };
        (min, min + size)
    } else {
        let rel = rel - n * n;
        let min = coord! {
            x: (rel % (n + 1)) * size.x - size.x / 2,
            y: (rel / (n + 1)) * size.y - size.y / 2,
        };
        let max = min + size;
        (
            coord! { x: min.x.max(0), y: min.y.max(0) },
            coord! { x: max.x.min(w), y: max.y.min(h) },
        )
    };

    Rect::new(min, max).translate(layer.min())
}

/// Number of the deepest cell (up to `maxlevels`) that fully contains `bbox`.
///
/// Levels are tried from `maxlevels` down to 0. At each level the aligned grid is
/// preferred; the staggered grid is used only when the box crosses an aligned boundary
/// on either axis. When no level accepts the box the root cell 1 is returned.
pub fn max_cellno_containing_bbox(layerbbox: Rect<f64>, bbox: Rect<f64>, maxlevels: u32) -> u32 {
    let maxlevels = maxlevels.min(MAX_LEVEL);
    let inc = bbox.translate(coord! { x: -layerbbox.min().x, y: -layerbbox.min().y });
    let (w, h) = (layerbbox.width(), layerbbox.height());

    let crosses = |c1: f64, c2: f64, cw: f64| c2.rem_euclid(cw) < c1.rem_euclid(cw);

    let mut found = None;
    for level in (0..=maxlevels).rev() {
        let div = (1u64 << level) as f64;
        let (cw, ch) = (w / div, h / div);
        if inc.width() > cw || inc.height() > ch {
            continue;
        }
        let aligned_crossing = crosses(inc.min().x, inc.max().x, cw)
            || crosses(inc.min().y, inc.max().y, ch);
        if !aligned_crossing {
            found = Some((level, 0u64));
            break;
        }
        let shifted = inc.translate(coord! { x: cw / 2.0, y: ch / 2.0 });
        let shifted_crossing = crosses(shifted.min().x, shifted.max().x, cw)
            || crosses(shifted.min().y, shifted.max().y, ch);
        if !shifted_crossing {
            found = Some((level, 1u64));
            break;
        }
    }

    let Some((level, shifted)) = found else {
        return 1;
    };

    let n = 1u64 << level;
    let div = n as f64;
    let (cw, ch) = (w / div, h / div);
    let half = shifted as f64 * 0.5;
    let last = (n + shifted - 1) as f64;
    let col = ((inc.min().x + half * cw) / cw).floor().clamp(0.0, last) as u64;
    let row = ((inc.min().y + half * ch) / ch).floor().clamp(0.0, last) as u64;

    let cellnum =
        1 + totcells_at_level(level as i32 - 1) + col + (n + shifted) * row + shifted * n * n;
    cellnum as u32
}

/// Deepest cell whose integer extents cover a discrete box.
///
/// [`max_cellno_containing_bbox`] reasons with exact fractional cell sizes while
/// [`calc_cell_extents`] uses integer division, so near cell edges the chosen cell can
/// miss the box by a unit. The search then retries one level up until the extents cover
/// the box, which always holds for the root.
pub fn cell_for_discrete_bbox(layer: Rect<i64>, bbox: Rect<i64>, maxlevels: u32) -> u32 {
    let layer_f = rect_as_f64(layer);
    let bbox_f = rect_as_f64(bbox);
    let mut limit = maxlevels;
    loop {
        let cellnum = max_cellno_containing_bbox(layer_f, bbox_f, limit);
        let level = level_of_cell(cellnum).unwrap_or(0);
        if level == 0 || bbox.is_covered_by(&calc_cell_extents(layer, cellnum), 0) {
            return cellnum;
        }
        limit = level - 1;
    }
}
