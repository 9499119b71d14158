//! Coordinate system and rectangle helpers
//!
//! A layer maps geographic `(lon, lat)` coordinates onto a discrete integer grid:
//! the latitude axis is negated first, then both axes are shifted by the layer reference
//! point and divided by the layer scale.

use geo::{Coord, CoordNum, Rect, coord};
use serde::{Deserialize, Serialize};

/// Default scale of MapSend layers, in degrees per discrete unit.
pub const DEFAULT_SCALE: f64 = 9e-6;

/// Quotients this close to an integer are snapped before floor/ceil.
const SNAP_EPSILON: f64 = 1e-6;

/// Per-layer mapping between geographic and discrete coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSystem {
    /// Reference point, in the Y-negated continuous space
    pub refpoint: Coord<f64>,
    /// Size of one discrete unit along each axis
    pub scale: Coord<f64>,
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self {
            refpoint: coord! { x: 0.0, y: 0.0 },
            scale: coord! { x: DEFAULT_SCALE, y: DEFAULT_SCALE },
        }
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl CoordinateSystem {
    pub fn new(refpoint: Coord<f64>, scale: Coord<f64>) -> Self {
        Self { refpoint, scale }
    }

    /// Discretise a geographic coordinate, rounding to the nearest unit.
    #[inline]
    pub fn to_discrete(&self, c: Coord<f64>) -> Coord<i64> {
        coord! {
            x: ((c.x - self.refpoint.x) / self.scale.x).round() as i64,
            y: ((-c.y - self.refpoint.y) / self.scale.y).round() as i64,
        }
    }

    /// Inverse of [`Self::to_discrete`], back to geographic `(lon, lat)`.
    #[inline]
    pub fn to_geographic(&self, d: Coord<i64>) -> Coord<f64> {
        coord! {
            x: d.x as f64 * self.scale.x + self.refpoint.x,
            y: -(d.y as f64 * self.scale.y + self.refpoint.y),
        }
    }

    /// Discretise a geographic rectangle.
    ///
    /// The minimum corner is floored and the maximum corner ceiled so the discrete box
    /// always covers the input, then the box is grown by one unit on any axis whose size
    /// is odd so that it can be halved evenly.
    pub fn rect_to_discrete(&self, rect: Rect<f64>) -> Rect<i64> {
        let internal = rect.negate_y();
        let q1 = quotient(internal.min(), self.refpoint, self.scale);
        let q2 = quotient(internal.max(), self.refpoint, self.scale);
        let min = coord! { x: snap(q1.x).floor() as i64, y: snap(q1.y).floor() as i64 };
        let mut max = coord! { x: snap(q2.x).ceil() as i64, y: snap(q2.y).ceil() as i64 };
        max.x += (max.x - min.x) % 2;
        max.y += (max.y - min.y) % 2;
        Rect::new(min, max)
    }

    /// Continuous box of a discrete rectangle in the internal (Y-negated) space.
    ///
    /// This is the representation stored in layer headers.
    pub fn rect_to_internal(&self, rect: Rect<i64>) -> Rect<f64> {
        let map = |d: Coord<i64>| {
            coord! {
                x: d.x as f64 * self.scale.x + self.refpoint.x,
                y: d.y as f64 * self.scale.y + self.refpoint.y,
            }
        };
        Rect::new(map(rect.min()), map(rect.max()))
    }

    /// Geographic box of a discrete rectangle.
    pub fn rect_to_geographic(&self, rect: Rect<i64>) -> Rect<f64> {
        self.rect_to_internal(rect).negate_y()
    }
}

fn quotient(c: Coord<f64>, refpoint: Coord<f64>, scale: Coord<f64>) -> Coord<f64> {
    coord! {
        x: (c.x - refpoint.x) / scale.x,
        y: (c.y - refpoint.y) / scale.y,
    }
}

#[inline]
fn snap(q: f64) -> f64 {
    let r = q.round();
    if (q - r).abs() < SNAP_EPSILON { r } else { q }
}

/// Convert an integer rectangle to floating point.
pub fn rect_as_f64(rect: Rect<i64>) -> Rect<f64> {
    Rect::new(
        coord! { x: rect.min().x as f64, y: rect.min().y as f64 },
        coord! { x: rect.max().x as f64, y: rect.max().y as f64 },
    )
}

/// Smallest discrete box holding every coordinate, `None` for an empty input.
pub fn bounding_box(coords: impl IntoIterator<Item = Coord<i64>>) -> Option<Rect<i64>> {
    let mut iter = coords.into_iter();
    let first = iter.next()?;
    let (min, max) = iter.fold((first, first), |(min, max), c| {
        (
            coord! { x: min.x.min(c.x), y: min.y.min(c.y) },
            coord! { x: max.x.max(c.x), y: max.y.max(c.y) },
        )
    });
    Some(Rect::new(min, max))
}

/// Corner names and set operations for rectangles.
///
/// Corner names refer to the rectangle's own axes: `ll` is `(min.x, min.y)` and `ur` is
/// `(max.x, max.y)`.
pub trait RectExt<T: CoordNum> {
    fn ll(&self) -> Coord<T>;
    fn ul(&self) -> Coord<T>;
    fn lr(&self) -> Coord<T>;
    fn ur(&self) -> Coord<T>;
    fn union(&self, other: &Self) -> Self;
    /// Grow by `margin` on every side
    fn buffer(&self, margin: T) -> Self;
    fn translate(&self, offset: Coord<T>) -> Self;
    /// Mirror across the X axis
    fn negate_y(&self) -> Self;
    /// True if `self` lies inside `other` grown by `margin`
    fn is_covered_by(&self, other: &Self, margin: T) -> bool;
}

impl<T: CoordNum + std::ops::Neg<Output = T>> RectExt<T> for Rect<T> {
    fn ll(&self) -> Coord<T> {
        self.min()
    }

    fn ul(&self) -> Coord<T> {
        coord! { x: self.min().x, y: self.max().y }
    }

    fn lr(&self) -> Coord<T> {
        coord! { x: self.max().x, y: self.min().y }
    }

    fn ur(&self) -> Coord<T> {
        self.max()
    }

    fn union(&self, other: &Self) -> Self {
        let pick_min = |a: T, b: T| if b < a { b } else { a };
        let pick_max = |a: T, b: T| if b > a { b } else { a };
        Rect::new(
            coord! {
                x: pick_min(self.min().x, other.min().x),
                y: pick_min(self.min().y, other.min().y),
            },
            coord! {
                x: pick_max(self.max().x, other.max().x),
                y: pick_max(self.max().y, other.max().y),
            },
        )
    }

    fn buffer(&self, margin: T) -> Self {
        let m = coord! { x: margin, y: margin };
        Rect::new(self.min() - m, self.max() + m)
    }

    fn translate(&self, offset: Coord<T>) -> Self {
        Rect::new(self.min() + offset, self.max() + offset)
    }

    fn negate_y(&self) -> Self {
        Rect::new(
            coord! { x: self.min().x, y: -self.max().y },
            coord! { x: self.max().x, y: -self.min().y },
        )
    }

    fn is_covered_by(&self, other: &Self, margin: T) -> bool {
        let outer = other.buffer(margin);
        self.min().x >= outer.min().x
            && self.min().y >= outer.min().y
            && self.max().x <= outer.max().x
            && self.max().y <= outer.max().y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milli() -> CoordinateSystem {
        CoordinateSystem::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1e-3, y: 1e-3 })
    }

    #[test]
    fn test_rect_to_discrete_negates_and_covers() {
        let rect = Rect::new(coord! { x: -3.0, y: -4.0 }, coord! { x: 2.0, y: 1.0 });
        let d = milli().rect_to_discrete(rect);
        assert_eq!(d.min(), coord! { x: -3000, y: -1000 });
        assert_eq!(d.max(), coord! { x: 2000, y: 4000 });
    }

    #[test]
    fn test_rect_to_discrete_even_size() {
        let cs = CoordinateSystem::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let d = cs.rect_to_discrete(Rect::new(coord! { x: 0.2, y: 0.0 }, coord! { x: 2.5, y: 3.0 }));
        assert_eq!(d.width() % 2, 0);
        assert_eq!(d.height() % 2, 0);
        assert_eq!(d.min(), coord! { x: 0, y: -3 });
    }

    #[test]
    fn test_point_roundtrip_within_unit() {
        let cs = CoordinateSystem::default();
        let p = coord! { x: 16.1757486998, y: 58.5899908940 };
        let back = cs.to_geographic(cs.to_discrete(p));
        assert!((back.x - p.x).abs() <= cs.scale.x);
        assert!((back.y - p.y).abs() <= cs.scale.y);
    }

    #[test]
    fn test_rect_geographic_roundtrip() {
        let cs = milli();
        let rect = Rect::new(coord! { x: -3.0, y: -4.0 }, coord! { x: 2.0, y: 1.0 });
        let back = cs.rect_to_geographic(cs.rect_to_discrete(rect));
        assert!((back.min().x + 3.0).abs() < 1e-9);
        assert!((back.min().y + 4.0).abs() < 1e-9);
        assert!((back.max().y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_corners_and_union() {
        let a = Rect::new(coord! { x: 0, y: 0 }, coord! { x: 2, y: 4 });
        assert_eq!(a.ul(), coord! { x: 0, y: 4 });
        assert_eq!(a.lr(), coord! { x: 2, y: 0 });
        let b = Rect::new(coord! { x: -1, y: 1 }, coord! { x: 1, y: 6 });
        let u = a.union(&b);
        assert_eq!(u.min(), coord! { x: -1, y: 0 });
        assert_eq!(u.max(), coord! { x: 2, y: 6 });
        assert_eq!(a.translate(coord! { x: 1, y: 1 }).min(), coord! { x: 1, y: 1 });
    }

    #[test]
    fn test_is_covered_by_margin() {
        let inner = Rect::new(coord! { x: -0.5, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let outer = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        assert!(!inner.is_covered_by(&outer, 0.0));
        assert!(inner.is_covered_by(&outer, 0.5));
    }

    #[test]
    fn test_bounding_box() {
        let b = bounding_box([coord! { x: 3, y: -1 }, coord! { x: 0, y: 5 }]);
        assert_eq!(b, Some(Rect::new(coord! { x: 0, y: -1 }, coord! { x: 3, y: 5 })));
        assert_eq!(bounding_box(std::iter::empty()), None);
    }
}
