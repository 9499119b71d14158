//! Layer parameter estimation for layers created without a bounding box
//!
//! While the box is deferred every element lands in cell 1 and only a sample
//! `(discrete bbox, estimated size)` is recorded. Once all data is in, the estimator
//! proposes the layer box and the shallowest level count keeping every cell within the
//! configured budgets.

use crate::config::EstimatorLimits;
use crate::coords::{CoordinateSystem, RectExt};
use crate::element::Element;
use crate::quadtree::cell_for_discrete_bbox;
use crate::{MapError, Result};
use geo::{Rect, coord};
use rayon::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Estimator {
    limits: EstimatorLimits,
    dbbox: Option<Rect<i64>>,
    samples: Vec<(Rect<i64>, f64)>,
}

/// Element count and summed size of one cell
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    count: usize,
    size: f64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Estimator {
    pub fn new(limits: EstimatorLimits) -> Self {
        Self {
            limits,
            dbbox: None,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn add(&mut self, element: &Element, coords: &CoordinateSystem) -> Result<()> {
        let bbox = element.discrete_bbox(coords)?;
        self.dbbox = Some(match self.dbbox {
            Some(current) => current.union(&bbox),
            None => bbox,
        });
        self.samples.push((bbox, element.estimated_size()));
        Ok(())
    }

    /// Discrete box covering every sample, with even sizes of at least 2 units.
    pub fn dbbox(&self) -> Option<Rect<i64>> {
        let bbox = self.dbbox?;
        let grow = |size: i64| if size < 2 { 2 - size } else { size % 2 };
        let max = bbox.max() + coord! { x: grow(bbox.width()), y: grow(bbox.height()) };
        Some(Rect::new(bbox.min(), max))
    }

    /// Shallowest level count in `0..=max_levels` whose cells all satisfy the limits.
    pub fn calculate_nlevels(&self, layer: Rect<i64>, name: &str) -> Result<u32> {
        // Profile the per-level bucketing passes
        #[cfg(feature = "profiling")]
        profiling::scope!("estimator::calculate_nlevels");

        for nlevels in 0..=self.limits.max_levels {
            let buckets = self.buckets(layer, nlevels);
            let over = buckets.iter().find(|(_, b)| {
                b.count > self.limits.max_cell_elements || b.size > self.limits.max_cell_data_size
            });
            match over {
                None => {
                    tracing::debug!(
                        "Layer {name}: {nlevels} levels, {} cells for {} elements",
                        buckets.len(),
                        self.samples.len()
                    );
                    return Ok(nlevels);
                }
                Some((cellnum, b)) => tracing::debug!(
                    "Layer {name}: cell {cellnum} over budget at {nlevels} levels ({} elements, {:.0} bytes)",
                    b.count,
                    b.size
                ),
            }
        }
        Err(MapError::LevelCountNotFound {
            layer: name.to_string(),
            max_levels: self.limits.max_levels,
        })
    }

    fn buckets(&self, layer: Rect<i64>, nlevels: u32) -> HashMap<u32, Bucket> {
        let cells: Vec<(u32, f64)> = self
            .samples
            .par_iter()
            .map(|&(bbox, size)| (cell_for_discrete_bbox(layer, bbox, nlevels), size))
            .collect();

        let mut buckets: HashMap<u32, Bucket> = HashMap::new();
        for (cellnum, size) in cells {
            let bucket = buckets.entry(cellnum).or_default();
            bucket.count += 1;
            bucket.size += size;
        }
        buckets
    }
}
