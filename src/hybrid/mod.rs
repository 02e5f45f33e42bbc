//! The combined 2D/3D index façade.
//!
//! [`SpatialIndex`] holds one planar and one volumetric R-tree and routes
//! every operation by the dimensionality of the item's geometry. Queries
//! bridge the two populations:
//!
//! - a 2D query window widens to the 3D tree with an unbounded z-range;
//! - a 3D query window reaches the 2D tree iff its z-range covers 0,
//!   since planar objects live at z = 0;
//! - nearest-neighbor streams from both trees are merged into one
//!   globally-sorted stream under a bounded rendezvous protocol.

mod merge;

#[cfg(test)]
mod tests;

use crate::geom::{Geom, Item};
use crate::rect::Rect;
use crate::rtree::RTree;

/// A dynamic spatial index over a mixed 2D/3D population.
///
/// Every inserted item lives in exactly one of the two trees, decided by
/// its geometry's dimensionality at insert time. Mutations require `&mut
/// self`; reads are not internally synchronized, so callers serialize
/// access the usual way.
pub struct SpatialIndex {
    tree2: RTree<2>,
    tree3: RTree<3>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self {
            tree2: RTree::new(),
            tree3: RTree::new(),
        }
    }

    pub fn insert(&mut self, item: &Item) {
        if item.geom().dims() == 2 {
            self.tree2.insert(item);
        } else {
            self.tree3.insert(item);
        }
    }

    /// Remove by handle identity; absent items are a no-op.
    pub fn remove(&mut self, item: &Item) {
        if item.geom().dims() == 2 {
            self.tree2.remove(item);
        } else {
            self.tree3.remove(item);
        }
    }

    pub fn count(&self) -> usize {
        self.tree2.count() + self.tree3.count()
    }

    pub fn is_empty(&self) -> bool {
        self.tree2.is_empty() && self.tree3.is_empty()
    }

    /// Combined min/max corners, or zeroes when empty. Planar objects
    /// contribute nothing to the z-range.
    pub fn bounds(&self) -> ([f64; 3], [f64; 3]) {
        let empty2 = self.tree2.is_empty();
        let empty3 = self.tree3.is_empty();
        if empty2 && empty3 {
            return ([0.0; 3], [0.0; 3]);
        }
        if empty3 {
            let (min2, max2) = self.tree2.bounds();
            return ([min2[0], min2[1], 0.0], [max2[0], max2[1], 0.0]);
        }
        if empty2 {
            return self.tree3.bounds();
        }
        let (mut min, mut max) = self.tree3.bounds();
        let (min2, max2) = self.tree2.bounds();
        for i in 0..2 {
            min[i] = min[i].min(min2[i]);
            max[i] = max[i].max(max2[i]);
        }
        (min, max)
    }

    /// Stream every item intersecting the query item's rectangle, across
    /// both populations. Returns `false` iff the callback stopped early.
    pub fn search(&self, query: &Item, mut cb: impl FnMut(&Item) -> bool) -> bool {
        let geom = query.geom();
        if has_nan(geom) {
            log::warn!("rejecting search with NaN query coordinates");
            return true;
        }
        if geom.dims() == 2 {
            let window = geom.rect::<2>();
            if !self.tree2.search_rect(window, &mut cb) {
                return false;
            }
            let widened = Rect::new(
                [window.min[0], window.min[1], f64::NEG_INFINITY],
                [window.max[0], window.max[1], f64::INFINITY],
            );
            self.tree3.search_rect(widened, cb)
        } else {
            let window = geom.rect::<3>();
            if window.min[2] <= 0.0 && window.max[2] >= 0.0 {
                let flat = Rect::new(
                    [window.min[0], window.min[1]],
                    [window.max[0], window.max[1]],
                );
                if !self.tree2.search_rect(flat, &mut cb) {
                    return false;
                }
            }
            self.tree3.search_rect(window, cb)
        }
    }

    /// Visit every indexed item exactly once. Returns `false` on early exit.
    pub fn scan(&self, mut cb: impl FnMut(&Item) -> bool) -> bool {
        if !self.tree2.scan(&mut cb) {
            return false;
        }
        self.tree3.scan(cb)
    }

    /// Stream items from nearest to farthest of the query item's position,
    /// merged across both populations in nondecreasing squared box
    /// distance. Returns `false` iff the callback stopped early.
    pub fn knn(&self, pos: &Item, cb: impl FnMut(&Item, f64) -> bool) -> bool {
        let geom = pos.geom();
        if has_nan(geom) {
            log::warn!("rejecting nearest-neighbor query with NaN coordinates");
            return true;
        }
        let p = geom.position();
        let empty2 = self.tree2.is_empty();
        let empty3 = self.tree3.is_empty();
        if empty2 && empty3 {
            return true;
        }
        if empty3 {
            return self.tree2.knn([p[0], p[1]], cb);
        }
        if empty2 {
            return self.tree3.knn(p, cb);
        }
        merge::knn_merged(&self.tree2, &self.tree3, p, cb)
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn has_nan(geom: &Geom) -> bool {
    let r = geom.rect::<3>();
    r.min.iter().chain(r.max.iter()).any(|v| v.is_nan())
}
