//! In-memory dynamic R-tree spatial index over mixed 2D/3D geometries.
//!
//! A [`SpatialIndex`] keeps planar and volumetric objects in two R-trees
//! behind one interface: insert, remove, rectangle search, full scans and
//! globally-sorted nearest-neighbor streaming across both populations.
//!
//! ```rust
//! use dimtree::{Item, SpatialIndex};
//!
//! let mut index = SpatialIndex::new();
//! index.insert(&Item::point2("nyc", -74.0060, 40.7128));
//! index.insert(&Item::point3("drone", -74.0060, 40.7128, 120.0));
//!
//! let query = Item::rect2("", [-75.0, 40.0], [-73.0, 41.0]);
//! let mut keys = Vec::new();
//! index.search(&query, |item| {
//!     keys.push(item.key().clone());
//!     true
//! });
//! assert_eq!(keys.len(), 2);
//! ```
//!
//! The per-dimension trees are available directly as [`RTree<2>`] and
//! [`RTree<3>`] when only one population is needed, including with a
//! coordinate transform such as [`wgs84_to_ecef`].

pub mod error;
pub mod geom;
pub mod hybrid;
pub mod rect;
pub mod rtree;

pub use error::{GeomError, Result};
pub use geom::{Geom, Item, Transform, sphere_to_ecef, wgs84_to_ecef};
pub use hybrid::SpatialIndex;
pub use rect::Rect;
pub use rtree::{DEFAULT_MAX_ENTRIES, RTree, RTree2, RTree3, TreeOptions};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {
    pub use crate::{Geom, GeomError, Item, RTree, Rect, Result, SpatialIndex, TreeOptions};
}
