//! Encoded geometry payloads and the opaque [`Item`] handle.
//!
//! An item couples an opaque key with an encoded geometry value. The value
//! is a small binary blob: one dimensionality tag byte (2 or 3) followed by
//! the `min` then `max` corner coordinates as little-endian `f64`. A point
//! is a degenerate rectangle with `min == max`.
//!
//! Items are compared by *handle identity*, not by coordinates: two handles
//! are the same item iff one is a clone of the other. The caller keeps a
//! clone of the handle it inserted in order to remove it later.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{GeomError, Result};
use crate::rect::Rect;

const TAG_2D: u8 = 2;
const TAG_3D: u8 = 3;

const LEN_2D: usize = 1 + 4 * 8;
const LEN_3D: usize = 1 + 6 * 8;

/// A coordinate transform applied wherever a tree decodes a rectangle,
/// e.g. lon/lat/elevation to Cartesian. Must be a pure box-to-box mapping.
pub type Transform<const D: usize> = fn(min: [f64; D], max: [f64; D]) -> ([f64; D], [f64; D]);

/// Decoded view of an encoded geometry: dimensionality plus min/max corners.
///
/// For 2D geometries the z components are held at 0 and carry no meaning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geom {
    dims: u8,
    min: [f64; 3],
    max: [f64; 3],
}

impl Geom {
    pub fn point2(x: f64, y: f64) -> Self {
        Self::rect2([x, y], [x, y])
    }

    /// Coordinates are expected to be finite; queries carrying NaN are
    /// rejected at the index boundary.
    pub fn rect2(min: [f64; 2], max: [f64; 2]) -> Self {
        Self {
            dims: TAG_2D,
            min: [min[0], min[1], 0.0],
            max: [max[0], max[1], 0.0],
        }
    }

    pub fn point3(x: f64, y: f64, z: f64) -> Self {
        Self::rect3([x, y, z], [x, y, z])
    }

    pub fn rect3(min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            dims: TAG_3D,
            min,
            max,
        }
    }

    /// Parse an encoded geometry blob.
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        let got = buf.len();
        if got == 0 {
            return Err(GeomError::Truncated { expected: 1, got });
        }
        let tag = buf.get_u8();
        let (dims, expected) = match tag {
            TAG_2D => (2, LEN_2D),
            TAG_3D => (3, LEN_3D),
            other => return Err(GeomError::BadTag(other)),
        };
        if got != expected {
            return Err(GeomError::Truncated { expected, got });
        }
        let mut min = [0.0; 3];
        let mut max = [0.0; 3];
        for slot in min.iter_mut().take(dims) {
            *slot = buf.get_f64_le();
        }
        for slot in max.iter_mut().take(dims) {
            *slot = buf.get_f64_le();
        }
        if min[..dims]
            .iter()
            .chain(max[..dims].iter())
            .any(|v| !v.is_finite())
        {
            return Err(GeomError::NonFinite);
        }
        Ok(Self {
            dims: tag,
            min,
            max,
        })
    }

    /// Serialize to the blob format accepted by [`Geom::decode`].
    pub fn encode(&self) -> Bytes {
        let dims = self.dims as usize;
        let mut buf = BytesMut::with_capacity(1 + dims * 2 * 8);
        buf.put_u8(self.dims);
        for v in &self.min[..dims] {
            buf.put_f64_le(*v);
        }
        for v in &self.max[..dims] {
            buf.put_f64_le(*v);
        }
        buf.freeze()
    }

    /// Dimensionality of the geometry, 2 or 3.
    pub fn dims(&self) -> usize {
        self.dims as usize
    }

    /// The min/max corners as a `D`-dimensional rectangle.
    pub fn rect<const D: usize>(&self) -> Rect<D> {
        Rect {
            min: std::array::from_fn(|i| self.min[i]),
            max: std::array::from_fn(|i| self.max[i]),
        }
    }

    /// Center of the bounding box; z is 0 for 2D geometries.
    pub fn position(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }
}

#[derive(Debug)]
struct ItemInner {
    key: Bytes,
    value: Bytes,
    geom: Geom,
}

/// An opaque spatial record: key + encoded geometry, shared by handle.
///
/// Cloning is cheap (reference count bump). Equality and hashing use the
/// handle, so items with identical coordinates remain distinct records and
/// can be removed individually.
#[derive(Debug, Clone)]
pub struct Item {
    inner: Arc<ItemInner>,
}

impl Item {
    /// Build an item from an untrusted encoded geometry blob, validating it.
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Result<Self> {
        let value = value.into();
        let geom = Geom::decode(&value)?;
        Ok(Self {
            inner: Arc::new(ItemInner {
                key: key.into(),
                value,
                geom,
            }),
        })
    }

    fn from_geom(key: impl Into<Bytes>, geom: Geom) -> Self {
        Self {
            inner: Arc::new(ItemInner {
                key: key.into(),
                value: geom.encode(),
                geom,
            }),
        }
    }

    pub fn point2(key: impl Into<Bytes>, x: f64, y: f64) -> Self {
        Self::from_geom(key, Geom::point2(x, y))
    }

    pub fn rect2(key: impl Into<Bytes>, min: [f64; 2], max: [f64; 2]) -> Self {
        Self::from_geom(key, Geom::rect2(min, max))
    }

    pub fn point3(key: impl Into<Bytes>, x: f64, y: f64, z: f64) -> Self {
        Self::from_geom(key, Geom::point3(x, y, z))
    }

    pub fn rect3(key: impl Into<Bytes>, min: [f64; 3], max: [f64; 3]) -> Self {
        Self::from_geom(key, Geom::rect3(min, max))
    }

    pub fn from_geo_point(key: impl Into<Bytes>, point: &geo::Point<f64>) -> Self {
        Self::point2(key, point.x(), point.y())
    }

    pub fn from_geo_rect(key: impl Into<Bytes>, rect: &geo::Rect<f64>) -> Self {
        Self::rect2(
            key,
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        )
    }

    pub fn key(&self) -> &Bytes {
        &self.inner.key
    }

    /// The encoded geometry blob.
    pub fn value(&self) -> &Bytes {
        &self.inner.value
    }

    /// The decoded geometry. Decoding happened once, at construction.
    pub fn geom(&self) -> &Geom {
        &self.inner.geom
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.inner) as usize).hash(state);
    }
}

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Map a lon/lat/elevation box to ECEF Cartesian under the WGS84 ellipsoid.
///
/// Usable as a [`Transform<3>`]. Corner coordinates are re-ordered per axis
/// after the mapping so `min ≤ max` still holds.
pub fn wgs84_to_ecef(min: [f64; 3], max: [f64; 3]) -> ([f64; 3], [f64; 3]) {
    if min == max {
        let p = lle_to_ecef_wgs84(min);
        return (p, p);
    }
    reorder(lle_to_ecef_wgs84(min), lle_to_ecef_wgs84(max))
}

/// Map a lon/lat/elevation box to Cartesian on a spherical Earth model.
///
/// Usable as a [`Transform<3>`].
pub fn sphere_to_ecef(min: [f64; 3], max: [f64; 3]) -> ([f64; 3], [f64; 3]) {
    if min == max {
        let p = lle_to_ecef_sphere(min);
        return (p, p);
    }
    reorder(lle_to_ecef_sphere(min), lle_to_ecef_sphere(max))
}

fn reorder(mut min: [f64; 3], mut max: [f64; 3]) -> ([f64; 3], [f64; 3]) {
    for i in 0..3 {
        if min[i] > max[i] {
            std::mem::swap(&mut min[i], &mut max[i]);
        }
    }
    (min, max)
}

fn lle_to_ecef_wgs84(lle: [f64; 3]) -> [f64; 3] {
    let (lon, lat, ele) = (lle[0] * DEG_TO_RAD, lle[1] * DEG_TO_RAD, lle[2]);
    const FLATTENING: f64 = 1.0 / 298.257_223_563;
    const FF2: f64 = (1.0 - FLATTENING) * (1.0 - FLATTENING);
    let (sin_lat, cos_lat) = lat.sin_cos();
    let c = 1.0 / (cos_lat * cos_lat + FF2 * sin_lat * sin_lat).sqrt();
    let x = (EARTH_RADIUS * c + ele) * cos_lat * lon.cos();
    let y = (EARTH_RADIUS * c + ele) * cos_lat * lon.sin();
    let z = (EARTH_RADIUS * c * FF2 + ele) * sin_lat;
    // ECEF y/z swapped so the polar axis lands on the middle component
    [x, z, y]
}

fn lle_to_ecef_sphere(lle: [f64; 3]) -> [f64; 3] {
    let (lon, lat, ele) = (lle[0] * DEG_TO_RAD, lle[1] * DEG_TO_RAD, lle[2]);
    let x = (EARTH_RADIUS + ele) * lat.cos() * lon.cos();
    let y = (EARTH_RADIUS + ele) * lat.cos() * lon.sin();
    let z = (EARTH_RADIUS + ele) * lat.sin();
    [x, z, y]
}
