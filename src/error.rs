//! Error types for geometry decoding.

use thiserror::Error;

/// Errors produced while decoding an encoded geometry blob.
///
/// Index operations themselves are total; the only fallible boundary is
/// accepting untrusted bytes through [`crate::Item::new`] or
/// [`crate::Geom::decode`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeomError {
    #[error("geometry blob truncated: expected {expected} bytes, got {got}")]
    Truncated { expected: usize, got: usize },
    #[error("unknown dimensionality tag: {0}")]
    BadTag(u8),
    #[error("non-finite coordinate in geometry blob")]
    NonFinite,
}

pub type Result<T> = std::result::Result<T, GeomError>;
