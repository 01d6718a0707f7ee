//! Coordinate reference system transformations.
//!
//! Implements the cylindrical equal-area projection family from scratch
//! and an explicit `Transformer` for moving geometries between CRSs.

pub mod cea;
pub mod transform;

pub use cea::CylindricalEqualArea;
pub use transform::Transformer;
