//! Geometry and presence-data generators.
//!
//! These generators create predictable, verifiable inputs that can be
//! used across the test suite.

use geo::{polygon, MultiPolygon, Polygon};

/// Axis-aligned square with its min corner at (`min_x`, `min_y`).
pub fn square(min_x: f64, min_y: f64, size: f64) -> Polygon<f64> {
    rectangle(min_x, min_y, min_x + size, min_y + size)
}

/// Axis-aligned rectangle polygon.
pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
    polygon![
        (x: min_x, y: min_y),
        (x: max_x, y: min_y),
        (x: max_x, y: max_y),
        (x: min_x, y: max_y),
        (x: min_x, y: min_y),
    ]
}

/// Right triangle covering the lower-left half of a square.
pub fn lower_left_triangle(min_x: f64, min_y: f64, size: f64) -> Polygon<f64> {
    polygon![
        (x: min_x, y: min_y),
        (x: min_x + size, y: min_y),
        (x: min_x, y: min_y + size),
        (x: min_x, y: min_y),
    ]
}

/// Multipolygon from any number of parts.
pub fn multi(parts: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    MultiPolygon::new(parts)
}

/// Deterministic pseudo-random presence matrix, row-major.
///
/// Roughly `density_pct` percent of entries are present. The same
/// (rows, cols, seed) always gives the same matrix.
pub fn create_presence_matrix(rows: usize, cols: usize, density_pct: u32, seed: u32) -> Vec<Vec<bool>> {
    (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| simple_hash(col as u32, row as u32, seed) % 100 < density_pct)
                .collect()
        })
        .collect()
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
