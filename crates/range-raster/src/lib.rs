//! Species range maps and their rasterization onto an equal-area grid.
//!
//! This crate provides:
//! - GeoJSON range and coastline readers
//! - Species name normalization to the tree-tip convention
//! - Per-species merging and explicit reprojection of range records
//! - A rasterizer producing one binary presence layer per species

pub mod collection;
pub mod rasterizer;
pub mod reader;
pub mod species;
pub mod stack;

pub use collection::{RangeCollection, RangeRecord};
pub use rasterizer::{PresenceRule, Rasterizer};
pub use reader::{
    coastline_from_geojson, load_coastline, load_ranges, ranges_from_geojson, CoastlineLayer,
    DEFAULT_SPECIES_FIELD,
};
pub use species::normalize_species_name;
pub use stack::{PresenceLayer, PresenceStack};
