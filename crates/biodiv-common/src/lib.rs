//! Common types shared by every crate of the marine diversity workspace.

pub mod bbox;
pub mod crs;
pub mod error;
pub mod grid;
pub mod style;

pub use bbox::BoundingBox;
pub use crs::CrsCode;
pub use error::{BiodivError, BiodivResult};
pub use grid::{CellId, CellMap, GridTemplate, DEFAULT_RESOLUTION_M};
pub use style::{Color, ColorRamp, ColorStop};
