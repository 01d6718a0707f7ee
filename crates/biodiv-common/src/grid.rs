//! Raster grid templates shared by every species layer.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{BiodivError, BiodivResult, BoundingBox, CrsCode};

/// Default cell size for the global analysis grid (~110 km, one degree at the equator).
pub const DEFAULT_RESOLUTION_M: f64 = 110_000.0;

/// Row-major index of a cell in a [`GridTemplate`].
///
/// Cell ids are the join key carried through every pipeline stage, so
/// results computed on different row subsets can always be matched up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(pub u32);

impl CellId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

/// Per-cell values keyed by cell id.
pub type CellMap<T> = BTreeMap<CellId, T>;

/// A fixed-resolution raster definition.
///
/// Row 0 is the northernmost row and columns run west to east, so a cell's
/// id is `row * ncols + col`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridTemplate {
    /// CRS of the extent and of every geometry rasterized on this grid
    pub crs: CrsCode,
    /// Extent snapped to a whole number of cells
    pub extent: BoundingBox,
    /// Cell width in CRS units
    pub res_x: f64,
    /// Cell height in CRS units
    pub res_y: f64,
    /// Number of columns
    pub ncols: usize,
    /// Number of rows
    pub nrows: usize,
}

impl GridTemplate {
    /// Build a template covering `extent` with square cells of `resolution`.
    ///
    /// The extent's max corner is pushed out so the grid holds a whole number
    /// of cells, anchored at the min corner.
    pub fn new(crs: CrsCode, extent: BoundingBox, resolution: f64) -> BiodivResult<Self> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(BiodivError::InvalidTemplate(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }
        if !extent.is_valid() {
            return Err(BiodivError::InvalidTemplate(format!(
                "extent has min >= max: {:?}",
                extent
            )));
        }

        // Tolerate float noise so an exact multiple does not gain a column
        let ncols = ((extent.width() / resolution) - 1e-9).ceil().max(1.0) as usize;
        let nrows = ((extent.height() / resolution) - 1e-9).ceil().max(1.0) as usize;

        if ncols.checked_mul(nrows).map_or(true, |n| n > u32::MAX as usize) {
            return Err(BiodivError::InvalidTemplate(format!(
                "{} x {} cells exceeds the addressable grid size",
                ncols, nrows
            )));
        }

        let snapped = BoundingBox::new(
            extent.min_x,
            extent.min_y,
            extent.min_x + ncols as f64 * resolution,
            extent.min_y + nrows as f64 * resolution,
        );

        Ok(Self {
            crs,
            extent: snapped,
            res_x: resolution,
            res_y: resolution,
            ncols,
            nrows,
        })
    }

    /// Template spanning the full valid extent of `crs`.
    pub fn global(crs: CrsCode, resolution: f64) -> BiodivResult<Self> {
        Self::new(crs, crs.valid_bounds(), resolution)
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.ncols * self.nrows
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.ncols == 0 || self.nrows == 0
    }

    /// Cell id for a (row, col) pair.
    pub fn cell_id(&self, row: usize, col: usize) -> Option<CellId> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        Some(CellId((row * self.ncols + col) as u32))
    }

    /// (row, col) of a cell id.
    pub fn row_col(&self, cell: CellId) -> Option<(usize, usize)> {
        let idx = cell.index();
        if idx >= self.len() {
            return None;
        }
        Some((idx / self.ncols, idx % self.ncols))
    }

    /// Bounds of a single cell.
    pub fn cell_bounds(&self, cell: CellId) -> Option<BoundingBox> {
        let (row, col) = self.row_col(cell)?;
        let min_x = self.extent.min_x + col as f64 * self.res_x;
        let max_y = self.extent.max_y - row as f64 * self.res_y;
        Some(BoundingBox::new(
            min_x,
            max_y - self.res_y,
            min_x + self.res_x,
            max_y,
        ))
    }

    /// Center of a cell in CRS coordinates.
    pub fn cell_center(&self, cell: CellId) -> Option<(f64, f64)> {
        let (row, col) = self.row_col(cell)?;
        Some((
            self.extent.min_x + (col as f64 + 0.5) * self.res_x,
            self.extent.max_y - (row as f64 + 0.5) * self.res_y,
        ))
    }

    /// Cell containing a point, if the point is inside the grid.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<CellId> {
        if !self.extent.contains_point(x, y) {
            return None;
        }
        let col = (((x - self.extent.min_x) / self.res_x).floor() as usize).min(self.ncols - 1);
        let row = (((self.extent.max_y - y) / self.res_y).floor() as usize).min(self.nrows - 1);
        self.cell_id(row, col)
    }

    /// Columns whose cells overlap the closed interval [min_x, max_x].
    pub fn col_range(&self, min_x: f64, max_x: f64) -> Range<usize> {
        let start = ((min_x - self.extent.min_x) / self.res_x).floor();
        let end = ((max_x - self.extent.min_x) / self.res_x).floor() + 1.0;
        clamp_range(start, end, self.ncols)
    }

    /// Rows whose cells overlap the closed interval [min_y, max_y].
    pub fn row_range(&self, min_y: f64, max_y: f64) -> Range<usize> {
        let start = ((self.extent.max_y - max_y) / self.res_y).floor();
        let end = ((self.extent.max_y - min_y) / self.res_y).floor() + 1.0;
        clamp_range(start, end, self.nrows)
    }

    /// Fail fast when geometries in `other` would be read in the wrong CRS.
    pub fn ensure_crs(&self, other: CrsCode) -> BiodivResult<()> {
        if self.crs != other {
            return Err(BiodivError::CrsMismatch {
                expected: self.crs.to_string(),
                found: other.to_string(),
            });
        }
        Ok(())
    }
}

fn clamp_range(start: f64, end: f64, len: usize) -> Range<usize> {
    let start = start.max(0.0).min(len as f64) as usize;
    let end = end.max(0.0).min(len as f64) as usize;
    start..end.max(start)
}
