//! Polygon rasterization onto a grid template.
//!
//! Two presence rules are available:
//! - `AnyOverlap`: a cell is present when the polygon reaches into its
//!   interior. Polygons that only touch a cell's edge or corner do not count.
//! - `CellCenter`: a cell is present when its center is strictly inside.
//!
//! Both work per polygon with a scanline fill over cell-center rows. Any
//! overlap additionally walks every ring edge through the rows and columns
//! it crosses, so thin or small polygons that miss every center still mark
//! the cells they pass through.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use biodiv_common::{BiodivResult, BoundingBox, GridTemplate};
use geo::{BoundingRect, Line, LineString, MultiPolygon, Polygon};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collection::RangeCollection;
use crate::stack::{PresenceLayer, PresenceStack};

/// Rule deciding when a polygon marks a cell as present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceRule {
    #[default]
    AnyOverlap,
    CellCenter,
}

impl fmt::Display for PresenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceRule::AnyOverlap => write!(f, "any_overlap"),
            PresenceRule::CellCenter => write!(f, "cell_center"),
        }
    }
}

impl FromStr for PresenceRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "any_overlap" | "any" | "touches" => Ok(PresenceRule::AnyOverlap),
            "cell_center" | "center" | "centroid" => Ok(PresenceRule::CellCenter),
            other => Err(format!("unknown presence rule '{}'", other)),
        }
    }
}

/// Burns range geometries onto a fixed template.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    template: GridTemplate,
    rule: PresenceRule,
}

impl Rasterizer {
    pub fn new(template: GridTemplate) -> Self {
        Self {
            template,
            rule: PresenceRule::default(),
        }
    }

    pub fn with_rule(mut self, rule: PresenceRule) -> Self {
        self.rule = rule;
        self
    }

    pub fn template(&self) -> &GridTemplate {
        &self.template
    }

    pub fn rule(&self) -> PresenceRule {
        self.rule
    }

    /// Presence of one geometry on every cell, row-major.
    ///
    /// The geometry must already be in the template's CRS.
    pub fn rasterize_geometry(&self, geometry: &MultiPolygon<f64>) -> Vec<bool> {
        let mut cells = vec![false; self.template.len()];
        for polygon in geometry {
            self.burn_polygon(polygon, &mut cells);
        }
        cells
    }

    /// Rasterize every species in `ranges` into a presence stack.
    ///
    /// Records sharing a species label are combined by logical OR. Fails
    /// with a CRS mismatch instead of reprojecting.
    pub fn rasterize(&self, ranges: &RangeCollection) -> BiodivResult<PresenceStack> {
        self.template.ensure_crs(ranges.crs())?;

        let mut grouped: BTreeMap<&str, Vec<&MultiPolygon<f64>>> = BTreeMap::new();
        for record in ranges.records() {
            grouped
                .entry(record.species.as_str())
                .or_default()
                .push(&record.geometry);
        }
        let grouped: Vec<(&str, Vec<&MultiPolygon<f64>>)> = grouped.into_iter().collect();

        info!(
            species = grouped.len(),
            records = ranges.len(),
            cells = self.template.len(),
            rule = %self.rule,
            "Rasterizing range maps"
        );

        let layers: Vec<PresenceLayer> = grouped
            .par_iter()
            .map(|(species, geometries)| {
                let mut cells = vec![false; self.template.len()];
                for geometry in geometries {
                    for polygon in *geometry {
                        self.burn_polygon(polygon, &mut cells);
                    }
                }
                let layer = PresenceLayer::new(*species, cells);
                debug!(species = %species, cells = layer.count(), "Rasterized species");
                layer
            })
            .collect();

        for layer in layers.iter().filter(|l| l.is_empty()) {
            warn!(species = %layer.species(), "Species range covers no grid cell");
        }

        PresenceStack::new(self.template.clone(), layers)
    }

    fn burn_polygon(&self, polygon: &Polygon<f64>, cells: &mut [bool]) {
        let Some(rect) = polygon.bounding_rect() else {
            return;
        };
        let bounds = BoundingBox::from(rect);

        if self.rule == PresenceRule::AnyOverlap {
            for ring in rings(polygon) {
                for segment in ring.lines() {
                    self.burn_segment(segment, cells);
                }
            }
        }
        self.fill_centers(polygon, &bounds, cells);
    }

    /// Mark every cell whose open interior the segment passes through.
    fn burn_segment(&self, segment: Line<f64>, cells: &mut [bool]) {
        let t = &self.template;
        let (x0, y0, x1, y1) = (segment.start.x, segment.start.y, segment.end.x, segment.end.y);
        let (y_lo, y_hi) = (y0.min(y1), y0.max(y1));

        for row in t.row_range(y_lo, y_hi) {
            let top = t.extent.max_y - row as f64 * t.res_y;
            let bottom = top - t.res_y;
            if !(bottom < y_hi && top > y_lo) {
                continue;
            }

            // x extent of the part of the segment inside this row band
            let (xa, xb) = if y0 == y1 {
                (x0.min(x1), x0.max(x1))
            } else {
                let x_at = |y: f64| x0 + (x1 - x0) * (y - y0) / (y1 - y0);
                let a = x_at(y_lo.max(bottom));
                let b = x_at(y_hi.min(top));
                (a.min(b), a.max(b))
            };

            for col in t.col_range(xa, xb) {
                let left = t.extent.min_x + col as f64 * t.res_x;
                if left < xb && left + t.res_x > xa {
                    cells[row * t.ncols + col] = true;
                }
            }
        }
    }

    /// Mark cells whose center lies strictly inside the polygon (even-odd).
    fn fill_centers(&self, polygon: &Polygon<f64>, bounds: &BoundingBox, cells: &mut [bool]) {
        let t = &self.template;
        let mut crossings: Vec<f64> = Vec::new();

        for row in t.row_range(bounds.min_y, bounds.max_y) {
            let yc = t.extent.max_y - (row as f64 + 0.5) * t.res_y;

            crossings.clear();
            for ring in rings(polygon) {
                for segment in ring.lines() {
                    let (a, b) = (segment.start, segment.end);
                    if (a.y > yc) != (b.y > yc) {
                        crossings.push(a.x + (yc - a.y) * (b.x - a.x) / (b.y - a.y));
                    }
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for pair in crossings.chunks_exact(2) {
                let first = ((pair[0] - t.extent.min_x) / t.res_x - 0.5).floor() + 1.0;
                let last = ((pair[1] - t.extent.min_x) / t.res_x - 0.5).ceil();
                let start = first.max(0.0).min(t.ncols as f64) as usize;
                let end = last.max(0.0).min(t.ncols as f64) as usize;
                for col in start..end {
                    cells[row * t.ncols + col] = true;
                }
            }
        }
    }
}

fn rings(polygon: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors())
}
