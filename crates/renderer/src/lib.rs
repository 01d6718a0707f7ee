//! Report figures for the diversity pipeline.
//!
//! This crate provides:
//! - Choropleth maps of per-cell metrics with a colour bar legend
//! - Circular phylogeny figures coloured by clade, as SVG and PNG
//! - An in-house PNG encoder (indexed when the palette allows)
//!
//! [`ReportRenderer`] takes every input explicitly and returns encoded
//! [`Figure`]s; it never writes files or touches global state.

pub mod choropleth;
pub mod legend;
pub mod phylogeny;
pub mod png;

use std::path::{Path, PathBuf};

use biodiv_common::{BiodivResult, GridTemplate};
use diversity::{DiversityTable, Metric};
use geo::LineString;
use phylo::{CladeAssignment, PhyloTree};
use tracing::info;

pub use choropleth::{map_dimensions, render_choropleth, value_range, MapStyle};
pub use phylogeny::{rasterize_svg, render_tree_svg, CircularLayout, TreeStyle};

pub const MEDIA_TYPE_PNG: &str = "image/png";
pub const MEDIA_TYPE_SVG: &str = "image/svg+xml";

/// An encoded figure ready to be written out.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    /// File name, including extension
    pub name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Figure {
    /// Write into `dir` under the figure's name.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> BiodivResult<PathBuf> {
        let path = dir.as_ref().join(&self.name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// File name of the map for a metric.
pub fn map_file_name(metric: Metric) -> &'static str {
    match metric {
        Metric::Richness => "alpha_richness.png",
        Metric::Pd => "phylogenetic_diversity.png",
    }
}

pub const TREE_SVG_NAME: &str = "phylogeny.svg";
pub const TREE_PNG_NAME: &str = "phylogeny.png";

/// Everything the report figures are drawn from.
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    pub table: &'a DiversityTable,
    pub template: &'a GridTemplate,
    /// Coastline in the template's CRS
    pub coastline: &'a [LineString<f64>],
    pub tree: &'a PhyloTree,
    pub clades: &'a CladeAssignment,
}

/// Renders the report's maps and tree figure.
#[derive(Debug, Clone, Default)]
pub struct ReportRenderer {
    map_style: MapStyle,
    tree_style: TreeStyle,
}

impl ReportRenderer {
    pub fn new(map_style: MapStyle, tree_style: TreeStyle) -> Self {
        Self { map_style, tree_style }
    }

    pub fn map_style(&self) -> &MapStyle {
        &self.map_style
    }

    pub fn tree_style(&self) -> &TreeStyle {
        &self.tree_style
    }

    /// Choropleth of one metric of `table`.
    pub fn render_map(
        &self,
        metric: Metric,
        table: &DiversityTable,
        template: &GridTemplate,
        coastline: &[LineString<f64>],
    ) -> BiodivResult<Figure> {
        template.ensure_crs(table.crs)?;
        let pixmap = render_choropleth(template, &table.values(metric), coastline, &self.map_style)?;
        Ok(Figure {
            name: map_file_name(metric).to_string(),
            media_type: MEDIA_TYPE_PNG,
            bytes: png::encode_pixmap(&pixmap)?,
        })
    }

    /// The circular tree as SVG text.
    pub fn render_tree(&self, tree: &PhyloTree, clades: &CladeAssignment) -> Figure {
        Figure {
            name: TREE_SVG_NAME.to_string(),
            media_type: MEDIA_TYPE_SVG,
            bytes: render_tree_svg(tree, clades, &self.tree_style).into_bytes(),
        }
    }

    /// The circular tree rasterized at the style's size.
    pub fn render_tree_png(&self, tree: &PhyloTree, clades: &CladeAssignment) -> BiodivResult<Figure> {
        let svg = render_tree_svg(tree, clades, &self.tree_style);
        let size = self.tree_style.size;
        let pixmap = rasterize_svg(&svg, size, size)?;
        Ok(Figure {
            name: TREE_PNG_NAME.to_string(),
            media_type: MEDIA_TYPE_PNG,
            bytes: png::encode_pixmap(&pixmap)?,
        })
    }

    /// Both maps, then the tree as SVG and PNG.
    pub fn render_all(&self, inputs: &ReportInputs<'_>) -> BiodivResult<Vec<Figure>> {
        let figures = vec![
            self.render_map(Metric::Richness, inputs.table, inputs.template, inputs.coastline)?,
            self.render_map(Metric::Pd, inputs.table, inputs.template, inputs.coastline)?,
            self.render_tree(inputs.tree, inputs.clades),
            self.render_tree_png(inputs.tree, inputs.clades)?,
        ];

        info!(
            figures = figures.len(),
            bytes = figures.iter().map(|f| f.bytes.len()).sum::<usize>(),
            "Rendered report figures"
        );
        Ok(figures)
    }
}
