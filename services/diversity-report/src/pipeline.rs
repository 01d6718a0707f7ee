//! The report pipeline: ranges to rasters to metrics to figures.
//!
//! Every stage is a plain function call on the previous stage's output; the
//! grid template and CRS are fixed up front and checked at each boundary.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use biodiv_common::{BiodivError, CrsCode, GridTemplate};
use chrono::{DateTime, Utc};
use diversity::{alpha_richness, CommunityMatrix, DiversityTable, MetricSummary, PdCalculator};
use geo::LineString;
use phylo::{assign_clades, load_newick, PhyloTree};
use projection::Transformer;
use range_raster::{load_coastline, load_ranges, PresenceRule, PresenceStack, RangeCollection, Rasterizer};
use renderer::{ReportInputs, ReportRenderer};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ReportConfig;

pub const TABLE_FILE_NAME: &str = "diversity_table.json";
pub const SUMMARY_FILE_NAME: &str = "report_summary.json";

/// Longest lon/lat edge, in degrees, before it is split for projection.
const DENSIFY_DEGREES: f64 = 1.0;

/// Grid description in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub crs: CrsCode,
    pub resolution_m: f64,
    pub ncols: usize,
    pub nrows: usize,
}

/// What one run read, computed and wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub generated_at: DateTime<Utc>,
    pub grid: GridSummary,
    pub presence_rule: PresenceRule,
    pub include_root: bool,
    /// Range records read from the input file
    pub range_records: usize,
    /// Distinct species in the ranges
    pub species: usize,
    /// Species whose range covers at least one cell
    pub species_rasterized: usize,
    /// Species whose range covers no cell of the grid
    pub species_without_cells: Vec<String>,
    pub tree_tips: usize,
    /// Tree tips with no range data
    pub tips_without_ranges: usize,
    /// Occupied cells
    pub cells: usize,
    pub richness: Option<MetricSummary>,
    pub pd: Option<MetricSummary>,
    /// Files written, relative to the output directory
    pub outputs: Vec<String>,
}

/// Results of a finished run.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub summary: ReportSummary,
    pub table: DiversityTable,
    pub output_dir: PathBuf,
}

/// Run the whole report and write every output into `config.output.dir`.
pub fn run_report(config: &ReportConfig) -> Result<ReportOutcome> {
    let template = config.template().context("Failed to build grid template")?;
    info!(
        crs = %template.crs,
        resolution_m = template.res_x,
        ncols = template.ncols,
        nrows = template.nrows,
        "Grid template ready"
    );

    let ranges = load_ranges(&config.inputs.ranges, &config.inputs.species_field)
        .with_context(|| format!("Failed to load ranges from {:?}", config.inputs.ranges))?;
    info!(records = ranges.len(), species = ranges.species().len(), crs = %ranges.crs(), "Loaded range maps");
    let range_records = ranges.len();
    let projected = project_ranges(&ranges, &template)?;

    let stack = Rasterizer::new(template.clone())
        .with_rule(config.presence.rule)
        .rasterize(&projected)
        .context("Failed to rasterize ranges")?;

    let tree = load_newick(&config.inputs.tree)
        .map_err(BiodivError::from)
        .with_context(|| format!("Failed to load tree from {:?}", config.inputs.tree))?;
    info!(tips = tree.num_tips(), nodes = tree.len(), "Loaded phylogeny");

    check_species_in_tree(&stack, &tree)?;

    let matrix = CommunityMatrix::from_presence_stack(&stack);
    let alpha = alpha_richness(&matrix).context("Failed to compute species richness")?;
    let pd = PdCalculator::new(&tree, matrix.species())
        .and_then(|calc| calc.with_include_root(config.phylo.include_root).compute(&matrix))
        .context("Failed to compute phylogenetic diversity")?;

    let table = DiversityTable::join(&template, &alpha, &pd).context("Failed to join results")?;

    let coastline = match &config.inputs.coastline {
        Some(path) => load_projected_coastline(path, &template)?,
        None => Vec::new(),
    };
    let clades = assign_clades(&tree, &config.clade_defs())
        .map_err(BiodivError::from)
        .context("Failed to assign clades")?;

    let renderer = ReportRenderer::new(config.map_style(), config.tree_style());
    let figures = renderer.render_all(&ReportInputs {
        table: &table,
        template: &template,
        coastline: &coastline,
        tree: &tree,
        clades: &clades,
    })?;

    let output_dir = config.output.dir.clone();
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", output_dir))?;

    let mut outputs = Vec::new();
    for figure in &figures {
        let path = figure.write_to(&output_dir)?;
        info!(path = %path.display(), bytes = figure.bytes.len(), "Wrote figure");
        outputs.push(figure.name.clone());
    }
    table.write_json(output_dir.join(TABLE_FILE_NAME))?;
    outputs.push(TABLE_FILE_NAME.to_string());
    outputs.push(SUMMARY_FILE_NAME.to_string());

    let species_without_cells: Vec<String> = stack.empty_species().into_iter().map(str::to_string).collect();
    let table_summary = table.summary();
    let summary = ReportSummary {
        generated_at: Utc::now(),
        grid: GridSummary {
            crs: template.crs,
            resolution_m: template.res_x,
            ncols: template.ncols,
            nrows: template.nrows,
        },
        presence_rule: config.presence.rule,
        include_root: config.phylo.include_root,
        range_records,
        species: stack.len(),
        species_rasterized: stack.len() - species_without_cells.len(),
        species_without_cells,
        tree_tips: tree.num_tips(),
        tips_without_ranges: tree.tip_labels().iter().filter(|t| stack.layer(t).is_none()).count(),
        cells: table_summary.cells,
        richness: table_summary.richness,
        pd: table_summary.pd,
        outputs,
    };
    write_summary(&summary, &output_dir)?;

    info!(
        cells = summary.cells,
        species = summary.species,
        output_dir = %output_dir.display(),
        "Report complete"
    );

    Ok(ReportOutcome {
        summary,
        table,
        output_dir,
    })
}

/// Category of the library error behind a failed run; "other" when the
/// failure did not come from a library crate.
pub fn failure_category(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BiodivError>())
        .map(BiodivError::category)
        .unwrap_or("other")
}

/// Reproject ranges into the grid CRS; a no-op when they already match.
fn project_ranges(ranges: &RangeCollection, template: &GridTemplate) -> Result<RangeCollection> {
    if ranges.crs() == template.crs {
        return Ok(ranges.clone());
    }
    let mut transformer = Transformer::new(ranges.crs(), template.crs)?;
    if ranges.crs().is_geographic() {
        transformer = transformer.with_densify(DENSIFY_DEGREES);
    }
    Ok(ranges
        .reproject(&transformer)
        .context("Failed to reproject ranges to the grid CRS")?)
}

/// Every rasterized species must be a tree tip; all misses are reported together.
fn check_species_in_tree(stack: &PresenceStack, tree: &PhyloTree) -> Result<()> {
    let missing: Vec<&str> = stack
        .species()
        .into_iter()
        .filter(|s| !tree.contains_tip(s))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    warn!(missing = missing.len(), "Range species missing from the phylogeny");
    Err(BiodivError::species_mismatch(missing).into())
}

fn load_projected_coastline(path: &Path, template: &GridTemplate) -> Result<Vec<LineString<f64>>> {
    let layer = load_coastline(path).with_context(|| format!("Failed to load coastline from {:?}", path))?;
    let mut transformer = Transformer::new(layer.crs, template.crs)?;
    if layer.crs.is_geographic() {
        transformer = transformer.with_densify(DENSIFY_DEGREES);
    }
    let lines = layer
        .lines
        .iter()
        .map(|line| transformer.transform_line(line))
        .collect::<Result<Vec<_>, _>>()?;
    info!(lines = lines.len(), "Loaded coastline");
    Ok(lines)
}

fn write_summary(summary: &ReportSummary, dir: &Path) -> Result<()> {
    let path = dir.join(SUMMARY_FILE_NAME);
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}
