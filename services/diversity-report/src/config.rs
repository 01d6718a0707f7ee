//! Report configuration.
//!
//! A single YAML file describes the inputs, the grid, the presence rule, the
//! clades to highlight and the figure styling. `${VAR}` and
//! `${VAR:-default}` are substituted from the environment before parsing,
//! and relative paths are resolved against the config file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use biodiv_common::{
    BiodivResult, BoundingBox, Color, ColorRamp, CrsCode, GridTemplate, DEFAULT_RESOLUTION_M,
};
use phylo::CladeDef;
use projection::Transformer;
use range_raster::{PresenceRule, DEFAULT_SPECIES_FIELD};
use renderer::{MapStyle, TreeStyle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub inputs: InputsConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub phylo: PhyloConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputsConfig {
    /// GeoJSON range maps
    pub ranges: PathBuf,
    /// Feature property holding the species binomial
    #[serde(default = "default_species_field")]
    pub species_field: String,
    /// Newick tree
    pub tree: PathBuf,
    /// Optional GeoJSON coastline drawn on the maps
    #[serde(default)]
    pub coastline: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default = "default_grid_crs")]
    pub crs: CrsCode,
    #[serde(default = "default_resolution")]
    pub resolution_m: f64,
    /// Area of interest in degrees; the whole CRS extent when absent
    #[serde(default)]
    pub bbox: Option<BBoxConfig>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            crs: default_grid_crs(),
            resolution_m: default_resolution(),
            bbox: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BBoxConfig {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default)]
    pub rule: PresenceRule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhyloConfig {
    /// Count edges above the community MRCA (Faith's original PD)
    #[serde(default = "default_true")]
    pub include_root: bool,
    #[serde(default)]
    pub clades: Vec<CladeConfig>,
}

impl Default for PhyloConfig {
    fn default() -> Self {
        Self {
            include_root: true,
            clades: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CladeConfig {
    pub name: String,
    /// Two tips whose MRCA is the clade's crown
    pub tips: [String; 2],
    #[serde(default)]
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_pixels_per_cell")]
    pub pixels_per_cell: u32,
    #[serde(default = "default_palette")]
    pub palette: String,
    #[serde(default = "default_background")]
    pub background: Color,
    #[serde(default = "default_coastline_color")]
    pub coastline_color: Color,
    #[serde(default = "default_tree_size")]
    pub tree_size: u32,
    #[serde(default = "default_true")]
    pub tip_labels: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            pixels_per_cell: default_pixels_per_cell(),
            palette: default_palette(),
            background: default_background(),
            coastline_color: default_coastline_color(),
            tree_size: default_tree_size(),
            tip_labels: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_species_field() -> String {
    DEFAULT_SPECIES_FIELD.to_string()
}

fn default_grid_crs() -> CrsCode {
    CrsCode::Esri54017
}

fn default_resolution() -> f64 {
    DEFAULT_RESOLUTION_M
}

fn default_true() -> bool {
    true
}

fn default_pixels_per_cell() -> u32 {
    4
}

fn default_palette() -> String {
    "viridis".to_string()
}

fn default_background() -> Color {
    Color::transparent()
}

fn default_coastline_color() -> Color {
    Color::Hex("#3c3c3c".to_string())
}

fn default_tree_size() -> u32 {
    800
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl ReportConfig {
    /// Read, expand, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read report config from {:?}", path))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to load report config from {:?}", path))?;
        config.resolve_paths(base);
        Ok(config)
    }

    /// Parse YAML text after environment substitution, then validate.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let config: ReportConfig =
            serde_yaml::from_str(&expanded).context("Failed to parse report config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Make relative input and output paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.inputs.ranges);
        resolve(&mut self.inputs.tree);
        if let Some(coastline) = self.inputs.coastline.as_mut() {
            resolve(coastline);
        }
        resolve(&mut self.output.dir);
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.inputs.species_field.trim().is_empty(),
            "inputs.species_field cannot be empty"
        );

        anyhow::ensure!(
            self.grid.resolution_m.is_finite() && self.grid.resolution_m > 0.0,
            "grid.resolution_m must be positive, got {}",
            self.grid.resolution_m
        );
        anyhow::ensure!(
            self.grid.crs.is_equal_area(),
            "grid.crs must be an equal-area projection, got {}",
            self.grid.crs
        );
        if let Some(bbox) = &self.grid.bbox {
            anyhow::ensure!(
                bbox.min_lon < bbox.max_lon && bbox.min_lat < bbox.max_lat,
                "grid.bbox must have min < max: {:?}",
                bbox
            );
            anyhow::ensure!(
                bbox.min_lon >= -180.0 && bbox.max_lon <= 180.0 && bbox.min_lat >= -90.0 && bbox.max_lat <= 90.0,
                "grid.bbox must lie within -180..180, -90..90: {:?}",
                bbox
            );
        }

        for (i, clade) in self.phylo.clades.iter().enumerate() {
            anyhow::ensure!(
                !clade.name.trim().is_empty(),
                "phylo.clades[{}] has an empty name",
                i
            );
            anyhow::ensure!(
                clade.tips.iter().all(|t| !t.trim().is_empty()),
                "phylo.clades[{}] ({}) has an empty tip label",
                i,
                clade.name
            );
        }

        anyhow::ensure!(
            ColorRamp::builtin(&self.render.palette).is_some(),
            "Invalid palette: {}. Must be one of: {:?}",
            self.render.palette,
            biodiv_common::style::BUILTIN_PALETTES
        );
        self.render
            .background
            .validate()
            .context("render.background")?;
        self.render
            .coastline_color
            .validate()
            .context("render.coastline_color")?;
        for clade in &self.phylo.clades {
            if let Some(color) = &clade.color {
                color
                    .validate()
                    .with_context(|| format!("phylo.clades ({}) color", clade.name))?;
            }
        }
        anyhow::ensure!(
            self.render.pixels_per_cell > 0,
            "render.pixels_per_cell must be greater than 0"
        );
        anyhow::ensure!(
            self.render.tree_size >= 100,
            "render.tree_size must be at least 100 pixels"
        );

        Ok(())
    }

    /// The grid every range is rasterized on.
    pub fn template(&self) -> BiodivResult<GridTemplate> {
        let Some(bbox) = self.grid.bbox else {
            return GridTemplate::global(self.grid.crs, self.grid.resolution_m);
        };

        let to_grid = Transformer::new(CrsCode::Epsg4326, self.grid.crs)?;
        let (min_x, min_y) = to_grid.transform_point(bbox.min_lon, bbox.min_lat)?;
        let (max_x, max_y) = to_grid.transform_point(bbox.max_lon, bbox.max_lat)?;
        GridTemplate::new(
            self.grid.crs,
            BoundingBox::new(min_x, min_y, max_x, max_y),
            self.grid.resolution_m,
        )
    }

    pub fn clade_defs(&self) -> Vec<CladeDef> {
        self.phylo
            .clades
            .iter()
            .map(|c| CladeDef::new(c.name.trim(), c.tips[0].trim(), c.tips[1].trim()))
            .collect()
    }

    pub fn map_style(&self) -> MapStyle {
        MapStyle {
            pixels_per_cell: self.render.pixels_per_cell,
            ramp: ColorRamp::builtin(&self.render.palette).unwrap_or_else(|| MapStyle::default().ramp),
            background: self.render.background.clone(),
            coastline_color: self.render.coastline_color.clone(),
            ..MapStyle::default()
        }
    }

    pub fn tree_style(&self) -> TreeStyle {
        let defaults = TreeStyle::default();
        let clade_colors = self
            .phylo
            .clades
            .iter()
            .enumerate()
            .map(|(i, c)| c.color.clone().unwrap_or_else(|| defaults.clade_color(i)))
            .collect();
        TreeStyle {
            size: self.render.tree_size,
            tip_labels: self.render.tip_labels,
            clade_colors,
            ..defaults
        }
    }
}

/// Expand `${VAR}` and `${VAR:-default}` in config text.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();

        let mut var_expr = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => var_expr.push(c),
                None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
            }
        }
        result.push_str(&resolve_var_expr(&var_expr)?);
    }

    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}
