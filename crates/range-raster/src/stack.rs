//! Binary presence layers on a shared grid template.

use std::collections::HashSet;

use biodiv_common::{BiodivError, BiodivResult, CellId, GridTemplate};

/// Presence of one species on every cell of a template, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceLayer {
    species: String,
    cells: Vec<bool>,
    count: usize,
}

impl PresenceLayer {
    pub fn new(species: impl Into<String>, cells: Vec<bool>) -> Self {
        let count = cells.iter().filter(|&&present| present).count();
        Self {
            species: species.into(),
            cells,
            count,
        }
    }

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn is_present(&self, cell: CellId) -> bool {
        self.cells.get(cell.index()).copied().unwrap_or(false)
    }

    /// Number of cells where the species is present.
    pub fn count(&self) -> usize {
        self.count
    }

    /// True when the species is present nowhere on the grid.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn present_cells(&self) -> impl Iterator<Item = CellId> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &present)| present)
            .map(|(i, _)| CellId(i as u32))
    }
}

/// One presence layer per species, all on the same template.
///
/// Built once by the rasterizer and read-only afterwards.
#[derive(Debug, Clone)]
pub struct PresenceStack {
    template: GridTemplate,
    layers: Vec<PresenceLayer>,
}

impl PresenceStack {
    /// Assemble a stack, checking layer sizes and species uniqueness.
    pub fn new(template: GridTemplate, layers: Vec<PresenceLayer>) -> BiodivResult<Self> {
        let mut seen = HashSet::new();
        for layer in &layers {
            if layer.cells.len() != template.len() {
                return Err(BiodivError::InvalidTemplate(format!(
                    "layer '{}' has {} cells, template has {}",
                    layer.species,
                    layer.cells.len(),
                    template.len()
                )));
            }
            if !seen.insert(layer.species.as_str()) {
                return Err(BiodivError::InvalidGeometry(format!(
                    "species '{}' has more than one presence layer",
                    layer.species
                )));
            }
        }
        Ok(Self { template, layers })
    }

    pub fn template(&self) -> &GridTemplate {
        &self.template
    }

    pub fn layers(&self) -> &[PresenceLayer] {
        &self.layers
    }

    /// Number of species layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Species labels in layer order.
    pub fn species(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.species()).collect()
    }

    pub fn layer(&self, species: &str) -> Option<&PresenceLayer> {
        self.layers.iter().find(|l| l.species == species)
    }

    /// Species whose range missed every cell of the grid.
    pub fn empty_species(&self) -> Vec<&str> {
        self.layers
            .iter()
            .filter(|l| l.is_empty())
            .map(|l| l.species())
            .collect()
    }
}
