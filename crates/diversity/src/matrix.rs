//! Site-by-species presence matrix.

use std::collections::{HashMap, HashSet};

use biodiv_common::{BiodivError, BiodivResult, CellId};
use range_raster::PresenceStack;
use tracing::info;

/// Binary community matrix: one row per occupied cell, one column per species.
///
/// Rows are keyed by [`CellId`] in ascending order and every row has at
/// least one present species.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityMatrix {
    species: Vec<String>,
    cells: Vec<CellId>,
    /// Row-major presence values, `cells.len() * species.len()` long
    data: Vec<bool>,
}

impl CommunityMatrix {
    /// Flatten a presence stack, one column per layer in stack order.
    pub fn from_presence_stack(stack: &PresenceStack) -> Self {
        let species: Vec<String> = stack.species().into_iter().map(str::to_string).collect();
        let ncols = species.len();

        let mut cells = Vec::new();
        let mut data = Vec::new();
        let mut row = vec![false; ncols];

        for idx in 0..stack.template().len() {
            let mut any = false;
            for (slot, layer) in row.iter_mut().zip(stack.layers()) {
                *slot = layer.cells()[idx];
                any |= *slot;
            }
            if any {
                cells.push(CellId(idx as u32));
                data.extend_from_slice(&row);
            }
        }

        info!(
            rows = cells.len(),
            species = ncols,
            grid_cells = stack.template().len(),
            "Built community matrix"
        );

        Self { species, cells, data }
    }

    /// Build from explicit rows; empty rows are dropped and rows sorted by cell.
    pub fn from_rows(species: Vec<String>, rows: Vec<(CellId, Vec<bool>)>) -> BiodivResult<Self> {
        let mut seen = HashSet::new();
        for name in &species {
            if !seen.insert(name.as_str()) {
                return Err(BiodivError::DuplicateTip(name.clone()));
            }
        }

        let mut rows: Vec<(CellId, Vec<bool>)> = rows
            .into_iter()
            .filter(|(_, values)| values.iter().any(|&p| p))
            .collect();
        rows.sort_by_key(|(cell, _)| *cell);

        let mut cells = Vec::with_capacity(rows.len());
        let mut data = Vec::with_capacity(rows.len() * species.len());
        for (cell, values) in rows {
            if values.len() != species.len() {
                return Err(BiodivError::InvalidTemplate(format!(
                    "row {} has {} values for {} species",
                    cell,
                    values.len(),
                    species.len()
                )));
            }
            if cells.last() == Some(&cell) {
                return Err(BiodivError::InvalidTemplate(format!("row {} appears twice", cell)));
            }
            cells.push(cell);
            data.extend(values);
        }

        Ok(Self { species, cells, data })
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// Row keys in ascending order.
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    pub fn num_rows(&self) -> usize {
        self.cells.len()
    }

    pub fn num_cols(&self) -> usize {
        self.species.len()
    }

    /// True when there are no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty() || self.species.is_empty()
    }

    /// Error unless the matrix has at least one row and one column.
    pub fn ensure_non_empty(&self) -> BiodivResult<()> {
        if self.species.is_empty() {
            return Err(BiodivError::EmptyCommunity("matrix has no species columns".to_string()));
        }
        if self.cells.is_empty() {
            return Err(BiodivError::EmptyCommunity(
                "no cell holds any species".to_string(),
            ));
        }
        Ok(())
    }

    /// Presence values of row `i`.
    pub fn row(&self, i: usize) -> &[bool] {
        let n = self.species.len();
        &self.data[i * n..(i + 1) * n]
    }

    /// Presence values for a cell, if it is a row.
    pub fn row_of(&self, cell: CellId) -> Option<&[bool]> {
        self.cells.binary_search(&cell).ok().map(|i| self.row(i))
    }

    /// (cell, row) pairs in ascending cell order.
    pub fn rows(&self) -> impl Iterator<Item = (CellId, &[bool])> + '_ {
        self.cells.iter().enumerate().map(move |(i, &cell)| (cell, self.row(i)))
    }

    /// Species present in a cell.
    pub fn present_species(&self, cell: CellId) -> Vec<&str> {
        self.row_of(cell)
            .map(|row| {
                row.iter()
                    .zip(&self.species)
                    .filter(|(&p, _)| p)
                    .map(|(_, s)| s.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of occupied cells per species, in column order.
    pub fn column_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.species.len()];
        for i in 0..self.cells.len() {
            for (count, &present) in counts.iter_mut().zip(self.row(i)) {
                *count += present as usize;
            }
        }
        counts
    }

    /// Reorder columns to follow `order`, such as a tree's tip order.
    ///
    /// `order` may name species the matrix does not have; they are skipped.
    /// Every matrix column must appear in `order`.
    pub fn align_columns<S: AsRef<str>>(&self, order: &[S]) -> BiodivResult<Self> {
        let index: HashMap<&str, usize> = self
            .species
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();

        let mut placed = HashSet::new();
        let mut permutation = Vec::with_capacity(self.species.len());
        for name in order {
            if let Some(&col) = index.get(name.as_ref()) {
                if placed.insert(col) {
                    permutation.push(col);
                }
            }
        }

        if permutation.len() != self.species.len() {
            let unplaced = self
                .species
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed.contains(i))
                .map(|(_, s)| s.clone());
            return Err(BiodivError::species_mismatch(unplaced));
        }

        let species = permutation.iter().map(|&c| self.species[c].clone()).collect();
        let mut data = Vec::with_capacity(self.data.len());
        for i in 0..self.cells.len() {
            let row = self.row(i);
            data.extend(permutation.iter().map(|&c| row[c]));
        }

        Ok(Self {
            species,
            cells: self.cells.clone(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use biodiv_common::{BoundingBox, CrsCode, GridTemplate};
    use range_raster::PresenceLayer;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn stack() -> PresenceStack {
        let template =
            GridTemplate::new(CrsCode::Esri54017, BoundingBox::new(0.0, 0.0, 3.0, 1.0), 1.0).unwrap();
        PresenceStack::new(
            template,
            vec![
                PresenceLayer::new("A_a", vec![true, false, true]),
                PresenceLayer::new("B_b", vec![false, false, true]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_stack_drops_empty_rows() {
        let matrix = CommunityMatrix::from_presence_stack(&stack());
        assert_eq!(matrix.species(), &names(&["A_a", "B_b"])[..]);
        assert_eq!(matrix.cells(), &[CellId(0), CellId(2)]);
        assert_eq!(matrix.row(1), &[true, true]);
        assert_eq!(matrix.row_of(CellId(1)), None);
        assert_eq!(matrix.present_species(CellId(2)), vec!["A_a", "B_b"]);
        assert_eq!(matrix.column_counts(), vec![2, 1]);
    }

    #[test]
    fn test_empty_stack_has_no_columns() {
        let template =
            GridTemplate::new(CrsCode::Esri54017, BoundingBox::new(0.0, 0.0, 3.0, 1.0), 1.0).unwrap();
        let empty = PresenceStack::new(template, vec![]).unwrap();
        let matrix = CommunityMatrix::from_presence_stack(&empty);
        assert_eq!(matrix.num_cols(), 0);
        assert_eq!(matrix.num_rows(), 0);
        assert!(matches!(matrix.ensure_non_empty(), Err(BiodivError::EmptyCommunity(_))));
    }

    #[test]
    fn test_from_rows_sorts_and_validates() {
        let matrix = CommunityMatrix::from_rows(
            names(&["A_a", "B_b"]),
            vec![
                (CellId(9), vec![false, true]),
                (CellId(4), vec![true, false]),
                (CellId(5), vec![false, false]),
            ],
        )
        .unwrap();
        assert_eq!(matrix.cells(), &[CellId(4), CellId(9)]);

        assert!(CommunityMatrix::from_rows(names(&["A_a"]), vec![(CellId(0), vec![true, true])]).is_err());
        assert!(CommunityMatrix::from_rows(
            names(&["A_a"]),
            vec![(CellId(0), vec![true]), (CellId(0), vec![true])]
        )
        .is_err());
        assert!(matches!(
            CommunityMatrix::from_rows(names(&["A_a", "A_a"]), vec![]),
            Err(BiodivError::DuplicateTip(_))
        ));
    }

    #[test]
    fn test_align_columns() {
        let matrix = CommunityMatrix::from_presence_stack(&stack());
        let aligned = matrix.align_columns(&["Z_z", "B_b", "A_a"]).unwrap();
        assert_eq!(aligned.species(), &names(&["B_b", "A_a"])[..]);
        assert_eq!(aligned.row(0), &[false, true]);
        assert_eq!(aligned.cells(), matrix.cells());

        match matrix.align_columns(&["A_a"]) {
            Err(BiodivError::SpeciesMismatch { missing }) => assert_eq!(missing, vec!["B_b"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
