//! Alpha diversity (species richness).

use biodiv_common::{BiodivResult, CellMap};
use tracing::info;

use crate::matrix::CommunityMatrix;

/// Number of species present in each occupied cell.
pub fn alpha_richness(matrix: &CommunityMatrix) -> BiodivResult<CellMap<u32>> {
    matrix.ensure_non_empty()?;

    let richness: CellMap<u32> = matrix
        .rows()
        .map(|(cell, row)| (cell, row.iter().filter(|&&p| p).count() as u32))
        .collect();

    info!(
        cells = richness.len(),
        max = richness.values().max().copied().unwrap_or(0),
        "Computed species richness"
    );
    Ok(richness)
}
