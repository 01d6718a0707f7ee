//! Integration tests for grid templates and cell-id bookkeeping.

use biodiv_common::{BoundingBox, CellId, CrsCode, GridTemplate};

// ============================================================================
// Template construction
// ============================================================================

#[test]
fn test_every_cell_round_trips_through_row_col() {
    let grid = GridTemplate::new(
        CrsCode::Esri54017,
        BoundingBox::new(-500.0, -300.0, 500.0, 300.0),
        100.0,
    )
    .unwrap();

    for idx in 0..grid.len() as u32 {
        let cell = CellId(idx);
        let (row, col) = grid.row_col(cell).unwrap();
        assert_eq!(grid.cell_id(row, col), Some(cell));

        let (x, y) = grid.cell_center(cell).unwrap();
        assert_eq!(grid.cell_at(x, y), Some(cell));
    }
}

#[test]
fn test_cells_tile_the_extent() {
    let grid = GridTemplate::new(
        CrsCode::Esri54034,
        BoundingBox::new(0.0, 0.0, 30.0, 20.0),
        10.0,
    )
    .unwrap();

    let total_area: f64 = (0..grid.len() as u32)
        .map(|i| grid.cell_bounds(CellId(i)).unwrap())
        .map(|b| b.width() * b.height())
        .sum();
    assert!((total_area - grid.extent.width() * grid.extent.height()).abs() < 1e-9);
}

#[test]
fn test_global_templates_cover_valid_bounds() {
    for crs in [CrsCode::Esri54017, CrsCode::Esri54034] {
        let grid = GridTemplate::global(crs, 250_000.0).unwrap();
        let bounds = crs.valid_bounds();
        assert_eq!(grid.extent.min_x, bounds.min_x);
        assert!(grid.extent.max_x >= bounds.max_x);
        assert!(grid.extent.max_y >= bounds.max_y);
    }
}

// ============================================================================
// Serialization
// ============================================================================

#[test]
fn test_template_serializes_crs_as_string() {
    let grid = GridTemplate::new(
        CrsCode::Esri54017,
        BoundingBox::new(0.0, 0.0, 2.0, 2.0),
        1.0,
    )
    .unwrap();
    let json = serde_json::to_value(&grid).unwrap();
    assert_eq!(json["crs"], "ESRI:54017");
    assert_eq!(json["ncols"], 2);

    let back: GridTemplate = serde_json::from_value(json).unwrap();
    assert_eq!(back, grid);
}

#[test]
fn test_cell_id_serializes_transparently() {
    assert_eq!(serde_json::to_string(&CellId(42)).unwrap(), "42");
}
