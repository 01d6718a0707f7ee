//! Full report runs over small GeoJSON and Newick fixtures.

use std::path::Path;

use diversity_report::{failure_category, run_report, ReportConfig, ReportSummary, SUMMARY_FILE_NAME, TABLE_FILE_NAME};
use serde_json::json;
use test_utils::{box_feature, feature_collection, temp_test_dir, write_fixture, MARINE_MAMMAL_NEWICK};

/// Three overlapping ranges around (0, 0); every species meets in one area.
fn write_inputs(dir: &Path, extra_species: Option<&str>) {
    let mut features = vec![
        box_feature("Stenella attenuata", -20.0, -10.0, 0.0, 10.0),
        box_feature("Tursiops truncatus", -10.0, -10.0, 10.0, 10.0),
        box_feature("Trichechus manatus", -5.0, -5.0, 20.0, 5.0),
    ];
    if let Some(name) = extra_species {
        features.push(box_feature(name, 5.0, 5.0, 15.0, 15.0));
    }
    write_fixture(dir, "ranges.geojson", &feature_collection(features, None));
    write_fixture(dir, "tree.nwk", MARINE_MAMMAL_NEWICK);

    let coast = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": { "type": "LineString", "coordinates": [[-40.0, 20.0], [40.0, 20.0]] }
        }]
    });
    write_fixture(dir, "coast.geojson", &coast.to_string());
}

fn write_config(dir: &Path, include_root: bool) -> std::path::PathBuf {
    let yaml = format!(
        r##"
inputs:
  ranges: ranges.geojson
  tree: tree.nwk
  coastline: coast.geojson
grid:
  crs: ESRI:54017
  resolution_m: 500000
  bbox: {{ min_lon: -40, min_lat: -30, max_lon: 40, max_lat: 30 }}
phylo:
  include_root: {}
  clades:
    - name: Cetacea
      tips: [Stenella_attenuata, Balaenoptera_musculus]
    - name: Sirenia
      tips: [Trichechus_manatus, Dugong_dugon]
      color: "#2ca02c"
render:
  pixels_per_cell: 3
  tree_size: 300
output:
  dir: out
"##,
        include_root
    );
    write_fixture(dir, "report.yaml", &yaml)
}

#[test]
fn test_report_writes_every_output() {
    let dir = temp_test_dir();
    write_inputs(dir.path(), None);
    let config = ReportConfig::load(write_config(dir.path(), true)).unwrap();

    let outcome = run_report(&config).unwrap();
    let out = dir.path().join("out");
    assert_eq!(outcome.output_dir, out);

    for name in [
        "alpha_richness.png",
        "phylogenetic_diversity.png",
        "phylogeny.svg",
        "phylogeny.png",
        TABLE_FILE_NAME,
        SUMMARY_FILE_NAME,
    ] {
        assert!(out.join(name).is_file(), "missing {}", name);
        assert!(outcome.summary.outputs.iter().any(|o| o == name));
    }

    let summary = &outcome.summary;
    assert_eq!(summary.species, 3);
    assert_eq!(summary.species_rasterized, 3);
    assert!(summary.species_without_cells.is_empty());
    assert_eq!(summary.tree_tips, 11);
    assert_eq!(summary.tips_without_ranges, 8);
    assert_eq!(summary.cells, outcome.table.len());

    // Stenella 100, Tursiops adds 6 + 2, Trichechus adds 30 + 70
    let richness = summary.richness.unwrap();
    let pd = summary.pd.unwrap();
    assert_eq!((richness.min, richness.max), (1.0, 3.0));
    assert_eq!(pd.min, 100.0);
    assert_eq!(pd.max, 208.0);

    let written: ReportSummary =
        serde_json::from_str(&std::fs::read_to_string(out.join(SUMMARY_FILE_NAME)).unwrap()).unwrap();
    assert_eq!(&written, summary);
}

#[test]
fn test_report_without_root() {
    let dir = temp_test_dir();
    write_inputs(dir.path(), None);
    let config = ReportConfig::load(write_config(dir.path(), false)).unwrap();

    let outcome = run_report(&config).unwrap();
    let pd = outcome.summary.pd.unwrap();
    // Single-species cells span no edges; the trio already meets at the root
    assert_eq!(pd.min, 0.0);
    assert_eq!(pd.max, 208.0);

    for record in &outcome.table.records {
        if record.richness == 1 {
            assert_eq!(record.pd, 0.0);
        }
    }
}

#[test]
fn test_species_missing_from_tree_fails_the_run() {
    let dir = temp_test_dir();
    write_inputs(dir.path(), Some("Orcinus orca"));
    let config = ReportConfig::load(write_config(dir.path(), true)).unwrap();

    let err = run_report(&config).unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Orcinus_orca"), "{}", message);
    assert_eq!(failure_category(&err), "input_mismatch");
    assert!(!dir.path().join("out").join(SUMMARY_FILE_NAME).exists());
}

#[test]
fn test_table_json_matches_outcome() {
    let dir = temp_test_dir();
    write_inputs(dir.path(), None);
    let config = ReportConfig::load(write_config(dir.path(), true)).unwrap();

    let outcome = run_report(&config).unwrap();
    let json = std::fs::read_to_string(outcome.output_dir.join(TABLE_FILE_NAME)).unwrap();
    let table: diversity::DiversityTable = serde_json::from_str(&json).unwrap();
    assert_eq!(table, outcome.table);
    assert!(table.records.windows(2).all(|w| w[0].cell < w[1].cell));
}

#[test]
fn test_failure_category_of_unreadable_tree() {
    let dir = temp_test_dir();
    write_inputs(dir.path(), None);
    std::fs::remove_file(dir.path().join("tree.nwk")).unwrap();
    let config = ReportConfig::load(write_config(dir.path(), true)).unwrap();

    let err = run_report(&config).unwrap_err();
    assert_eq!(failure_category(&err), "io");
    assert_eq!(failure_category(&anyhow::anyhow!("plain failure")), "other");
}
