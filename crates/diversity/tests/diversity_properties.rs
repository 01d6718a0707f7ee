//! Behavioural properties of richness and PD on the marine mammal fixture.

use biodiv_common::{BiodivError, BoundingBox, CellId, CrsCode, GridTemplate};
use diversity::{alpha_richness, faith_pd, CommunityMatrix, DiversityTable, PdCalculator};
use phylo::PhyloTree;
use range_raster::{normalize_species_name, PresenceLayer, PresenceStack};
use test_utils::{assert_approx_eq, create_presence_matrix, MARINE_MAMMAL_NEWICK, MARINE_MAMMAL_TIPS};

fn marine_tree() -> PhyloTree {
    PhyloTree::from_newick(MARINE_MAMMAL_NEWICK).expect("fixture tree parses")
}

fn species() -> Vec<String> {
    MARINE_MAMMAL_TIPS.iter().map(|s| s.to_string()).collect()
}

/// Random-ish matrix over every fixture species.
fn random_matrix(rows: usize, seed: u32) -> CommunityMatrix {
    let pattern = create_presence_matrix(rows, MARINE_MAMMAL_TIPS.len(), 35, seed);
    let rows = pattern
        .into_iter()
        .enumerate()
        .map(|(i, row)| (CellId(i as u32 * 3), row))
        .collect();
    CommunityMatrix::from_rows(species(), rows).unwrap()
}

// ============================================================================
// Alpha richness
// ============================================================================

#[test]
fn test_richness_counts_present_columns_and_is_positive() {
    let matrix = random_matrix(200, 4);
    let alpha = alpha_richness(&matrix).unwrap();

    assert_eq!(alpha.len(), matrix.num_rows());
    for (cell, row) in matrix.rows() {
        let expected = row.iter().filter(|&&p| p).count() as u32;
        assert_eq!(alpha[&cell], expected);
        assert!(alpha[&cell] >= 1);
    }
}

// ============================================================================
// Phylogenetic diversity
// ============================================================================

#[test]
fn test_known_community_values() {
    let tree = marine_tree();
    let shallow = ["Stenella_attenuata", "Stenella_longirostris", "Delphinus_delphis"];
    let deep = ["Stenella_attenuata", "Trichechus_manatus", "Phoca_vitulina"];

    assert_approx_eq!(faith_pd(&tree, &shallow).unwrap(), 111.0, 1e-9);
    assert_approx_eq!(faith_pd(&tree, &deep).unwrap(), 280.0, 1e-9);
}

#[test]
fn test_distant_clades_beat_shallow_clade_at_equal_richness() {
    let tree = marine_tree();
    let calc = PdCalculator::new(&tree, MARINE_MAMMAL_TIPS).unwrap();

    let index = |name: &str| MARINE_MAMMAL_TIPS.iter().position(|t| *t == name).unwrap();
    let mut shallow = vec![false; MARINE_MAMMAL_TIPS.len()];
    for name in ["Stenella_attenuata", "Stenella_longirostris", "Delphinus_delphis"] {
        shallow[index(name)] = true;
    }
    let mut deep = vec![false; MARINE_MAMMAL_TIPS.len()];
    for name in ["Stenella_attenuata", "Trichechus_manatus", "Phoca_vitulina"] {
        deep[index(name)] = true;
    }

    let matrix = CommunityMatrix::from_rows(species(), vec![(CellId(10), shallow), (CellId(20), deep)]).unwrap();
    let alpha = alpha_richness(&matrix).unwrap();
    let pd = calc.compute(&matrix).unwrap();

    assert_eq!(alpha[&CellId(10)], 3);
    assert_eq!(alpha[&CellId(20)], 3);
    assert!(pd[&CellId(20)] > pd[&CellId(10)]);
}

#[test]
fn test_single_species_pd_is_root_to_tip_distance() {
    let tree = marine_tree();
    let calc = PdCalculator::new(&tree, MARINE_MAMMAL_TIPS).unwrap();
    for tip in MARINE_MAMMAL_TIPS {
        let expected = tree.root_to_tip_distance(tip).unwrap();
        assert_approx_eq!(calc.community_pd(&[*tip]).unwrap(), expected, 1e-9);
        assert_approx_eq!(faith_pd(&tree, &[*tip]).unwrap(), expected, 1e-9);
    }
}

#[test]
fn test_pd_monotone_under_adding_species() {
    let tree = marine_tree();
    let calc = PdCalculator::new(&tree, MARINE_MAMMAL_TIPS).unwrap();

    let mut community: Vec<&str> = Vec::new();
    let mut previous = 0.0;
    // Walk the tips in a scrambled but fixed order
    for k in 0..MARINE_MAMMAL_TIPS.len() {
        community.push(MARINE_MAMMAL_TIPS[(k * 7) % MARINE_MAMMAL_TIPS.len()]);
        let pd = calc.community_pd(&community).unwrap();
        assert!(pd >= previous, "PD dropped from {previous} to {pd} at {community:?}");
        previous = pd;
    }
    assert_approx_eq!(previous, tree.total_length(), 1e-9);
}

#[test]
fn test_pruning_is_lossless_for_pd() {
    let tree = marine_tree();
    let retained = [
        "Stenella_longirostris",
        "Tursiops_truncatus",
        "Megaptera_novaeangliae",
        "Odobenus_rosmarus",
        "Dugong_dugon",
    ];
    let pruned = tree.keep_tips(&retained).unwrap();

    let pattern = create_presence_matrix(40, retained.len(), 50, 9);
    for row in pattern {
        let community: Vec<&str> = retained
            .iter()
            .zip(&row)
            .filter(|(_, &p)| p)
            .map(|(s, _)| *s)
            .collect();
        assert_approx_eq!(
            faith_pd(&pruned, &community).unwrap(),
            faith_pd(&tree, &community).unwrap(),
            1e-9
        );
    }
}

#[test]
fn test_calculator_matches_direct_faith_pd() {
    let tree = marine_tree();
    let matrix = random_matrix(150, 21);
    let calc = PdCalculator::new(&tree, matrix.species()).unwrap();
    let pd = calc.compute(&matrix).unwrap();

    assert_eq!(pd.len(), matrix.num_rows());
    for (cell, _) in matrix.rows() {
        let present = matrix.present_species(cell);
        assert_approx_eq!(pd[&cell], faith_pd(&tree, &present).unwrap(), 1e-9);
    }
}

#[test]
fn test_column_order_does_not_change_pd() {
    let tree = marine_tree();
    let matrix = random_matrix(60, 2);
    let mut reversed: Vec<&str> = MARINE_MAMMAL_TIPS.to_vec();
    reversed.reverse();
    let aligned = matrix.align_columns(&reversed).unwrap();

    let calc = PdCalculator::new(&tree, MARINE_MAMMAL_TIPS).unwrap();
    assert_eq!(calc.compute(&matrix).unwrap(), calc.compute(&aligned).unwrap());
}

#[test]
fn test_unrooted_pd_excludes_edges_above_mrca() {
    let tree = marine_tree();
    let calc = PdCalculator::new(&tree, MARINE_MAMMAL_TIPS)
        .unwrap()
        .with_include_root(false);

    assert_approx_eq!(calc.community_pd(&["Dugong_dugon"]).unwrap(), 0.0, 1e-9);
    // Two stenellids: 3 + 3
    assert_approx_eq!(
        calc.community_pd(&["Stenella_attenuata", "Stenella_longirostris"]).unwrap(),
        6.0,
        1e-9
    );
    // Spanning the root, nothing is excluded
    assert_approx_eq!(
        calc.community_pd(&["Stenella_attenuata", "Trichechus_manatus", "Phoca_vitulina"]).unwrap(),
        280.0,
        1e-9
    );
}

// ============================================================================
// Name matching
// ============================================================================

#[test]
fn test_normalized_name_matches_tip_and_misspelling_is_reported() {
    let tree = marine_tree();
    let normalized = normalize_species_name("Stenella.attenuata");
    assert_eq!(normalized, "Stenella_attenuata");
    assert!(PdCalculator::new(&tree, &[normalized.as_str()]).is_ok());

    let misspelled = normalize_species_name("Stenella.atenuata");
    match PdCalculator::new(&tree, &[normalized.as_str(), misspelled.as_str(), "Orcinus_orca"]) {
        Err(BiodivError::SpeciesMismatch { missing }) => {
            assert_eq!(missing, vec!["Orcinus_orca", "Stenella_atenuata"]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

// ============================================================================
// Stack to table
// ============================================================================

#[test]
fn test_stack_to_table_joins_on_cell_id() {
    let template =
        GridTemplate::new(CrsCode::Esri54017, BoundingBox::new(0.0, 0.0, 4_000_000.0, 1_000_000.0), 1_000_000.0)
            .unwrap();
    let stack = PresenceStack::new(
        template.clone(),
        vec![
            PresenceLayer::new("Dugong_dugon", vec![true, true, false, false]),
            PresenceLayer::new("Stenella_attenuata", vec![false, true, false, true]),
        ],
    )
    .unwrap();

    let matrix = CommunityMatrix::from_presence_stack(&stack);
    assert_eq!(matrix.cells(), &[CellId(0), CellId(1), CellId(3)]);

    let tree = marine_tree();
    let alpha = alpha_richness(&matrix).unwrap();
    let pd = PdCalculator::new(&tree, matrix.species()).unwrap().compute(&matrix).unwrap();
    let table = DiversityTable::join(&template, &alpha, &pd).unwrap();

    assert_eq!(table.len(), 3);
    assert_eq!(table.records[1].cell, CellId(1));
    assert_eq!(table.records[1].richness, 2);
    assert_approx_eq!(table.records[1].pd, 200.0, 1e-9);
    assert_approx_eq!(table.records[2].pd, 100.0, 1e-9);
}

#[test]
fn test_empty_stack_is_rejected_by_calculators() {
    let template =
        GridTemplate::new(CrsCode::Esri54017, BoundingBox::new(0.0, 0.0, 2.0, 2.0), 1.0).unwrap();
    let stack = PresenceStack::new(template, vec![PresenceLayer::new("Dugong_dugon", vec![false; 4])]).unwrap();
    let matrix = CommunityMatrix::from_presence_stack(&stack);

    assert_eq!(matrix.num_rows(), 0);
    assert!(matches!(alpha_richness(&matrix), Err(BiodivError::EmptyCommunity(_))));
    let calc = PdCalculator::new(&marine_tree(), matrix.species()).unwrap();
    assert!(matches!(calc.compute(&matrix), Err(BiodivError::EmptyCommunity(_))));
}
