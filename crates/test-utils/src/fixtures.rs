//! Common test fixtures for the diversity pipeline tests.
//!
//! This module provides a small dated phylogeny and GeoJSON range-map
//! builders whose expected diversity values can be worked out by hand.

use serde_json::{json, Value};

/// A dated (ultrametric, depth 100) marine mammal tree.
///
/// Three well separated clades hang off the root:
/// - Cetacea: dolphins (`Stenella`, `Delphinus`, `Tursiops`) and baleen whales
/// - Pinnipedia: seals, sea lions and walrus
/// - Sirenia: manatee and dugong
///
/// Known values with the root included:
/// - PD{S. attenuata, S. longirostris, D. delphis} = 111
/// - PD{S. attenuata, T. manatus, P. vitulina} = 280
pub const MARINE_MAMMAL_NEWICK: &str = "(((((Stenella_attenuata:3,Stenella_longirostris:3):5,\
(Delphinus_delphis:6,Tursiops_truncatus:6):2):26,\
(Balaenoptera_musculus:10,Megaptera_novaeangliae:10):24):46,\
(Phoca_vitulina:20,(Zalophus_californianus:15,Odobenus_rosmarus:15):5):60):20,\
(Trichechus_manatus:30,Dugong_dugon:30):70);";

/// Root-to-tip depth of every tip in [`MARINE_MAMMAL_NEWICK`].
pub const MARINE_MAMMAL_DEPTH: f64 = 100.0;

/// All tip labels of [`MARINE_MAMMAL_NEWICK`], in Newick order.
pub const MARINE_MAMMAL_TIPS: &[&str] = &[
    "Stenella_attenuata",
    "Stenella_longirostris",
    "Delphinus_delphis",
    "Tursiops_truncatus",
    "Balaenoptera_musculus",
    "Megaptera_novaeangliae",
    "Phoca_vitulina",
    "Zalophus_californianus",
    "Odobenus_rosmarus",
    "Trichechus_manatus",
    "Dugong_dugon",
];

/// Clade definitions as (name, representative tip, representative tip).
///
/// The MRCA of the two representatives is the clade's crown node.
pub const MARINE_MAMMAL_CLADES: &[(&str, &str, &str)] = &[
    ("Cetacea", "Stenella_attenuata", "Balaenoptera_musculus"),
    ("Sirenia", "Trichechus_manatus", "Dugong_dugon"),
    ("Pinnipedia", "Phoca_vitulina", "Odobenus_rosmarus"),
];

/// Common extents in EPSG:4326 degrees, as (min_x, min_y, max_x, max_y).
pub mod extents {
    /// Whole globe
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Gulf of California, a small area with many cetaceans
    pub const GULF_OF_CALIFORNIA: (f64, f64, f64, f64) = (-115.0, 22.0, -105.0, 32.0);

    /// Caribbean, manatee range
    pub const CARIBBEAN: (f64, f64, f64, f64) = (-90.0, 10.0, -60.0, 25.0);
}

/// A GeoJSON polygon feature with one property holding the species name.
///
/// `ring` is the exterior ring; it is closed automatically when the last
/// vertex differs from the first.
pub fn range_feature(field: &str, species: &str, ring: &[(f64, f64)]) -> Value {
    let mut coords: Vec<[f64; 2]> = ring.iter().map(|&(x, y)| [x, y]).collect();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }

    json!({
        "type": "Feature",
        "properties": { field: species },
        "geometry": {
            "type": "Polygon",
            "coordinates": [coords],
        },
    })
}

/// An axis-aligned box feature under the default `binomial` property.
pub fn box_feature(species: &str, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
    range_feature(
        "binomial",
        species,
        &[(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)],
    )
}

/// Wrap features in a FeatureCollection, optionally with a legacy named `crs` member.
pub fn feature_collection(features: Vec<Value>, crs: Option<&str>) -> String {
    let mut collection = json!({
        "type": "FeatureCollection",
        "features": features,
    });
    if let Some(name) = crs {
        collection["crs"] = json!({
            "type": "name",
            "properties": { "name": name },
        });
    }
    collection.to_string()
}
