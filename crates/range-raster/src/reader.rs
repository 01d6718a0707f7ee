//! GeoJSON readers for range maps and coastline context layers.
//!
//! The CRS is taken from the legacy named `crs` member when present,
//! otherwise EPSG:4326 as RFC 7946 requires.

use std::path::Path;

use biodiv_common::{BiodivError, BiodivResult, CrsCode};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use geojson::{Feature, GeoJson, Geometry, JsonObject, Value};
use tracing::{info, warn};

use crate::collection::RangeCollection;

/// Property holding the species binomial in IUCN range exports.
pub const DEFAULT_SPECIES_FIELD: &str = "binomial";

/// Read a GeoJSON range file.
pub fn load_ranges(path: impl AsRef<Path>, species_field: &str) -> BiodivResult<RangeCollection> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| BiodivError::IoError(format!("{}: {}", path.display(), e)))?;
    let ranges = ranges_from_geojson(&text, species_field)?;
    info!(
        path = %path.display(),
        records = ranges.len(),
        species = ranges.species().len(),
        crs = %ranges.crs(),
        "Loaded range maps"
    );
    Ok(ranges)
}

/// Parse range records from GeoJSON text.
///
/// Accepts a FeatureCollection or a single Feature. Polygon and
/// MultiPolygon geometries are kept, GeometryCollections are flattened,
/// and features with no areal part are skipped.
pub fn ranges_from_geojson(text: &str, species_field: &str) -> BiodivResult<RangeCollection> {
    let (features, foreign) = parse_features(text)?;
    let mut ranges = RangeCollection::new(declared_crs(foreign.as_ref())?);

    for (index, feature) in features.iter().enumerate() {
        let species = feature
            .property(species_field)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| BiodivError::MissingAttribute {
                index,
                field: species_field.to_string(),
            })?;

        let mut parts = Vec::new();
        if let Some(geometry) = &feature.geometry {
            collect_polygons(geometry, index, &mut parts)?;
        }

        if parts.is_empty() {
            warn!(feature = index, species = %species, "Skipping feature without polygon geometry");
            continue;
        }
        ranges.push(species, MultiPolygon::new(parts));
    }

    Ok(ranges)
}

/// Context lines read from a coastline or land GeoJSON file.
#[derive(Debug, Clone)]
pub struct CoastlineLayer {
    pub crs: CrsCode,
    pub lines: Vec<LineString<f64>>,
}

/// Read a coastline layer. Polygons contribute their rings as lines.
pub fn load_coastline(path: impl AsRef<Path>) -> BiodivResult<CoastlineLayer> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| BiodivError::IoError(format!("{}: {}", path.display(), e)))?;
    let layer = coastline_from_geojson(&text)?;
    info!(path = %path.display(), lines = layer.lines.len(), "Loaded coastline");
    Ok(layer)
}

/// Parse a coastline layer from GeoJSON text.
pub fn coastline_from_geojson(text: &str) -> BiodivResult<CoastlineLayer> {
    let (features, foreign) = parse_features(text)?;
    let crs = declared_crs(foreign.as_ref())?;

    let mut lines = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        if let Some(geometry) = &feature.geometry {
            collect_lines(geometry, index, &mut lines)?;
        }
    }
    Ok(CoastlineLayer { crs, lines })
}

fn parse_features(text: &str) -> BiodivResult<(Vec<Feature>, Option<JsonObject>)> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e: geojson::Error| BiodivError::GeoJsonError(e.to_string()))?;

    match geojson {
        GeoJson::FeatureCollection(collection) => Ok((collection.features, collection.foreign_members)),
        GeoJson::Feature(feature) => {
            let foreign = feature.foreign_members.clone();
            Ok((vec![feature], foreign))
        }
        GeoJson::Geometry(_) => Err(BiodivError::GeoJsonError(
            "expected a FeatureCollection or Feature, found a bare geometry".to_string(),
        )),
    }
}

/// CRS named by a legacy `{"crs": {"type": "name", "properties": {"name": ...}}}` member.
fn declared_crs(foreign: Option<&JsonObject>) -> BiodivResult<CrsCode> {
    let Some(crs) = foreign.and_then(|members| members.get("crs")) else {
        return Ok(CrsCode::Epsg4326);
    };
    let name = crs
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| BiodivError::GeoJsonError(format!("unrecognized crs member: {}", crs)))?;
    Ok(CrsCode::parse(name)?)
}

fn collect_polygons(geometry: &Geometry, index: usize, out: &mut Vec<Polygon<f64>>) -> BiodivResult<()> {
    match &geometry.value {
        Value::Polygon(rings) => out.push(to_polygon(rings, index)?),
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                out.push(to_polygon(rings, index)?);
            }
        }
        Value::GeometryCollection(members) => {
            for member in members {
                collect_polygons(member, index, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn collect_lines(geometry: &Geometry, index: usize, out: &mut Vec<LineString<f64>>) -> BiodivResult<()> {
    match &geometry.value {
        Value::LineString(positions) => out.push(to_line(positions, index)?),
        Value::MultiLineString(lines) => {
            for positions in lines {
                out.push(to_line(positions, index)?);
            }
        }
        Value::Polygon(rings) => {
            for positions in rings {
                out.push(to_line(positions, index)?);
            }
        }
        Value::MultiPolygon(polygons) => {
            for positions in polygons.iter().flatten() {
                out.push(to_line(positions, index)?);
            }
        }
        Value::GeometryCollection(members) => {
            for member in members {
                collect_lines(member, index, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn to_polygon(rings: &[Vec<Vec<f64>>], index: usize) -> BiodivResult<Polygon<f64>> {
    let mut rings = rings.iter().map(|ring| to_line(ring, index));
    let exterior = rings
        .next()
        .ok_or_else(|| BiodivError::InvalidGeometry(format!("feature {}: polygon without rings", index)))??;
    let interiors = rings.collect::<BiodivResult<Vec<_>>>()?;

    for ring in std::iter::once(&exterior).chain(interiors.iter()) {
        // Closed ring: at least three distinct vertices plus the closing one
        if ring.0.len() < 4 {
            return Err(BiodivError::InvalidGeometry(format!(
                "feature {}: ring has {} positions, need at least 4",
                index,
                ring.0.len()
            )));
        }
    }
    Ok(Polygon::new(exterior, interiors))
}

fn to_line(positions: &[Vec<f64>], index: usize) -> BiodivResult<LineString<f64>> {
    positions
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
            _ => Err(BiodivError::InvalidGeometry(format!(
                "feature {}: invalid position {:?}",
                index, p
            ))),
        })
        .collect::<BiodivResult<Vec<_>>>()
        .map(LineString::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{box_feature, feature_collection, range_feature};

    #[test]
    fn test_reads_species_and_default_crs() {
        let text = feature_collection(
            vec![
                box_feature("Stenella attenuata", 0.0, 0.0, 2.0, 2.0),
                box_feature("Dugong dugon", 5.0, 5.0, 6.0, 6.0),
            ],
            None,
        );
        let ranges = ranges_from_geojson(&text, DEFAULT_SPECIES_FIELD).unwrap();
        assert_eq!(ranges.crs(), CrsCode::Epsg4326);
        assert_eq!(ranges.species(), vec!["Dugong_dugon", "Stenella_attenuata"]);
    }

    #[test]
    fn test_reads_declared_crs() {
        let text = feature_collection(vec![box_feature("A b", 0.0, 0.0, 1.0, 1.0)], Some("ESRI:54017"));
        let ranges = ranges_from_geojson(&text, DEFAULT_SPECIES_FIELD).unwrap();
        assert_eq!(ranges.crs(), CrsCode::Esri54017);

        let text = feature_collection(vec![], Some("EPSG:3857"));
        assert!(matches!(
            ranges_from_geojson(&text, DEFAULT_SPECIES_FIELD),
            Err(BiodivError::UnsupportedCrs(_))
        ));
    }

    #[test]
    fn test_missing_species_attribute() {
        let text = feature_collection(
            vec![
                box_feature("A b", 0.0, 0.0, 1.0, 1.0),
                range_feature("sci_name", "C d", &[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]),
            ],
            None,
        );
        match ranges_from_geojson(&text, DEFAULT_SPECIES_FIELD) {
            Err(BiodivError::MissingAttribute { index, field }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "binomial");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_skips_point_features_and_flattens_collections() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"binomial": "A b"},
                 "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}},
                {"type": "Feature", "properties": {"binomial": "C d"},
                 "geometry": {"type": "GeometryCollection", "geometries": [
                    {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]},
                    {"type": "MultiPolygon", "coordinates": [[[[2,2],[3,2],[3,3],[2,2]]]]},
                    {"type": "LineString", "coordinates": [[0,0],[5,5]]}
                 ]}}
            ]
        }"#;
        let ranges = ranges_from_geojson(text, "binomial").unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges.records()[0].species, "C_d");
        assert_eq!(ranges.records()[0].geometry.0.len(), 2);
    }

    #[test]
    fn test_degenerate_ring_rejected() {
        let text = r#"{"type": "Feature", "properties": {"binomial": "A b"},
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[0,0]]]}}"#;
        assert!(matches!(
            ranges_from_geojson(text, "binomial"),
            Err(BiodivError::InvalidGeometry(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            ranges_from_geojson("{not json", "binomial"),
            Err(BiodivError::GeoJsonError(_))
        ));
        assert!(matches!(
            ranges_from_geojson(r#"{"type": "Point", "coordinates": [0, 0]}"#, "binomial"),
            Err(BiodivError::GeoJsonError(_))
        ));
    }

    #[test]
    fn test_coastline_collects_rings_and_lines() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1],[2,0]]}},
                {"type": "Feature", "properties": {},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}
            ]
        }"#;
        let coast = coastline_from_geojson(text).unwrap();
        assert_eq!(coast.crs, CrsCode::Epsg4326);
        assert_eq!(coast.lines.len(), 2);
        assert_eq!(coast.lines[0].0.len(), 3);
    }
}
