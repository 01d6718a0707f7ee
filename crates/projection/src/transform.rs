//! Explicit coordinate transformations between supported CRSs.
//!
//! Range maps usually arrive in EPSG:4326 while the analysis grid is
//! equal-area. The rasterizer refuses mismatched inputs, so the pipeline
//! reprojects through a `Transformer` first.

use biodiv_common::{BiodivError, BiodivResult, BoundingBox, CrsCode};
use geo::{BooleanOps, BoundingRect, Coord, Densify, LineString, MapCoords, MultiPolygon};

use crate::cea::CylindricalEqualArea;

#[derive(Debug, Clone)]
enum Kind {
    Identity,
    Forward(CylindricalEqualArea),
    Inverse(CylindricalEqualArea),
    Between(CylindricalEqualArea, CylindricalEqualArea),
}

/// Point and geometry transformer for one (source, target) CRS pair.
#[derive(Debug, Clone)]
pub struct Transformer {
    from: CrsCode,
    to: CrsCode,
    kind: Kind,
    /// Max edge length in source units before projecting; 0 disables densification
    densify: f64,
}

impl Transformer {
    /// Build a transformer from `from` to `to`.
    pub fn new(from: CrsCode, to: CrsCode) -> BiodivResult<Self> {
        let kind = match (
            CylindricalEqualArea::for_crs(from),
            CylindricalEqualArea::for_crs(to),
        ) {
            _ if from == to => Kind::Identity,
            (None, Some(target)) => Kind::Forward(target),
            (Some(source), None) => Kind::Inverse(source),
            (Some(source), Some(target)) => Kind::Between(source, target),
            (None, None) => {
                return Err(BiodivError::UnsupportedCrs(format!(
                    "no transformation from {} to {}",
                    from, to
                )))
            }
        };

        Ok(Self {
            from,
            to,
            kind,
            densify: 0.0,
        })
    }

    /// Split polygon edges longer than `max_segment` (source units) before
    /// projecting, so long edges follow the projected curve.
    pub fn with_densify(mut self, max_segment: f64) -> Self {
        self.densify = max_segment.max(0.0);
        self
    }

    pub fn source(&self) -> CrsCode {
        self.from
    }

    pub fn target(&self) -> CrsCode {
        self.to
    }

    /// Transform one point.
    pub fn transform_point(&self, x: f64, y: f64) -> BiodivResult<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(BiodivError::ProjectionError(format!(
                "non-finite coordinate ({}, {})",
                x, y
            )));
        }

        match &self.kind {
            Kind::Identity => Ok((x, y)),
            Kind::Forward(target) => {
                check_geographic(x, y)?;
                Ok(target.forward(x, y))
            }
            Kind::Inverse(source) => Ok(source.inverse(x, y)),
            Kind::Between(source, target) => {
                let (lon, lat) = source.inverse(x, y);
                Ok(target.forward(lon, lat))
            }
        }
    }

    /// Transform every vertex of a multipolygon.
    ///
    /// Lon/lat polygons written past ±180° (Pacific ranges drawn as
    /// 170..190) are split at the antimeridian first, so each piece projects
    /// onto its own side of the map.
    pub fn transform_multipolygon(&self, geometry: &MultiPolygon<f64>) -> BiodivResult<MultiPolygon<f64>> {
        if matches!(self.kind, Kind::Identity) {
            return Ok(geometry.clone());
        }
        let split;
        let geometry = if matches!(self.kind, Kind::Forward(_)) {
            split = split_antimeridian(geometry)?;
            &split
        } else {
            geometry
        };
        if self.densify > 0.0 {
            let dense = geometry.densify(self.densify);
            return dense.try_map_coords(|c| self.transform_coord(c));
        }
        geometry.try_map_coords(|c| self.transform_coord(c))
    }

    /// Transform every vertex of a line string.
    pub fn transform_line(&self, line: &LineString<f64>) -> BiodivResult<LineString<f64>> {
        if matches!(self.kind, Kind::Identity) {
            return Ok(line.clone());
        }
        if self.densify > 0.0 {
            let dense = line.densify(self.densify);
            return dense.try_map_coords(|c| self.transform_coord(c));
        }
        line.try_map_coords(|c| self.transform_coord(c))
    }

    fn transform_coord(&self, c: Coord<f64>) -> BiodivResult<Coord<f64>> {
        let (x, y) = self.transform_point(c.x, c.y)?;
        Ok(Coord { x, y })
    }
}

/// Longitude overshoot accepted in polygons before they are split.
const MAX_WRAPPED_LON: f64 = 360.0;

/// Reject coordinates outside [-180, 180] x [-90, 90]. Projected files
/// mislabelled as EPSG:4326 fail here instead of being wrapped.
fn check_geographic(lon: f64, lat: f64) -> BiodivResult<()> {
    if lon.abs() > 180.0 + 1e-9 || lat.abs() > 90.0 + 1e-9 {
        return Err(BiodivError::ProjectionError(format!(
            "coordinate ({}, {}) is outside geographic range",
            lon, lat
        )));
    }
    Ok(())
}

/// Cut a lon/lat multipolygon into pieces inside [-180, 180], shifting the
/// parts beyond the antimeridian by a full turn.
///
/// Geometry already inside the range is returned unchanged. Longitudes
/// beyond ±360 are an error.
fn split_antimeridian(geometry: &MultiPolygon<f64>) -> BiodivResult<MultiPolygon<f64>> {
    let Some(bounds) = geometry.bounding_rect() else {
        return Ok(geometry.clone());
    };
    let (min, max) = (bounds.min(), bounds.max());
    if min.x >= -180.0 && max.x <= 180.0 {
        return Ok(geometry.clone());
    }
    if min.x < -MAX_WRAPPED_LON || max.x > MAX_WRAPPED_LON {
        return Err(BiodivError::ProjectionError(format!(
            "longitude range {}..{} is outside geographic range",
            min.x, max.x
        )));
    }

    let mut parts = Vec::new();
    for offset in [-360.0, 0.0, 360.0] {
        // The window spans the geometry's own latitudes so invalid ones still fail later
        let window = BoundingBox::new(-180.0 + offset, min.y, 180.0 + offset, max.y)
            .to_rect()
            .to_polygon();
        let clipped = geometry.intersection(&MultiPolygon::new(vec![window]));
        parts.extend(clipped.0.into_iter().map(|polygon| {
            polygon.map_coords(|c| Coord {
                x: (c.x - offset).clamp(-180.0, 180.0),
                y: c.y,
            })
        }));
    }
    Ok(MultiPolygon::new(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_identity_is_noop() {
        let t = Transformer::new(CrsCode::Esri54017, CrsCode::Esri54017).unwrap();
        assert_eq!(t.transform_point(123.0, -456.0).unwrap(), (123.0, -456.0));
    }

    #[test]
    fn test_forward_then_inverse() {
        let fwd = Transformer::new(CrsCode::Epsg4326, CrsCode::Esri54017).unwrap();
        let inv = Transformer::new(CrsCode::Esri54017, CrsCode::Epsg4326).unwrap();
        let (x, y) = fwd.transform_point(-150.0, 20.0).unwrap();
        let (lon, lat) = inv.transform_point(x, y).unwrap();
        assert!((lon + 150.0).abs() < 1e-9);
        assert!((lat - 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_between_equal_area_crs() {
        let t = Transformer::new(CrsCode::Esri54034, CrsCode::Esri54017).unwrap();
        let direct = Transformer::new(CrsCode::Epsg4326, CrsCode::Esri54017).unwrap();
        let via = Transformer::new(CrsCode::Epsg4326, CrsCode::Esri54034).unwrap();

        let (x0, y0) = via.transform_point(45.0, -30.0).unwrap();
        let (x1, y1) = t.transform_point(x0, y0).unwrap();
        let (x2, y2) = direct.transform_point(45.0, -30.0).unwrap();
        assert!((x1 - x2).abs() < 1e-3);
        assert!((y1 - y2).abs() < 1e-1);
    }

    #[test]
    fn test_rejects_projected_coordinates_labelled_geographic() {
        let t = Transformer::new(CrsCode::Epsg4326, CrsCode::Esri54017).unwrap();
        assert!(matches!(
            t.transform_point(1_000_000.0, 2_000_000.0),
            Err(BiodivError::ProjectionError(_))
        ));
        assert!(t.transform_point(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_lon_lat() {
        let t = Transformer::new(CrsCode::Epsg4326, CrsCode::Esri54017).unwrap();
        assert!(matches!(t.transform_point(200.0, 10.0), Err(BiodivError::ProjectionError(_))));
        assert!(matches!(t.transform_point(-200.0, 10.0), Err(BiodivError::ProjectionError(_))));
        assert!(matches!(t.transform_point(10.0, 95.0), Err(BiodivError::ProjectionError(_))));
        assert!(matches!(t.transform_point(10.0, -95.0), Err(BiodivError::ProjectionError(_))));
        assert!(t.transform_point(180.0, 90.0).is_ok());

        let line = LineString::from(vec![(0.0, 0.0), (200.0, 0.0)]);
        assert!(t.transform_line(&line).is_err());

        let beyond_pole = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 80.0),
            (x: 10.0, y: 80.0),
            (x: 10.0, y: 95.0),
            (x: 0.0, y: 95.0),
        ]]);
        assert!(t.transform_multipolygon(&beyond_pole).is_err());

        let far_east = MultiPolygon::new(vec![polygon![
            (x: 370.0, y: 0.0),
            (x: 380.0, y: 0.0),
            (x: 380.0, y: 10.0),
            (x: 370.0, y: 10.0),
        ]]);
        assert!(t.transform_multipolygon(&far_east).is_err());
    }

    #[test]
    fn test_polygon_across_antimeridian_is_split() {
        let t = Transformer::new(CrsCode::Epsg4326, CrsCode::Esri54017).unwrap();
        let pacific = MultiPolygon::new(vec![polygon![
            (x: 170.0, y: 0.0),
            (x: 190.0, y: 0.0),
            (x: 190.0, y: 10.0),
            (x: 170.0, y: 10.0),
        ]]);

        let projected = t.transform_multipolygon(&pacific).unwrap();
        assert_eq!(projected.0.len(), 2);

        let (east_edge, _) = t.transform_point(170.0, 0.0).unwrap();
        let (west_edge, _) = t.transform_point(-170.0, 0.0).unwrap();
        for piece in &projected {
            let rect = piece.bounding_rect().unwrap();
            // Each piece stays on its own side of the map
            assert!(rect.min().x >= east_edge - 1.0 || rect.max().x <= west_edge + 1.0);
        }
    }

    #[test]
    fn test_transform_multipolygon_with_densify() {
        let poly = polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
        ];
        let mp = MultiPolygon::new(vec![poly]);

        let plain = Transformer::new(CrsCode::Epsg4326, CrsCode::Esri54017).unwrap();
        let dense = plain.clone().with_densify(1.0);

        let a = plain.transform_multipolygon(&mp).unwrap();
        let b = dense.transform_multipolygon(&mp).unwrap();
        assert!(b.0[0].exterior().0.len() > a.0[0].exterior().0.len());

        let (x, y) = plain.transform_point(10.0, 10.0).unwrap();
        assert!(a.0[0].exterior().0.iter().any(|c| (c.x - x).abs() < 1e-6 && (c.y - y).abs() < 1e-6));
    }
}
