//! Cylindrical Equal-Area projection on the WGS84 ellipsoid.
//!
//! Used for the global analysis grid: equal-area cells make per-cell species
//! counts comparable between the tropics and high latitudes.
//!
//! Two members of the family are in use:
//! - Behrmann (ESRI:54017): standard parallel 30°
//! - Lambert cylindrical equal-area (ESRI:54034): standard parallel 0°
//!
//! Reference: Snyder, Map Projections: A Working Manual (1987), pp. 76-85.

use std::f64::consts::PI;

use biodiv_common::CrsCode;

/// WGS84 semi-major axis (meters)
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// Cylindrical equal-area projection parameters.
#[derive(Debug, Clone)]
pub struct CylindricalEqualArea {
    /// Central meridian in radians
    pub lon0: f64,
    /// Latitude of true scale in radians
    pub lat_ts: f64,
    /// Semi-major axis (meters)
    pub a: f64,
    /// First eccentricity
    e: f64,
    /// Eccentricity squared
    es: f64,
    /// Scale factor along the standard parallel
    k0: f64,
    /// q at the pole, for the inverse
    qp: f64,
}

impl CylindricalEqualArea {
    /// Create a projection on the WGS84 ellipsoid.
    ///
    /// # Arguments
    /// * `lon0_deg` - Central meridian (degrees)
    /// * `lat_ts_deg` - Standard parallel (degrees)
    pub fn new(lon0_deg: f64, lat_ts_deg: f64) -> Self {
        let es = WGS84_F * (2.0 - WGS84_F);
        let e = es.sqrt();
        let lat_ts = lat_ts_deg.to_radians();
        let sin_ts = lat_ts.sin();
        let k0 = lat_ts.cos() / (1.0 - es * sin_ts * sin_ts).sqrt();

        let mut proj = Self {
            lon0: lon0_deg.to_radians(),
            lat_ts,
            a: WGS84_A,
            e,
            es,
            k0,
            qp: 0.0,
        };
        proj.qp = proj.q(1.0);
        proj
    }

    /// World Behrmann (ESRI:54017).
    pub fn behrmann() -> Self {
        Self::new(0.0, 30.0)
    }

    /// Projection for an equal-area CRS code, `None` for geographic codes.
    pub fn for_crs(crs: CrsCode) -> Option<Self> {
        crs.standard_parallel().map(|lat_ts| Self::new(0.0, lat_ts))
    }

    /// Authalic q(φ) from sin φ.
    fn q(&self, sin_phi: f64) -> f64 {
        let e_sin = self.e * sin_phi;
        (1.0 - self.es)
            * (sin_phi / (1.0 - e_sin * e_sin)
                - (1.0 / (2.0 * self.e)) * ((1.0 - e_sin) / (1.0 + e_sin)).ln())
    }

    /// Convert geographic coordinates (degrees) to projected meters.
    ///
    /// Longitude is wrapped to [-180, 180) around the central meridian and
    /// latitude is clamped to the poles.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.clamp(-90.0, 90.0).to_radians();

        // Normalize longitude difference to [-π, π]
        let mut dlon = lon_deg.to_radians() - self.lon0;
        while dlon > PI {
            dlon -= 2.0 * PI;
        }
        while dlon < -PI {
            dlon += 2.0 * PI;
        }

        let x = self.a * self.k0 * dlon;
        let y = self.a * self.q(lat.sin()) / (2.0 * self.k0);
        (x, y)
    }

    /// Convert projected meters back to geographic degrees (lon, lat).
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let ratio = (2.0 * y * self.k0 / (self.a * self.qp)).clamp(-1.0, 1.0);
        let beta = ratio.asin();

        // Authalic-to-geodetic latitude series
        let e4 = self.es * self.es;
        let e6 = e4 * self.es;
        let lat = beta
            + (self.es / 3.0 + 31.0 * e4 / 180.0 + 517.0 * e6 / 5040.0) * (2.0 * beta).sin()
            + (23.0 * e4 / 360.0 + 251.0 * e6 / 3780.0) * (4.0 * beta).sin()
            + (761.0 * e6 / 45360.0) * (6.0 * beta).sin();

        let lon = self.lon0 + x / (self.a * self.k0);
        (lon.to_degrees(), lat.to_degrees())
    }

    /// Projected x of the antimeridian, i.e. half the map width.
    pub fn half_width(&self) -> f64 {
        self.a * self.k0 * PI
    }

    /// Projected y of the north pole.
    pub fn half_height(&self) -> f64 {
        self.a * self.qp / (2.0 * self.k0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_behrmann_extent_matches_crs_bounds() {
        let proj = CylindricalEqualArea::behrmann();
        let bounds = CrsCode::Esri54017.valid_bounds();
        assert!((proj.half_width() - bounds.max_x).abs() < 1e-3);
        assert!((proj.half_height() - bounds.max_y).abs() < 1e-3);

        let (x, y) = proj.forward(180.0 - 1e-12, 90.0);
        assert!((x - bounds.max_x).abs() < 1e-2);
        assert!((y - bounds.max_y).abs() < 1e-3);
    }

    #[test]
    fn test_origin_maps_to_zero() {
        let proj = CylindricalEqualArea::behrmann();
        let (x, y) = proj.forward(0.0, 0.0);
        assert!(x.abs() < 1e-9);
        assert!(y.abs() < 1e-9);
    }

    #[test]
    fn test_roundtrip() {
        let proj = CylindricalEqualArea::behrmann();
        for &(lon, lat) in &[(-120.5, 36.0), (10.0, -45.0), (179.0, 80.0), (-63.0, -70.5)] {
            let (x, y) = proj.forward(lon, lat);
            let (lon2, lat2) = proj.inverse(x, y);
            assert!((lon - lon2).abs() < 1e-9, "lon {} vs {}", lon, lon2);
            assert!((lat - lat2).abs() < 1e-6, "lat {} vs {}", lat, lat2);
        }
    }

    #[test]
    fn test_longitude_wraps() {
        let proj = CylindricalEqualArea::behrmann();
        let (x1, _) = proj.forward(-170.0, 0.0);
        let (x2, _) = proj.forward(190.0, 0.0);
        assert!((x1 - x2).abs() < 1e-6);
    }

    #[test]
    fn test_equal_area_bands() {
        // Bands of equal latitude span shrink in y towards the pole,
        // the cylindrical compensation for wider cells in x
        let proj = CylindricalEqualArea::new(0.0, 0.0);
        let (_, y0) = proj.forward(0.0, 0.0);
        let (_, y10) = proj.forward(0.0, 10.0);
        let (_, y70) = proj.forward(0.0, 70.0);
        let (_, y80) = proj.forward(0.0, 80.0);
        assert!((y10 - y0) > (y80 - y70));
    }
}
