//! Coordinate Reference System codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::BoundingBox;

/// Well-known CRS codes supported by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    Epsg4326,
    /// World Behrmann: cylindrical equal-area, standard parallel 30° (meters)
    Esri54017,
    /// World Cylindrical Equal Area: standard parallel 0° (meters)
    Esri54034,
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326", "epsg:4326", "CRS:84"
    /// - OGC URNs as written by GeoJSON exporters ("urn:ogc:def:crs:OGC:1.3:CRS84")
    /// - "ESRI:54017" (also spelled "EPSG:54017" by some tools)
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "OGC:CRS84" | "URN:OGC:DEF:CRS:OGC:1.3:CRS84"
            | "URN:OGC:DEF:CRS:EPSG::4326" => Ok(CrsCode::Epsg4326),
            "ESRI:54017" | "EPSG:54017" | "URN:OGC:DEF:CRS:ESRI::54017" => Ok(CrsCode::Esri54017),
            "ESRI:54034" | "EPSG:54034" | "URN:OGC:DEF:CRS:ESRI::54034" => Ok(CrsCode::Esri54034),
            _ => Err(CrsParseError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }

    /// Equal-area CRSs keep raster cell counts spatially comparable.
    pub fn is_equal_area(&self) -> bool {
        matches!(self, CrsCode::Esri54017 | CrsCode::Esri54034)
    }

    /// Standard parallel in degrees for the cylindrical equal-area family.
    pub fn standard_parallel(&self) -> Option<f64> {
        match self {
            CrsCode::Esri54017 => Some(30.0),
            CrsCode::Esri54034 => Some(0.0),
            CrsCode::Epsg4326 => None,
        }
    }

    /// Get the valid bounds for this CRS, in its own units.
    pub fn valid_bounds(&self) -> BoundingBox {
        match self {
            CrsCode::Epsg4326 => BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
            // WGS84 ellipsoid: a = 6378137, authalic extent of the poles
            CrsCode::Esri54017 => BoundingBox::new(
                -17_367_530.445_161_372,
                -7_342_230.136_498_681,
                17_367_530.445_161_372,
                7_342_230.136_498_681,
            ),
            CrsCode::Esri54034 => BoundingBox::new(
                -20_037_508.342_789_244,
                -6_363_885.331_926_043,
                20_037_508.342_789_244,
                6_363_885.331_926_043,
            ),
        }
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
            CrsCode::Esri54017 => "ESRI:54017",
            CrsCode::Esri54034 => "ESRI:54034",
        };
        write!(f, "{}", code)
    }
}

impl FromStr for CrsCode {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CrsCode::parse(s)
    }
}

impl TryFrom<String> for CrsCode {
    type Error = CrsParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CrsCode::parse(&value)
    }
}

impl From<CrsCode> for String {
    fn from(code: CrsCode) -> Self {
        code.to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),
}

impl From<CrsParseError> for crate::BiodivError {
    fn from(err: CrsParseError) -> Self {
        match err {
            CrsParseError::UnsupportedCrs(s) => crate::BiodivError::UnsupportedCrs(s),
        }
    }
}
