//! Per-cell diversity results joined on cell id.

use std::fmt;
use std::path::Path;

use biodiv_common::{BiodivError, BiodivResult, CellId, CellMap, CrsCode, GridTemplate};
use projection::Transformer;
use serde::{Deserialize, Serialize};

/// Diversity values of one occupied cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityRecord {
    pub cell: CellId,
    /// Cell center in the grid CRS
    pub x: f64,
    pub y: f64,
    /// Cell center in degrees
    pub lon: f64,
    pub lat: f64,
    /// Species richness
    pub richness: u32,
    /// Faith's phylogenetic diversity
    pub pd: f64,
}

/// Metric columns of a [`DiversityTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Richness,
    Pd,
}

impl Metric {
    pub fn title(&self) -> &'static str {
        match self {
            Metric::Richness => "Species richness",
            Metric::Pd => "Phylogenetic diversity",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Richness => write!(f, "richness"),
            Metric::Pd => write!(f, "pd"),
        }
    }
}

/// Min, max and mean of one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Summary of a whole table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub cells: usize,
    pub richness: Option<MetricSummary>,
    pub pd: Option<MetricSummary>,
}

/// One record per occupied cell, in ascending cell order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiversityTable {
    pub crs: CrsCode,
    pub resolution: f64,
    pub records: Vec<DiversityRecord>,
}

impl DiversityTable {
    /// Join richness and PD on cell id.
    ///
    /// Both maps must hold exactly the same cells; positions are never
    /// used to pair values.
    pub fn join(template: &GridTemplate, alpha: &CellMap<u32>, pd: &CellMap<f64>) -> BiodivResult<Self> {
        let only_alpha: Vec<CellId> = alpha.keys().filter(|k| !pd.contains_key(*k)).copied().collect();
        let only_pd: Vec<CellId> = pd.keys().filter(|k| !alpha.contains_key(*k)).copied().collect();
        if !only_alpha.is_empty() || !only_pd.is_empty() {
            return Err(BiodivError::KeyMismatch {
                left: "richness".to_string(),
                right: "pd".to_string(),
                detail: format!(
                    "{} cells only in richness (first {:?}), {} only in pd (first {:?})",
                    only_alpha.len(),
                    only_alpha.first(),
                    only_pd.len(),
                    only_pd.first()
                ),
            });
        }

        let to_geographic = Transformer::new(template.crs, CrsCode::Epsg4326)?;

        let records = alpha
            .iter()
            .map(|(&cell, &richness)| -> BiodivResult<DiversityRecord> {
                let (x, y) = template.cell_center(cell).ok_or_else(|| {
                    BiodivError::InvalidTemplate(format!("{} is outside the grid", cell))
                })?;
                let (lon, lat) = to_geographic.transform_point(x, y)?;
                Ok(DiversityRecord {
                    cell,
                    x,
                    y,
                    lon,
                    lat,
                    richness,
                    pd: pd[&cell],
                })
            })
            .collect::<BiodivResult<Vec<_>>>()?;

        Ok(Self {
            crs: template.crs,
            resolution: template.res_x,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One metric as a cell map.
    pub fn values(&self, metric: Metric) -> CellMap<f64> {
        self.records
            .iter()
            .map(|r| {
                let value = match metric {
                    Metric::Richness => r.richness as f64,
                    Metric::Pd => r.pd,
                };
                (r.cell, value)
            })
            .collect()
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            cells: self.records.len(),
            richness: summarize(self.records.iter().map(|r| r.richness as f64)),
            pd: summarize(self.records.iter().map(|r| r.pd)),
        }
    }

    pub fn to_json(&self) -> BiodivResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> BiodivResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

fn summarize(values: impl Iterator<Item = f64>) -> Option<MetricSummary> {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        count += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }
    (count > 0).then(|| MetricSummary {
        min,
        max,
        mean: sum / count as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use biodiv_common::BoundingBox;

    fn template() -> GridTemplate {
        GridTemplate::global(CrsCode::Esri54017, 1_000_000.0).unwrap()
    }

    #[test]
    fn test_join_by_key() {
        let alpha: CellMap<u32> = [(CellId(5), 2), (CellId(1), 1)].into_iter().collect();
        let pd: CellMap<f64> = [(CellId(1), 10.0), (CellId(5), 25.0)].into_iter().collect();

        let table = DiversityTable::join(&template(), &alpha, &pd).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].cell, CellId(1));
        assert_eq!(table.records[0].pd, 10.0);
        assert_eq!(table.records[1].richness, 2);
        assert!(table.records.iter().all(|r| r.lat.abs() <= 90.0 && r.lon.abs() <= 180.0));
    }

    #[test]
    fn test_join_rejects_differing_keys() {
        let alpha: CellMap<u32> = [(CellId(1), 1), (CellId(2), 1)].into_iter().collect();
        let pd: CellMap<f64> = [(CellId(1), 4.0), (CellId(3), 4.0)].into_iter().collect();
        assert!(matches!(
            DiversityTable::join(&template(), &alpha, &pd),
            Err(BiodivError::KeyMismatch { .. })
        ));
    }

    #[test]
    fn test_join_rejects_cells_outside_template() {
        let small =
            GridTemplate::new(CrsCode::Esri54017, BoundingBox::new(0.0, 0.0, 2.0, 2.0), 1.0).unwrap();
        let alpha: CellMap<u32> = [(CellId(10), 1)].into_iter().collect();
        let pd: CellMap<f64> = [(CellId(10), 1.0)].into_iter().collect();
        assert!(DiversityTable::join(&small, &alpha, &pd).is_err());
    }

    #[test]
    fn test_summary_and_values() {
        let alpha: CellMap<u32> = [(CellId(0), 1), (CellId(1), 3)].into_iter().collect();
        let pd: CellMap<f64> = [(CellId(0), 10.0), (CellId(1), 30.0)].into_iter().collect();
        let table = DiversityTable::join(&template(), &alpha, &pd).unwrap();

        let summary = table.summary();
        assert_eq!(summary.cells, 2);
        let richness = summary.richness.unwrap();
        assert_eq!((richness.min, richness.max, richness.mean), (1.0, 3.0, 2.0));
        assert_eq!(summary.pd.unwrap().mean, 20.0);

        assert_eq!(table.values(Metric::Pd)[&CellId(1)], 30.0);
        assert_eq!(table.values(Metric::Richness)[&CellId(1)], 3.0);
    }

    #[test]
    fn test_json_export() {
        let alpha: CellMap<u32> = [(CellId(7), 2)].into_iter().collect();
        let pd: CellMap<f64> = [(CellId(7), 12.5)].into_iter().collect();
        let table = DiversityTable::join(&template(), &alpha, &pd).unwrap();

        let json = table.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["crs"], "ESRI:54017");
        assert_eq!(parsed["records"][0]["cell"], 7);
        assert_eq!(parsed["records"][0]["pd"], 12.5);

        let back: DiversityTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }
}
