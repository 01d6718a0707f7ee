//! Species range records and collections.

use std::collections::BTreeMap;

use biodiv_common::{BiodivError, BiodivResult, BoundingBox, CrsCode};
use geo::{BoundingRect, MultiPolygon};
use projection::Transformer;
use tracing::debug;

use crate::species::normalize_species_name;

/// One range geometry labelled with a species binomial.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRecord {
    /// Normalized binomial (`Genus_epithet`)
    pub species: String,
    pub geometry: MultiPolygon<f64>,
}

/// Range records sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeCollection {
    crs: CrsCode,
    records: Vec<RangeRecord>,
}

impl RangeCollection {
    pub fn new(crs: CrsCode) -> Self {
        Self {
            crs,
            records: Vec::new(),
        }
    }

    /// Add a record, normalizing its species label.
    pub fn push(&mut self, species: &str, geometry: MultiPolygon<f64>) {
        self.records.push(RangeRecord {
            species: normalize_species_name(species),
            geometry,
        });
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    pub fn records(&self) -> &[RangeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct species labels, sorted.
    pub fn species(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.records.iter().map(|r| r.species.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Combined bounds of every record.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.records
            .iter()
            .filter_map(|r| r.geometry.bounding_rect())
            .map(BoundingBox::from)
            .reduce(|a, b| a.union(&b))
    }

    /// One record per species, holding the parts of all its records.
    ///
    /// Records come out sorted by species. Under any presence rule that is
    /// applied part by part, this is the logical OR of the inputs.
    pub fn merge_by_species(self) -> RangeCollection {
        let before = self.records.len();
        let mut grouped: BTreeMap<String, Vec<geo::Polygon<f64>>> = BTreeMap::new();
        for record in self.records {
            grouped
                .entry(record.species)
                .or_default()
                .extend(record.geometry.0);
        }

        let records: Vec<RangeRecord> = grouped
            .into_iter()
            .map(|(species, parts)| RangeRecord {
                species,
                geometry: MultiPolygon::new(parts),
            })
            .collect();

        debug!(records_before = before, species = records.len(), "Merged range records by species");

        RangeCollection {
            crs: self.crs,
            records,
        }
    }

    /// Reproject every record through `transformer`.
    ///
    /// The transformer's source CRS must be this collection's CRS.
    pub fn reproject(&self, transformer: &Transformer) -> BiodivResult<RangeCollection> {
        if transformer.source() != self.crs {
            return Err(BiodivError::CrsMismatch {
                expected: transformer.source().to_string(),
                found: self.crs.to_string(),
            });
        }

        let records = self
            .records
            .iter()
            .map(|record| -> BiodivResult<RangeRecord> {
                Ok(RangeRecord {
                    species: record.species.clone(),
                    geometry: transformer.transform_multipolygon(&record.geometry)?,
                })
            })
            .collect::<BiodivResult<Vec<_>>>()?;

        debug!(
            from = %self.crs,
            to = %transformer.target(),
            records = records.len(),
            "Reprojected range records"
        );

        Ok(RangeCollection {
            crs: transformer.target(),
            records,
        })
    }
}
