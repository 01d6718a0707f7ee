//! Diversity metrics over a gridded community.
//!
//! This crate provides:
//! - The community matrix built from a presence stack
//! - Species richness per cell
//! - Faith's phylogenetic diversity per cell
//! - A result table joining both metrics on cell id

pub mod alpha;
pub mod matrix;
pub mod pd;
pub mod table;

pub use alpha::alpha_richness;
pub use matrix::CommunityMatrix;
pub use pd::{faith_pd, PdCalculator};
pub use table::{DiversityRecord, DiversityTable, Metric, MetricSummary, TableSummary};
