//! Marine mammal diversity report.
//!
//! Loads species range maps and a dated phylogeny, rasterizes the ranges on
//! an equal-area grid and writes species richness and phylogenetic
//! diversity maps, a circular tree figure and JSON results.

pub mod config;
pub mod pipeline;

pub use config::ReportConfig;
pub use pipeline::{failure_category, run_report, ReportOutcome, ReportSummary, SUMMARY_FILE_NAME, TABLE_FILE_NAME};
