//! Error types for the diversity pipeline.

use thiserror::Error;

/// Result type alias using BiodivError.
pub type BiodivResult<T> = Result<T, BiodivError>;

/// Primary error type for pipeline operations.
///
/// Every variant is fatal for a run; nothing in the pipeline retries.
#[derive(Debug, Error)]
pub enum BiodivError {
    // === Input mismatch ===
    #[error("species not found in phylogeny ({} missing): {}", missing.len(), missing.join(", "))]
    SpeciesMismatch { missing: Vec<String> },

    #[error("tip not found in tree: {0}")]
    TipNotFound(String),

    #[error("duplicate tip label in tree: {0}")]
    DuplicateTip(String),

    #[error("cell keys differ between {left} and {right}: {detail}")]
    KeyMismatch {
        left: String,
        right: String,
        detail: String,
    },

    // === Geometry / projection ===
    #[error("CRS mismatch: grid template uses {expected}, geometries use {found}")]
    CrsMismatch { expected: String, found: String },

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Projection error: {0}")]
    ProjectionError(String),

    // === Degenerate input ===
    #[error("Empty community matrix: {0}")]
    EmptyCommunity(String),

    #[error("Invalid grid template: {0}")]
    InvalidTemplate(String),

    // === Input decoding ===
    #[error("Feature {index} is missing attribute '{field}'")]
    MissingAttribute { index: usize, field: String },

    #[error("Invalid GeoJSON: {0}")]
    GeoJsonError(String),

    #[error("Failed to parse tree: {0}")]
    TreeParse(String),

    // === Output ===
    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl BiodivError {
    /// Build a SpeciesMismatch from any iterator of names, sorted for stable messages.
    pub fn species_mismatch<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut missing: Vec<String> = names.into_iter().map(Into::into).collect();
        missing.sort();
        missing.dedup();
        BiodivError::SpeciesMismatch { missing }
    }

    /// Short machine-friendly category, logged when a run fails.
    pub fn category(&self) -> &'static str {
        match self {
            BiodivError::SpeciesMismatch { .. }
            | BiodivError::TipNotFound(_)
            | BiodivError::DuplicateTip(_)
            | BiodivError::KeyMismatch { .. } => "input_mismatch",
            BiodivError::CrsMismatch { .. }
            | BiodivError::UnsupportedCrs(_)
            | BiodivError::InvalidGeometry(_)
            | BiodivError::ProjectionError(_) => "geometry",
            BiodivError::EmptyCommunity(_) | BiodivError::InvalidTemplate(_) => "degenerate_input",
            BiodivError::MissingAttribute { .. }
            | BiodivError::GeoJsonError(_)
            | BiodivError::TreeParse(_) => "decode",
            BiodivError::RenderError(_) => "render",
            BiodivError::IoError(_) => "io",
        }
    }
}

impl From<std::io::Error> for BiodivError {
    fn from(err: std::io::Error) -> Self {
        BiodivError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for BiodivError {
    fn from(err: serde_json::Error) -> Self {
        BiodivError::IoError(format!("JSON error: {}", err))
    }
}
