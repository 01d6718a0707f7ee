//! Error types for tree parsing and queries.

use biodiv_common::BiodivError;
use thiserror::Error;

/// Result type for phylogeny operations.
pub type PhyloResult<T> = Result<T, PhyloError>;

/// Error types for phylogeny parsing and manipulation.
#[derive(Error, Debug)]
pub enum PhyloError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed Newick text
    #[error("Newick syntax error at byte {position}: {message}")]
    Syntax { position: usize, message: String },

    /// A non-root node without a branch length
    #[error("Missing branch length for {0}")]
    MissingBranchLength(String),

    /// Negative or non-finite branch length
    #[error("Invalid branch length {length} for {node}")]
    InvalidBranchLength { node: String, length: f64 },

    /// Tip label appears more than once
    #[error("Duplicate tip label: {0}")]
    DuplicateTip(String),

    /// Single label lookup failed
    #[error("Tip not found: {0}")]
    TipNotFound(String),

    /// Several requested tips are absent from the tree
    #[error("{} tips not found: {}", missing.len(), missing.join(", "))]
    MissingTips { missing: Vec<String> },

    /// Pruning would leave nothing
    #[error("No tips retained after pruning")]
    NoTipsRetained,

    /// Two clade definitions share nodes
    #[error("Clades '{first}' and '{second}' overlap")]
    CladeOverlap { first: String, second: String },
}

impl PhyloError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        PhyloError::Syntax {
            position,
            message: message.into(),
        }
    }
}

impl From<PhyloError> for BiodivError {
    fn from(err: PhyloError) -> Self {
        match err {
            PhyloError::IoError(e) => BiodivError::IoError(e.to_string()),
            PhyloError::TipNotFound(label) => BiodivError::TipNotFound(label),
            PhyloError::DuplicateTip(label) => BiodivError::DuplicateTip(label),
            PhyloError::MissingTips { missing } => BiodivError::species_mismatch(missing),
            other => BiodivError::TreeParse(other.to_string()),
        }
    }
}
