//! Rooted phylogenies with branch lengths.
//!
//! This crate provides:
//! - A Newick reader and writer
//! - Tip lookup, MRCA and root-to-tip distance queries
//! - Lossless pruning to a tip subset
//! - Clade assignment from representative tip pairs

pub mod clade;
pub mod error;
pub mod newick;
pub mod tree;

pub use clade::{assign_clades, Clade, CladeAssignment, CladeDef};
pub use error::{PhyloError, PhyloResult};
pub use newick::{load_newick, parse_newick, to_newick};
pub use tree::{Node, NodeId, PhyloTree};
