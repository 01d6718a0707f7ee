//! Named clades located by the MRCA of two representative tips.

use tracing::debug;

use crate::error::{PhyloError, PhyloResult};
use crate::tree::{NodeId, PhyloTree};

/// A clade defined by two tips that straddle its crown node.
#[derive(Debug, Clone, PartialEq)]
pub struct CladeDef {
    pub name: String,
    pub first_tip: String,
    pub second_tip: String,
}

impl CladeDef {
    pub fn new(name: impl Into<String>, first_tip: impl Into<String>, second_tip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            first_tip: first_tip.into(),
            second_tip: second_tip.into(),
        }
    }
}

/// A clade located in a specific tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Clade {
    pub name: String,
    /// MRCA of the representatives
    pub crown: NodeId,
    pub tips: Vec<String>,
}

/// Clade membership of every node of one tree.
#[derive(Debug, Clone)]
pub struct CladeAssignment {
    clades: Vec<Clade>,
    membership: Vec<Option<usize>>,
}

impl CladeAssignment {
    pub fn clades(&self) -> &[Clade] {
        &self.clades
    }

    /// Index into [`clades`](Self::clades) of the clade containing `node`.
    pub fn clade_index(&self, node: NodeId) -> Option<usize> {
        self.membership.get(node.0).copied().flatten()
    }

    /// Name of the clade containing `node`.
    pub fn clade_of(&self, node: NodeId) -> Option<&str> {
        self.clade_index(node).map(|i| self.clades[i].name.as_str())
    }

    /// An assignment where no node belongs to a clade.
    pub fn empty(tree: &PhyloTree) -> Self {
        Self {
            clades: Vec::new(),
            membership: vec![None; tree.len()],
        }
    }
}

/// Locate each clade and label every node of its subtree.
///
/// Both representatives must be tips of `tree`. Clades whose subtrees share
/// a node are rejected, since a branch can only take one colour.
pub fn assign_clades(tree: &PhyloTree, defs: &[CladeDef]) -> PhyloResult<CladeAssignment> {
    let mut assignment = CladeAssignment::empty(tree);

    for (index, def) in defs.iter().enumerate() {
        let crown = tree.mrca(&def.first_tip, &def.second_tip)?;
        let members = tree.subtree(crown);

        for &node in &members {
            if let Some(other) = assignment.membership[node.0] {
                return Err(PhyloError::CladeOverlap {
                    first: assignment.clades[other].name.clone(),
                    second: def.name.clone(),
                });
            }
        }
        for &node in &members {
            assignment.membership[node.0] = Some(index);
        }

        let tips: Vec<String> = tree
            .descendant_tips(crown)
            .into_iter()
            .map(str::to_string)
            .collect();
        debug!(clade = %def.name, crown = %crown, tips = tips.len(), "Assigned clade");

        assignment.clades.push(Clade {
            name: def.name.clone(),
            crown,
            tips,
        });
    }

    Ok(assignment)
}
