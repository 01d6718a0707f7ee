//! Rooted phylogeny stored as a node arena.
//!
//! Nodes are numbered in preorder: the root is node 0 and every parent has
//! a smaller id than its children. Depth and subtree computations rely on
//! this, so every constructor checks it.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::{PhyloError, PhyloResult};

/// Index of a node in a [`PhyloTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A single tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Tip binomial, or optional internal label (support value, clade name)
    pub label: Option<String>,
    /// Length of the edge to the parent; `None` only on the root
    pub length: Option<f64>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }
}

/// A rooted tree with branch lengths.
#[derive(Debug, Clone)]
pub struct PhyloTree {
    nodes: Vec<Node>,
    tips: HashMap<String, NodeId>,
}

impl PhyloTree {
    /// Build a tree from preorder-numbered nodes.
    ///
    /// Checks the preorder invariant, parent/child consistency, branch
    /// lengths and tip label uniqueness.
    pub fn from_nodes(nodes: Vec<Node>) -> PhyloResult<Self> {
        if nodes.is_empty() {
            return Err(PhyloError::syntax(0, "empty tree"));
        }
        if nodes[0].parent.is_some() {
            return Err(PhyloError::syntax(0, "node 0 must be the root"));
        }

        let mut tips = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            let name = || node.label.clone().unwrap_or_else(|| NodeId(i).to_string());

            if i > 0 {
                let parent = node
                    .parent
                    .ok_or_else(|| PhyloError::syntax(0, format!("{} has no parent", name())))?;
                if parent.0 >= i || !nodes[parent.0].children.contains(&NodeId(i)) {
                    return Err(PhyloError::syntax(
                        0,
                        format!("{} is not in preorder under its parent", name()),
                    ));
                }
                match node.length {
                    None => return Err(PhyloError::MissingBranchLength(name())),
                    Some(length) if !(length.is_finite() && length >= 0.0) => {
                        return Err(PhyloError::InvalidBranchLength {
                            node: name(),
                            length,
                        })
                    }
                    Some(_) => {}
                }
            }

            if node.is_tip() {
                let label = node
                    .label
                    .clone()
                    .ok_or_else(|| PhyloError::syntax(0, format!("unlabelled tip {}", NodeId(i))))?;
                if tips.insert(label.clone(), NodeId(i)).is_some() {
                    return Err(PhyloError::DuplicateTip(label));
                }
            }
        }

        Ok(Self { nodes, tips })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, tips included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn num_tips(&self) -> usize {
        self.tips.len()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn is_tip(&self, id: NodeId) -> bool {
        self.nodes[id.0].is_tip()
    }

    /// Length of the edge above `id`. The root has no edge, so 0.
    pub fn branch_length(&self, id: NodeId) -> f64 {
        let node = &self.nodes[id.0];
        match node.parent {
            Some(_) => node.length.unwrap_or(0.0),
            None => 0.0,
        }
    }

    /// Node ids in preorder (root first).
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Tip node ids in left-to-right order.
    pub fn tips(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.preorder().filter(move |&id| self.is_tip(id))
    }

    /// Tip labels in left-to-right order.
    pub fn tip_labels(&self) -> Vec<&str> {
        self.tips()
            .filter_map(|id| self.nodes[id.0].label.as_deref())
            .collect()
    }

    pub fn contains_tip(&self, label: &str) -> bool {
        self.tips.contains_key(label)
    }

    /// Look up a tip by exact label.
    pub fn tip(&self, label: &str) -> PhyloResult<NodeId> {
        self.tips
            .get(label)
            .copied()
            .ok_or_else(|| PhyloError::TipNotFound(label.to_string()))
    }

    /// Edges from `id` up to, but not including, the root.
    ///
    /// Each returned node stands for the edge above it.
    pub fn path_to_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            path.push(current);
            current = parent;
        }
        path
    }

    /// Distance from the root to every node, indexed by node id.
    pub fn node_depths(&self) -> Vec<f64> {
        let mut depths = vec![0.0; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate().skip(1) {
            if let Some(parent) = node.parent {
                depths[i] = depths[parent.0] + node.length.unwrap_or(0.0);
            }
        }
        depths
    }

    /// Sum of edge lengths from the root to a tip.
    pub fn root_to_tip_distance(&self, label: &str) -> PhyloResult<f64> {
        let tip = self.tip(label)?;
        Ok(self
            .path_to_root(tip)
            .into_iter()
            .map(|id| self.branch_length(id))
            .sum())
    }

    /// Greatest root-to-node distance.
    pub fn height(&self) -> f64 {
        self.node_depths().into_iter().fold(0.0, f64::max)
    }

    /// Sum of every edge length.
    pub fn total_length(&self) -> f64 {
        self.preorder().map(|id| self.branch_length(id)).sum()
    }

    /// Most recent common ancestor of two nodes.
    pub fn mrca_nodes(&self, a: NodeId, b: NodeId) -> NodeId {
        let mut on_path = vec![false; self.nodes.len()];
        let mut current = Some(a);
        while let Some(id) = current {
            on_path[id.0] = true;
            current = self.nodes[id.0].parent;
        }

        let mut current = b;
        while !on_path[current.0] {
            match self.nodes[current.0].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Most recent common ancestor of two tips.
    pub fn mrca(&self, a: &str, b: &str) -> PhyloResult<NodeId> {
        Ok(self.mrca_nodes(self.tip(a)?, self.tip(b)?))
    }

    /// Most recent common ancestor of any number of tips.
    pub fn mrca_of<S: AsRef<str>>(&self, labels: &[S]) -> PhyloResult<NodeId> {
        let mut iter = labels.iter();
        let first = iter
            .next()
            .ok_or_else(|| PhyloError::TipNotFound("<empty tip set>".to_string()))?;
        let mut acc = self.tip(first.as_ref())?;
        for label in iter {
            acc = self.mrca_nodes(acc, self.tip(label.as_ref())?);
        }
        Ok(acc)
    }

    /// Every node in the subtree rooted at `id`, in preorder.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev());
        }
        out
    }

    /// Labels of the tips below `id`.
    pub fn descendant_tips(&self, id: NodeId) -> Vec<&str> {
        self.subtree(id)
            .into_iter()
            .filter(|&n| self.is_tip(n))
            .filter_map(|n| self.nodes[n.0].label.as_deref())
            .collect()
    }

    /// Prune the tree to the given tips.
    ///
    /// Internal nodes left with one child are collapsed and their edge is
    /// added to the child's, so every retained root-to-tip distance and
    /// every union of root paths keeps its length. The original root stays
    /// the root even when it ends up with a single child.
    pub fn keep_tips<S: AsRef<str>>(&self, labels: &[S]) -> PhyloResult<PhyloTree> {
        let missing: Vec<String> = labels
            .iter()
            .map(AsRef::as_ref)
            .filter(|label| !self.contains_tip(label))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(PhyloError::MissingTips { missing });
        }
        if labels.is_empty() {
            return Err(PhyloError::NoTipsRetained);
        }

        let n = self.nodes.len();
        let mut marked = vec![false; n];
        for label in labels {
            let mut current = Some(self.tip(label.as_ref())?);
            while let Some(id) = current {
                if marked[id.0] {
                    break;
                }
                marked[id.0] = true;
                current = self.nodes[id.0].parent;
            }
        }

        let mut marked_children = vec![0usize; n];
        for (i, node) in self.nodes.iter().enumerate() {
            if marked[i] {
                if let Some(parent) = node.parent {
                    marked_children[parent.0] += 1;
                }
            }
        }

        // attach[v]: new node that v's retained children hang from
        // carry[v]: length of collapsed edges to add to those children
        let mut attach: Vec<Option<NodeId>> = vec![None; n];
        let mut carry = vec![0.0f64; n];
        let mut pruned: Vec<Node> = Vec::with_capacity(labels.len() * 2);

        for (i, node) in self.nodes.iter().enumerate() {
            if !marked[i] {
                continue;
            }

            let Some(parent) = node.parent else {
                pruned.push(Node {
                    label: node.label.clone(),
                    length: node.length,
                    parent: None,
                    children: Vec::new(),
                });
                attach[i] = Some(NodeId(0));
                continue;
            };

            let length = node.length.unwrap_or(0.0) + carry[parent.0];
            if !node.is_tip() && marked_children[i] == 1 {
                attach[i] = attach[parent.0];
                carry[i] = length;
                continue;
            }

            let new_parent = attach[parent.0].ok_or_else(|| {
                PhyloError::syntax(0, format!("{} reached before its parent", NodeId(i)))
            })?;
            let new_id = NodeId(pruned.len());
            pruned.push(Node {
                label: node.label.clone(),
                length: Some(length),
                parent: Some(new_parent),
                children: Vec::new(),
            });
            pruned[new_parent.0].children.push(new_id);
            attach[i] = Some(new_id);
        }

        debug!(
            tips_before = self.num_tips(),
            tips_after = labels.len(),
            nodes_after = pruned.len(),
            "Pruned tree"
        );

        PhyloTree::from_nodes(pruned)
    }
}
