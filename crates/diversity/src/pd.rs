//! Faith's phylogenetic diversity.
//!
//! PD of a community is the total length of the tree edges connecting its
//! species. With the root included (Faith's original definition) that is
//! the union of every species' root-to-tip path; without it, the edges
//! above the community's most recent common ancestor are left out.
//!
//! The calculator prunes the tree to the matrix species once and keeps one
//! root path per column, so each row costs only the edges it adds.

use std::collections::{HashMap, HashSet};

use biodiv_common::{BiodivError, BiodivResult, CellId, CellMap};
use phylo::PhyloTree;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::matrix::CommunityMatrix;

/// Per-cell PD over a fixed species set.
#[derive(Debug, Clone)]
pub struct PdCalculator {
    tree: PhyloTree,
    species: Vec<String>,
    /// Edge nodes from each species' tip up to, excluding, the root
    paths: Vec<Vec<usize>>,
    /// Edge length above each node of the pruned tree
    lengths: Vec<f64>,
    /// Root distance of each node
    depths: Vec<f64>,
    parents: Vec<Option<usize>>,
    /// Topological depth (edge count from the root)
    levels: Vec<u32>,
    include_root: bool,
}

impl PdCalculator {
    /// Prepare a calculator for `species`.
    ///
    /// Every species must be a tip of `tree`; all unmatched names are
    /// reported together. Other tips are pruned away.
    pub fn new<S: AsRef<str>>(tree: &PhyloTree, species: &[S]) -> BiodivResult<Self> {
        if species.is_empty() {
            return Err(BiodivError::EmptyCommunity("no species to compute PD for".to_string()));
        }

        let mut seen = HashSet::new();
        for name in species {
            if !seen.insert(name.as_ref()) {
                return Err(BiodivError::DuplicateTip(name.as_ref().to_string()));
            }
        }

        let missing: Vec<&str> = species
            .iter()
            .map(AsRef::as_ref)
            .filter(|name| !tree.contains_tip(name))
            .collect();
        if !missing.is_empty() {
            return Err(BiodivError::species_mismatch(missing));
        }

        let pruned = tree.keep_tips(species)?;

        let paths = species
            .iter()
            .map(|name| -> BiodivResult<Vec<usize>> {
                let tip = pruned.tip(name.as_ref())?;
                Ok(pruned.path_to_root(tip).into_iter().map(|id| id.index()).collect())
            })
            .collect::<BiodivResult<Vec<Vec<usize>>>>()?;

        let lengths: Vec<f64> = pruned.preorder().map(|id| pruned.branch_length(id)).collect();
        let parents: Vec<Option<usize>> = pruned
            .preorder()
            .map(|id| pruned.parent(id).map(|p| p.index()))
            .collect();
        let mut levels = vec![0u32; pruned.len()];
        for (i, parent) in parents.iter().enumerate() {
            if let Some(p) = parent {
                levels[i] = levels[*p] + 1;
            }
        }

        debug!(
            species = species.len(),
            tree_tips = tree.num_tips(),
            pruned_nodes = pruned.len(),
            "Prepared PD calculator"
        );

        Ok(Self {
            depths: pruned.node_depths(),
            tree: pruned,
            species: species.iter().map(|s| s.as_ref().to_string()).collect(),
            paths,
            lengths,
            parents,
            levels,
            include_root: true,
        })
    }

    /// Whether edges above the community's MRCA count (default true).
    pub fn with_include_root(mut self, include_root: bool) -> Self {
        self.include_root = include_root;
        self
    }

    pub fn include_root(&self) -> bool {
        self.include_root
    }

    /// The tree pruned to this calculator's species.
    pub fn tree(&self) -> &PhyloTree {
        &self.tree
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    /// PD of every row of `matrix`, keyed by cell.
    ///
    /// Matrix columns are matched to species by name, so their order does
    /// not matter, but every column must be one of this calculator's species.
    pub fn compute(&self, matrix: &CommunityMatrix) -> BiodivResult<CellMap<f64>> {
        matrix.ensure_non_empty()?;

        let index: HashMap<&str, usize> = self
            .species
            .iter()
            .enumerate()
            .map(|(i, s)| (s.as_str(), i))
            .collect();
        let unknown: Vec<&str> = matrix
            .species()
            .iter()
            .map(String::as_str)
            .filter(|s| !index.contains_key(s))
            .collect();
        if !unknown.is_empty() {
            return Err(BiodivError::species_mismatch(unknown));
        }
        let columns: Vec<usize> = matrix.species().iter().map(|s| index[s.as_str()]).collect();

        let node_count = self.lengths.len();
        let values: Vec<(CellId, f64)> = (0..matrix.num_rows())
            .into_par_iter()
            .map_init(
                || vec![0u32; node_count],
                |visited, i| {
                    let present = matrix
                        .row(i)
                        .iter()
                        .zip(&columns)
                        .filter(|(&p, _)| p)
                        .map(|(_, &col)| col);
                    // Row numbers are unique, so they double as visit stamps
                    let stamp = i as u32 + 1;
                    (matrix.cells()[i], self.pd_of_columns(present, visited, stamp))
                },
            )
            .collect();

        let pd: CellMap<f64> = values.into_iter().collect();
        info!(
            cells = pd.len(),
            include_root = self.include_root,
            max = pd.values().copied().fold(0.0, f64::max),
            "Computed phylogenetic diversity"
        );
        Ok(pd)
    }

    /// PD of a single community given by species names.
    pub fn community_pd<S: AsRef<str>>(&self, species: &[S]) -> BiodivResult<f64> {
        let columns = species
            .iter()
            .map(|name| {
                self.species
                    .iter()
                    .position(|s| s == name.as_ref())
                    .ok_or_else(|| BiodivError::species_mismatch([name.as_ref()]))
            })
            .collect::<BiodivResult<Vec<usize>>>()?;
        let mut visited = vec![0u32; self.lengths.len()];
        Ok(self.pd_of_columns(columns.into_iter(), &mut visited, 1))
    }

    fn pd_of_columns(&self, columns: impl Iterator<Item = usize>, visited: &mut [u32], stamp: u32) -> f64 {
        let mut total = 0.0;
        let mut mrca: Option<usize> = None;

        for col in columns {
            let path = &self.paths[col];
            for &node in path {
                if visited[node] == stamp {
                    // Everything above was added by an earlier species
                    break;
                }
                visited[node] = stamp;
                total += self.lengths[node];
            }

            if !self.include_root {
                let tip = path.first().copied().unwrap_or(0);
                mrca = Some(match mrca {
                    Some(current) => self.lca(current, tip),
                    None => tip,
                });
            }
        }

        match mrca {
            Some(node) if !self.include_root => total - self.depths[node],
            _ => total,
        }
    }

    fn lca(&self, mut a: usize, mut b: usize) -> usize {
        while a != b {
            if self.levels[a] >= self.levels[b] {
                match self.parents[a] {
                    Some(p) => a = p,
                    None => return a,
                }
            } else {
                match self.parents[b] {
                    Some(p) => b = p,
                    None => return b,
                }
            }
        }
        a
    }
}

/// Faith's PD (root included) of one community.
///
/// An empty community has PD 0. Unknown species are reported together.
pub fn faith_pd<S: AsRef<str>>(tree: &PhyloTree, species: &[S]) -> BiodivResult<f64> {
    if species.is_empty() {
        return Ok(0.0);
    }
    let missing: Vec<&str> = species
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !tree.contains_tip(name))
        .collect();
    if !missing.is_empty() {
        return Err(BiodivError::species_mismatch(missing));
    }

    let mut counted = vec![false; tree.len()];
    let mut total = 0.0;
    for name in species {
        for id in tree.path_to_root(tree.tip(name.as_ref())?) {
            if counted[id.index()] {
                break;
            }
            counted[id.index()] = true;
            total += tree.branch_length(id);
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ((A:1,B:2):3,(C:4,D:5):6);
    fn tree() -> PhyloTree {
        PhyloTree::from_newick("((A:1,B:2):3,(C:4,D:5):6);").unwrap()
    }

    #[test]
    fn test_faith_pd_small_tree() {
        let tree = tree();
        assert_eq!(faith_pd(&tree, &["A"]).unwrap(), 4.0);
        assert_eq!(faith_pd(&tree, &["A", "B"]).unwrap(), 6.0);
        assert_eq!(faith_pd(&tree, &["A", "C"]).unwrap(), 14.0);
        assert_eq!(faith_pd(&tree, &["A", "B", "C", "D"]).unwrap(), tree.total_length());
        let none: [&str; 0] = [];
        assert_eq!(faith_pd(&tree, &none).unwrap(), 0.0);
    }

    #[test]
    fn test_calculator_rows() {
        let tree = tree();
        let calc = PdCalculator::new(&tree, &["A", "B", "C"]).unwrap();
        let matrix = CommunityMatrix::from_rows(
            vec!["C".into(), "A".into(), "B".into()],
            vec![
                (CellId(0), vec![false, true, false]),
                (CellId(1), vec![false, true, true]),
                (CellId(2), vec![true, true, true]),
            ],
        )
        .unwrap();

        let pd = calc.compute(&matrix).unwrap();
        assert_eq!(pd[&CellId(0)], 4.0);
        assert_eq!(pd[&CellId(1)], 6.0);
        assert_eq!(pd[&CellId(2)], 16.0);
    }

    #[test]
    fn test_without_root() {
        let tree = tree();
        let calc = PdCalculator::new(&tree, &["A", "B", "C", "D"])
            .unwrap()
            .with_include_root(false);
        assert_eq!(calc.community_pd(&["A"]).unwrap(), 0.0);
        assert_eq!(calc.community_pd(&["A", "B"]).unwrap(), 3.0);
        assert_eq!(calc.community_pd(&["A", "C"]).unwrap(), 14.0);
        assert_eq!(calc.community_pd(&["C", "D"]).unwrap(), 9.0);
    }

    #[test]
    fn test_unknown_species_all_reported() {
        let tree = tree();
        match PdCalculator::new(&tree, &["A", "X", "Y"]) {
            Err(BiodivError::SpeciesMismatch { missing }) => assert_eq!(missing, vec!["X", "Y"]),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(faith_pd(&tree, &["Q"]), Err(BiodivError::SpeciesMismatch { .. })));
    }

    #[test]
    fn test_matrix_column_not_in_calculator() {
        let tree = tree();
        let calc = PdCalculator::new(&tree, &["A", "B"]).unwrap();
        let matrix = CommunityMatrix::from_rows(
            vec!["A".into(), "C".into()],
            vec![(CellId(0), vec![true, true])],
        )
        .unwrap();
        assert!(matches!(calc.compute(&matrix), Err(BiodivError::SpeciesMismatch { .. })));
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let tree = tree();
        let none: [&str; 0] = [];
        assert!(matches!(PdCalculator::new(&tree, &none), Err(BiodivError::EmptyCommunity(_))));
        assert!(matches!(
            PdCalculator::new(&tree, &["A", "A"]),
            Err(BiodivError::DuplicateTip(_))
        ));
    }
}
