//! Lineage graph over populations.
//!
//! The graph is a DAG whose nodes are populations and whose edges point from
//! a parent population to the populations descending from it. Topology is
//! immutable after construction; the only mutation path is
//! [`LineageGraph::update_allele_state`], which rewrites derived/ancestral
//! allele counts and rebuilds the one derived table that depends on them.
//!
//! Derived views:
//! - `leaves_subtended_by` / `lineage_count_at` depend on topology and leaf
//!   lineage counts only and are computed once at construction.
//! - `derived_count_subtended_by` depends on allele state and is rebuilt
//!   wholesale by every successful allele update. Rebuilding one small table
//!   beats chasing scattered cache-coherency bugs.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::engine::errors::DemographyError;
use crate::model::{
    AlleleUpdate, EdgeSpec, ModelKind, PopulationSpec, SizeHistory, DEFAULT_EFFECTIVE_SIZE,
};

/// A unique identifier for a population in the lineage graph.
///
/// Ids are assigned densely in the order populations were supplied, so they
/// double as indexes into the graph's internal tables.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopId(pub u32);

impl PopId {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A population in the lineage graph with its sampled-data attributes.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopulationNode {
    /// The unique population identifier.
    pub id: PopId,
    /// The population name as supplied by the front end.
    pub name: String,
    /// Number of sampled lineages (always present on leaves).
    pub lineages: Option<u32>,
    /// Observed derived-allele count.
    pub derived: Option<u32>,
    /// Observed ancestral-allele count.
    pub ancestral: Option<u32>,
    /// Size-history model over the population's incoming edge interval.
    pub size_history: SizeHistory,
}

/// A directed parent → child edge with its time span.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeData {
    pub parent: PopId,
    pub child: PopId,
    pub branch_length: f64,
}

/// A directed acyclic graph of populations with cached derived views.
#[derive(Debug, Clone)]
pub struct LineageGraph {
    nodes: Vec<PopulationNode>,
    edges: Vec<EdgeData>,
    name_index: FxHashMap<String, PopId>,
    children: Vec<Vec<PopId>>,
    parents: Vec<Vec<PopId>>,
    root: PopId,
    leaves: BTreeSet<PopId>,
    // Topology-only tables, fixed for the instance lifetime.
    leaves_subtended: Vec<BTreeSet<PopId>>,
    lineage_counts: Vec<u32>,
    // Allele-dependent table, rebuilt by update_allele_state.
    derived_subtended: Vec<u32>,
}

impl LineageGraph {
    /// Builds a lineage graph, validating leaf attributes and topology.
    ///
    /// # Errors
    ///
    /// * `Validation` — empty graph, duplicate or unknown population names,
    ///   negative branch length, a leaf without `lineages`.
    /// * `Consistency` — `derived + ancestral != lineages` on any node where
    ///   allele counts are declared.
    /// * `Structural` — zero or multiple roots, or a cycle.
    /// * `UnsupportedModel` — an unrecognized size-history tag.
    pub fn new(pops: &[PopulationSpec], edges: &[EdgeSpec]) -> Result<Self, DemographyError> {
        Self::with_default_effective_size(pops, edges, DEFAULT_EFFECTIVE_SIZE)
    }

    /// Like [`LineageGraph::new`] with an explicit fallback effective size
    /// for populations that do not declare one.
    pub fn with_default_effective_size(
        pops: &[PopulationSpec],
        edges: &[EdgeSpec],
        default_n_e: f64,
    ) -> Result<Self, DemographyError> {
        if pops.is_empty() {
            return Err(DemographyError::Validation(
                "demographic history must contain at least one population".to_string(),
            ));
        }

        let mut name_index: FxHashMap<String, PopId> = FxHashMap::default();
        for (i, spec) in pops.iter().enumerate() {
            let id = PopId(i as u32);
            if name_index.insert(spec.name.clone(), id).is_some() {
                return Err(DemographyError::Validation(format!(
                    "duplicate population name '{}'",
                    spec.name
                )));
            }
        }

        let mut children: Vec<Vec<PopId>> = vec![Vec::new(); pops.len()];
        let mut parents: Vec<Vec<PopId>> = vec![Vec::new(); pops.len()];
        let mut edge_data = Vec::with_capacity(edges.len());
        for e in edges {
            let parent = *name_index.get(&e.parent).ok_or_else(|| {
                DemographyError::Validation(format!("edge references unknown population '{}'", e.parent))
            })?;
            let child = *name_index.get(&e.child).ok_or_else(|| {
                DemographyError::Validation(format!("edge references unknown population '{}'", e.child))
            })?;
            if e.branch_length.is_nan() || e.branch_length < 0.0 {
                return Err(DemographyError::Validation(format!(
                    "branch length on edge {} -> {} must be non-negative, got {}",
                    e.parent, e.child, e.branch_length
                )));
            }
            children[parent.idx()].push(child);
            parents[child.idx()].push(parent);
            edge_data.push(EdgeData {
                parent,
                child,
                branch_length: e.branch_length,
            });
        }

        let roots: Vec<PopId> = (0..pops.len())
            .map(|i| PopId(i as u32))
            .filter(|v| parents[v.idx()].is_empty())
            .collect();
        let root = match roots.as_slice() {
            [r] => *r,
            [] => {
                return Err(DemographyError::Structural(
                    "lineage graph has no root (every population has a parent)".to_string(),
                ))
            }
            many => {
                return Err(DemographyError::Structural(format!(
                    "lineage graph has {} roots, expected exactly one",
                    many.len()
                )))
            }
        };

        let leaves: BTreeSet<PopId> = (0..pops.len())
            .map(|i| PopId(i as u32))
            .filter(|v| children[v.idx()].is_empty())
            .collect();

        for leaf in &leaves {
            if pops[leaf.idx()].lineages.is_none() {
                return Err(DemographyError::Validation(format!(
                    "'lineages' attribute must be set for leaf population '{}'",
                    pops[leaf.idx()].name
                )));
            }
        }
        for spec in pops {
            if let (Some(lineages), Some(derived), Some(ancestral)) =
                (spec.lineages, spec.derived, spec.ancestral)
            {
                // Compared in u64: the sum of two u32 counts can overflow.
                if u64::from(derived) + u64::from(ancestral) != u64::from(lineages) {
                    return Err(DemographyError::Consistency(format!(
                        "derived + ancestral must add to lineages at population '{}' ({} + {} != {})",
                        spec.name, derived, ancestral, lineages
                    )));
                }
            }
        }

        let leaves_subtended = compute_leaves_subtended(&children, &leaves);
        let lineage_counts = compute_lineage_counts(&children, &leaves, pops, root)?;

        // Attach size histories now that subtended lineage counts are known.
        // Each non-root population models size over its first incoming edge;
        // the root's interval is unbounded.
        let mut nodes = Vec::with_capacity(pops.len());
        for (i, spec) in pops.iter().enumerate() {
            let id = PopId(i as u32);
            let kind = ModelKind::from_tag(spec.model.as_deref())?;
            let n_e = spec.effective_size.unwrap_or(default_n_e);
            let tau = if id == root {
                f64::INFINITY
            } else {
                let p = parents[i][0];
                edge_data
                    .iter()
                    .find(|e| e.parent == p && e.child == id)
                    .map(|e| e.branch_length)
                    .ok_or_else(|| {
                        DemographyError::Internal(format!(
                            "missing edge data for population '{}'",
                            spec.name
                        ))
                    })?
            };
            let n_max = lineage_counts[i].max(1);
            let size_history = SizeHistory::for_kind(kind, n_e, tau, n_max)?;
            nodes.push(PopulationNode {
                id,
                name: spec.name.clone(),
                lineages: spec.lineages,
                derived: spec.derived,
                ancestral: spec.ancestral,
                size_history,
            });
        }

        let mut graph = LineageGraph {
            nodes,
            edges: edge_data,
            name_index,
            children,
            parents,
            root,
            leaves,
            leaves_subtended,
            lineage_counts,
            derived_subtended: Vec::new(),
        };
        graph.rebuild_derived_subtended();
        Ok(graph)
    }

    /// The unique population with no parent.
    pub fn root(&self) -> PopId {
        self.root
    }

    /// The set of populations with no children.
    pub fn leaves(&self) -> &BTreeSet<PopId> {
        &self.leaves
    }

    /// True when `v` is a sampled (leaf) population.
    pub fn is_leaf(&self, v: PopId) -> bool {
        self.leaves.contains(&v)
    }

    /// Looks up a population by id.
    pub fn pop(&self, id: PopId) -> Option<&PopulationNode> {
        self.nodes.get(id.idx())
    }

    /// Resolves a population name to its id.
    pub fn pop_id(&self, name: &str) -> Option<PopId> {
        self.name_index.get(name).copied()
    }

    /// The population's name.
    pub fn name(&self, id: PopId) -> &str {
        &self.nodes[id.idx()].name
    }

    /// Number of populations.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all populations in id order.
    pub fn populations(&self) -> impl Iterator<Item = &PopulationNode> {
        self.nodes.iter()
    }

    /// All edges in supply order.
    pub fn edges(&self) -> &[EdgeData] {
        &self.edges
    }

    /// Direct descendants of `v`.
    pub fn children_of(&self, v: PopId) -> &[PopId] {
        &self.children[v.idx()]
    }

    /// Direct ancestors of `v`.
    pub fn parents_of(&self, v: PopId) -> &[PopId] {
        &self.parents[v.idx()]
    }

    /// The leaf populations reachable from `v` (including `v` itself when it
    /// is a leaf). Topology-only; never invalidated by allele updates.
    pub fn leaves_subtended_by(&self, v: PopId) -> &BTreeSet<PopId> {
        &self.leaves_subtended[v.idx()]
    }

    /// Total lineage count entering `v` from below.
    ///
    /// Leaves report their declared `lineages`; internal nodes sum the
    /// counts of their direct children. Admixture lets a lineage path split
    /// and later recombine, so this may exceed the number of distinct
    /// sampled lineages beneath `v`. That is the intended quantity.
    pub fn lineage_count_at(&self, v: PopId) -> u32 {
        self.lineage_counts[v.idx()]
    }

    /// Sum of observed derived-allele counts over the leaves subtended by
    /// `v`. Leaves without allele state contribute zero.
    pub fn derived_count_subtended_by(&self, v: PopId) -> u32 {
        self.derived_subtended[v.idx()]
    }

    /// Applies derived/ancestral allele-count updates to named populations.
    ///
    /// The whole batch is validated before any node is mutated: on error the
    /// graph, including every cached table, is exactly as it was. On success
    /// the allele-dependent table is rebuilt; topology-only tables are
    /// untouched.
    ///
    /// # Errors
    ///
    /// * `Validation` — an update names an unknown population, or one with
    ///   no declared `lineages`.
    /// * `Consistency` — `derived + ancestral != lineages` for any update.
    pub fn update_allele_state(
        &mut self,
        updates: &[(String, AlleleUpdate)],
    ) -> Result<(), DemographyError> {
        let mut resolved = Vec::with_capacity(updates.len());
        for (name, update) in updates {
            let id = self.pop_id(name).ok_or_else(|| {
                DemographyError::Validation(format!(
                    "allele update references unknown population '{name}'"
                ))
            })?;
            let lineages = self.nodes[id.idx()].lineages.ok_or_else(|| {
                DemographyError::Validation(format!(
                    "population '{name}' has no lineage count to update alleles against"
                ))
            })?;
            if u64::from(update.derived) + u64::from(update.ancestral) != u64::from(lineages) {
                return Err(DemographyError::Consistency(format!(
                    "derived + ancestral must add to lineages at population '{name}' ({} + {} != {})",
                    update.derived, update.ancestral, lineages
                )));
            }
            resolved.push((id, *update));
        }

        for (id, update) in resolved {
            let node = &mut self.nodes[id.idx()];
            node.derived = Some(update.derived);
            node.ancestral = Some(update.ancestral);
        }
        self.rebuild_derived_subtended();
        Ok(())
    }

    fn rebuild_derived_subtended(&mut self) {
        self.derived_subtended = self
            .leaves_subtended
            .iter()
            .map(|leaves| {
                leaves
                    .iter()
                    .map(|l| self.nodes[l.idx()].derived.unwrap_or(0))
                    .sum()
            })
            .collect();
    }
}

/// Preorder reachability intersected with the leaf set, per node.
fn compute_leaves_subtended(children: &[Vec<PopId>], leaves: &BTreeSet<PopId>) -> Vec<BTreeSet<PopId>> {
    (0..children.len())
        .map(|i| {
            let mut found = BTreeSet::new();
            let mut stack = vec![PopId(i as u32)];
            let mut seen = vec![false; children.len()];
            while let Some(v) = stack.pop() {
                if std::mem::replace(&mut seen[v.idx()], true) {
                    continue;
                }
                if leaves.contains(&v) {
                    found.insert(v);
                }
                stack.extend_from_slice(&children[v.idx()]);
            }
            found
        })
        .collect()
}

/// Postorder lineage-count DP from the root, with cycle detection.
///
/// Cycles reachable from the root trip the `InProgress` mark; a node the
/// traversal never reaches at all sits in an ancestor cycle (the single-root
/// check guarantees it has a parent), so any leftover mark is also a
/// structural failure.
fn compute_lineage_counts(
    children: &[Vec<PopId>],
    leaves: &BTreeSet<PopId>,
    pops: &[PopulationSpec],
    root: PopId,
) -> Result<Vec<u32>, DemographyError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    let mut counts = vec![0u32; children.len()];
    let mut marks = vec![Mark::Unvisited; children.len()];
    // Iterative postorder; the second visit of a frame sums its children.
    let mut stack = vec![(root, false)];
    while let Some((v, expanded)) = stack.pop() {
        if expanded {
            counts[v.idx()] = if leaves.contains(&v) {
                // Leaf lineage presence was validated before this runs.
                pops[v.idx()].lineages.unwrap_or(0)
            } else {
                children[v.idx()].iter().map(|c| counts[c.idx()]).sum()
            };
            marks[v.idx()] = Mark::Done;
            continue;
        }
        match marks[v.idx()] {
            Mark::Done => continue,
            Mark::InProgress => {
                return Err(DemographyError::Structural(format!(
                    "lineage graph contains a cycle through population '{}'",
                    pops[v.idx()].name
                )))
            }
            Mark::Unvisited => {
                marks[v.idx()] = Mark::InProgress;
                stack.push((v, true));
                for &c in &children[v.idx()] {
                    if marks[c.idx()] != Mark::Done {
                        stack.push((c, false));
                    }
                }
            }
        }
    }
    if let Some(i) = marks.iter().position(|&m| m != Mark::Done) {
        return Err(DemographyError::Structural(format!(
            "population '{}' is unreachable from the root",
            pops[i].name
        )));
    }
    Ok(counts)
}
