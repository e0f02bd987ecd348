//! The assembled demographic model.
//!
//! [`Demography`] ties the three layers together: the validated
//! [`LineageGraph`], the [`EventTree`] derived from the ordered event list,
//! and the per-instance [`AdmixtureMixer`]. It exposes the consumption
//! surface the SFS likelihood recursion works against, so downstream code
//! never reaches into the layers individually.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::engine::admixture::{AdmixtureMixer, AdmixtureTensor, DEFAULT_PROB_EPSILON};
use crate::engine::errors::DemographyError;
use crate::engine::event_tree::{EventId, EventNode, EventTree, EventTreeBuilder, EventType};
use crate::engine::graph::{LineageGraph, PopId, PopulationNode};
use crate::model::{AlleleUpdate, EdgeSpec, PopulationSpec, RawEvent, DEFAULT_EFFECTIVE_SIZE};

/// Construction knobs that have sensible defaults.
#[derive(Debug, Clone)]
pub struct DemographyOptions {
    /// Effective size for populations that do not declare one.
    pub default_effective_size: f64,
    /// Tolerance for the admixture `p1 + p2 == 1` check.
    pub prob_epsilon: f64,
}

impl Default for DemographyOptions {
    fn default() -> Self {
        DemographyOptions {
            default_effective_size: DEFAULT_EFFECTIVE_SIZE,
            prob_epsilon: DEFAULT_PROB_EPSILON,
        }
    }
}

/// A validated demographic history ready for likelihood evaluation.
///
/// All computation is synchronous within one instance; caches are explicit
/// fields invalidated only by [`Demography::update_allele_state`]. Admixture
/// tensors depend on lineage counts and split probabilities, which allele
/// updates never touch, so they stay memoized for the instance lifetime.
#[derive(Debug)]
pub struct Demography {
    graph: LineageGraph,
    tree: EventTree,
    mixer: AdmixtureMixer,
}

impl Demography {
    /// Builds the full model with default options.
    pub fn new(
        pops: &[PopulationSpec],
        edges: &[EdgeSpec],
        events: &[RawEvent],
    ) -> Result<Self, DemographyError> {
        Self::with_options(pops, edges, events, DemographyOptions::default())
    }

    /// Builds the full model: lineage graph first (leaf and attribute
    /// validation), then the event tree (history validation). Any failure
    /// aborts construction; there is no partially-built state.
    pub fn with_options(
        pops: &[PopulationSpec],
        edges: &[EdgeSpec],
        events: &[RawEvent],
        options: DemographyOptions,
    ) -> Result<Self, DemographyError> {
        let graph = LineageGraph::with_default_effective_size(
            pops,
            edges,
            options.default_effective_size,
        )?;
        let tree = EventTreeBuilder::new(&graph).build(events)?;
        debug!(
            populations = graph.len(),
            events = tree.len(),
            "demography assembled"
        );
        Ok(Demography {
            graph,
            tree,
            mixer: AdmixtureMixer::with_epsilon(options.prob_epsilon),
        })
    }

    /// The underlying lineage graph.
    pub fn graph(&self) -> &LineageGraph {
        &self.graph
    }

    /// The derived event tree.
    pub fn event_tree(&self) -> &EventTree {
        &self.tree
    }

    /// The unique root population.
    pub fn root(&self) -> PopId {
        self.graph.root()
    }

    /// The sampled leaf populations.
    pub fn leaves(&self) -> &BTreeSet<PopId> {
        self.graph.leaves()
    }

    pub fn is_leaf(&self, v: PopId) -> bool {
        self.graph.is_leaf(v)
    }

    /// Looks up a population by name.
    pub fn population(&self, name: &str) -> Option<&PopulationNode> {
        self.graph.pop_id(name).and_then(|id| self.graph.pop(id))
    }

    /// Total lineage count entering `v` from below.
    pub fn lineage_count_at(&self, v: PopId) -> u32 {
        self.graph.lineage_count_at(v)
    }

    /// Derived-allele count summed over the leaves subtended by `v`.
    pub fn derived_count_subtended_by(&self, v: PopId) -> u32 {
        self.graph.derived_count_subtended_by(v)
    }

    /// The leaf populations subtended by `v`.
    pub fn leaves_subtended_by(&self, v: PopId) -> &BTreeSet<PopId> {
        self.graph.leaves_subtended_by(v)
    }

    /// The event the likelihood recursion starts from.
    pub fn root_event(&self) -> EventId {
        self.tree.root()
    }

    /// Looks up an event node by handle.
    pub fn event(&self, e: EventId) -> Option<&EventNode> {
        self.tree.node(e)
    }

    /// Structural classification of event `e`.
    pub fn event_type(&self, e: EventId) -> Option<EventType> {
        self.tree.node(e).map(EventNode::event_type)
    }

    /// Populations existing root-ward of event `e`.
    pub fn parent_pops(&self, e: EventId) -> Option<&BTreeSet<PopId>> {
        self.tree.node(e).map(|n| &n.parent_pops)
    }

    /// The frontier of event `e`.
    pub fn sub_pops(&self, e: EventId) -> Option<&BTreeSet<PopId>> {
        self.tree.node(e).map(|n| &n.sub_pops)
    }

    /// Populations consumed at event `e`, each with its owning event.
    pub fn child_pops(&self, e: EventId) -> Option<&BTreeMap<PopId, EventId>> {
        self.tree.node(e).map(|n| &n.child_pops)
    }

    /// Iterates over the admixture events in time order.
    pub fn admixture_events(&self) -> impl Iterator<Item = &EventNode> {
        self.tree.admixture_events()
    }

    /// The mixing-probability tensor of admixture event `e`, memoized.
    pub fn admixture_probability(
        &self,
        e: EventId,
    ) -> Result<Arc<AdmixtureTensor>, DemographyError> {
        let node = self
            .tree
            .node(e)
            .ok_or_else(|| DemographyError::Internal(format!("unknown event handle {}", e.0)))?;
        self.mixer.admixture_probability(&self.graph, node)
    }

    /// Tensors for every admixture event; a parallel map with the `rayon`
    /// feature enabled, sequential otherwise.
    pub fn admixture_probabilities(
        &self,
    ) -> Result<Vec<Arc<AdmixtureTensor>>, DemographyError> {
        self.mixer.admixture_probabilities(&self.graph, &self.tree)
    }

    /// Applies derived/ancestral updates between likelihood evaluations on
    /// the same topology. Validate-then-apply; see
    /// [`LineageGraph::update_allele_state`].
    pub fn update_allele_state(
        &mut self,
        updates: &[(String, AlleleUpdate)],
    ) -> Result<(), DemographyError> {
        self.graph.update_allele_state(updates)
    }
}

/// Convenience entry point: builds a [`Demography`] with default options.
pub fn build_demography(
    pops: &[PopulationSpec],
    edges: &[EdgeSpec],
    events: &[RawEvent],
) -> Result<Demography, DemographyError> {
    Demography::new(pops, edges, events)
}
