//! Event tree derived from an ordered demographic event list.
//!
//! The lineage graph describes which populations exist; the event tree
//! describes *when* they merge, split, or admix, and in what dependency
//! order. The likelihood recursion walks this tree, so its construction is
//! validated aggressively: a malformed or out-of-order event list must abort
//! the build rather than silently corrupt downstream math.
//!
//! Events are addressed by opaque [`EventId`] handles into an
//! index-addressed node table; nothing relies on structural equality of the
//! events themselves.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::engine::errors::DemographyError;
use crate::engine::graph::{LineageGraph, PopId};
use crate::model::RawEvent;

/// A unique identifier for a node of the event tree.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(pub u32);

impl EventId {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Structural classification of an event, used by the likelihood recursion
/// to dispatch computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
    /// Trivial single-population placeholder for a sampled leaf.
    Leaf,
    /// One population split its ancestry across two surviving parents.
    Admixture,
    /// Two previously independent event clusters converge.
    MergeClusters,
    /// Two populations owned by the same child event merge; a simple
    /// time-depth increase.
    MergeSubpops,
}

/// One resolved population-edge of an event.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventEdge {
    pub parent: PopId,
    pub child: PopId,
    /// Admixture split probability assigned to `parent`, when supplied.
    pub prob: Option<f64>,
}

/// An immutable node of the event tree.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventNode {
    /// The event's handle in the tree's node table.
    pub id: EventId,
    /// Populations that exist going forward (root-ward) from this event.
    pub parent_pops: BTreeSet<PopId>,
    /// The event's frontier: every population still live in this branch of
    /// history after the event resolves.
    pub sub_pops: BTreeSet<PopId>,
    /// Each population consumed here, mapped to the event that owned it.
    pub child_pops: BTreeMap<PopId, EventId>,
    /// Distinct child events, in edge-discovery order.
    pub children: Vec<EventId>,
    /// The originating pair of population-edges; `None` for leaf
    /// placeholders. Edge order is preserved because it fixes the admixture
    /// parent axes.
    pub edges: Option<[EventEdge; 2]>,
}

impl EventNode {
    /// Classifies the event from its structural counts alone.
    pub fn event_type(&self) -> EventType {
        if self.edges.is_none() {
            EventType::Leaf
        } else if self.parent_pops.len() == 2 {
            EventType::Admixture
        } else if self.children.len() == 2 {
            EventType::MergeClusters
        } else {
            EventType::MergeSubpops
        }
    }

    /// For an admixture event: the consumed population and the two parent
    /// populations with their split probabilities, in edge order.
    pub fn admixture_parts(&self) -> Option<(PopId, [EventEdge; 2])> {
        if self.event_type() != EventType::Admixture {
            return None;
        }
        let edges = self.edges?;
        Some((edges[0].child, edges))
    }
}

/// The validated event tree: an index-addressed DAG of [`EventNode`]s.
#[derive(Debug, Clone)]
pub struct EventTree {
    nodes: Vec<EventNode>,
    root: EventId,
}

impl EventTree {
    /// The event with no incoming event-tree edges.
    pub fn root(&self) -> EventId {
        self.root
    }

    /// Looks up an event node by handle.
    pub fn node(&self, id: EventId) -> Option<&EventNode> {
        self.nodes.get(id.idx())
    }

    /// Number of events, leaf placeholders included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over all events in creation (time) order.
    pub fn events(&self) -> impl Iterator<Item = &EventNode> {
        self.nodes.iter()
    }

    /// Iterates over the admixture events in creation order.
    pub fn admixture_events(&self) -> impl Iterator<Item = &EventNode> {
        self.nodes
            .iter()
            .filter(|n| n.event_type() == EventType::Admixture)
    }
}

/// Builds an [`EventTree`] from a lineage graph and its ordered event list.
pub struct EventTreeBuilder<'g> {
    graph: &'g LineageGraph,
}

impl<'g> EventTreeBuilder<'g> {
    pub fn new(graph: &'g LineageGraph) -> Self {
        EventTreeBuilder { graph }
    }

    /// Folds the ordered event list into the validated tree.
    ///
    /// Order encodes time: events earlier in history (closer to the leaves)
    /// must appear first. Each event is fully validated before the live
    /// population map is touched, so a failed build never leaves the fold in
    /// a half-applied state.
    ///
    /// # Errors
    ///
    /// `Structural` for every malformed-history condition: an event not
    /// touching exactly three distinct populations, a consumed population
    /// that is not live, a parent population that already is, or an event
    /// list that does not resolve into a single ancestral lineage.
    pub fn build(&self, events: &[RawEvent]) -> Result<EventTree, DemographyError> {
        let mut nodes: Vec<EventNode> = Vec::with_capacity(self.graph.leaves().len() + events.len());
        let mut live: FxHashMap<PopId, EventId> = FxHashMap::default();

        // Every leaf starts as a trivial single-population event that owns
        // itself.
        for &leaf in self.graph.leaves() {
            let id = EventId(nodes.len() as u32);
            nodes.push(EventNode {
                id,
                parent_pops: BTreeSet::from([leaf]),
                sub_pops: BTreeSet::from([leaf]),
                child_pops: BTreeMap::new(),
                children: Vec::new(),
                edges: None,
            });
            live.insert(leaf, id);
        }

        for (i, raw) in events.iter().enumerate() {
            let staged = self.stage_event(i, raw, &nodes, &live)?;
            let id = EventId(nodes.len() as u32);

            // Validation is done; from here on the fold state may change.
            for p in staged.child_pops.keys() {
                live.remove(p);
            }
            for &p in &staged.parent_pops {
                live.insert(p, id);
            }

            // An event may sit below two later merges (admixture parents are
            // consumed independently), so child frontiers can mention pops
            // consumed on the other branch. Keep only pops still live.
            let mut sub_pops = staged.sub_pops;
            sub_pops.retain(|p| live.contains_key(p));

            nodes.push(EventNode {
                id,
                parent_pops: staged.parent_pops,
                sub_pops,
                child_pops: staged.child_pops,
                children: staged.children,
                edges: Some(staged.edges),
            });
        }

        if live.len() != 1 {
            return Err(DemographyError::Structural(format!(
                "event list does not resolve into one ancestral lineage; {} populations remain live",
                live.len()
            )));
        }
        let (&final_pop, &root) = live.iter().next().ok_or_else(|| {
            DemographyError::Internal("live map empty after termination check".to_string())
        })?;
        let root_sub = &nodes[root.idx()].sub_pops;
        if root_sub.len() != 1 || !root_sub.contains(&final_pop) {
            return Err(DemographyError::Structural(format!(
                "root event frontier is not the single final population '{}'",
                self.graph.name(final_pop)
            )));
        }

        debug!(
            events = events.len(),
            nodes = nodes.len(),
            root = root.0,
            "event tree built"
        );
        Ok(EventTree { nodes, root })
    }

    /// Validates one raw event against the current fold state and stages the
    /// fields of its node. Nothing is mutated here.
    fn stage_event(
        &self,
        index: usize,
        raw: &RawEvent,
        nodes: &[EventNode],
        live: &FxHashMap<PopId, EventId>,
    ) -> Result<StagedEvent, DemographyError> {
        let mut edges = [EventEdge {
            parent: PopId(0),
            child: PopId(0),
            prob: None,
        }; 2];
        for (slot, e) in edges.iter_mut().zip(raw.edges.iter()) {
            let parent = self.graph.pop_id(&e.parent).ok_or_else(|| {
                DemographyError::Structural(format!(
                    "event {index} references unknown population '{}'",
                    e.parent
                ))
            })?;
            let child = self.graph.pop_id(&e.child).ok_or_else(|| {
                DemographyError::Structural(format!(
                    "event {index} references unknown population '{}'",
                    e.child
                ))
            })?;
            *slot = EventEdge {
                parent,
                child,
                prob: e.prob,
            };
        }

        let parent_pops: BTreeSet<PopId> = edges.iter().map(|e| e.parent).collect();
        let child_set: BTreeSet<PopId> = edges.iter().map(|e| e.child).collect();
        if parent_pops.intersection(&child_set).next().is_some()
            || parent_pops.len() + child_set.len() != 3
        {
            return Err(DemographyError::Structural(format!(
                "event {index} must touch exactly 3 distinct populations, \
                 with none both consumed and surviving"
            )));
        }

        let mut child_pops = BTreeMap::new();
        let mut children: Vec<EventId> = Vec::with_capacity(2);
        // Discovery order: walk the edges, not the sorted set.
        for e in &edges {
            if child_pops.contains_key(&e.child) {
                continue;
            }
            let owner = *live.get(&e.child).ok_or_else(|| {
                DemographyError::Structural(format!(
                    "event {index} consumes population '{}' which is not live; \
                     is the event list out of order?",
                    self.graph.name(e.child)
                ))
            })?;
            child_pops.insert(e.child, owner);
            if !children.contains(&owner) {
                children.push(owner);
            }
        }
        debug_assert!(matches!(children.len(), 1 | 2));

        for &p in &parent_pops {
            if live.contains_key(&p) {
                return Err(DemographyError::Structural(format!(
                    "event {index} introduces population '{}' which is already live",
                    self.graph.name(p)
                )));
            }
        }

        let mut sub_pops = BTreeSet::new();
        for &c in &children {
            sub_pops.extend(nodes[c.idx()].sub_pops.iter().copied());
        }
        for p in child_pops.keys() {
            sub_pops.remove(p);
        }
        sub_pops.extend(parent_pops.iter().copied());

        Ok(StagedEvent {
            parent_pops,
            sub_pops,
            child_pops,
            children,
            edges,
        })
    }
}

/// Fields of an event node validated but not yet registered.
struct StagedEvent {
    parent_pops: BTreeSet<PopId>,
    sub_pops: BTreeSet<PopId>,
    child_pops: BTreeMap<PopId, EventId>,
    children: Vec<EventId>,
    edges: [EventEdge; 2],
}
