//! Externally-supplied description types for a demographic history.
//!
//! These are the construction inputs handed to [`crate::build_demography`]
//! by whatever front end produced them (a newick/ms parser, a test fixture,
//! a simulation driver). They are plain data: all validation happens inside
//! the engine, not here.

pub mod size_history;

pub use size_history::{ModelKind, SizeHistory, DEFAULT_EFFECTIVE_SIZE};

/// Attributes of one population, keyed by name.
///
/// Leaves must set `lineages`; `derived`/`ancestral` are meaningful on
/// leaves only and must sum to `lineages` wherever both are present.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopulationSpec {
    /// Unique population name.
    pub name: String,
    /// Number of sampled lineages (required on leaf populations).
    pub lineages: Option<u32>,
    /// Observed derived-allele count among the sampled lineages.
    pub derived: Option<u32>,
    /// Observed ancestral-allele count among the sampled lineages.
    pub ancestral: Option<u32>,
    /// Effective population size; falls back to [`DEFAULT_EFFECTIVE_SIZE`].
    pub effective_size: Option<f64>,
    /// Size-history model tag; `None` means the constant model.
    pub model: Option<String>,
}

impl PopulationSpec {
    /// Convenience constructor for a named population with no attributes.
    pub fn named(name: impl Into<String>) -> Self {
        PopulationSpec {
            name: name.into(),
            ..PopulationSpec::default()
        }
    }

    /// Convenience constructor for a sampled leaf population.
    pub fn leaf(name: impl Into<String>, lineages: u32) -> Self {
        PopulationSpec {
            name: name.into(),
            lineages: Some(lineages),
            ..PopulationSpec::default()
        }
    }
}

/// A parent → child relation in the lineage graph.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeSpec {
    pub parent: String,
    pub child: String,
    /// Time span of the edge; `f64::INFINITY` only above the root.
    pub branch_length: f64,
}

impl EdgeSpec {
    pub fn new(parent: impl Into<String>, child: impl Into<String>, branch_length: f64) -> Self {
        EdgeSpec {
            parent: parent.into(),
            child: child.into(),
            branch_length,
        }
    }
}

/// One population-edge inside a [`RawEvent`].
///
/// `prob` is the admixture split probability assigned to `parent`; it is
/// required on both edges of an admixture event and meaningless elsewhere.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PopEdge {
    pub parent: String,
    pub child: String,
    pub prob: Option<f64>,
}

impl PopEdge {
    pub fn new(parent: impl Into<String>, child: impl Into<String>) -> Self {
        PopEdge {
            parent: parent.into(),
            child: child.into(),
            prob: None,
        }
    }

    /// Edge carrying an admixture split probability.
    pub fn with_prob(parent: impl Into<String>, child: impl Into<String>, prob: f64) -> Self {
        PopEdge {
            parent: parent.into(),
            child: child.into(),
            prob: Some(prob),
        }
    }
}

/// A single demographic event: a merge, split, or admixture at one point in
/// history, described by exactly two population-edges.
///
/// Events are supplied in ascending time order, earliest (leaf-ward) first.
/// The edge order inside an admixture event is significant: it fixes which
/// parent population is axis `parent1` of the mixing tensor.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawEvent {
    pub edges: [PopEdge; 2],
}

impl RawEvent {
    /// Two populations merging into a common ancestor.
    pub fn merge(
        ancestor: impl Into<String> + Clone,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        RawEvent {
            edges: [
                PopEdge::new(ancestor.clone(), left),
                PopEdge::new(ancestor, right),
            ],
        }
    }

    /// One population splitting its ancestry across two parents.
    pub fn admixture(
        child: impl Into<String> + Clone,
        parent1: impl Into<String>,
        prob1: f64,
        parent2: impl Into<String>,
        prob2: f64,
    ) -> Self {
        RawEvent {
            edges: [
                PopEdge::with_prob(parent1, child.clone(), prob1),
                PopEdge::with_prob(parent2, child, prob2),
            ],
        }
    }
}

/// A derived/ancestral allele-count update for one population, applied
/// between likelihood evaluations on the same topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlleleUpdate {
    pub derived: u32,
    pub ancestral: u32,
}
