//! # Demograph - demographic-history graphs for SFS inference
//!
//! Demograph models population-genetic demographic histories as annotated
//! graphs and derives from them the combinatorial probability structure an
//! expected site-frequency-spectrum (SFS) likelihood needs: a validated
//! event tree over demographic events and, per admixture event, the mixing
//! tensor relating child and parent derived-allele counts.
//!
//! ## Architecture
//!
//! - **model**: externally-supplied description types (populations, edges,
//!   raw events, size-history models)
//! - **engine**: lineage graph, event-tree builder, admixture mixer, and
//!   the assembled [`Demography`]
//!
//! Parsing of textual model languages, genealogy simulation, and the SFS
//! sum-product recursion itself are external collaborators; this crate
//! covers everything between raw description and validated probability
//! structure.
//!
//! ## Usage
//!
//! ```rust
//! use demograph::{build_demography, EdgeSpec, PopulationSpec, RawEvent};
//!
//! let pops = vec![
//!     PopulationSpec::named("anc"),
//!     PopulationSpec::leaf("a", 3),
//!     PopulationSpec::leaf("b", 2),
//! ];
//! let edges = vec![
//!     EdgeSpec::new("anc", "a", 1.0),
//!     EdgeSpec::new("anc", "b", 1.0),
//! ];
//! let events = vec![RawEvent::merge("anc", "a", "b")];
//!
//! let demography = build_demography(&pops, &edges, &events).expect("valid history");
//! assert_eq!(demography.lineage_count_at(demography.root()), 5);
//! ```

#![forbid(unsafe_code)]

pub mod engine;
pub mod model;

// Re-export the types most consumers need.
pub use engine::admixture::{AdmixtureMixer, AdmixtureTensor, DEFAULT_PROB_EPSILON};
pub use engine::demography::{build_demography, Demography, DemographyOptions};
pub use engine::errors::DemographyError;
pub use engine::event_tree::{EventId, EventNode, EventTree, EventTreeBuilder, EventType};
pub use engine::graph::{EdgeData, LineageGraph, PopId, PopulationNode};
pub use model::{
    AlleleUpdate, EdgeSpec, ModelKind, PopEdge, PopulationSpec, RawEvent, SizeHistory,
    DEFAULT_EFFECTIVE_SIZE,
};
