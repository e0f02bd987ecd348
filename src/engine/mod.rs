//! The computational core of the crate.
//!
//! This module provides:
//! - **errors**: the fail-fast error taxonomy
//! - **graph**: the lineage graph over populations with cached derived views
//! - **event_tree**: the event DAG derived from the ordered event list
//! - **admixture**: mixing-probability tensors for admixture events
//! - **demography**: the assembled model and its consumption surface

pub mod admixture;
pub mod demography;
pub mod errors;
pub mod event_tree;
pub mod graph;
