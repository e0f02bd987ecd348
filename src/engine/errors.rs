//! Error types for demographic-model construction and evaluation.

use thiserror::Error;

/// Errors raised while building or querying a demographic model.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// All variants are raised synchronously at the point of detection and are
/// never retried or recovered internally: a structurally invalid event tree
/// would otherwise feed silently-wrong numbers into the likelihood recursion,
/// which is far costlier to detect than an aborted build.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DemographyError {
    /// Malformed or missing required attributes.
    ///
    /// Examples: a leaf population without a `lineages` count, or admixture
    /// split probabilities that do not sum to one within tolerance.
    #[error("validation error: {0}")]
    Validation(String),

    /// Allele-count bookkeeping violation.
    ///
    /// Raised when an allele-state update would leave a node with
    /// `derived + ancestral != lineages`.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// The lineage graph or event list does not form a valid history.
    ///
    /// Examples: zero or multiple roots, an event whose two edges do not
    /// touch exactly three distinct populations, an out-of-order event list,
    /// or events that fail to resolve into a single ancestral lineage.
    #[error("structural error: {0}")]
    Structural(String),

    /// A size-history model tag that this crate does not implement.
    #[error("unsupported size-history model: {0}")]
    UnsupportedModel(String),

    /// Internal invariant violation.
    ///
    /// Indicates an unexpected condition such as a dangling population or
    /// event handle. This should be used only for programmer errors, not
    /// user errors.
    #[error("internal error: {0}")]
    Internal(String),
}
