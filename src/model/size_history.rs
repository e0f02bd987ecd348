//! Size-history models attached to lineage-graph edges.
//!
//! A size history describes how a population's effective size behaves over
//! the time interval covered by its incoming edge. The likelihood recursion
//! consumes these models; this crate only constructs and validates them.
//!
//! The set of supported models is a closed enum rather than a string tag so
//! that dispatch is exhaustive and an unknown tag fails loudly at
//! construction instead of deep inside the likelihood math.

use crate::engine::errors::DemographyError;

/// Effective size used when a population does not declare one.
pub const DEFAULT_EFFECTIVE_SIZE: f64 = 1.0;

/// Recognized size-history model tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelKind {
    /// Constant effective size over the edge interval.
    Constant,
}

impl ModelKind {
    /// Resolves an external model tag.
    ///
    /// A missing tag means [`ModelKind::Constant`]; anything unrecognized is
    /// an [`DemographyError::UnsupportedModel`].
    pub fn from_tag(tag: Option<&str>) -> Result<Self, DemographyError> {
        match tag {
            None | Some("constant") => Ok(ModelKind::Constant),
            Some(other) => Err(DemographyError::UnsupportedModel(other.to_string())),
        }
    }
}

/// An analytic model of population size over one edge's time interval.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SizeHistory {
    /// Constant effective size `n_e` over a span `tau`, truncated at
    /// `n_max` lineages (the most that can enter the interval from below).
    ConstantTruncated {
        /// Effective population size.
        n_e: f64,
        /// Length of the interval; `f64::INFINITY` above the root.
        tau: f64,
        /// Maximum number of lineages entering the interval.
        n_max: u32,
    },
}

impl SizeHistory {
    /// Builds a constant-truncated history, validating its parameters.
    pub fn constant_truncated(n_e: f64, tau: f64, n_max: u32) -> Result<Self, DemographyError> {
        if !(n_e > 0.0) || !n_e.is_finite() {
            return Err(DemographyError::Validation(format!(
                "effective size must be positive and finite, got {n_e}"
            )));
        }
        if tau.is_nan() || tau < 0.0 {
            return Err(DemographyError::Validation(format!(
                "branch length must be non-negative, got {tau}"
            )));
        }
        if n_max == 0 {
            return Err(DemographyError::Validation(
                "size history must admit at least one lineage".to_string(),
            ));
        }
        Ok(SizeHistory::ConstantTruncated { n_e, tau, n_max })
    }

    /// Builds the model selected by `kind` for one edge interval.
    pub fn for_kind(
        kind: ModelKind,
        n_e: f64,
        tau: f64,
        n_max: u32,
    ) -> Result<Self, DemographyError> {
        match kind {
            ModelKind::Constant => SizeHistory::constant_truncated(n_e, tau, n_max),
        }
    }

    /// The maximum number of lineages the interval admits.
    pub fn n_max(&self) -> u32 {
        match self {
            SizeHistory::ConstantTruncated { n_max, .. } => *n_max,
        }
    }

    /// The time span covered by the interval.
    pub fn tau(&self) -> f64 {
        match self {
            SizeHistory::ConstantTruncated { tau, .. } => *tau,
        }
    }

    /// The effective population size on the interval.
    pub fn effective_size(&self) -> f64 {
        match self {
            SizeHistory::ConstantTruncated { n_e, .. } => *n_e,
        }
    }

    /// True when the interval extends indefinitely (the root interval).
    pub fn is_unbounded(&self) -> bool {
        self.tau().is_infinite()
    }
}
