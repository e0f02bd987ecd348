//! Admixture mixing-probability tensors.
//!
//! An admixture event models each of the `n` lineages at the consumed
//! population as independently tracing to parent 1 with probability `p1` or
//! parent 2 with probability `p2`. The tensor computed here relates the
//! child population's derived-allele count to the derived-allele counts of
//! the two parents; the likelihood recursion contracts its partial results
//! against it.
//!
//! The computation has two independent stages:
//! - a binomial mixing distribution over `k`, the number of lineages tracing
//!   to parent 1, which depends on `(n, p1, p2)`;
//! - a 4-D hypergeometric allele-split kernel which depends on `n` alone and
//!   is therefore memoized across events and across `(p1, p2)` pairs.
//!
//! Tensors for distinct admixture events have no data dependency on each
//! other, so batch evaluation is a natural parallel map (`rayon` feature).

use std::sync::{Arc, Mutex};

use ndarray::{Array1, Array2, Array3, Array4};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::engine::errors::DemographyError;
use crate::engine::event_tree::{EventEdge, EventNode, EventTree};
use crate::engine::graph::{LineageGraph, PopId};

/// Default tolerance for the `p1 + p2 == 1` precondition.
pub const DEFAULT_PROB_EPSILON: f64 = 1e-9;

/// The mixing-probability tensor of one admixture event.
///
/// `probs[[c, d1, d2]]` is indexed by the child population's derived count
/// `c` and the parents' derived counts `d1`, `d2`; all axes have length
/// `n + 1`. The population triple records which axis belongs to whom;
/// `parent1`/`parent2` follow the edge order of the originating event.
#[derive(Debug, Clone)]
pub struct AdmixtureTensor {
    pub probs: Array3<f64>,
    pub child: PopId,
    pub parent1: PopId,
    pub parent2: PopId,
}

impl AdmixtureTensor {
    /// The lineage count `n` the tensor was built for.
    pub fn lineage_count(&self) -> usize {
        self.probs.shape()[0] - 1
    }
}

/// Everything a tensor's value depends on. `EventId`s are only unique
/// within one event tree, so the memo is keyed by the defining parameters
/// instead; a mixer shared across histories then either misses or returns a
/// tensor that is exact for the event at hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TensorKey {
    n: usize,
    p1_bits: u64,
    p2_bits: u64,
    child: PopId,
    parent1: PopId,
    parent2: PopId,
}

/// Computes and memoizes admixture tensors.
///
/// Both caches live behind mutexes so a shared `&AdmixtureMixer` can be used
/// from a parallel map. Tensors depend only on lineage counts and split
/// probabilities, neither of which allele-state updates touch, so entries
/// are never invalidated.
#[derive(Debug)]
pub struct AdmixtureMixer {
    prob_epsilon: f64,
    kernels: Mutex<FxHashMap<usize, Arc<Array4<f64>>>>,
    tensors: Mutex<FxHashMap<TensorKey, Arc<AdmixtureTensor>>>,
}

impl Default for AdmixtureMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmixtureMixer {
    pub fn new() -> Self {
        Self::with_epsilon(DEFAULT_PROB_EPSILON)
    }

    /// A mixer with an explicit tolerance for the probability-sum check.
    pub fn with_epsilon(prob_epsilon: f64) -> Self {
        AdmixtureMixer {
            prob_epsilon,
            kernels: Mutex::new(FxHashMap::default()),
            tensors: Mutex::new(FxHashMap::default()),
        }
    }

    /// The mixing tensor for one admixture event, memoized by its defining
    /// parameters.
    ///
    /// All preconditions are checked before any tensor work: the computation
    /// is cubic-to-quartic in `n` and must not run on invalid input.
    ///
    /// # Errors
    ///
    /// `Validation` — the event is not an admixture, a split probability is
    /// missing or outside `[0, 1]`, or `p1 + p2` differs from 1 by more than
    /// the configured epsilon.
    pub fn admixture_probability(
        &self,
        graph: &LineageGraph,
        event: &EventNode,
    ) -> Result<Arc<AdmixtureTensor>, DemographyError> {
        let (child, edges) = event.admixture_parts().ok_or_else(|| {
            DemographyError::Validation(format!(
                "event {} is not an admixture event",
                event.id.0
            ))
        })?;
        let [e1, e2] = edges;
        let p1 = split_prob(graph, &e1)?;
        let p2 = split_prob(graph, &e2)?;
        if (p1 + p2 - 1.0).abs() > self.prob_epsilon {
            return Err(DemographyError::Validation(format!(
                "admixture probabilities into '{}' must sum to 1, got {} + {}",
                graph.name(child),
                p1,
                p2
            )));
        }

        let n = graph.lineage_count_at(child) as usize;
        let key = TensorKey {
            n,
            p1_bits: p1.to_bits(),
            p2_bits: p2.to_bits(),
            child,
            parent1: e1.parent,
            parent2: e2.parent,
        };
        if let Some(cached) = self.tensors.lock().unwrap().get(&key) {
            return Ok(Arc::clone(cached));
        }

        let kernel = self.kernel_for(n);
        let mix = mixing_distribution(n, p1, p2);

        // Contraction over k: P[c, d1, d2] = sum_k mix[k] * K[k, c, d1, d2].
        let mut probs = Array3::<f64>::zeros((n + 1, n + 1, n + 1));
        for k in 0..=n {
            let w = mix[k];
            if w == 0.0 {
                continue;
            }
            for c in 0..=n {
                for d1 in 0..=n {
                    for d2 in 0..=n {
                        probs[[c, d1, d2]] += w * kernel[[k, c, d1, d2]];
                    }
                }
            }
        }

        debug!(
            child = graph.name(child),
            n,
            p1,
            p2,
            "admixture tensor computed"
        );
        let tensor = Arc::new(AdmixtureTensor {
            probs,
            child,
            parent1: e1.parent,
            parent2: e2.parent,
        });
        self.tensors
            .lock()
            .unwrap()
            .insert(key, Arc::clone(&tensor));
        Ok(tensor)
    }

    /// Evaluates the tensors of every admixture event in the tree.
    ///
    /// The events are independent, so with the `rayon` feature enabled this
    /// is a parallel map over a shared read-only graph; otherwise it runs
    /// sequentially in tree order. Results come back in tree (time) order
    /// either way.
    pub fn admixture_probabilities(
        &self,
        graph: &LineageGraph,
        tree: &EventTree,
    ) -> Result<Vec<Arc<AdmixtureTensor>>, DemographyError> {
        let events: Vec<&EventNode> = tree.admixture_events().collect();

        #[cfg(feature = "rayon")]
        let tensors = events
            .par_iter()
            .map(|e| self.admixture_probability(graph, e))
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(not(feature = "rayon"))]
        let tensors = events
            .iter()
            .map(|e| self.admixture_probability(graph, e))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(tensors)
    }

    /// The hypergeometric allele-split kernel for `n` lineages, memoized.
    ///
    /// `K[[k, c, d1, d2]]` is the probability, conditioned on exactly `k`
    /// lineages tracing to parent 1, that a child derived count of `c` is
    /// consistent with parent derived counts `d1` and `d2`.
    pub fn kernel_for(&self, n: usize) -> Arc<Array4<f64>> {
        let mut kernels = self.kernels.lock().unwrap();
        Arc::clone(
            kernels
                .entry(n)
                .or_insert_with(|| Arc::new(allele_split_kernel(n))),
        )
    }
}

fn split_prob(graph: &LineageGraph, edge: &EventEdge) -> Result<f64, DemographyError> {
    let p = edge.prob.ok_or_else(|| {
        DemographyError::Validation(format!(
            "admixture edge {} -> {} carries no split probability",
            graph.name(edge.parent),
            graph.name(edge.child)
        ))
    })?;
    if !(0.0..=1.0).contains(&p) {
        return Err(DemographyError::Validation(format!(
            "split probability on edge {} -> {} must lie in [0, 1], got {p}",
            graph.name(edge.parent),
            graph.name(edge.child)
        )));
    }
    Ok(p)
}

/// Binomial coefficients up to `C(n, n)` via Pascal's triangle; entries
/// above the diagonal are zero, which makes out-of-range hypergeometric
/// terms vanish without special cases.
fn binomial_table(n: usize) -> Array2<f64> {
    let mut c = Array2::<f64>::zeros((n + 1, n + 1));
    for i in 0..=n {
        c[[i, 0]] = 1.0;
        for j in 1..=i {
            c[[i, j]] = c[[i - 1, j - 1]] + c[[i - 1, j]];
        }
    }
    c
}

/// `mix[k] = C(n, k) * p1^k * p2^(n-k)`: the probability that exactly `k`
/// of the `n` lineages trace to parent 1.
fn mixing_distribution(n: usize, p1: f64, p2: f64) -> Array1<f64> {
    let choose = binomial_table(n);
    Array1::from_iter(
        (0..=n).map(|k| choose[[n, k]] * p1.powi(k as i32) * p2.powi((n - k) as i32)),
    )
}

/// One hypergeometric factor: `h[[d, x]]` is the probability of drawing `x`
/// derived lineages when `draws` of the parent's `n` lineages (of which `d`
/// are derived) are taken without replacement.
fn hypergeometric_factor(n: usize, draws: usize, choose: &Array2<f64>) -> Array2<f64> {
    let denom = choose[[n, draws]];
    let mut h = Array2::<f64>::zeros((n + 1, draws + 1));
    for d in 0..=n {
        for x in 0..=draws.min(d) {
            if draws - x <= n - d {
                h[[d, x]] = choose[[d, x]] * choose[[n - d, draws - x]] / denom;
            }
        }
    }
    h
}

/// The 4-D allele-split kernel `K[[k, c, d1, d2]]`, depending on `n` only.
///
/// For each `k`, the two hypergeometric factors (parent 1 supplying `k`
/// draws, parent 2 the remaining `n - k`) are combined by a discrete
/// convolution along the derived-contribution axis, so that every child
/// total `c = from_parent1 + from_parent2` is accumulated at once.
fn allele_split_kernel(n: usize) -> Array4<f64> {
    let choose = binomial_table(n);
    let mut kernel = Array4::<f64>::zeros((n + 1, n + 1, n + 1, n + 1));
    for k in 0..=n {
        let h1 = hypergeometric_factor(n, k, &choose);
        let h2 = hypergeometric_factor(n, n - k, &choose);
        for d1 in 0..=n {
            for d2 in 0..=n {
                for x in 0..=k {
                    let a = h1[[d1, x]];
                    if a == 0.0 {
                        continue;
                    }
                    for y in 0..=(n - k) {
                        kernel[[k, x + y, d1, d2]] += a * h2[[d2, y]];
                    }
                }
            }
        }
    }
    kernel
}
