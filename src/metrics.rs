//! Whole-network propagation metrics.
//!
//! Every metric is defined over the condensation DAG: processing SCCs
//! sinks-first, a single pass unions each component's successor descendant
//! sets exactly once, and the per-component value is an integer-weighted
//! sum over the resulting set. All members of an SCC share the component's
//! value. Custom metrics implement [`MetricKind`] against the same sweep
//! helpers.

use rayon::prelude::*;
use tracing::debug;

use crate::bitset::SccSet;
use crate::condense::Condensation;
use crate::model::PackageNetwork;
use crate::progress::{self, ProgressObserver};
use crate::stats::MetricStats;

/// A metric computation the network model can cache.
///
/// `key` identifies the cache slot; two kinds with the same key are treated
/// as the same metric. `compute` must be deterministic for a given model.
///
/// External code can register its own kinds against the same sweep
/// helpers the built-ins use:
///
/// ```
/// use depreach::{MetricKind, MetricStats, PackageNetwork};
/// use depreach::metrics::{descendant_weight_sweep, per_package_stats};
///
/// /// Counts the distinct SCCs a defect can reach, the package's own
/// /// component included.
/// struct ClusterReach;
///
/// impl MetricKind for ClusterReach {
///     fn key(&self) -> &str {
///         "cluster-reach"
///     }
///
///     fn compute(&self, net: &PackageNetwork) -> MetricStats {
///         let cond = net.condensation();
///         let ones = vec![1u64; cond.count()];
///         let totals = descendant_weight_sweep(cond, net.descendant_index(), &ones);
///         per_package_stats(net, &totals)
///     }
/// }
///
/// let net = PackageNetwork::from_arcs([("a", "b"), ("b", "c"), ("c", "a"), ("d", "a")])?;
/// let clusters = net.get_metric(&ClusterReach);
/// // d reaches its own component plus the cycle; cycle members only theirs.
/// assert_eq!(clusters.get("d"), Some(2.0));
/// assert_eq!(clusters.get("a"), Some(1.0));
/// # Ok::<(), depreach::ModelError>(())
/// ```
pub trait MetricKind: Send + Sync {
    /// Stable identifier used for caching and serialization.
    fn key(&self) -> &str;

    /// Computes the per-package values for `net`.
    fn compute(&self, net: &PackageNetwork) -> MetricStats;
}

/// Number of packages a defect reaches, the package itself included.
pub struct Reach;

/// Number of arcs in the subgraph a defect reaches.
pub struct Impact;

/// Number of packages whose defect can reach the package, itself included.
pub struct Surface;

/// Direct dependant count.
pub struct DependentsCount;

/// Direct dependency count.
pub struct DependenciesCount;

pub(crate) const REACH_KEY: &str = "reach";

impl MetricKind for Reach {
    fn key(&self) -> &str {
        REACH_KEY
    }

    fn compute(&self, net: &PackageNetwork) -> MetricStats {
        let cond = net.condensation();
        let sizes = scc_sizes(cond);
        let totals = descendant_weight_sweep(cond, net.descendant_index(), &sizes);
        per_package_stats(net, &totals)
    }
}

impl MetricKind for Impact {
    fn key(&self) -> &str {
        "impact"
    }

    fn compute(&self, net: &PackageNetwork) -> MetricStats {
        let cond = net.condensation();
        let weights: Vec<u64> = (0..cond.count() as u32)
            .map(|s| cond.arc_weight(s))
            .collect();
        let totals = descendant_weight_sweep(cond, net.descendant_index(), &weights);
        per_package_stats(net, &totals)
    }
}

impl MetricKind for Surface {
    fn key(&self) -> &str {
        "surface"
    }

    fn compute(&self, net: &PackageNetwork) -> MetricStats {
        let cond = net.condensation();
        let sizes = scc_sizes(cond);
        let totals = ancestor_weight_sweep(cond, &sizes, net.progress_observer());
        per_package_stats(net, &totals)
    }
}

impl MetricKind for DependentsCount {
    fn key(&self) -> &str {
        "dependents-count"
    }

    fn compute(&self, net: &PackageNetwork) -> MetricStats {
        let graph = net.graph();
        MetricStats::from_values(graph.names().enumerate().map(|(id, name)| {
            (name.to_string(), graph.dependants_of(id as u32).len() as f64)
        }))
    }
}

impl MetricKind for DependenciesCount {
    fn key(&self) -> &str {
        "dependencies-count"
    }

    fn compute(&self, net: &PackageNetwork) -> MetricStats {
        let graph = net.graph();
        MetricStats::from_values(graph.names().enumerate().map(|(id, name)| {
            (name.to_string(), graph.dependencies_of(id as u32).len() as f64)
        }))
    }
}

/// Strict descendant sets of every SCC (self excluded), built by one
/// sinks-first pass. Component ids are already a reverse topological order,
/// so every successor's set exists by the time it is needed.
pub(crate) fn build_descendant_index(
    cond: &Condensation,
    observer: Option<&dyn ProgressObserver>,
) -> Vec<SccSet> {
    let c = cond.count();
    let mut sets: Vec<SccSet> = Vec::with_capacity(c);
    for s in 0..c as u32 {
        let mut set = SccSet::empty(c);
        for &t in cond.succ(s) {
            set.insert(t);
            set.union_with(&sets[t as usize]);
        }
        sets.push(set);
        progress::report(observer, "descendant-sets", s as usize + 1, c);
    }
    debug!(sccs = c, "descendant index built");
    sets
}

/// Per-SCC totals of `weights` over each component's descendant closure,
/// the component itself included.
pub fn descendant_weight_sweep(
    cond: &Condensation,
    descendants: &[SccSet],
    weights: &[u64],
) -> Vec<u64> {
    (0..cond.count())
        .map(|s| weights[s] + descendants[s].weighted_sum(weights))
        .collect()
}

/// Per-SCC totals of `weights` over each component's ancestor closure, the
/// component itself included. Runs the same union pass on the reversed
/// quotient; ancestor sets are transient.
pub fn ancestor_weight_sweep(
    cond: &Condensation,
    weights: &[u64],
    observer: Option<&dyn ProgressObserver>,
) -> Vec<u64> {
    let c = cond.count();
    let mut sets: Vec<Option<SccSet>> = (0..c).map(|_| None).collect();
    let mut totals = vec![0u64; c];
    // Sources first: predecessors carry higher ids under the sinks-first
    // numbering, so walk ids downwards.
    for (processed, s) in (0..c as u32).rev().enumerate() {
        let mut set = SccSet::empty(c);
        for &p in cond.pred(s) {
            set.insert(p);
            if let Some(parent) = &sets[p as usize] {
                set.union_with(parent);
            }
        }
        totals[s as usize] = weights[s as usize] + set.weighted_sum(weights);
        sets[s as usize] = Some(set);
        progress::report(observer, "ancestor-sets", processed + 1, c);
    }
    totals
}

/// Expands per-SCC totals into a per-package result. The fan-out is
/// order-preserving, so parallel materialization stays bit-identical.
pub fn per_package_stats(net: &PackageNetwork, per_scc: &[u64]) -> MetricStats {
    let graph = net.graph();
    let cond = net.condensation();
    let values: Vec<f64> = (0..graph.len() as u32)
        .into_par_iter()
        .map(|u| per_scc[cond.scc_of(u) as usize] as f64)
        .collect();
    MetricStats::from_values(graph.names().map(str::to_string).zip(values))
}

pub(crate) fn scc_sizes(cond: &Condensation) -> Vec<u64> {
    (0..cond.count() as u32).map(|s| cond.size(s)).collect()
}
