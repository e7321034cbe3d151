//! Network-wide vulnerability and immunization deltas.
//!
//! Failure vulnerability is the mean of a cost metric over all packages:
//! the expected defect cost under uniform failure. Immunizing a set of
//! packages strips their outgoing propagation arcs, so their defects stop
//! spreading while defects elsewhere still reach them; the delta is the
//! resulting drop of the mean.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::graph::{GraphBuilder, PackageId};
use crate::metrics::{MetricKind, Reach, REACH_KEY};
use crate::model::{ModelError, PackageNetwork};

/// Errors from the vulnerability computations.
#[derive(Error, Debug)]
pub enum VulnerabilityError {
    #[error("the analytic immunization algorithm supports only the reach metric, got \"{0}\"")]
    UnsupportedMetric(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Mean of `metric` over every package in the network.
pub fn failure_vulnerability(net: &PackageNetwork, metric: &dyn MetricKind) -> f64 {
    net.get_metric(metric).summary().mean
}

/// Vulnerability before and after an immunization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImmunizationOutcome {
    pub before: f64,
    pub after: f64,
}

impl ImmunizationOutcome {
    /// Decrease of the mean metric; never negative.
    pub fn delta(&self) -> f64 {
        (self.before - self.after).max(0.0)
    }
}

/// How to evaluate the immunized network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeltaAlgorithm {
    /// Rebuild the full modified network and recompute the metric. Works
    /// for every metric kind.
    #[default]
    Network,
    /// Rebuild only the region that can traverse a removed arc. Exact, but
    /// limited to the reach metric.
    Analytic,
}

/// Improvement of the mean `metric` when every package in `targets` is
/// treated as non-propagating. The packages stay in the network; only
/// their outgoing arcs are dropped.
pub fn immunization_delta<'a, I>(
    net: &PackageNetwork,
    targets: I,
    metric: &dyn MetricKind,
    algorithm: DeltaAlgorithm,
) -> Result<ImmunizationOutcome, VulnerabilityError>
where
    I: IntoIterator<Item = &'a str>,
{
    let graph = net.graph();
    let mut ids: Vec<PackageId> = Vec::new();
    let mut seen = HashSet::new();
    for name in targets {
        let id = graph
            .id_of(name)
            .ok_or_else(|| ModelError::NotFound(name.to_string()))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }

    let before = net.get_metric(metric).summary();
    if ids.is_empty() {
        return Ok(ImmunizationOutcome {
            before: before.mean,
            after: before.mean,
        });
    }

    match algorithm {
        DeltaAlgorithm::Network => network_delta(net, &ids, metric, before.mean),
        DeltaAlgorithm::Analytic => analytic_delta(net, &ids, metric, before.sum),
    }
}

/// Materializes the immunized graph in full and recomputes the metric.
fn network_delta(
    net: &PackageNetwork,
    targets: &[PackageId],
    metric: &dyn MetricKind,
    before: f64,
) -> Result<ImmunizationOutcome, VulnerabilityError> {
    let graph = net.graph();
    let mut is_target = vec![false; graph.len()];
    for &t in targets {
        is_target[t as usize] = true;
    }

    let mut builder = GraphBuilder::new();
    for name in graph.names() {
        builder.add_package(name);
    }
    for (u, v) in graph.arcs() {
        if !is_target[u as usize] {
            builder.add_arc(graph.name_of(u), graph.name_of(v));
        }
    }

    let immunized = PackageNetwork::from_graph(builder.build()).map_err(VulnerabilityError::Model)?;
    let after = immunized.get_metric(metric).summary().mean;
    debug!(targets = targets.len(), before, after, "network immunization delta");
    Ok(ImmunizationOutcome { before, after })
}

/// Restricted rebuild for the reach metric.
///
/// Only packages that can reach a target may lose reach: every removed arc
/// has a target as its tail, so a path from anywhere else never traverses
/// one. The rebuild therefore covers just the arc-closure of that affected
/// set, with the targets' outgoing arcs dropped, and the difference is
/// summed over the affected set alone.
fn analytic_delta(
    net: &PackageNetwork,
    targets: &[PackageId],
    metric: &dyn MetricKind,
    before_sum: f64,
) -> Result<ImmunizationOutcome, VulnerabilityError> {
    if metric.key() != REACH_KEY {
        return Err(VulnerabilityError::UnsupportedMetric(metric.key().to_string()));
    }

    let graph = net.graph();
    let n = graph.len();
    let mut is_target = vec![false; n];
    for &t in targets {
        is_target[t as usize] = true;
    }

    // Ancestors of the targets, targets included.
    let mut affected = vec![false; n];
    let mut queue: Vec<PackageId> = targets.to_vec();
    for &t in targets {
        affected[t as usize] = true;
    }
    let mut head = 0;
    while head < queue.len() {
        let cur = queue[head];
        head += 1;
        for &p in graph.dependencies_of(cur) {
            if !affected[p as usize] {
                affected[p as usize] = true;
                queue.push(p);
            }
        }
    }

    // Forward closure of the affected set: everything a rebuilt reach
    // value could still count.
    let mut in_closure = affected.clone();
    let mut queue: Vec<PackageId> = (0..n as PackageId)
        .filter(|&u| affected[u as usize])
        .collect();
    let mut head = 0;
    while head < queue.len() {
        let cur = queue[head];
        head += 1;
        for &next in graph.dependants_of(cur) {
            if !in_closure[next as usize] {
                in_closure[next as usize] = true;
                queue.push(next);
            }
        }
    }

    let mut builder = GraphBuilder::new();
    for u in 0..n as PackageId {
        if in_closure[u as usize] {
            builder.add_package(graph.name_of(u));
        }
    }
    for u in 0..n as PackageId {
        if in_closure[u as usize] && !is_target[u as usize] {
            for &v in graph.dependants_of(u) {
                builder.add_arc(graph.name_of(u), graph.name_of(v));
            }
        }
    }
    let restricted =
        PackageNetwork::from_graph(builder.build()).map_err(VulnerabilityError::Model)?;

    let full_reach = net.get_metric(&Reach);
    let restricted_reach = restricted.get_metric(&Reach);
    let mut lost = 0.0;
    for u in 0..n as PackageId {
        if !affected[u as usize] {
            continue;
        }
        let name = graph.name_of(u);
        let old = full_reach
            .get(name)
            .expect("reach covers every package");
        let new = restricted_reach
            .get(name)
            .expect("the restricted model contains every affected package");
        lost += old - new;
    }

    let before = before_sum / n as f64;
    let after = (before_sum - lost) / n as f64;
    debug!(
        targets = targets.len(),
        closure = queue.len(),
        before,
        after,
        "analytic immunization delta"
    );
    Ok(ImmunizationOutcome { before, after })
}
