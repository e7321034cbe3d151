//! The network model: graph + condensation + metric cache.
//!
//! A [`PackageNetwork`] is built once and never mutated; the only mutable
//! state is the append-only metric cache, which is single-flight per metric
//! kind. Per-package queries go through lightweight [`PackageView`] handles
//! that borrow the model.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use thiserror::Error;
use tracing::debug;

use crate::bitset::SccSet;
use crate::condense::{BuildError, Condensation, SccId};
use crate::coupling;
use crate::graph::{GraphBuilder, PackageGraph, PackageId};
use crate::ingest::{self, IngestError};
use crate::io;
use crate::metrics::{self, Impact, MetricKind, Reach, Surface};
use crate::progress::ProgressObserver;
use crate::stats::MetricStats;

/// Errors surfaced by the network model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("package not found: {0}")]
    NotFound(String),

    #[error("corrupted model file: {0}")]
    CorruptedModel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

type MetricCell = Arc<OnceLock<Arc<MetricStats>>>;

/// An immutable dependency network with lazily computed, cached metrics.
pub struct PackageNetwork {
    graph: PackageGraph,
    cond: Condensation,
    cache: Mutex<HashMap<String, MetricCell>>,
    descendants: OnceLock<Vec<SccSet>>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl PackageNetwork {
    /// Builds a model from an already-materialized graph.
    pub fn from_graph(graph: PackageGraph) -> Result<Self, ModelError> {
        let cond = Condensation::build(&graph)?;
        debug!(packages = graph.len(), sccs = cond.count(), "model built");
        Ok(PackageNetwork {
            graph,
            cond,
            cache: Mutex::new(HashMap::new()),
            descendants: OnceLock::new(),
            observer: None,
        })
    }

    /// Builds a model from an adjacency file (`.gz`/`.bz2` transparent).
    pub fn from_adjacency_path(path: &Path) -> Result<Self, ModelError> {
        let graph = ingest::graph_from_adjacency_path(path)?;
        Self::from_graph(graph)
    }

    /// Builds a model from propagation arcs given as name pairs.
    pub fn from_arcs<'a, I>(arcs: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut builder = GraphBuilder::new();
        for (from, to) in arcs {
            builder.add_arc(from, to);
        }
        Self::from_graph(builder.build())
    }

    /// Installs an observer for sweep progress callbacks.
    pub fn set_progress_observer(&mut self, observer: Arc<dyn ProgressObserver>) {
        self.observer = Some(observer);
    }

    /// Number of packages.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.graph.contains(name)
    }

    /// Package names in id order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.graph.names()
    }

    /// The underlying graph. Part of the engine contract for custom
    /// [`MetricKind`] implementations.
    pub fn graph(&self) -> &PackageGraph {
        &self.graph
    }

    /// The SCC condensation. Part of the engine contract.
    pub fn condensation(&self) -> &Condensation {
        &self.cond
    }

    /// Strict descendant sets per SCC, built on first use and shared by the
    /// reach/impact sweeps and the coupling engine.
    pub fn descendant_index(&self) -> &[SccSet] {
        self.descendants
            .get_or_init(|| metrics::build_descendant_index(&self.cond, self.progress_observer()))
    }

    pub(crate) fn progress_observer(&self) -> Option<&dyn ProgressObserver> {
        self.observer.as_deref()
    }

    /// Returns the cached result for `kind`, computing it on first request.
    /// Concurrent calls for one kind compute exactly once.
    pub fn get_metric(&self, kind: &dyn MetricKind) -> Arc<MetricStats> {
        let cell: MetricCell = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache
                .entry(kind.key().to_string())
                .or_insert_with(|| Arc::new(OnceLock::new()))
                .clone()
        };
        cell.get_or_init(|| Arc::new(kind.compute(self))).clone()
    }

    /// View over a single package.
    pub fn view<'a>(&'a self, name: &str) -> Result<PackageView<'a>, ModelError> {
        let id = self
            .graph
            .id_of(name)
            .ok_or_else(|| ModelError::NotFound(name.to_string()))?;
        Ok(PackageView { net: self, id })
    }

    /// Lazy iterator over SCC member-name sets, in SCC id order.
    pub fn sccs(&self) -> impl Iterator<Item = Vec<&str>> {
        (0..self.cond.count() as SccId).map(move |s| self.scc_names(s))
    }

    /// SCC member sets sorted by decreasing size; equal sizes order by
    /// their first member's name so the listing is reproducible.
    pub fn sorted_clusters(&self) -> Vec<Vec<&str>> {
        let mut clusters: Vec<Vec<&str>> = self.sccs().collect();
        clusters.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(b[0])));
        clusters
    }

    fn scc_names(&self, scc: SccId) -> Vec<&str> {
        let mut ids: Vec<PackageId> = self.cond.members(scc).to_vec();
        ids.sort_unstable();
        ids.iter().map(|&id| self.graph.name_of(id)).collect()
    }

    /// Serializes the model, including every currently cached metric.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        io::save(self, path)
    }

    /// Restores a model saved with [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        io::load(path)
    }

    /// Snapshot of the cache for serialization: `(kind key, result)` pairs
    /// in key order.
    pub(crate) fn cached_metrics(&self) -> Vec<(String, Arc<MetricStats>)> {
        let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(String, Arc<MetricStats>)> = cache
            .iter()
            .filter_map(|(key, cell)| cell.get().map(|stats| (key.clone(), stats.clone())))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub(crate) fn from_loaded(
        graph: PackageGraph,
        cond: Condensation,
        cached: Vec<(String, MetricStats)>,
    ) -> Self {
        let mut cache: HashMap<String, MetricCell> = HashMap::new();
        for (key, stats) in cached {
            let cell = OnceLock::new();
            let _ = cell.set(Arc::new(stats));
            cache.insert(key, Arc::new(cell));
        }
        PackageNetwork {
            graph,
            cond,
            cache: Mutex::new(cache),
            descendants: OnceLock::new(),
            observer: None,
        }
    }
}

/// Cheap handle for per-package queries; holds only the model reference and
/// the package id.
#[derive(Clone, Copy)]
pub struct PackageView<'a> {
    net: &'a PackageNetwork,
    id: PackageId,
}

impl<'a> PackageView<'a> {
    pub fn name(&self) -> &'a str {
        self.net.graph.name_of(self.id)
    }

    pub(crate) fn id(&self) -> PackageId {
        self.id
    }

    /// Packages this one directly depends on, in arc insertion order.
    pub fn direct_dependencies(&self) -> Vec<&'a str> {
        self.names_of(self.net.graph.dependencies_of(self.id))
    }

    /// Packages directly depending on this one, in arc insertion order.
    pub fn direct_dependants(&self) -> Vec<&'a str> {
        self.names_of(self.net.graph.dependants_of(self.id))
    }

    /// All packages this one depends on through one or more arcs, sorted
    /// by name. A package inside a dependency cycle transitively depends
    /// on itself.
    pub fn transitive_dependencies(&self) -> Vec<&'a str> {
        let mut names = self.names_of(&self.net.graph.reachable(self.id, false));
        names.sort_unstable();
        names
    }

    /// All packages depending on this one through one or more arcs, sorted
    /// by name. A package inside a dependency cycle is its own transitive
    /// dependant.
    pub fn transitive_dependants(&self) -> Vec<&'a str> {
        let mut names = self.names_of(&self.net.graph.reachable(self.id, true));
        names.sort_unstable();
        names
    }

    pub fn reach(&self) -> f64 {
        self.metric_value(&Reach)
    }

    pub fn impact(&self) -> f64 {
        self.metric_value(&Impact)
    }

    pub fn surface(&self) -> f64 {
        self.metric_value(&Surface)
    }

    /// Members of this package's SCC (itself included), sorted by id.
    pub fn scc(&self) -> Vec<&'a str> {
        self.net.scc_names(self.net.cond.scc_of(self.id))
    }

    /// Coupling interface of this package over `target`: the direct
    /// dependencies of `target` through which this package influences it.
    pub fn coupling_interface_to(&self, target: &str) -> Result<Vec<&'a str>, ModelError> {
        coupling::coupling_interface(self.net, self.name(), target)
    }

    /// Coupling interface of `source` over this package.
    pub fn coupling_interface_from(&self, source: &str) -> Result<Vec<&'a str>, ModelError> {
        coupling::coupling_interface(self.net, source, self.name())
    }

    /// Interfaces of every transitive dependency over this package.
    pub fn coupling_profile(&self) -> std::collections::BTreeMap<&'a str, Vec<&'a str>> {
        coupling::coupling_profile(self.net, *self)
    }

    fn metric_value(&self, kind: &dyn MetricKind) -> f64 {
        self.net
            .get_metric(kind)
            .get(self.name())
            .expect("built-in metrics cover every package")
    }

    fn names_of(&self, ids: &[PackageId]) -> Vec<&'a str> {
        ids.iter().map(|&id| self.net.graph.name_of(id)).collect()
    }
}
