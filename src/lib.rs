//! # depreach - Dependency Network Vulnerability Analysis
//!
//! A library for analyzing how defects propagate through software package
//! dependency networks: directed graphs where each package is linked to the
//! packages depending on it.
//!
//! ## Overview
//!
//! depreach answers three families of questions about a network:
//!
//! 1. **Reachability** - What does a package depend on, and what depends on
//!    it, directly or transitively?
//! 2. **Propagation cost** - How expensive is a defect in each package,
//!    under several cost metrics (Reach, Impact, Surface, degree counts)?
//! 3. **Immunization** - How much does the network-wide expected failure
//!    cost drop when a chosen set of packages stops propagating defects?
//!
//! The engine condenses the raw graph into its SCC quotient DAG once, then
//! computes whole-network metrics with a single reverse-topological sweep
//! per metric, caching each result inside the model.
//!
//! ## Usage
//!
//! ```
//! use depreach::{failure_vulnerability, PackageNetwork, Reach};
//!
//! // a, b and c form a dependency cycle; d depends on a.
//! let net = PackageNetwork::from_arcs([
//!     ("a", "b"),
//!     ("b", "c"),
//!     ("c", "a"),
//!     ("d", "a"),
//! ])?;
//!
//! let reach = net.get_metric(&Reach);
//! assert_eq!(reach.get("d"), Some(4.0));
//! assert_eq!(net.sorted_clusters()[0], vec!["a", "b", "c"]);
//!
//! let phi = failure_vulnerability(&net, &Reach);
//! assert!((phi - 13.0 / 4.0).abs() < 1e-12);
//! # Ok::<(), depreach::ModelError>(())
//! ```
//!
//! Arcs are stored in propagation orientation: the arc `u -> v` records
//! that `v` directly depends on `u`, so a defect in `u` reaches `v`.
//! [`GraphBuilder::add_dependency`] accepts the opposite, more common
//! phrasing and flips it on the way in.

pub mod bitset;
pub mod condense;
pub mod coupling;
pub mod graph;
pub mod ingest;
mod io;
pub mod metrics;
pub mod model;
pub mod progress;
pub mod stats;
pub mod vulnerability;

pub use bitset::SccSet;
pub use condense::{BuildError, Condensation, SccId};
pub use coupling::{coupling_interface, transitive_coupling};
pub use graph::{graph_from_arcs, GraphBuilder, PackageGraph, PackageId};
pub use ingest::{graph_from_adjacency_path, graph_from_adjacency_reader, IngestError};
pub use metrics::{
    DependenciesCount, DependentsCount, Impact, MetricKind, Reach, Surface,
};
pub use model::{ModelError, PackageNetwork, PackageView};
pub use progress::ProgressObserver;
pub use stats::{MetricStats, StatsError, Summary};
pub use vulnerability::{
    failure_vulnerability, immunization_delta, DeltaAlgorithm, ImmunizationOutcome,
    VulnerabilityError,
};
