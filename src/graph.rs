//! Immutable package dependency graph.
//!
//! Packages are interned to dense integer ids and adjacency is stored in
//! CSR form (offset + target arrays), one array per direction. Arcs are
//! stored in propagation orientation: an arc `u -> v` records that a defect
//! in `u` reaches `v`, i.e. `v` directly depends on `u`.

use std::collections::{HashMap, HashSet};

/// Dense package identifier in `[0, N)`.
pub type PackageId = u32;

/// Compressed sparse row adjacency: `offsets` has `N + 1` entries and the
/// neighbors of node `u` are `targets[offsets[u]..offsets[u + 1]]`, in
/// first-insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Csr {
    pub(crate) offsets: Vec<u32>,
    pub(crate) targets: Vec<PackageId>,
}

impl Csr {
    /// Builds a CSR from per-source neighbor lists.
    pub(crate) fn from_lists(lists: &[Vec<PackageId>]) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut total = 0u32;
        offsets.push(0);
        for list in lists {
            total += list.len() as u32;
            offsets.push(total);
        }
        let mut targets = Vec::with_capacity(total as usize);
        for list in lists {
            targets.extend_from_slice(list);
        }
        Csr { offsets, targets }
    }

    pub(crate) fn neighbors(&self, u: PackageId) -> &[PackageId] {
        let lo = self.offsets[u as usize] as usize;
        let hi = self.offsets[u as usize + 1] as usize;
        &self.targets[lo..hi]
    }
}

/// Immutable labeled directed graph over interned package names.
///
/// Built once via [`GraphBuilder`]; no mutation afterwards. The forward
/// direction holds direct dependants, the reverse direction direct
/// dependencies.
#[derive(Debug, Clone)]
pub struct PackageGraph {
    names: Vec<String>,
    ids: HashMap<String, PackageId>,
    fwd: Csr,
    rev: Csr,
}

impl PackageGraph {
    /// Number of packages.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True when the graph holds no packages.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of stored arcs.
    pub fn arc_count(&self) -> usize {
        self.fwd.targets.len()
    }

    /// Id of `name`, if registered.
    pub fn id_of(&self, name: &str) -> Option<PackageId> {
        self.ids.get(name).copied()
    }

    /// Name of `id`. Panics on out-of-range ids, which cannot be produced
    /// by this crate's public surface.
    pub fn name_of(&self, id: PackageId) -> &str {
        &self.names[id as usize]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }

    /// Package names in id order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Direct dependants of `id` (packages a defect in `id` reaches in one
    /// arc), in insertion order.
    pub fn dependants_of(&self, id: PackageId) -> &[PackageId] {
        self.fwd.neighbors(id)
    }

    /// Direct dependencies of `id`, in insertion order.
    pub fn dependencies_of(&self, id: PackageId) -> &[PackageId] {
        self.rev.neighbors(id)
    }

    /// All stored arcs `(u, v)` in id order of the tail.
    pub fn arcs(&self) -> impl Iterator<Item = (PackageId, PackageId)> + '_ {
        (0..self.len() as u32)
            .flat_map(move |u| self.fwd.neighbors(u).iter().map(move |&v| (u, v)))
    }

    /// Packages reachable from `start` by one or more arcs along the
    /// chosen direction. `start` itself appears in the result exactly when
    /// it lies on a cycle.
    pub(crate) fn reachable(&self, start: PackageId, forward: bool) -> Vec<PackageId> {
        let adj = if forward { &self.fwd } else { &self.rev };
        let mut visited = vec![false; self.len()];
        visited[start as usize] = true;
        let mut queue = vec![start];
        let mut head = 0;
        let mut out = Vec::new();
        let mut start_on_cycle = false;
        while head < queue.len() {
            let cur = queue[head];
            head += 1;
            for &next in adj.neighbors(cur) {
                if next == start {
                    start_on_cycle = true;
                }
                if !visited[next as usize] {
                    visited[next as usize] = true;
                    out.push(next);
                    queue.push(next);
                }
            }
        }
        if start_on_cycle {
            out.push(start);
        }
        out
    }

    pub(crate) fn fwd(&self) -> &Csr {
        &self.fwd
    }

    pub(crate) fn rev(&self) -> &Csr {
        &self.rev
    }

    /// Reassembles a graph from raw parts, re-deriving the name→id map.
    /// Used by the model loader; `validate` has already checked the arrays.
    pub(crate) fn from_parts(names: Vec<String>, fwd: Csr, rev: Csr) -> Self {
        let ids = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i as PackageId))
            .collect();
        PackageGraph {
            names,
            ids,
            fwd,
            rev,
        }
    }
}

/// Incremental builder for [`PackageGraph`].
///
/// Names are interned on first sight; duplicate arcs and self-loops are
/// silently collapsed, preserving the first-insertion order of the
/// survivors.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    names: Vec<String>,
    ids: HashMap<String, PackageId>,
    arcs: Vec<(PackageId, PackageId)>,
    seen: HashSet<(PackageId, PackageId)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, returning its id. Idempotent.
    pub fn add_package(&mut self, name: &str) -> PackageId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as PackageId;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Records that `dependant` directly depends on `dependency`,
    /// registering both names. Stored as the propagation arc
    /// `dependency -> dependant`.
    pub fn add_dependency(&mut self, dependant: &str, dependency: &str) {
        let head = self.add_package(dependant);
        let tail = self.add_package(dependency);
        self.push_arc(tail, head);
    }

    /// Records the propagation arc `from -> to` (`to` depends on `from`).
    pub fn add_arc(&mut self, from: &str, to: &str) {
        let from = self.add_package(from);
        let to = self.add_package(to);
        self.push_arc(from, to);
    }

    fn push_arc(&mut self, from: PackageId, to: PackageId) {
        if from == to {
            return;
        }
        if self.seen.insert((from, to)) {
            self.arcs.push((from, to));
        }
    }

    pub fn package_count(&self) -> usize {
        self.names.len()
    }

    /// Finalizes the CSR arrays.
    pub fn build(self) -> PackageGraph {
        let n = self.names.len();
        let mut fwd_lists: Vec<Vec<PackageId>> = vec![Vec::new(); n];
        let mut rev_lists: Vec<Vec<PackageId>> = vec![Vec::new(); n];
        for &(from, to) in &self.arcs {
            fwd_lists[from as usize].push(to);
            rev_lists[to as usize].push(from);
        }
        PackageGraph {
            names: self.names,
            ids: self.ids,
            fwd: Csr::from_lists(&fwd_lists),
            rev: Csr::from_lists(&rev_lists),
        }
    }
}

/// Builds a graph from propagation arcs given as name pairs; a convenience
/// for callers that already materialized a directed graph elsewhere.
pub fn graph_from_arcs<'a, I>(arcs: I) -> PackageGraph
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut builder = GraphBuilder::new();
    for (from, to) in arcs {
        builder.add_arc(from, to);
    }
    builder.build()
}
