//! Transitive coupling between a package and its users.
//!
//! The coupling interface of a dependency `u` over a user `v` is the subset
//! of `v`'s direct dependencies through which `u` influences `v`. Each
//! candidate is a single membership test against the descendant sets
//! retained by the reach sweep, so an interface costs O(direct
//! dependencies of `v`).

use std::collections::BTreeMap;

use crate::model::{ModelError, PackageNetwork, PackageView};

/// Direct dependencies of `user` from which `source` is reachable, in
/// `user`'s dependency order. Empty when `source` is not a transitive
/// dependency of `user`.
pub fn coupling_interface<'a>(
    net: &'a PackageNetwork,
    source: &str,
    user: &str,
) -> Result<Vec<&'a str>, ModelError> {
    let graph = net.graph();
    let u = graph
        .id_of(source)
        .ok_or_else(|| ModelError::NotFound(source.to_string()))?;
    let v = graph
        .id_of(user)
        .ok_or_else(|| ModelError::NotFound(user.to_string()))?;

    let cond = net.condensation();
    let descendants = net.descendant_index();
    let su = cond.scc_of(u);
    let out = graph
        .dependencies_of(v)
        .iter()
        .filter(|&&d| {
            let sd = cond.scc_of(d);
            sd == su || descendants[su as usize].contains(sd)
        })
        .map(|&d| graph.name_of(d))
        .collect();
    Ok(out)
}

/// Cardinality of the coupling interface of `source` over `user`.
pub fn transitive_coupling(
    net: &PackageNetwork,
    source: &str,
    user: &str,
) -> Result<usize, ModelError> {
    Ok(coupling_interface(net, source, user)?.len())
}

/// Interface of every transitive dependency of the viewed package over it.
pub(crate) fn coupling_profile<'a>(
    net: &'a PackageNetwork,
    view: PackageView<'a>,
) -> BTreeMap<&'a str, Vec<&'a str>> {
    let graph = net.graph();
    let cond = net.condensation();
    let descendants = net.descendant_index();
    let deps = graph.dependencies_of(view.id());

    let mut out = BTreeMap::new();
    for u in graph.reachable(view.id(), false) {
        let su = cond.scc_of(u);
        let interface: Vec<&str> = deps
            .iter()
            .filter(|&&d| {
                let sd = cond.scc_of(d);
                sd == su || descendants[su as usize].contains(sd)
            })
            .map(|&d| graph.name_of(d))
            .collect();
        out.insert(graph.name_of(u), interface);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::metrics::Impact;
    use crate::model::PackageNetwork;

    /// v uses p, q and r; u flows into v through q (via s) and through r.
    fn interface_network() -> PackageNetwork {
        let mut b = GraphBuilder::new();
        b.add_dependency("v", "p");
        b.add_dependency("v", "q");
        b.add_dependency("v", "r");
        b.add_dependency("q", "s");
        b.add_dependency("s", "u");
        b.add_dependency("r", "u");
        PackageNetwork::from_graph(b.build()).unwrap()
    }

    #[test]
    fn interface_picks_the_carrying_dependencies() {
        let net = interface_network();
        let interface = coupling_interface(&net, "u", "v").unwrap();
        assert_eq!(interface, vec!["q", "r"]);
        assert_eq!(transitive_coupling(&net, "u", "v").unwrap(), 2);
    }

    #[test]
    fn direct_dependency_interfaces_itself() {
        let net = interface_network();
        assert_eq!(coupling_interface(&net, "p", "v").unwrap(), vec!["p"]);
    }

    #[test]
    fn unrelated_packages_have_an_empty_interface() {
        let net = interface_network();
        assert!(coupling_interface(&net, "v", "p").unwrap().is_empty());
    }

    #[test]
    fn unknown_names_are_not_found() {
        let net = interface_network();
        assert!(matches!(
            coupling_interface(&net, "ghost", "v"),
            Err(ModelError::NotFound(_))
        ));
        assert!(matches!(
            coupling_interface(&net, "u", "ghost"),
            Err(ModelError::NotFound(_))
        ));
    }

    #[test]
    fn profile_covers_every_transitive_dependency() {
        let net = interface_network();
        let v = net.view("v").unwrap();
        let profile = v.coupling_profile();
        assert_eq!(profile.len(), 5);
        assert_eq!(profile["u"], vec!["q", "r"]);
        assert_eq!(profile["s"], vec!["q"]);
        assert_eq!(profile["q"], vec!["q"]);
        assert_eq!(profile["p"], vec!["p"]);
    }

    #[test]
    fn coupling_totals_match_impact() {
        // The interface cardinalities of u over its users partition the
        // arc set a defect in u can traverse.
        let net =
            PackageNetwork::from_arcs([("a", "b"), ("b", "c"), ("c", "a"), ("d", "a")]).unwrap();
        let impact = net.get_metric(&Impact);
        for name in ["a", "b", "c", "d"] {
            let view = net.view(name).unwrap();
            let total: usize = view
                .transitive_dependants()
                .iter()
                .map(|user| transitive_coupling(&net, name, user).unwrap())
                .sum();
            assert_eq!(total as f64, impact.get(name).unwrap(), "package {name}");
        }
    }
}
