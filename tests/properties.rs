//! Property-based invariants over randomized networks.

use depreach::{
    immunization_delta, transitive_coupling, DeltaAlgorithm, GraphBuilder, Impact, MetricStats,
    PackageNetwork, Reach, Surface,
};
use proptest::prelude::*;

fn build(n: usize, edges: &[(usize, usize)]) -> PackageNetwork {
    let names: Vec<String> = (0..n).map(|i| format!("p{i:02}")).collect();
    let mut b = GraphBuilder::new();
    for name in &names {
        b.add_package(name);
    }
    for &(u, v) in edges {
        b.add_arc(&names[u], &names[v]);
    }
    PackageNetwork::from_graph(b.build()).unwrap()
}

/// Random directed graphs: up to 20 nodes with up to three arcs per node
/// on average, cycles very much included.
fn arb_topology() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..20).prop_flat_map(|n| {
        let edges = proptest::collection::vec((0..n, 0..n), 0..3 * n);
        (Just(n), edges)
    })
}

/// A topology plus two boolean masks used to derive nested target sets.
fn arb_topology_with_masks(
) -> impl Strategy<Value = (usize, Vec<(usize, usize)>, Vec<bool>, Vec<bool>)> {
    (2usize..16).prop_flat_map(|n| {
        let edges = proptest::collection::vec((0..n, 0..n), 0..3 * n);
        let outer = proptest::collection::vec(any::<bool>(), n);
        let inner = proptest::collection::vec(any::<bool>(), n);
        (Just(n), edges, outer, inner)
    })
}

/// Closure size including the package itself, from a transitive set that
/// contains the package only when it lies on a cycle.
fn closure_len(name: &str, reachable: &[&str]) -> usize {
    if reachable.contains(&name) {
        reachable.len()
    } else {
        reachable.len() + 1
    }
}

proptest! {
    #[test]
    fn reach_and_surface_count_their_closures((n, edges) in arb_topology()) {
        let net = build(n, &edges);
        let reach = net.get_metric(&Reach);
        let surface = net.get_metric(&Surface);
        for name in net.iter() {
            let view = net.view(name).unwrap();
            let dependants = view.transitive_dependants();
            prop_assert_eq!(reach.get(name), Some(closure_len(name, &dependants) as f64));
            let dependencies = view.transitive_dependencies();
            prop_assert_eq!(surface.get(name), Some(closure_len(name, &dependencies) as f64));
        }
    }

    #[test]
    fn scc_members_agree_on_every_metric((n, edges) in arb_topology()) {
        let net = build(n, &edges);
        let reach = net.get_metric(&Reach);
        let impact = net.get_metric(&Impact);
        let surface = net.get_metric(&Surface);
        for cluster in net.sccs() {
            let head = cluster[0];
            for &member in &cluster {
                prop_assert_eq!(reach.get(member), reach.get(head));
                prop_assert_eq!(impact.get(member), impact.get(head));
                prop_assert_eq!(surface.get(member), surface.get(head));
                let view = net.view(member).unwrap();
                let head_view = net.view(head).unwrap();
                prop_assert_eq!(view.transitive_dependants(), head_view.transitive_dependants());
            }
        }
    }

    #[test]
    fn coupling_totals_equal_impact((n, edges) in arb_topology()) {
        let net = build(n, &edges);
        let impact = net.get_metric(&Impact);
        for name in net.iter() {
            let view = net.view(name).unwrap();
            let total: usize = view
                .transitive_dependants()
                .iter()
                .map(|user| transitive_coupling(&net, name, user).unwrap())
                .sum();
            prop_assert_eq!(Some(total as f64), impact.get(name), "package {}", name);
        }
    }

    #[test]
    fn immunization_delta_is_nonnegative_and_monotone(
        (n, edges, outer, inner) in arb_topology_with_masks()
    ) {
        let net = build(n, &edges);
        let names: Vec<String> = net.iter().map(str::to_string).collect();
        let large: Vec<&str> = names
            .iter()
            .enumerate()
            .filter(|&(i, _)| outer[i])
            .map(|(_, n)| n.as_str())
            .collect();
        let small: Vec<&str> = names
            .iter()
            .enumerate()
            .filter(|&(i, _)| outer[i] && inner[i])
            .map(|(_, n)| n.as_str())
            .collect();

        let d_small =
            immunization_delta(&net, small.iter().copied(), &Reach, DeltaAlgorithm::Network)
                .unwrap()
                .delta();
        let d_large =
            immunization_delta(&net, large.iter().copied(), &Reach, DeltaAlgorithm::Network)
                .unwrap()
                .delta();
        prop_assert!(d_small >= 0.0);
        prop_assert!(d_small <= d_large + 1e-9);
    }

    #[test]
    fn analytic_delta_matches_the_network_rebuild(
        (n, edges, outer, _) in arb_topology_with_masks()
    ) {
        let net = build(n, &edges);
        let names: Vec<String> = net.iter().map(str::to_string).collect();
        let targets: Vec<&str> = names
            .iter()
            .enumerate()
            .filter(|&(i, _)| outer[i])
            .map(|(_, n)| n.as_str())
            .collect();

        let network =
            immunization_delta(&net, targets.iter().copied(), &Reach, DeltaAlgorithm::Network)
                .unwrap();
        let analytic =
            immunization_delta(&net, targets.iter().copied(), &Reach, DeltaAlgorithm::Analytic)
                .unwrap();
        let scale = network.delta().abs().max(1.0);
        prop_assert!(
            (network.delta() - analytic.delta()).abs() <= 1e-9 * scale,
            "network {} vs analytic {}",
            network.delta(),
            analytic.delta()
        );
    }

    #[test]
    fn stats_arithmetic_laws_hold_on_integer_values(
        values in proptest::collection::vec((-1000i32..1000, -1000i32..1000, -1000i32..1000), 1..30)
    ) {
        let name = |i: usize| format!("p{i:02}");
        let a = MetricStats::from_values(
            values.iter().enumerate().map(|(i, t)| (name(i), t.0 as f64)),
        );
        let b = MetricStats::from_values(
            values.iter().enumerate().map(|(i, t)| (name(i), t.1 as f64)),
        );
        let c = MetricStats::from_values(
            values.iter().enumerate().map(|(i, t)| (name(i), t.2 as f64)),
        );

        // Integer-valued operands keep f64 arithmetic exact, so the laws
        // hold bit-for-bit.
        prop_assert_eq!(a.add(&b).unwrap(), b.add(&a).unwrap());
        prop_assert_eq!(a.mul(&b).unwrap(), b.mul(&a).unwrap());
        prop_assert_eq!(
            a.add(&b).unwrap().add(&c).unwrap(),
            a.add(&b.add(&c).unwrap()).unwrap()
        );
        prop_assert_eq!(
            a.mul(&b).unwrap().mul(&c).unwrap(),
            a.mul(&b.mul(&c).unwrap()).unwrap()
        );
        prop_assert_eq!(a.add_scalar(0.0), a.clone());
        prop_assert_eq!(a.mul_scalar(1.0), a.clone());
        prop_assert_eq!(a.pow_scalar(1.0), a.clone());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn save_load_answers_queries_identically((n, edges) in arb_topology()) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("net.olv");

        let net = build(n, &edges);
        let reach = net.get_metric(&Reach);
        let impact = net.get_metric(&Impact);
        net.save(&path).unwrap();

        let loaded = PackageNetwork::load(&path).unwrap();
        prop_assert_eq!(loaded.len(), net.len());
        prop_assert_eq!(
            loaded.iter().collect::<Vec<_>>(),
            net.iter().collect::<Vec<_>>()
        );
        prop_assert_eq!(loaded.sorted_clusters(), net.sorted_clusters());
        prop_assert_eq!(&*loaded.get_metric(&Reach), &*reach);
        prop_assert_eq!(&*loaded.get_metric(&Impact), &*impact);
        prop_assert_eq!(&*loaded.get_metric(&Surface), &*net.get_metric(&Surface));
        for name in net.iter() {
            let a = net.view(name).unwrap();
            let b = loaded.view(name).unwrap();
            prop_assert_eq!(a.transitive_dependants(), b.transitive_dependants());
            prop_assert_eq!(a.direct_dependencies(), b.direct_dependencies());
            prop_assert_eq!(a.scc(), b.scc());
        }
    }
}
