use std::collections::HashMap;
use tower_mesh_loadbalancer::{LoadBalanceStrategy, LoadBalancer};
use tower_mesh_registry::ServiceInstance;

fn instances(ids: &[&str]) -> Vec<ServiceInstance> {
    ids.iter()
        .map(|id| ServiceInstance::new(*id, "users", "10.0.0.1", 80))
        .collect()
}

#[test]
fn round_robin_visits_each_once_per_cycle() {
    let balancer = LoadBalancer::new();
    let candidates = instances(&["a", "b", "c", "d"]);

    let picks: Vec<&str> = (0..12)
        .map(|_| {
            balancer
                .select("users", &candidates, LoadBalanceStrategy::RoundRobin)
                .unwrap()
                .id()
        })
        .collect();

    for cycle in picks.chunks(4) {
        let mut sorted = cycle.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec!["a", "b", "c", "d"]);
        assert_eq!(cycle, &picks[..4]);
    }
}

#[test]
fn round_robin_cursor_survives_scaling() {
    let balancer = LoadBalancer::new();
    let three = instances(&["a", "b", "c"]);
    let four = instances(&["a", "b", "c", "d"]);

    assert_eq!(balancer.select("users", &three, LoadBalanceStrategy::RoundRobin).unwrap().id(), "a");
    assert_eq!(balancer.select("users", &three, LoadBalanceStrategy::RoundRobin).unwrap().id(), "b");
    // A new instance joins; rotation continues instead of restarting at "a".
    assert_eq!(balancer.select("users", &four, LoadBalanceStrategy::RoundRobin).unwrap().id(), "c");
    assert_eq!(balancer.select("users", &four, LoadBalanceStrategy::RoundRobin).unwrap().id(), "d");
}

#[test]
fn round_robin_cursors_are_per_key() {
    let balancer = LoadBalancer::new();
    let candidates = instances(&["a", "b"]);

    assert_eq!(balancer.select("users", &candidates, LoadBalanceStrategy::RoundRobin).unwrap().id(), "a");
    assert_eq!(balancer.select("orders", &candidates, LoadBalanceStrategy::RoundRobin).unwrap().id(), "a");
    assert_eq!(balancer.select("users", &candidates, LoadBalanceStrategy::RoundRobin).unwrap().id(), "b");

    balancer.reset_cursor("users");
    assert_eq!(balancer.select("users", &candidates, LoadBalanceStrategy::RoundRobin).unwrap().id(), "a");
}

#[test]
fn least_connections_picks_minimum() {
    let balancer = LoadBalancer::new();
    let candidates = instances(&["A", "B", "C"]);
    balancer.connections().set("A", 3);
    balancer.connections().set("B", 1);
    balancer.connections().set("C", 2);

    let chosen = balancer
        .select("users", &candidates, LoadBalanceStrategy::LeastConnections)
        .unwrap();
    assert_eq!(chosen.id(), "B");
}

#[test]
fn least_connections_ties_go_to_first_seen() {
    let balancer = LoadBalancer::new();
    let candidates = instances(&["x", "y", "z"]);
    balancer.connections().set("x", 2);

    let chosen = balancer
        .select("users", &candidates, LoadBalanceStrategy::LeastConnections)
        .unwrap();
    assert_eq!(chosen.id(), "y");
}

#[test]
fn random_covers_every_candidate() {
    let balancer = LoadBalancer::new();
    let candidates = instances(&["a", "b", "c"]);
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for _ in 0..3000 {
        let id = balancer
            .select("users", &candidates, LoadBalanceStrategy::Random)
            .unwrap()
            .id();
        *counts.entry(id).or_default() += 1;
    }

    assert_eq!(counts.len(), 3);
    // Uniform: each should be near 1000.
    assert!(counts.values().all(|&n| (700..=1300).contains(&n)), "{counts:?}");
}

#[test]
fn empty_and_single_candidate_lists() {
    let balancer = LoadBalancer::new();
    let none: Vec<ServiceInstance> = Vec::new();
    let one = instances(&["only"]);

    for strategy in [
        LoadBalanceStrategy::RoundRobin,
        LoadBalanceStrategy::Random,
        LoadBalanceStrategy::LeastConnections,
    ] {
        assert!(balancer.select("users", &none, strategy).is_none());
        assert_eq!(balancer.select("users", &one, strategy).unwrap().id(), "only");
    }
}

#[test]
fn strategies_parse_from_config_strings() {
    assert_eq!(
        "least-connections".parse::<LoadBalanceStrategy>().unwrap(),
        LoadBalanceStrategy::LeastConnections
    );
    assert_eq!(
        "ROUND_ROBIN".parse::<LoadBalanceStrategy>().unwrap(),
        LoadBalanceStrategy::RoundRobin
    );
    assert!("weighted".parse::<LoadBalanceStrategy>().is_err());
    assert_eq!(LoadBalanceStrategy::default(), LoadBalanceStrategy::RoundRobin);
}
