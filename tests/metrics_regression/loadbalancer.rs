//! Load balancer metrics regression tests

use super::helpers::*;
use serial_test::serial;
use tower_mesh_loadbalancer::{LoadBalanceStrategy, LoadBalancer};

#[test]
#[serial]
fn loadbalancer_metrics_exist() {
    init_recorder();

    let balancer = LoadBalancer::new();
    let candidates = ["a", "b", "c"];
    for strategy in [
        LoadBalanceStrategy::RoundRobin,
        LoadBalanceStrategy::Random,
        LoadBalanceStrategy::LeastConnections,
    ] {
        balancer.select("svc", &candidates, strategy);
    }

    assert_counter_exists("loadbalancer_selections_total");
    assert_metric_has_label("loadbalancer_selections_total", "strategy", "round_robin");
    assert_metric_has_label("loadbalancer_selections_total", "strategy", "random");
    assert_metric_has_label(
        "loadbalancer_selections_total",
        "strategy",
        "least_connections",
    );
}
