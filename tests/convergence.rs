//! End-to-end convergence runs over real localhost sockets: one relay task
//! plus one task per router, every port ephemeral so parallel test runs
//! never collide.

use dv_sim::DistanceVector;
use dv_sim::config::SimConfig;
use dv_sim::sim::{self, SimReport};
use dv_sim::topology::Topology;

fn test_config() -> SimConfig {
    SimConfig {
        relay_port: 0,
        node_base_port: 0,
        recv_timeout_ms: 25,
        join_timeout_ms: 2000,
        ..SimConfig::default()
    }
}

fn distances<'a>(report: &'a SimReport, id: &str) -> &'a DistanceVector {
    &report
        .nodes
        .iter()
        .find(|n| n.id == id)
        .unwrap_or_else(|| panic!("no report for router {id}"))
        .vector
}

#[tokio::test(flavor = "multi_thread")]
async fn triangle_converges_to_cheapest_paths() {
    // A-B costs 1, B-C costs 2, A-C costs 5: the direct A-C link loses to
    // the two-hop route through B.
    let topology = Topology::parse("A:<B,1>:<C,5>\nB:<A,1>:<C,2>\nC:<A,5>:<B,2>\n").unwrap();
    let report = sim::run(topology, &test_config()).await.unwrap();

    assert_eq!(report.relay.joined, 3);

    let a = distances(&report, "A");
    assert_eq!(a["A"], 0);
    assert_eq!(a["B"], 1);
    assert_eq!(a["C"], 3);

    let b = distances(&report, "B");
    assert_eq!(b["A"], 1);
    assert_eq!(b["C"], 2);

    let c = distances(&report, "C");
    assert_eq!(c["A"], 3);
    assert_eq!(c["B"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn line_topology_learns_routers_it_never_heard_of() {
    // A-B-C-D in a line, unit costs. A's row does not even mention C or D,
    // so those entries must be created by relaxation alone.
    let topology =
        Topology::parse("A:<B,1>\nB:<A,1>:<C,1>\nC:<B,1>:<D,1>\nD:<C,1>\n").unwrap();
    let report = sim::run(topology, &test_config()).await.unwrap();

    let a = distances(&report, "A");
    assert_eq!(a["B"], 1);
    assert_eq!(a["C"], 2);
    assert_eq!(a["D"], 3);

    let d = distances(&report, "D");
    assert_eq!(d["A"], 3);
    assert_eq!(d["B"], 2);
    assert_eq!(d["C"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_markers_survive_when_no_path_exists() {
    // B is an island: A and C link only to each other.
    let topology =
        Topology::parse("A:<B,-1>:<C,2>\nB:<A,-1>:<C,-1>\nC:<A,2>:<B,-1>\n").unwrap();
    let report = sim::run(topology, &test_config()).await.unwrap();

    let a = distances(&report, "A");
    assert_eq!(a["C"], 2);
    assert_eq!(a["B"], -1);

    let b = distances(&report, "B");
    assert_eq!(b["A"], -1);
    assert_eq!(b["C"], -1);
}
