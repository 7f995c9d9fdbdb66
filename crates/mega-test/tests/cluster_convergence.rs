//! Cluster convergence tests
//!
//! Aliases allocated on one node must become visible, with the same ID, on
//! every other node once broadcasts have been delivered.

use mega_test::{assert_converged, init_test_logging, TestCluster, VerificationError};
use mega_types::VlanId;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_alias_propagates_to_every_peer() {
    init_test_logging();
    let cluster = TestCluster::start(3).await.unwrap();

    let net = cluster
        .node(0)
        .parser()
        .parse("exercise", "br0,DMZ,virtio-net-pci")
        .await
        .unwrap();
    cluster.settle().await;

    let vlan = assert_converged(&cluster, "exercise", "DMZ").unwrap();
    assert_eq!(vlan, net.vlan);

    // peers answer locally with the propagated ID
    for node in &cluster.nodes()[1..] {
        let again = node.parser().parse("exercise", "DMZ").await.unwrap();
        assert_eq!(again.vlan, vlan);
    }
}

#[tokio::test]
async fn test_learned_alias_is_a_plain_lookup() {
    let cluster = TestCluster::start(2).await.unwrap();

    let vlan = cluster.node(0).resolver().resolve("ns", "WEB").await.unwrap();
    cluster.settle().await;

    let peer = cluster.node(1);
    assert_eq!(peer.resolver().resolve("ns", "WEB").await.unwrap(), vlan);
    cluster.settle().await;

    // the peer never allocated, so it never wrote a table
    assert!(!peer.config().alias_table_path().exists());
    assert!(cluster.node(0).config().alias_table_path().exists());
}

#[tokio::test]
async fn test_namespaces_stay_separate_across_cluster() {
    let cluster = TestCluster::start(2).await.unwrap();

    let a = cluster.node(0).resolver().resolve("alpha", "DMZ").await.unwrap();
    cluster.settle().await;
    let b = cluster.node(1).resolver().resolve("beta", "DMZ").await.unwrap();
    cluster.settle().await;

    assert_eq!(assert_converged(&cluster, "alpha", "DMZ").unwrap(), a);
    assert_eq!(assert_converged(&cluster, "beta", "DMZ").unwrap(), b);
    assert_eq!(
        cluster.node(0).allocator().print_vlan("beta", a),
        "alpha//DMZ"
    );
}

#[tokio::test]
async fn test_divergent_binding_is_detected() {
    let cluster = TestCluster::start(2).await.unwrap();

    // node1 binds 101 to another alias before hearing from node0
    let first = cluster.node(0);
    let second = cluster.node(1);
    second
        .apply_registration(r#"namespace ns vlans add "OTHER" 101"#)
        .unwrap();
    let on_first = first.resolver().resolve("ns", "DMZ").await.unwrap();
    cluster.settle().await;

    // node1 already had 101 bound to OTHER, so the registration was refused
    assert_eq!(on_first, VlanId::new(101).unwrap());
    assert_eq!(first.resolver().broadcaster().failures(), 1);
    assert!(matches!(
        assert_converged(&cluster, "ns", "DMZ"),
        Err(VerificationError::Missing { .. })
    ));
}

#[tokio::test]
async fn test_repeat_registration_is_noop() {
    let cluster = TestCluster::start(2).await.unwrap();
    let cmd = r#"namespace ns vlans add "DMZ" 200"#;

    assert!(cluster.node(1).apply_registration(cmd).unwrap());
    assert!(!cluster.node(1).apply_registration(cmd).unwrap());
    assert_eq!(
        cluster.node(1).vlan_info(Some("ns")),
        "Alias VLAN\nDMZ   200\n"
    );
}

#[tokio::test]
async fn test_namespace_with_whitespace_propagates() {
    let cluster = TestCluster::start(2).await.unwrap();

    let vlan = cluster.node(0).resolver().resolve("my ns", "DMZ").await.unwrap();
    cluster.settle().await;

    assert_eq!(assert_converged(&cluster, "my ns", "DMZ").unwrap(), vlan);
    assert_eq!(cluster.node(0).resolver().broadcaster().failures(), 0);
}
