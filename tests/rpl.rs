use rstest::rstest;

use smolrpl::iface::rpl::{DagState, Rank};
use smolrpl::iface::{RoutingDriver, RplConfig};
use smolrpl::time::Duration;
use smolrpl::wire::ipv6::DEFAULT_HOP_LIMIT;
use smolrpl::wire::{Ipv6AddressExt, RoutedPacket, RplModeOfOperation};

mod sim;

const ONE_HOUR: Duration = Duration::from_secs(60 * 60);
const FIFTEEN_MINUTES: Duration = Duration::from_secs(60 * 15);

fn config(mop: RplModeOfOperation) -> RplConfig {
    RplConfig::default().set_mode_of_operation(mop)
}

fn has_source_route(sim: &sim::NetworkSim, id: usize) -> bool {
    let addr = sim.nodes()[id].ip_address();
    sim.nodes()[0]
        .rpl
        .source_routes()
        .iter()
        .any(|(_, node)| node.address() == addr)
}

/// A root alone. With the default Trickle parameters, it sends about 10 DIOs in an hour.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn root_node_only(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::NetworkSim::new();
    sim.create_root(config(mop));

    sim.run(Duration::from_millis(500), ONE_HOUR);

    assert!(!sim.msgs().is_empty());

    let dio_count = sim.msgs().iter().filter(|m| m.is_dio()).count();
    assert!((9..=11).contains(&dio_count), "{dio_count} DIOs");

    for msg in sim.msgs() {
        assert!(msg.is_dio() && msg.is_broadcast());
    }
}

/// A node out of range of any DODAG solicits one every 30 seconds on average.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn normal_node_without_dodag(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::NetworkSim::new();
    sim.create_node(config(mop));

    sim.run(Duration::from_millis(500), ONE_HOUR);

    let dis_count = sim.msgs().iter().filter(|m| m.is_dis()).count();
    assert!((100..=140).contains(&dis_count), "{dis_count} DIS");

    for msg in sim.msgs() {
        assert!(msg.is_dis() && msg.is_broadcast());
    }
    assert!(!sim.nodes()[0].rpl.has_joined());
}

/// A node in range of the root joins it. With downward routes, it becomes reachable after one
/// DAO/DAO-ACK exchange and the root has a source route to it.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn root_and_normal_node(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::topology(sim::NetworkSim::new(), config(mop), 1, 1);

    sim.run(Duration::from_millis(500), FIFTEEN_MINUTES);

    let root = &sim.nodes()[0];
    let node = &sim.nodes()[1];
    assert!(RoutingDriver::is_root(&root.rpl));
    assert!(node.rpl.has_joined());
    assert!(!RoutingDriver::is_root(&node.rpl));
    assert!(node.rpl.dag().rank > root.rpl.dag().rank);
    assert!(!node.rpl.dag().rank.is_infinite());
    assert_eq!(node.rpl.dag().preferred_parent, Some(root.hardware_addr));
    assert_eq!(node.rpl.root_address(), root.rpl.root_address());

    // Both advertise the DODAG.
    assert!(sim.msgs_from(0).any(|m| m.is_dio()));
    assert!(sim.msgs_from(1).any(|m| m.is_dio() && m.is_broadcast()));

    let dao_count = sim.msgs().iter().filter(|m| m.is_dao()).count();
    let dao_ack_count = sim.msgs().iter().filter(|m| m.is_dao_ack()).count();
    match mop {
        RplModeOfOperation::NonStoringMode => {
            assert!(node.rpl.is_reachable());
            assert_eq!(node.rpl.dag().state, DagState::Reachable);
            assert!(dao_count >= 1);
            assert_eq!(dao_count, dao_ack_count);
            assert!(has_source_route(&sim, 1));
        }
        _ => {
            assert_eq!(node.rpl.dag().state, DagState::Joined);
            assert_eq!(dao_count, 0);
            assert_eq!(dao_ack_count, 0);
            assert_eq!(root.rpl.source_routes().num_nodes(), 0);
        }
    }

    // DAOs carry the RPL option on their way up, DAO-ACKs a source route on their way down.
    for msg in sim.msgs() {
        assert!(msg.is_dio() || msg.is_dis() || msg.is_dao() || msg.is_dao_ack());
        if msg.is_dao() {
            assert!(msg.has_hbh());
        }
        if msg.is_dao_ack() {
            assert!(msg.has_routing());
        }
    }
}

#[rstest]
#[case::with_ack(true)]
#[case::without_ack(false)]
fn dao_acknowledgements(#[case] with_ack: bool) {
    let config = config(RplModeOfOperation::NonStoringMode).set_with_dao_ack(with_ack);
    let mut sim = sim::topology(sim::NetworkSim::new(), config, 1, 1);

    sim.run(Duration::from_millis(500), Duration::from_secs(60 * 30));

    assert!(sim.nodes()[1].rpl.is_reachable());
    assert!(has_source_route(&sim, 1));

    let dao_count = sim.msgs().iter().filter(|m| m.is_dao()).count();
    let dao_ack_count = sim.msgs().iter().filter(|m| m.is_dao_ack()).count();
    if with_ack {
        assert!(sim.msgs().iter().filter_map(|m| m.dao()).all(|dao| dao.expect_ack));
        assert_eq!(dao_count, dao_ack_count);
    } else {
        // The root increments its DTSN every 4 DIOs, making the node refresh its route.
        assert!(sim.msgs().iter().filter_map(|m| m.dao()).all(|dao| !dao.expect_ack));
        assert!(dao_count >= 2, "{dao_count} DAOs");
        assert_eq!(dao_ack_count, 0);
    }
}

/// A node two hops away from the root joins through the node in between. The root reaches it
/// along a source route.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn multi_hop(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::topology(sim::NetworkSim::new(), config(mop), 1, 2);

    sim.run(Duration::from_millis(500), Duration::from_secs(60 * 30));

    let middle = &sim.nodes()[1];
    let far = &sim.nodes()[2];
    assert!(middle.rpl.has_joined());
    assert!(far.rpl.has_joined());
    assert_eq!(far.rpl.dag().preferred_parent, Some(middle.hardware_addr));
    assert!(far.rpl.dag().rank > middle.rpl.dag().rank);
    assert!(middle.rpl.dag().rank > Rank(128));

    if mop != RplModeOfOperation::NonStoringMode {
        return;
    }

    assert!(far.rpl.is_reachable());
    assert!(has_source_route(&sim, 1));
    assert!(has_source_route(&sim, 2));

    // The DAO-ACKs to the far node go through the middle one.
    let far_addr = far.ip_address();
    let middle_addr = middle.ip_address();
    assert!(sim
        .msgs()
        .iter()
        .filter(|m| m.is_dao_ack() && m.transmit.dst_addr == far_addr)
        .all(|m| m.to == middle.hardware_addr));

    let root = &sim.nodes()[0].rpl;
    let mut packet = RoutedPacket::new(root.global_address().unwrap(), far_addr, DEFAULT_HOP_LIMIT);
    assert!(RoutingDriver::ext_header_update(root_mut(&mut sim), &mut packet));
    assert_eq!(packet.ip.dst_addr, middle_addr);
    let srh = packet.source_route().unwrap();
    assert_eq!(srh.segments_left, 1);
    assert_eq!(&srh.addresses[..], &[far_addr]);

    let root = &sim.nodes()[0].rpl;
    assert_eq!(
        root.ext_header_srh_get_next_hop(&packet),
        Some(middle_addr.to_link_local())
    );

    // The middle node forwards it to the far node.
    let middle = &sim.nodes()[1].rpl;
    assert!(middle.ext_header_srh_update(&mut packet));
    assert_eq!(packet.ip.dst_addr, far_addr);
}

fn root_mut(sim: &mut sim::NetworkSim) -> &mut smolrpl::iface::Rpl {
    &mut sim.nodes_mut()[0].rpl
}

/// A node that loses its parent leaves the DODAG, and joins it again once back in range.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn normal_node_moved_out_of_range(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::topology(sim::NetworkSim::new(), config(mop), 1, 1);

    sim.run(Duration::from_millis(500), FIFTEEN_MINUTES);
    assert!(sim.nodes()[1].rpl.has_joined());

    sim.clear_msgs();
    sim.nodes_mut()[1].set_position(sim::Position((1000., 0.)));
    sim.run(Duration::from_millis(500), ONE_HOUR);

    let node = &sim.nodes()[1];
    assert!(!node.rpl.instance().used);
    assert!(!node.rpl.has_joined());
    assert_eq!(node.rpl.global_address(), None);
    assert!(sim.msgs_from(1).any(|m| m.is_dis()));

    sim.clear_msgs();
    sim.nodes_mut()[1].set_position(sim::Position((100., 0.)));
    sim.run(Duration::from_millis(500), ONE_HOUR);

    let node = &sim.nodes()[1];
    assert!(node.rpl.has_joined());
    assert_eq!(node.rpl.dag().preferred_parent, Some(sim.nodes()[0].hardware_addr));
    if mop == RplModeOfOperation::NonStoringMode {
        assert!(node.rpl.is_reachable());
    }
    // The root answers the first solicitations.
    let dis_count = sim.msgs_from(1).filter(|m| m.is_dis()).count();
    assert!(dis_count < 4, "{dis_count} DIS");
}

/// A node leaving on purpose advertises an infinite rank first.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn poison_and_leave(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::topology(sim::NetworkSim::new(), config(mop), 1, 1);
    sim.run(Duration::from_millis(500), FIFTEEN_MINUTES);
    assert!(sim.nodes()[1].rpl.has_joined());

    sim.clear_msgs();
    RoutingDriver::poison_and_leave(&mut sim.nodes_mut()[1].rpl);
    sim.run(Duration::from_millis(500), Duration::from_secs(60 * 2));

    let node = &sim.nodes()[1];
    assert_eq!(node.rpl.dag().state, DagState::Poisoning);
    assert!(node.rpl.dag().rank.is_infinite());
    assert_eq!(node.rpl.dag().preferred_parent, None);
    assert!(sim.msgs_from(1).any(|m| m.is_poisoning_dio() && m.is_broadcast()));

    // Once gone, it solicits the root and joins again.
    sim.run(Duration::from_millis(500), Duration::from_secs(60 * 10));
    let node = &sim.nodes()[1];
    assert!(node.rpl.has_joined());
    assert_ne!(node.rpl.dag().state, DagState::Poisoning);
    assert!(!node.rpl.dag().rank.is_infinite());
}

/// A global repair at the root moves the whole DODAG to a new version.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn global_repair(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::topology(sim::NetworkSim::new(), config(mop), 1, 2);
    sim.run(Duration::from_millis(500), FIFTEEN_MINUTES);
    let version = sim.nodes()[0].rpl.dag().version;
    assert!(sim.nodes().iter().all(|n| n.rpl.dag().version == version));

    RoutingDriver::global_repair(root_mut(&mut sim), "test");
    let new_version = sim.nodes()[0].rpl.dag().version;
    assert!(new_version.greater_than(&version));

    sim.run(Duration::from_millis(500), FIFTEEN_MINUTES);
    for node in sim.nodes() {
        assert_eq!(node.rpl.dag().version, new_version, "{node}");
        assert!(node.rpl.has_joined(), "{node}");
    }
    if mop == RplModeOfOperation::NonStoringMode {
        assert!(sim.nodes()[2].rpl.is_reachable());
    }
}

/// A leaf joins the DODAG but only answers to unicast solicitations, with an infinite rank.
#[test]
fn leaf_node() {
    let mut sim = sim::NetworkSim::new();
    sim.create_root(RplConfig::default());
    sim.create_node(RplConfig::default().set_leaf_only(true))
        .set_position(sim::Position((100., 0.)));

    sim.run(Duration::from_millis(500), FIFTEEN_MINUTES);

    let leaf = &sim.nodes()[1].rpl;
    assert!(RoutingDriver::leaf_only(leaf));
    assert!(leaf.has_joined());
    assert!(leaf.is_reachable());
    assert!(has_source_route(&sim, 1));

    assert!(sim
        .msgs_from(1)
        .filter(|m| m.is_dio())
        .all(|m| !m.is_broadcast() && m.is_poisoning_dio()));
}

/// A node that comes in range of a better parent switches to it after the hysteresis delay,
/// without retracting its route in non-storing mode.
#[rstest]
#[case::mop0(RplModeOfOperation::NoDownwardRoutesMaintained)]
#[case::mop1(RplModeOfOperation::NonStoringMode)]
fn normal_node_change_parent(#[case] mop: RplModeOfOperation) {
    let mut sim = sim::topology(sim::NetworkSim::new(), config(mop), 1, 2);
    sim.run(Duration::from_millis(500), FIFTEEN_MINUTES);
    assert_eq!(
        sim.nodes()[2].rpl.dag().preferred_parent,
        Some(sim.nodes()[1].hardware_addr)
    );

    // In range of both the root and the middle node.
    sim.nodes_mut()[2].set_position(sim::Position((50., -50.)));
    sim.run(Duration::from_millis(500), Duration::from_secs(60 * 45));

    let node = &sim.nodes()[2];
    let root = &sim.nodes()[0];
    assert_eq!(node.rpl.dag().preferred_parent, Some(root.hardware_addr));
    assert_eq!(node.rpl.dag().rank, node.rpl.rank_via_neighbor(&root.hardware_addr));
    assert!(node.rpl.dag().rank > root.rpl.dag().rank);
    assert!(!sim.msgs().iter().any(|m| m.is_no_path_dao()));
}
