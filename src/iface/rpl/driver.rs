//! The interface a network stack uses to drive its routing protocol.

use super::{Rpl, SourceRouteNode};

use crate::iface::link_stats::TxStatus;
use crate::wire::{HardwareAddress, Ipv6Address, RoutedPacket};
use crate::Result;

/// A routing protocol, as seen by the IPv6 layer that forwards packets for it.
pub trait RoutingDriver {
    /// Reset the routing state.
    fn init(&mut self);

    /// Set the prefix and interface identifier of the address used as DODAG root.
    fn root_set_prefix(&mut self, prefix: Option<Ipv6Address>, iid: Option<[u8; 8]>)
        -> Result<()>;

    /// Start a DODAG rooted at this node.
    fn root_start(&mut self) -> Result<()>;

    fn is_root(&self) -> bool;

    fn get_root_address(&self) -> Option<Ipv6Address>;

    /// The global address of a node of the source routing table.
    fn get_source_route_node_address(&self, node: &SourceRouteNode) -> Ipv6Address;

    /// Leave the network, after advertising an infinite rank for a while.
    fn poison_and_leave(&mut self);

    fn has_joined(&self) -> bool;

    /// Query whether the node has a downward route from the root.
    fn is_reachable(&self) -> bool;

    fn global_repair(&mut self, reason: &str);

    fn local_repair(&mut self, reason: &str);

    /// Remove the routing protocol extension headers of a packet.
    fn ext_header_remove(&self, packet: &mut RoutedPacket);

    /// Add or update the extension headers of a packet about to be sent. Returns `false`
    /// when the packet must be dropped.
    fn ext_header_update(&mut self, packet: &mut RoutedPacket) -> bool;

    /// Process the hop-by-hop header of a packet received from `sender`. Returns `false`
    /// when the packet must be dropped.
    fn ext_header_hbh_update(&mut self, packet: &mut RoutedPacket, sender: HardwareAddress)
        -> bool;

    /// Process the routing header of a packet addressed to us. Returns `true` when the packet
    /// must be forwarded to its new destination.
    fn ext_header_srh_update(&self, packet: &mut RoutedPacket) -> bool;

    /// The next hop of a packet the root sends down a source route.
    fn ext_header_srh_get_next_hop(&self, packet: &RoutedPacket) -> Option<Ipv6Address>;

    /// Process the outcome of a transmission to a neighbor.
    fn link_send_callback(&mut self, addr: &HardwareAddress, status: TxStatus, numtx: u8);

    /// Called when the IPv6 neighbor cache entry of a neighbor changes state.
    fn neighbor_state_changed(&mut self, _addr: &HardwareAddress) {}

    /// Called when the IPv6 layer removes a route.
    fn drop_route(&mut self, _dst_addr: &Ipv6Address) {}

    /// Query whether the node only joins as a leaf and never routes for others.
    fn leaf_only(&self) -> bool;
}

impl RoutingDriver for Rpl {
    fn init(&mut self) {
        Rpl::init(self)
    }

    fn root_set_prefix(
        &mut self,
        prefix: Option<Ipv6Address>,
        iid: Option<[u8; 8]>,
    ) -> Result<()> {
        Rpl::root_set_prefix(self, prefix, iid)
    }

    fn root_start(&mut self) -> Result<()> {
        Rpl::root_start(self)
    }

    fn is_root(&self) -> bool {
        Rpl::is_root(self)
    }

    fn get_root_address(&self) -> Option<Ipv6Address> {
        self.root_address()
    }

    fn get_source_route_node_address(&self, node: &SourceRouteNode) -> Ipv6Address {
        node.address()
    }

    fn poison_and_leave(&mut self) {
        Rpl::poison_and_leave(self)
    }

    fn has_joined(&self) -> bool {
        Rpl::has_joined(self)
    }

    fn is_reachable(&self) -> bool {
        Rpl::is_reachable(self)
    }

    fn global_repair(&mut self, reason: &str) {
        Rpl::global_repair(self, reason)
    }

    fn local_repair(&mut self, reason: &str) {
        Rpl::local_repair(self, reason)
    }

    fn ext_header_remove(&self, packet: &mut RoutedPacket) {
        Rpl::ext_header_remove(self, packet)
    }

    fn ext_header_update(&mut self, packet: &mut RoutedPacket) -> bool {
        Rpl::ext_header_update(self, packet)
    }

    fn ext_header_hbh_update(
        &mut self,
        packet: &mut RoutedPacket,
        sender: HardwareAddress,
    ) -> bool {
        Rpl::ext_header_hbh_update(self, packet, sender)
    }

    fn ext_header_srh_update(&self, packet: &mut RoutedPacket) -> bool {
        Rpl::ext_header_srh_update(self, packet)
    }

    fn ext_header_srh_get_next_hop(&self, packet: &RoutedPacket) -> Option<Ipv6Address> {
        Rpl::ext_header_srh_get_next_hop(self, packet)
    }

    fn link_send_callback(&mut self, addr: &HardwareAddress, status: TxStatus, numtx: u8) {
        Rpl::link_send_callback(self, addr, status, numtx)
    }

    fn leaf_only(&self) -> bool {
        self.config.leaf_only
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::super::DagState;
    use super::*;
    use crate::time::Instant;

    fn start_root<R: RoutingDriver>(driver: &mut R) -> Result<()> {
        driver.root_set_prefix(None, None)?;
        driver.root_start()
    }

    #[test]
    fn root_through_the_driver() {
        let mut rpl = node(ROOT_HW);
        start_root(&mut rpl).unwrap();

        let driver: &mut dyn RoutingDriver = &mut rpl;
        assert!(driver.is_root());
        assert!(driver.has_joined());
        assert!(driver.is_reachable());
        assert!(!driver.leaf_only());
        assert_eq!(
            driver.get_root_address(),
            Some(Ipv6Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))
        );

        driver.global_repair("test");
        assert!(driver.is_root());

        driver.init();
        assert!(!driver.is_root());
        assert!(!driver.has_joined());
        assert_eq!(driver.get_root_address(), None);
    }

    #[test]
    fn source_route_node_address() {
        let mut rpl = node(ROOT_HW);
        start_root(&mut rpl).unwrap();

        let child = Ipv6Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 0x42);
        let graph = rpl.graph();
        let index = rpl
            .source_routes
            .update_node(&graph, &child, Some(&dodag_id()), 600)
            .unwrap();
        let node = *rpl.source_routes().node(index).unwrap();
        assert_eq!(rpl.get_source_route_node_address(&node), child);
    }

    #[test]
    fn leave_through_the_driver() {
        let mut rpl = Rpl::new(
            super::super::RplConfig::default()
                .set_random_seed(3)
                .set_with_probing(false)
                .set_leaf_only(true),
            NODE_HW,
            Instant::from_secs(1),
        );
        assert!(RoutingDriver::leaf_only(&rpl));

        rpl.packet_input(&ROOT_HW, -60);
        rpl.process_dio(ROOT_HW.as_link_local_address().unwrap(), ROOT_HW, &root_dio(128));
        assert!(RoutingDriver::has_joined(&rpl));

        RoutingDriver::poison_and_leave(&mut rpl);
        assert_eq!(rpl.dag().state, DagState::Poisoning);
        rpl.poll(Instant::from_secs(1));
        assert_eq!(rpl.dag().preferred_parent, None);

        // Unused hooks.
        rpl.neighbor_state_changed(&ROOT_HW);
        rpl.drop_route(&dodag_id());
        assert!(rpl.instance().used);
    }
}
