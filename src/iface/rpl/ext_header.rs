//! The RPL extension headers of data packets: the RPL Hop-by-Hop option (RFC 6553) on the way
//! up, and the Source Route Header (RFC 6554) a non-storing root inserts on the way down.

use super::rank::Rank;
use super::Rpl;

use crate::wire::ipv6::DEFAULT_HOP_LIMIT;
use crate::wire::rpl::SourceRouteAddresses;
use crate::wire::{
    HardwareAddress, Ipv6Address, Ipv6AddressExt, RoutedPacket, RoutingHeader, RplHopByHopHeader,
    RplHopByHopOption, RplSourceRoute,
};

/// Compression of the SRH addresses is capped, so that at least one octet is carried.
const MAX_SRH_COMPRESSION: u8 = 15;

impl Rpl {
    /// Return the next hop of a packet the root routes downwards.
    ///
    /// The packet carries a SRH whose next address is already the IPv6 destination, or it goes
    /// to a direct child of the root. Either way, the next hop is the link-local counterpart of
    /// the destination.
    pub fn ext_header_srh_get_next_hop(&self, packet: &RoutedPacket) -> Option<Ipv6Address> {
        let dst_addr = packet.ip.dst_addr;
        if !self.is_addr_in_our_dag(&dst_addr) {
            return None;
        }

        let graph = self.graph();
        let root_node = self.source_routes.get_node(&graph, &self.instance.dag.dag_id);
        let dest_parent = self
            .source_routes
            .get_node(&graph, &dst_addr)
            .and_then(|n| self.source_routes.node(n))
            .and_then(|n| n.parent);
        let direct_child = root_node.is_some() && dest_parent == root_node;

        if packet.source_route().is_some() || direct_child {
            return Some(dst_addr.to_link_local());
        }

        net_trace!("no SRH found");
        None
    }

    /// Process the SRH of a packet we forward: the next address becomes the destination.
    ///
    /// Returns `false` when the packet has no SRH, or the SRH is invalid.
    pub fn ext_header_srh_update(&self, packet: &mut RoutedPacket) -> bool {
        let Some(RoutingHeader::Rpl(srh)) = packet.routing.as_mut() else {
            net_info!("SRH not found");
            return false;
        };

        net_info!(
            "read SRH, path len {}, segments left {}, Cmpri {}, Cmpre {}, ext len {} (padding {})",
            srh.addresses.len(),
            srh.segments_left,
            srh.cmpr_i,
            srh.cmpr_e,
            srh.buffer_len(),
            srh.padding()
        );

        if srh.segments_left == 0 {
            return true;
        }

        if !srh.advance(&mut packet.ip.dst_addr) {
            net_warn!("SRH with {} segments left is invalid", srh.segments_left);
            return false;
        }

        net_info!("SRH next hop {}", packet.ip.dst_addr);
        true
    }

    /// Build the SRH of a packet the root sends to a node of the DODAG.
    ///
    /// Returns `false` when the packet must be dropped.
    fn insert_srh(&self, packet: &mut RoutedPacket) -> bool {
        let dst_addr = packet.ip.dst_addr;
        net_info!(
            "SRH creating source routing header with destination {}",
            dst_addr
        );

        if !self.is_addr_in_our_dag(&dst_addr) {
            net_info!("SRH destination not in our DAG, skip SRH insertion");
            return true;
        }

        let graph = self.graph();
        let table = &self.source_routes;
        let Some(dest_node) = table.get_node(&graph, &dst_addr) else {
            net_info!("SRH node not found, skip SRH insertion");
            return true;
        };

        let Some(root_node) = table.get_node(&graph, &self.instance.dag.dag_id) else {
            net_warn!("SRH root node not found");
            return false;
        };

        if !table.is_addr_reachable(&graph, &dst_addr) {
            net_warn!("SRH no path found to destination");
            return false;
        }

        // Walk up to the child of the root that will be the first hop. Every node but the
        // first hop goes into the header.
        let mut addresses = SourceRouteAddresses::new();
        let mut cmpr = MAX_SRH_COMPRESSION;
        let mut node = dest_node;
        loop {
            let Some(current) = table.node(node) else {
                return false;
            };
            let parent = match current.parent {
                Some(parent) if parent != root_node => parent,
                _ => break,
            };
            let Some(parent_addr) = table.node(parent).map(|n| n.address()) else {
                return false;
            };

            if addresses.push(current.address()).is_err() {
                net_warn!("packet too long: impossible to add source routing header");
                return false;
            }
            net_info!("SRH Hop {}", parent_addr);
            cmpr = cmpr.min(parent_addr.matching_octets(&dst_addr) as u8);
            node = parent;
        }
        addresses.reverse();

        let Some(first_hop) = table.node(node).map(|n| n.address()) else {
            return false;
        };

        let srh = RplSourceRoute {
            segments_left: addresses.len() as u8,
            cmpr_i: cmpr,
            cmpr_e: cmpr,
            addresses,
        };
        net_info!(
            "SRH path len: {}, ComprI {}, ComprE {}, ext len {} (padding {})",
            srh.segments_left,
            srh.cmpr_i,
            srh.cmpr_e,
            srh.buffer_len(),
            srh.padding()
        );

        packet.routing = Some(RoutingHeader::Rpl(srh));
        packet.ip.dst_addr = first_hop;
        true
    }

    /// Check the RPL option of a packet received from `sender` for loops (RFC 6550 § 11.2).
    ///
    /// Returns `false` when the packet must be dropped.
    pub fn ext_header_hbh_update(
        &mut self,
        packet: &mut RoutedPacket,
        sender: HardwareAddress,
    ) -> bool {
        let Some(hbh) = packet.hop_by_hop.as_mut() else {
            return true;
        };

        if !hbh.is_well_formed() {
            net_warn!(
                "hop-by-hop extension header has wrong size or type ({} {} {})",
                hbh.header_len,
                hbh.option_type,
                hbh.option_data_len
            );
            return false;
        }

        let opt = &mut hbh.option;
        if !self.instance.used || self.instance.instance_id != opt.instance_id {
            net_warn!("unknown instance: {}", opt.instance_id);
            return false;
        }

        if opt.forwarding_error {
            net_warn!("forward error!");
            return false;
        }

        let down = opt.down;
        let sender_rank = opt.sender_rank;
        let rank_error_signaled = opt.rank_error;
        let sender = self.neighbors.contains(&sender).then_some(sender);
        let sender_closer = Rank(sender_rank) < self.instance.dag.rank;
        // Going down, the sender must be closer to the root than us. Going up, farther.
        let loop_detected = down != sender_closer;

        net_info!(
            "ext hdr: packet from {} to {} going {}, sender closer {} ({} < {}), rank error {}, loop detected {}",
            packet.ip.src_addr,
            packet.ip.dst_addr,
            if down { "down" } else { "up" },
            sender_closer,
            sender_rank,
            self.instance.dag.rank,
            rank_error_signaled,
            loop_detected
        );

        if loop_detected {
            opt.rank_error = true;
        }

        self.process_hbh(sender, sender_rank, loop_detected, rank_error_signaled)
    }

    /// Write our rank into the RPL option of a packet we forward.
    fn update_hbh(&self, packet: &mut RoutedPacket) -> bool {
        let Some(hbh) = packet.hop_by_hop.as_mut().filter(|h| h.is_rpl()) else {
            return true;
        };

        if !hbh.is_well_formed() {
            net_warn!(
                "hop-by-hop extension header has wrong size ({} {})",
                hbh.option_data_len,
                hbh.header_len
            );
            return false;
        }

        if !self.instance.used || self.instance.instance_id != hbh.option.instance_id {
            net_warn!("unable to add/update hop-by-hop extension header: incorrect instance");
            return false;
        }

        hbh.option.sender_rank = self.instance.dag.rank.raw_value();
        hbh.option.instance_id = self.instance.instance_id;
        true
    }

    fn insert_hbh(&self, packet: &mut RoutedPacket) -> bool {
        net_info!("creating hop-by-hop option");
        packet.hop_by_hop = Some(RplHopByHopHeader::new(RplHopByHopOption {
            down: false,
            rank_error: false,
            forwarding_error: false,
            instance_id: self.instance.instance_id,
            sender_rank: self.instance.dag.rank.raw_value(),
        }));
        self.update_hbh(packet)
    }

    /// Add or update the RPL extension headers of a packet before it is sent.
    ///
    /// The root inserts a SRH. Other nodes insert the RPL option in the packets they originate,
    /// and update it in the packets they forward. Returns `false` when the packet must be dropped.
    pub fn ext_header_update(&mut self, packet: &mut RoutedPacket) -> bool {
        let dst_addr = packet.ip.dst_addr;
        if !self.instance.used || dst_addr.is_link_local() || dst_addr.is_multicast() {
            return true;
        }

        if self.is_root() {
            self.ext_header_remove(packet);
            self.insert_srh(packet)
        } else if self.addresses.contains(&packet.ip.src_addr)
            && packet.ip.hop_limit == DEFAULT_HOP_LIMIT
        {
            self.insert_hbh(packet)
        } else {
            self.update_hbh(packet)
        }
    }

    /// Remove the RPL option and the routing header of a packet.
    pub fn ext_header_remove(&self, packet: &mut RoutedPacket) {
        if let Some(hbh) = packet.hop_by_hop.take_if(|h| h.is_rpl()) {
            net_info!(
                "removing RPL extension header (hop-by-hop, len {})",
                hbh.header_len
            );
        }
        if let Some(routing) = packet.routing.take() {
            net_info!(
                "removing RPL extension header (routing type {})",
                routing.routing_type()
            );
        }
    }
}
