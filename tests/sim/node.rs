use std::fmt::Display;

use smolrpl::iface::{Rpl, RplConfig};
use smolrpl::time::Instant;
use smolrpl::wire::{HardwareAddress, Ipv6Address};

use super::Position;

pub struct Node {
    pub id: usize,
    pub range: f32,
    pub position: Position,
    pub enabled: bool,
    pub hardware_addr: HardwareAddress,
    pub rpl: Rpl,
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "node {} ({}), rank {}, state {}",
            self.id,
            self.ip_address(),
            self.rpl.dag().rank,
            self.rpl.dag().state
        )
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("range", &self.range)
            .field("position", &self.position)
            .field("enabled", &self.enabled)
            .field("hardware_addr", &self.hardware_addr)
            .finish()
    }
}

impl Node {
    pub fn new(id: usize, config: RplConfig, now: Instant) -> Self {
        let hardware_addr = HardwareAddress::Extended((id as u64 + 1).to_be_bytes());

        Self {
            id,
            range: 101.,
            position: Position::from((0., 0.)),
            enabled: true,
            hardware_addr,
            rpl: Rpl::new(config, hardware_addr, now),
        }
    }

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    /// The global address of the node, or its link-local address before it has one.
    pub fn ip_address(&self) -> Ipv6Address {
        self.rpl
            .global_address()
            .unwrap_or_else(|| self.rpl.link_local_address())
    }

    pub fn owns(&self, addr: &Ipv6Address) -> bool {
        self.rpl.link_local_address() == *addr || self.rpl.addresses().contains(addr)
    }

    pub fn hears(&self, from: &Position) -> bool {
        self.enabled && self.position.distance(from) < self.range
    }
}
