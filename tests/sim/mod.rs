//! An in-memory network of RPL nodes.
//!
//! Nodes sit on a plane and hear every node closer than their range. Control messages are
//! delivered in the tick they are sent. A unicast message only needs its first hop in range:
//! the layers below RPL that would forward it further are not simulated.

mod message;
mod node;

pub use message::Message;
pub use node::Node;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use smolrpl::iface::{RoutingDriver, RplConfig, Transmit, TxStatus};
use smolrpl::time::{Duration, Instant};
use smolrpl::wire::ipv6::DEFAULT_HOP_LIMIT;
use smolrpl::wire::{HardwareAddress, Ipv6AddressExt, RoutedPacket};

const RSSI: i16 = -60;
/// Attempts the MAC reports for a frame that was never acknowledged.
const MAX_TX: u8 = 3;
/// Rounds of zero-delay exchanges run in a single tick.
const MAX_ROUNDS: usize = 16;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A root surrounded by `levels` rings of `nodes` nodes. Each ring only hears its neighbor
/// rings.
pub fn topology(mut sim: NetworkSim, config: RplConfig, nodes: usize, levels: usize) -> NetworkSim {
    let pos = Position((0., 0.));
    sim.create_root(config.clone()).set_position(pos);

    let interval = 2. * std::f32::consts::PI / nodes as f32;
    for level in 0..levels {
        for node in 0..nodes {
            let node_p = (
                pos.x() + 100. * f32::cos(interval * node as f32) * (level + 1) as f32,
                pos.y() + 100. * f32::sin(interval * node as f32) * (level + 1) as f32,
            );
            sim.create_node(config.clone()).set_position(node_p.into());
        }
    }

    sim
}

#[derive(Debug)]
pub struct NetworkSim {
    pub nodes: Vec<Node>,
    pub messages: Vec<Message>,
    pub now: Instant,
    rng: StdRng,
}

impl Default for NetworkSim {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkSim {
    pub fn new() -> Self {
        init_logger();
        Self {
            nodes: vec![],
            messages: vec![],
            now: Instant::ZERO,
            rng: StdRng::seed_from_u64(0x5eed),
        }
    }

    /// Create a node that joins a DODAG.
    pub fn create_node(&mut self, config: RplConfig) -> &mut Node {
        let id = self.nodes.len();
        let config = config.set_random_seed(self.rng.gen());
        self.nodes.push(Node::new(id, config, self.now));
        &mut self.nodes[id]
    }

    /// Create a node that roots a DODAG in `fd00::/64`.
    pub fn create_root(&mut self, config: RplConfig) -> &mut Node {
        let node = self.create_node(config);
        node.rpl.root_set_prefix(None, None).unwrap();
        node.rpl.root_start().unwrap();
        node
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn msgs(&self) -> &[Message] {
        &self.messages
    }

    pub fn clear_msgs(&mut self) {
        self.messages.clear();
    }

    /// The messages sent by node `id`.
    pub fn msgs_from(&self, id: usize) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(move |m| m.from.0 == id)
    }

    fn node_from_hw(&self, addr: &HardwareAddress) -> Option<usize> {
        self.nodes.iter().position(|n| n.hardware_addr == *addr)
    }

    pub fn run(&mut self, step: Duration, duration: Duration) {
        let start = self.now;
        while self.now < start + duration {
            let new_step = self.on_tick(self.now, step);

            if new_step == Duration::ZERO {
                self.now += Duration::from_millis(1);
            } else {
                self.now += new_step.min(step);
            }
        }
    }

    /// Poll every node, and deliver the messages they send until the network is quiet.
    ///
    /// Returns the delay until the next node timer.
    pub fn on_tick(&mut self, now: Instant, mut step: Duration) -> Duration {
        for _ in 0..MAX_ROUNDS {
            let mut sent = vec![];
            for node in self.nodes.iter_mut().filter(|n| n.enabled) {
                node.rpl.poll(now);
                while let Some(transmit) = node.rpl.dispatch() {
                    sent.push((node.id, transmit));
                }
            }

            if sent.is_empty() {
                break;
            }
            for (from, transmit) in sent {
                self.transmit(now, from, transmit);
            }
        }

        for node in self.nodes.iter().filter(|n| n.enabled) {
            if let Some(delay) = node.rpl.poll_delay(now) {
                step = step.min(delay);
            }
        }
        step
    }

    fn transmit(&mut self, now: Instant, from: usize, transmit: Transmit) {
        let from_pos = self.nodes[from].position;
        let from_hw = self.nodes[from].hardware_addr;

        if transmit.is_multicast() {
            self.messages.push(Message {
                at: now,
                from: (from, from_pos),
                to: HardwareAddress::BROADCAST,
                transmit: transmit.clone(),
                packet: None,
            });
            for node in self.nodes.iter_mut() {
                if node.id != from && node.hears(&from_pos) {
                    node.rpl.packet_input(&from_hw, RSSI);
                    node.rpl.process_control_message(
                        transmit.src_addr,
                        transmit.dst_addr,
                        from_hw,
                        &transmit.repr,
                    );
                }
            }
            return;
        }

        // Without a route, the message never leaves the node.
        let Some((next_hop, packet)) = self.route(from, &transmit) else {
            return;
        };

        self.messages.push(Message {
            at: now,
            from: (from, from_pos),
            to: next_hop,
            transmit: transmit.clone(),
            packet,
        });

        let heard = self
            .node_from_hw(&next_hop)
            .filter(|&hop| self.nodes[hop].hears(&from_pos));
        let status = if heard.is_some() {
            (TxStatus::Ok, 1)
        } else {
            (TxStatus::NoAck, MAX_TX)
        };
        self.nodes[from]
            .rpl
            .link_send_callback(&next_hop, status.0, status.1);

        let Some(hop) = heard else {
            return;
        };
        let Some(dst) = self
            .nodes
            .iter()
            .position(|n| n.enabled && n.owns(&transmit.dst_addr))
        else {
            return;
        };

        // Frames received over more than one hop say nothing about the sender's link.
        let lladdr = if dst == hop {
            self.nodes[dst].rpl.packet_input(&from_hw, RSSI);
            from_hw
        } else {
            self.nodes[hop].hardware_addr
        };
        self.nodes[dst].rpl.process_control_message(
            transmit.src_addr,
            transmit.dst_addr,
            lladdr,
            &transmit.repr,
        );
    }

    /// Find the link-layer next hop of a unicast message, letting the sender add its
    /// extension headers to messages that leave the link.
    fn route(
        &mut self,
        from: usize,
        transmit: &Transmit,
    ) -> Option<(HardwareAddress, Option<RoutedPacket>)> {
        if transmit.dst_addr.is_link_local() {
            let hop = self.nodes.iter().find(|n| n.owns(&transmit.dst_addr))?;
            return Some((hop.hardware_addr, None));
        }

        let rpl = &mut self.nodes[from].rpl;
        let mut packet = RoutedPacket::new(transmit.src_addr, transmit.dst_addr, DEFAULT_HOP_LIMIT);
        if !RoutingDriver::ext_header_update(rpl, &mut packet) {
            return None;
        }

        let next_hop = if RoutingDriver::is_root(rpl) {
            let via = rpl.ext_header_srh_get_next_hop(&packet)?;
            self.nodes.iter().find(|n| n.owns(&via))?.hardware_addr
        } else {
            rpl.next_hop(&packet.ip.dst_addr)?
        };
        Some((next_hop, Some(packet)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position(pub (f32, f32));

impl Position {
    pub fn distance(&self, other: &Self) -> f32 {
        ((other.0 .0 - self.0 .0).powf(2.0) + (other.0 .1 - self.0 .1).powf(2.0)).sqrt()
    }

    pub fn x(&self) -> f32 {
        self.0 .0
    }

    pub fn y(&self) -> f32 {
        self.0 .1
    }
}

impl From<(f32, f32)> for Position {
    fn from(pos: (f32, f32)) -> Self {
        Position(pos)
    }
}
