//! The source routing table of a non-storing root (RFC 6550 § 9.7).
//!
//! Every node that sent a DAO is stored with a reference to its DAO parent. The resulting graph
//! is walked upwards from a destination to build a Source Route Header. Nodes are kept in fixed
//! slots, so a [`NodeIndex`] stays valid until its node is removed. A node is only removed when
//! no other node references it.

use heapless::Vec;

use crate::config::RPL_SOURCE_ROUTE_TABLE_SIZE;
use crate::wire::rpl::InstanceId;
use crate::wire::{Ipv6Address, Ipv6AddressExt};

use super::consts::ROUTE_INFINITE_LIFETIME;

/// A node whose DAO parent has gone away is kept this many seconds.
pub const REMOVAL_DELAY: u32 = 60;

/// The DODAG a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Graph {
    pub instance_id: InstanceId,
    pub dodag_id: Ipv6Address,
}

impl Graph {
    /// The global address of a node: the first 64 bits of the DODAG ID followed by the node's
    /// interface identifier.
    pub fn node_address(&self, link_identifier: &[u8; 8]) -> Ipv6Address {
        Ipv6Address::from_prefix_and_iid(&self.dodag_id, link_identifier)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeIndex(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SourceRouteNode {
    pub graph: Graph,
    pub link_identifier: [u8; 8],
    pub parent: Option<NodeIndex>,
    /// Remaining lifetime in seconds, [`ROUTE_INFINITE_LIFETIME`] for nodes that never expire.
    pub lifetime: u32,
}

impl SourceRouteNode {
    pub fn address(&self) -> Ipv6Address {
        self.graph.node_address(&self.link_identifier)
    }
}

#[derive(Debug, Default)]
pub struct SourceRouteTable {
    nodes: Vec<Option<SourceRouteNode>, RPL_SOURCE_ROUTE_TABLE_SIZE>,
    num_nodes: usize,
}

impl SourceRouteTable {
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            num_nodes: 0,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn node(&self, index: NodeIndex) -> Option<&SourceRouteNode> {
        self.nodes.get(index.0).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &SourceRouteNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeIndex(i), n)))
    }

    /// Find the node of `addr` in `graph`. Only the interface identifier is compared.
    pub fn get_node(&self, graph: &Graph, addr: &Ipv6Address) -> Option<NodeIndex> {
        let iid = addr.interface_identifier();
        self.iter()
            .find(|(_, n)| n.graph == *graph && n.link_identifier == iid)
            .map(|(i, _)| i)
    }

    fn alloc(&mut self, node: SourceRouteNode) -> Option<NodeIndex> {
        let index = match self.nodes.iter().position(Option::is_none) {
            Some(i) => {
                self.nodes[i] = Some(node);
                i
            }
            None => {
                self.nodes.push(Some(node)).ok()?;
                self.nodes.len() - 1
            }
        };
        self.num_nodes += 1;
        Some(NodeIndex(index))
    }

    fn parent_of(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.node(index).and_then(|n| n.parent)
    }

    /// Walk up from `index`, at most once per slot. Returns where the walk stopped: at `stop`,
    /// at a node without parent, or after too many steps.
    fn walk_up(&self, index: Option<NodeIndex>, stop: Option<NodeIndex>) -> Option<NodeIndex> {
        let mut node = index;
        let mut max_depth = RPL_SOURCE_ROUTE_TABLE_SIZE;
        while let Some(current) = node {
            if Some(current) == stop || max_depth == 0 {
                break;
            }
            node = self.parent_of(current);
            max_depth -= 1;
        }
        node
    }

    /// Query whether the parent chain of `addr` leads to the DODAG root.
    pub fn is_addr_reachable(&self, graph: &Graph, addr: &Ipv6Address) -> bool {
        let node = self.get_node(graph, addr);
        let root = self.get_node(graph, &graph.dodag_id);
        match (node, root) {
            (Some(_), Some(root)) => self.walk_up(node, Some(root)) == Some(root),
            _ => false,
        }
    }

    fn has_cycle_through(&self, index: NodeIndex) -> bool {
        let mut node = self.parent_of(index);
        let mut max_depth = RPL_SOURCE_ROUTE_TABLE_SIZE;
        while let Some(current) = node {
            if current == index {
                return true;
            }
            if max_depth == 0 {
                return true;
            }
            node = self.parent_of(current);
            max_depth -= 1;
        }
        false
    }

    /// Add or update the link from `child` to `parent`.
    ///
    /// An unknown parent is added first, with an infinite lifetime. A parent change that would
    /// make the child unreachable, or create a cycle, is rolled back.
    pub fn update_node(
        &mut self,
        graph: &Graph,
        child: &Ipv6Address,
        parent: Option<&Ipv6Address>,
        lifetime: u32,
    ) -> Option<NodeIndex> {
        let mut parent_node = parent.and_then(|p| self.get_node(graph, p));

        if let (Some(parent), None) = (parent, parent_node) {
            parent_node = self.update_node(graph, parent, None, ROUTE_INFINITE_LIFETIME);
            if parent_node.is_none() {
                net_warn!("NS: no space left for root node!");
                return None;
            }
        }

        let child_node = match self.get_node(graph, child) {
            Some(index) => index,
            None => {
                let node = SourceRouteNode {
                    graph: *graph,
                    link_identifier: child.interface_identifier(),
                    parent: None,
                    lifetime,
                };
                match self.alloc(node) {
                    Some(index) => index,
                    None => {
                        net_warn!("NS: no space left for child {}", child);
                        return None;
                    }
                }
            }
        };

        let was_reachable = self.is_addr_reachable(graph, child);
        let node = self.nodes[child_node.0].as_mut()?;
        node.graph = *graph;
        node.lifetime = lifetime;
        node.link_identifier = child.interface_identifier();
        let old_parent = core::mem::replace(&mut node.parent, parent_node);

        if (was_reachable && !self.is_addr_reachable(graph, child))
            || self.has_cycle_through(child_node)
        {
            net_warn!("NS: cycle detected, not updating the parent of {}", child);
            if let Some(node) = self.nodes[child_node.0].as_mut() {
                node.parent = old_parent;
            }
        }

        match parent {
            Some(parent) => net_info!(
                "NS: updating link, child {}, parent {}, lifetime {}, num_nodes {}",
                child,
                parent,
                lifetime,
                self.num_nodes
            ),
            None => net_info!(
                "NS: updating link, child {}, parent none, lifetime {}, num_nodes {}",
                child,
                lifetime,
                self.num_nodes
            ),
        }

        Some(child_node)
    }

    /// The link from `child` to `parent` was removed: let the child expire soon.
    pub fn expire_parent(&mut self, graph: &Graph, child: &Ipv6Address, parent: &Ipv6Address) {
        let Some(child_node) = self.get_node(graph, child) else {
            return;
        };
        let parent_node = self.get_node(graph, parent);
        if let Some(node) = self.nodes[child_node.0].as_mut() {
            if node.parent.is_some() && node.parent == parent_node {
                node.lifetime = node.lifetime.min(REMOVAL_DELAY);
            }
        }
    }

    /// Age the nodes by `seconds`, and remove expired nodes no other node depends on.
    pub fn periodic(&mut self, seconds: u32) {
        for i in 0..self.nodes.len() {
            let Some(node) = self.nodes[i] else {
                continue;
            };

            if node.lifetime == 0 {
                let referenced = self.iter().any(|(_, n)| n.parent == Some(NodeIndex(i)));
                if !referenced {
                    net_info!("NS: removing expired node {}", node.address());
                    self.nodes[i] = None;
                    self.num_nodes -= 1;
                }
            } else if node.lifetime != ROUTE_INFINITE_LIFETIME {
                if let Some(node) = self.nodes[i].as_mut() {
                    node.lifetime = node.lifetime.saturating_sub(seconds);
                }
            }
        }
    }

    pub fn free_all(&mut self) {
        self.nodes.clear();
        self.num_nodes = 0;
    }

    /// The links of the table, for display.
    pub fn links(&self) -> impl Iterator<Item = Link<'_>> {
        self.iter().map(move |(_, node)| Link { table: self, node })
    }
}

/// A link of the source routing table: a node and its parent.
pub struct Link<'a> {
    table: &'a SourceRouteTable,
    node: &'a SourceRouteNode,
}

impl core::fmt::Display for Link<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.node.parent.and_then(|p| self.table.node(p)) {
            Some(parent) => write!(f, "{}  to {}", self.node.address(), parent.address())?,
            None => write!(f, "{}  (DODAG root)", self.node.address())?,
        }
        if self.node.lifetime == ROUTE_INFINITE_LIFETIME {
            write!(f, " (lifetime: infinite)")
        } else {
            write!(f, " (lifetime: {} seconds)", self.node.lifetime)
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Link<'_> {
    fn format(&self, f: defmt::Formatter) {
        match self.node.parent.and_then(|p| self.table.node(p)) {
            Some(parent) => defmt::write!(f, "{}  to {}", self.node.address(), parent.address()),
            None => defmt::write!(f, "{}  (DODAG root)", self.node.address()),
        }
        if self.node.lifetime == ROUTE_INFINITE_LIFETIME {
            defmt::write!(f, " (lifetime: infinite)")
        } else {
            defmt::write!(f, " (lifetime: {} seconds)", self.node.lifetime)
        }
    }
}
