//! RPL-lite: a single RPL instance with one DODAG, in non-storing mode or without downward
//! routes (RFC 6550).
//!
//! [`Rpl`] owns all the protocol state: the DAG, the RPL neighbors, the link statistics,
//! the IPv6 neighbor cache, the addresses and default route it configures, the source routing
//! table of a root, and the timers. It is driven by three kinds of events:
//!
//! - control messages, passed to [`Rpl::process_control_message`];
//! - link-layer feedback, passed to [`Rpl::link_send_callback`] and [`Rpl::packet_input`];
//! - time, passed to [`Rpl::poll`].
//!
//! Messages the core wants to send are queued, and are taken out with [`Rpl::dispatch`].

mod config;
pub mod consts;
mod dag;
mod driver;
mod ext_header;
mod icmp;
pub(crate) mod lollipop;
mod mrhof;
mod neighbor_table;
mod of;
mod of0;
mod rank;
mod root;
mod source_route;
mod timers;
mod trickle;

use heapless::Deque;

use crate::config::RPL_OUTBOX_SIZE;
use crate::iface::addr::{AddressOrigin, Addresses};
use crate::iface::link_stats::{LinkStatsTable, TxStatus};
use crate::iface::neighbor::Cache as NeighborCache;
use crate::iface::route::Routes;
use crate::rand::Rand;
use crate::time::{Duration, Instant};
use crate::wire::ipv6::LINK_LOCAL_ALL_RPL_NODES;
use crate::wire::rpl::{PrefixFlags, PrefixInformation};
use crate::wire::{HardwareAddress, Ipv6Address, Ipv6AddressExt, Ipv6Cidr, RplRepr};

pub use self::config::RplConfig;
pub use self::dag::{Dag, DagState, Instance};
pub use self::driver::RoutingDriver;
pub use self::lollipop::SequenceCounter;
pub use self::mrhof::Mrhof;
pub use self::neighbor_table::{RplNeighbor, RplNeighborTable};
pub use self::of::{Candidate, ObjectiveFunction, Of, OfContext};
pub use self::of0::ObjectiveFunction0;
pub use self::rank::Rank;
pub use self::source_route::{Graph, NodeIndex, SourceRouteNode, SourceRouteTable};
pub use self::trickle::TrickleTimer;

use self::timers::Timers;

/// Maximum number of timers handled by a single call to [`Rpl::poll`].
const MAX_TIMERS_PER_POLL: usize = 32;

/// A control message waiting to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmit {
    pub src_addr: Ipv6Address,
    pub dst_addr: Ipv6Address,
    pub repr: RplRepr,
}

impl Transmit {
    pub fn is_multicast(&self) -> bool {
        self.dst_addr.is_multicast()
    }
}

/// The RPL core of a node.
#[derive(Debug)]
pub struct Rpl {
    pub(crate) config: RplConfig,
    pub(crate) rand: Rand,
    pub(crate) now: Instant,

    hardware_addr: HardwareAddress,
    link_local_addr: Ipv6Address,

    pub(crate) instance: Instance,
    pub(crate) neighbors: RplNeighborTable,
    pub(crate) link_stats: LinkStatsTable,
    pub(crate) neighbor_cache: NeighborCache,
    pub(crate) addresses: Addresses,
    pub(crate) routes: Routes,
    pub(crate) source_routes: SourceRouteTable,
    /// Prefix used when this node starts a DODAG.
    pub(crate) root_prefix: Option<Ipv6Address>,

    pub(crate) timers: Timers,
    /// Number of DIOs sent as root, for the periodic DTSN increments.
    pub(crate) dio_send_count: u32,

    outbox: Deque<Transmit, RPL_OUTBOX_SIZE>,
}

impl Rpl {
    /// Create the RPL core of a node with the given link-layer address.
    ///
    /// The link-local address derived from `hardware_addr` is assigned to the node, and the
    /// periodic and DIS timers are armed.
    pub fn new(config: RplConfig, hardware_addr: HardwareAddress, now: Instant) -> Self {
        let link_local_addr = hardware_addr
            .as_link_local_address()
            .unwrap_or(Ipv6Address::UNSPECIFIED);

        let mut rpl = Self {
            rand: Rand::new(config.random_seed),
            config,
            now,
            hardware_addr,
            link_local_addr,
            instance: Instance::default(),
            neighbors: RplNeighborTable::new(),
            link_stats: LinkStatsTable::new(),
            neighbor_cache: NeighborCache::new(),
            addresses: Addresses::new(),
            routes: Routes::new(),
            source_routes: SourceRouteTable::new(),
            root_prefix: None,
            timers: Timers::default(),
            dio_send_count: 0,
            outbox: Deque::new(),
        };

        if rpl
            .addresses
            .add(Ipv6Cidr::new(link_local_addr, 64), AddressOrigin::Manual)
            .is_err()
        {
            net_warn!("could not assign the link-local address {}", link_local_addr);
        }

        rpl.init();
        rpl
    }

    /// Reset the whole protocol state and restart the periodic timers.
    pub(crate) fn init(&mut self) {
        net_info!("initializing");
        self.instance = Instance::default();
        self.neighbors.clear();
        self.source_routes.free_all();
        self.timers = Timers::default();
        self.init_timers();
    }

    pub fn config(&self) -> &RplConfig {
        &self.config
    }

    /// Switch leaf mode: a leaf joins a DODAG but never advertises it.
    pub fn set_leaf_only(&mut self, value: bool) {
        self.config.leaf_only = value;
    }

    pub fn now(&self) -> Instant {
        self.now
    }

    pub fn hardware_addr(&self) -> HardwareAddress {
        self.hardware_addr
    }

    /// The interface identifier of this node.
    pub fn iid(&self) -> [u8; 8] {
        self.hardware_addr.interface_identifier().unwrap_or_default()
    }

    pub fn link_local_address(&self) -> Ipv6Address {
        self.link_local_addr
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn dag(&self) -> &Dag {
        &self.instance.dag
    }

    pub fn neighbors(&self) -> &RplNeighborTable {
        &self.neighbors
    }

    pub fn link_stats(&self) -> &LinkStatsTable {
        &self.link_stats
    }

    pub fn link_stats_mut(&mut self) -> &mut LinkStatsTable {
        &mut self.link_stats
    }

    pub fn neighbor_cache(&self) -> &NeighborCache {
        &self.neighbor_cache
    }

    pub fn addresses(&self) -> &Addresses {
        &self.addresses
    }

    pub fn addresses_mut(&mut self) -> &mut Addresses {
        &mut self.addresses
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn source_routes(&self) -> &SourceRouteTable {
        &self.source_routes
    }

    /// Run the timers that expired at `now`.
    pub fn poll(&mut self, now: Instant) {
        self.now = now;
        for _ in 0..MAX_TIMERS_PER_POLL {
            let Some(timer) = self.timers.take_expired(now) else {
                return;
            };
            self.run_timer(timer);
        }
        net_debug!("timers still pending after {} runs", MAX_TIMERS_PER_POLL);
    }

    /// Return the instant at which [`Rpl::poll`] should be called next.
    pub fn poll_at(&self) -> Option<Instant> {
        self.timers.poll_at()
    }

    /// Return how long to wait before calling [`Rpl::poll`], starting at `timestamp`.
    pub fn poll_delay(&self, timestamp: Instant) -> Option<Duration> {
        match self.poll_at() {
            Some(poll_at) if timestamp < poll_at => Some(poll_at - timestamp),
            Some(_) => Some(Duration::ZERO),
            None => None,
        }
    }

    /// Take the next control message to send.
    pub fn dispatch(&mut self) -> Option<Transmit> {
        self.outbox.pop_front()
    }

    /// Query whether control messages are waiting to be sent.
    pub fn has_pending_transmit(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Queue a control message. Link-local and multicast destinations are reached from the
    /// link-local address, others from the global address.
    pub(crate) fn send(&mut self, dst_addr: Option<Ipv6Address>, repr: RplRepr) {
        let dst_addr = dst_addr.unwrap_or(LINK_LOCAL_ALL_RPL_NODES);
        let src_addr = if dst_addr.is_link_local() || dst_addr.is_multicast() {
            self.link_local_addr
        } else {
            self.global_address().unwrap_or(self.link_local_addr)
        };

        net_trace!("outbox: {} -> {}: {}", src_addr, dst_addr, repr);
        if self
            .outbox
            .push_back(Transmit {
                src_addr,
                dst_addr,
                repr,
            })
            .is_err()
        {
            net_debug!("outbox full, dropping message to {}", dst_addr);
        }
    }

    /// Return the link-layer address of the next hop towards `dst_addr`.
    pub fn next_hop(&self, dst_addr: &Ipv6Address) -> Option<HardwareAddress> {
        if let Some(hw) = self.neighbor_cache.lookup(dst_addr) {
            return Some(hw);
        }
        let via = self.routes.lookup(dst_addr, self.now)?;
        self.neighbor_cache.lookup(&via)
    }

    /// Process the outcome of a link-layer transmission to `addr`.
    pub fn link_send_callback(&mut self, addr: &HardwareAddress, status: TxStatus, numtx: u8) {
        self.link_stats.packet_sent(addr, status, numtx, self.now);

        if !self.instance.used || !self.neighbors.contains(addr) {
            return;
        }

        if self.instance.dag.urgent_probing_target == Some(*addr) {
            self.instance.dag.urgent_probing_target = None;
        }

        net_info!(
            "packet sent to {}, status {:?}, tx {}, new link metric {}",
            addr,
            status,
            numtx,
            self.neighbor_link_metric(addr)
        );
        // Link stats changed: re-evaluate the parent outside of this callback.
        self.schedule_state_update();
    }

    /// Process the reception of a frame from `addr`.
    pub fn packet_input(&mut self, addr: &HardwareAddress, rssi: i16) {
        self.link_stats.packet_input(addr, rssi);
    }

    /// Return the global address of this node, preferring one in the DODAG prefix.
    pub fn global_address(&self) -> Option<Ipv6Address> {
        let prefix = self
            .instance
            .dag
            .prefix_info
            .as_ref()
            .filter(|_| self.instance.used)
            .map(|p| (&p.prefix, p.prefix_length));
        self.addresses.global_address(prefix)
    }

    /// Build the address of this node in `prefix`.
    fn address_in_prefix(&self, prefix: &Ipv6Address, len: u8) -> Ipv6Address {
        let prefix = Ipv6Address::from(prefix.mask(len));
        Ipv6Address::from_prefix_and_iid(&prefix, &self.iid())
    }

    /// Set the DODAG prefix and autoconfigure an address in it.
    ///
    /// The prefix never expires. Returns `false` when the length is not in `1..=128` or the
    /// autonomous flag is missing.
    pub(crate) fn set_prefix_from_addr(
        &mut self,
        prefix: &Ipv6Address,
        len: u8,
        flags: PrefixFlags,
    ) -> bool {
        if len == 0 || len > 128 || !flags.contains(PrefixFlags::AUTONOMOUS) {
            net_warn!("prefix not included, not-supported or invalid");
            return false;
        }

        let info = PrefixInformation {
            prefix_length: len,
            flags,
            valid_lifetime: consts::ROUTE_INFINITE_LIFETIME,
            preferred_lifetime: consts::ROUTE_INFINITE_LIFETIME,
            prefix: Ipv6Address::from(prefix.mask(len)),
        };
        self.instance.dag.prefix_info = Some(info);

        let addr = self.address_in_prefix(prefix, len);
        if !self.addresses.contains(&addr) {
            net_info!("adding global IP address {}", addr);
            if self
                .addresses
                .add(Ipv6Cidr::new(addr, len), AddressOrigin::Autoconf)
                .is_err()
            {
                net_warn!("address table full, could not add {}", addr);
            }
        }
        true
    }

    /// Set the DODAG prefix from a Prefix Information option, keeping its lifetime.
    pub(crate) fn set_prefix(&mut self, prefix: &PrefixInformation) -> bool {
        if !self.set_prefix_from_addr(&prefix.prefix, prefix.prefix_length, prefix.flags) {
            return false;
        }
        if let Some(info) = self.instance.dag.prefix_info.as_mut() {
            info.valid_lifetime = prefix.valid_lifetime;
            info.preferred_lifetime = prefix.preferred_lifetime;
        }
        true
    }

    /// Remove the address autoconfigured from the DODAG prefix, and forget the prefix.
    pub(crate) fn reset_prefix(&mut self) {
        let Some(info) = self.instance.dag.prefix_info.take() else {
            return;
        };
        let addr = self.address_in_prefix(&info.prefix, info.prefix_length);
        if self.addresses.remove(&addr).is_some() {
            net_info!("removing global IP address {}", addr);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::wire::rpl::{
        DodagConfiguration, InstanceId, ModeOfOperation, PrefixFlags, PrefixInformation,
    };
    use crate::wire::RplDio;

    pub const ROOT_HW: HardwareAddress = HardwareAddress::Extended([0x02, 0, 0, 0, 0, 0, 0, 1]);
    pub const NODE_HW: HardwareAddress = HardwareAddress::Extended([0x02, 0, 0, 0, 0, 0, 0, 2]);

    pub fn dodag_id() -> Ipv6Address {
        Ipv6Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 1)
    }

    pub fn prefix() -> PrefixInformation {
        PrefixInformation {
            prefix_length: 64,
            flags: PrefixFlags::AUTONOMOUS,
            valid_lifetime: consts::ROUTE_INFINITE_LIFETIME,
            preferred_lifetime: consts::ROUTE_INFINITE_LIFETIME,
            prefix: Ipv6Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 0),
        }
    }

    /// A DIO from the root of the test DODAG.
    pub fn root_dio(rank: u16) -> RplDio {
        RplDio {
            rpl_instance_id: InstanceId::from(consts::RPL_DEFAULT_INSTANCE),
            version_number: SequenceCounter::default(),
            rank,
            grounded: false,
            mode_of_operation: ModeOfOperation::NonStoringMode,
            dodag_preference: 0,
            dtsn: SequenceCounter::default(),
            dodag_id: dodag_id(),
            dodag_configuration: DodagConfiguration::default(),
            metric_container: None,
            prefix_information: Some(prefix()),
        }
    }

    pub fn node(hw: HardwareAddress) -> Rpl {
        Rpl::new(RplConfig::default().set_random_seed(7), hw, Instant::ZERO)
    }

    /// Take all queued messages.
    pub fn drain(rpl: &mut Rpl) -> std::vec::Vec<Transmit> {
        core::iter::from_fn(|| rpl.dispatch()).collect()
    }

    #[test]
    fn new_node_has_link_local_address() {
        let rpl = node(NODE_HW);
        let ll = NODE_HW.as_link_local_address().unwrap();
        assert_eq!(rpl.link_local_address(), ll);
        assert!(rpl.addresses().contains(&ll));
        assert_eq!(rpl.global_address(), None);
        assert!(!rpl.instance().used);
        // The periodic and DIS timers are armed.
        assert!(rpl.poll_at().is_some());
    }

    #[test]
    fn prefix_autoconfiguration() {
        let mut rpl = node(NODE_HW);
        assert!(!rpl.set_prefix_from_addr(&prefix().prefix, 0, PrefixFlags::AUTONOMOUS));
        assert!(!rpl.set_prefix_from_addr(&prefix().prefix, 64, PrefixFlags::ON_LINK));

        assert!(rpl.set_prefix(&prefix()));
        let global = Ipv6Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 2);
        assert!(rpl.addresses().contains(&global));
        assert_eq!(
            rpl.instance.dag.prefix_info.map(|p| p.prefix_length),
            Some(64)
        );

        rpl.reset_prefix();
        assert!(!rpl.addresses().contains(&global));
        assert_eq!(rpl.instance.dag.prefix_info, None);
    }

    #[test]
    fn source_address_selection() {
        let mut rpl = node(NODE_HW);
        rpl.set_prefix(&prefix());
        rpl.instance.used = true;

        rpl.send(None, RplRepr::DodagInformationSolicitation(Default::default()));
        rpl.send(
            Some(dodag_id()),
            RplRepr::DodagInformationSolicitation(Default::default()),
        );

        let sent = drain(&mut rpl);
        assert_eq!(sent.len(), 2);
        assert!(sent[0].is_multicast());
        assert_eq!(sent[0].src_addr, rpl.link_local_address());
        assert_eq!(
            sent[1].src_addr,
            Ipv6Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 2)
        );
    }

    #[test]
    fn poll_delay() {
        let rpl = node(NODE_HW);
        let at = rpl.poll_at().unwrap();
        assert_eq!(rpl.poll_delay(at), Some(Duration::ZERO));
        assert_eq!(
            rpl.poll_delay(at - Duration::from_secs(1)),
            Some(Duration::from_secs(1))
        );
    }
}
