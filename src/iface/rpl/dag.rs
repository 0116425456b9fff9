//! The RPL instance and its DAG, and the state machine driven by DIOs, DAOs and DAO-ACKs.

use core::fmt;

use super::consts;
use super::lollipop::SequenceCounter;
use super::of::{ObjectiveFunction, Of};
use super::rank::Rank;
use super::source_route::Graph;
use super::trickle::TrickleTimer;
use super::Rpl;

use crate::time::Instant;
use crate::wire::rpl::{
    InstanceId, MetricContainer, ModeOfOperation, PrefixFlags, PrefixInformation,
    DAO_ACK_UNABLE_TO_ACCEPT,
};
use crate::wire::{HardwareAddress, Ipv6Address, Ipv6AddressExt, RplDao, RplDio};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DagState {
    /// Part of the DAG, without a preferred parent.
    Initialized,
    /// A preferred parent is selected.
    Joined,
    /// A DAO was acknowledged: downward routes lead to this node.
    Reachable,
    /// Advertising an infinite rank before leaving.
    Poisoning,
}

impl fmt::Display for DagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DagState::Initialized => write!(f, "initialized"),
            DagState::Joined => write!(f, "joined"),
            DagState::Reachable => write!(f, "reachable"),
            DagState::Poisoning => write!(f, "poisoning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dag {
    pub dag_id: Ipv6Address,
    pub version: SequenceCounter,
    pub prefix_info: Option<PrefixInformation>,
    pub preference: u8,
    pub grounded: bool,

    pub rank: Rank,
    pub lowest_rank: Rank,
    pub last_advertised_rank: Rank,
    pub state: DagState,
    pub preferred_parent: Option<HardwareAddress>,
    /// The preferred parent changed and the consequences are not handled yet.
    pub unprocessed_parent_switch: bool,
    pub urgent_probing_target: Option<HardwareAddress>,
    pub unicast_dio_target: Option<HardwareAddress>,

    /// Remaining lifetime of the DAG in seconds, [`consts::ROUTE_INFINITE_LIFETIME`] at the root.
    pub lifetime: u32,

    pub dao_last_seqno: SequenceCounter,
    pub dao_last_acked_seqno: SequenceCounter,
    pub dao_transmissions: u8,
    /// DAO-ACKs waiting to be sent: destination and sequence number.
    pub dao_ack: heapless::Vec<(Ipv6Address, SequenceCounter), { crate::config::RPL_OUTBOX_SIZE }>,

    pub trickle: TrickleTimer,
}

impl Default for Dag {
    fn default() -> Self {
        Self {
            dag_id: Ipv6Address::UNSPECIFIED,
            version: SequenceCounter::default(),
            prefix_info: None,
            preference: 0,
            grounded: false,
            rank: Rank::INFINITE,
            lowest_rank: Rank::INFINITE,
            last_advertised_rank: Rank::INFINITE,
            state: DagState::Initialized,
            preferred_parent: None,
            unprocessed_parent_switch: false,
            urgent_probing_target: None,
            unicast_dio_target: None,
            lifetime: 0,
            dao_last_seqno: SequenceCounter::default(),
            dao_last_acked_seqno: SequenceCounter::default(),
            dao_transmissions: 0,
            dao_ack: heapless::Vec::new(),
            trickle: TrickleTimer::new(
                consts::DEFAULT_DIO_INTERVAL_MIN,
                consts::DEFAULT_DIO_INTERVAL_DOUBLINGS,
                consts::DEFAULT_DIO_REDUNDANCY_CONSTANT,
            ),
        }
    }
}

/// The RPL instance. A node is part of at most one, with a single DAG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub used: bool,
    pub instance_id: InstanceId,
    pub mop: ModeOfOperation,
    pub of: Of,
    pub dtsn_out: SequenceCounter,
    pub min_hop_rank_increase: u16,
    /// 0 means no limit.
    pub max_rank_increase: u16,
    /// Route lifetime, in lifetime units.
    pub default_lifetime: u8,
    /// Lifetime unit, in seconds.
    pub lifetime_unit: u16,
    pub mc: MetricContainer,
    pub dag: Dag,
}

impl Default for Instance {
    fn default() -> Self {
        Self {
            used: false,
            instance_id: InstanceId::default(),
            mop: ModeOfOperation::default(),
            of: Of::default(),
            dtsn_out: SequenceCounter::default(),
            min_hop_rank_increase: consts::DEFAULT_MIN_HOP_RANK_INCREASE,
            max_rank_increase: consts::DEFAULT_MAX_RANK_INCREASE,
            default_lifetime: consts::DEFAULT_ROUTE_LIFETIME,
            lifetime_unit: consts::DEFAULT_ROUTE_LIFETIME_UNIT,
            mc: MetricContainer::NONE,
            dag: Dag::default(),
        }
    }
}

impl Instance {
    /// Lifetime, in seconds, of `units` lifetime units.
    pub fn lifetime_secs(&self, units: u8) -> u32 {
        u32::from(self.lifetime_unit) * u32::from(units)
    }
}

impl Rpl {
    pub(crate) fn root_rank(&self) -> Rank {
        Rank::root(self.instance.min_hop_rank_increase)
    }

    pub fn is_root(&self) -> bool {
        self.instance.used && self.instance.dag.rank == self.root_rank()
    }

    pub fn has_joined(&self) -> bool {
        self.instance.used && self.instance.dag.state >= DagState::Joined
    }

    pub fn is_reachable(&self) -> bool {
        self.instance.used && self.instance.dag.state == DagState::Reachable
    }

    /// The DODAG ID, which is the address of the root.
    pub fn root_address(&self) -> Option<Ipv6Address> {
        self.instance
            .used
            .then_some(self.instance.dag.dag_id)
    }

    pub(crate) fn graph(&self) -> Graph {
        Graph {
            instance_id: self.instance.instance_id,
            dodag_id: self.instance.dag.dag_id,
        }
    }

    /// Query whether `addr` shares the 64-bit prefix of the DODAG ID.
    pub fn is_addr_in_our_dag(&self, addr: &Ipv6Address) -> bool {
        self.instance.used && addr.matches_prefix(&self.instance.dag.dag_id, 64)
    }

    /// A node may advertise the DAG once it is reachable, or once it is in it when there are no
    /// downward routes.
    pub(crate) fn ready_to_advertise(&self) -> bool {
        if !self.instance.used {
            return false;
        }
        let min_state = if self.instance.mop == ModeOfOperation::NoDownwardRoutesMaintained {
            DagState::Initialized
        } else {
            DagState::Reachable
        };
        self.instance.dag.state >= min_state
    }

    /// Leave the DAG: retract our downward route and drop all the DAG state.
    pub(crate) fn leave(&mut self) {
        let dag_id = self.instance.dag.dag_id;
        net_info!(
            "leaving DAG {}, instance {}",
            dag_id,
            self.instance.instance_id
        );

        if !self.is_root() {
            self.instance.dag.dao_last_seqno.increment();
            self.dao_output(0);
        }

        self.link_stats.reset();
        self.remove_all_neighbors();
        self.source_routes.free_all();
        self.stop_dag_timers();

        let autonomous = self
            .instance
            .dag
            .prefix_info
            .is_some_and(|p| p.flags.contains(PrefixFlags::AUTONOMOUS));
        if autonomous {
            self.reset_prefix();
        }

        self.instance.used = false;
    }

    /// Advertise an infinite rank for a while, then leave.
    pub fn poison_and_leave(&mut self) {
        self.instance.dag.state = DagState::Poisoning;
        self.schedule_state_update();
    }

    /// Age the DAG by `seconds`. A node close to expiration solicits its parent.
    pub(crate) fn dag_periodic(&mut self, seconds: u32) {
        let dag = &mut self.instance.dag;
        if !self.instance.used || dag.lifetime == consts::ROUTE_INFINITE_LIFETIME {
            return;
        }

        dag.lifetime = dag.lifetime.saturating_sub(seconds);
        if dag.lifetime == 0 {
            net_warn!("DAG expired, poison and leave");
            dag.state = DagState::Poisoning;
            self.schedule_state_update();
        } else if dag.lifetime < consts::DAG_LIFETIME_DIS_THRESHOLD {
            let lifetime = dag.lifetime;
            let parent = dag.preferred_parent;
            if let Some(ip) = parent.and_then(|p| self.neighbor_ip_addr(&p)) {
                net_warn!(
                    "DAG expiring in {} seconds, send DIS to preferred parent",
                    lifetime
                );
                self.dis_output(Some(ip));
            }
        }
    }

    /// Make the nodes of the DAG refresh their downward routes.
    pub fn refresh_routes(&mut self, reason: &str) {
        if self.is_root() {
            self.instance.dtsn_out.increment();
            net_warn!(
                "incremented DTSN ({}), current {}",
                reason,
                self.instance.dtsn_out
            );
            self.print_neighbor_list("Refresh routes");
        }
    }

    /// Rebuild the DAG with a new version. Only the root can do this.
    pub fn global_repair(&mut self, reason: &str) {
        if !self.is_root() {
            return;
        }

        self.instance.dag.version.increment();
        self.instance.dtsn_out = SequenceCounter::default();
        net_warn!(
            "initiating global repair ({}), version {}, rank {}",
            reason,
            self.instance.dag.version,
            self.instance.dag.rank
        );
        self.print_neighbor_list("Global repair");

        // Now do a local repair to disseminate the new version.
        self.local_repair("Global repair");
    }

    /// Follow the global repair started by the root.
    fn global_repair_non_root(&mut self, dio: &RplDio) {
        if self.is_root() {
            return;
        }

        net_warn!(
            "participating in global repair, version {}, rank {}",
            dio.version_number,
            self.instance.dag.rank
        );
        self.stop_dag_timers();
        self.set_preferred_parent(None);
        if self.process_dio_init_dag(dio).is_err() {
            net_warn!("failed to join the new DAG version");
        }
        self.local_repair("Global repair");
    }

    /// Forget all neighbors and select a parent again.
    pub fn local_repair(&mut self, reason: &str) {
        if !self.instance.used {
            return;
        }

        net_warn!("local repair ({})", reason);
        if !self.is_root() {
            self.instance.dag.state = DagState::Initialized;
        }
        self.instance.of.reset();
        self.remove_all_neighbors();
        self.dio_reset("Local repair");
        self.schedule_state_update();
    }

    /// Re-evaluate the preferred parent and the rank, and handle the consequences.
    pub(crate) fn update_state(&mut self) {
        if !self.instance.used {
            return;
        }

        let old_rank = self.instance.dag.rank;
        self.unschedule_state_update();

        if self.instance.dag.state == DagState::Poisoning {
            self.set_preferred_parent(None);
            self.instance.dag.rank = Rank::INFINITE;
            if !old_rank.is_infinite() {
                // Advertise the infinite rank, then leave.
                net_warn!("poisoning and leaving after a delay");
                self.dio_reset("Poison routes");
                self.schedule_leaving();
            }
        } else if !self.is_root() {
            let old_parent = self.instance.dag.preferred_parent;
            let parent = self.select_best_parent();
            self.set_preferred_parent(parent);
            let rank = match parent {
                Some(parent) => self.rank_via_neighbor(&parent),
                None => Rank::INFINITE,
            };
            self.instance.dag.rank = rank;

            self.update_better_parent_since(rank);

            let dag = &mut self.instance.dag;
            if old_parent.is_none() || rank < dag.lowest_rank {
                dag.lowest_rank = rank;
            }

            let threshold = self.instance.min_hop_rank_increase.saturating_mul(4);
            if !dag.last_advertised_rank.is_infinite()
                && !rank.is_infinite()
                && rank.0.abs_diff(dag.last_advertised_rank.0) > threshold
            {
                net_warn!(
                    "significant rank update {}->{}",
                    dag.last_advertised_rank,
                    rank
                );
                // Update the last advertised rank right away, so the reset only happens once.
                dag.last_advertised_rank = rank;
                self.dio_reset("Significant rank update");
            }

            if self.instance.dag.unprocessed_parent_switch {
                match parent {
                    Some(parent) => {
                        if old_parent.is_none() {
                            self.instance.dag.state = DagState::Joined;
                            self.dio_reset("Got parent");
                            net_warn!(
                                "found parent: {:?}, staying in DAG",
                                self.neighbor_ip_addr(&parent)
                            );
                            self.unschedule_leaving();
                        }
                        // Advertise the new parent.
                        self.schedule_dao();
                    }
                    None => {
                        self.instance.dag.state = DagState::Initialized;
                        net_warn!(
                            "no parent, scheduling periodic DIS, will leave if no parent is found"
                        );
                        self.dio_reset("Poison routes");
                        self.schedule_periodic_dis();
                        self.schedule_leaving();
                    }
                }

                self.print_neighbor_list("Parent switch");
                self.instance.dag.unprocessed_parent_switch = false;
            }
        }

        let mc = self.instance.mc;
        self.instance.mc = self
            .instance
            .of
            .update_metric_container(&self.of_context(), mc);
    }

    /// Track since when each neighbor would give us a better rank than we have.
    fn update_better_parent_since(&mut self, rank: Rank) {
        let now: Instant = self.now;
        let ctx = self.of_context();
        let of = self.instance.of;
        let mut better = heapless::Vec::<HardwareAddress, { crate::config::RPL_NEIGHBOR_TABLE_SIZE }>::new();
        for (addr, nbr) in self.neighbors.iter() {
            let c = super::of::Candidate { addr: *addr, nbr };
            if of.rank_via_neighbor(&ctx, &c) < rank {
                // Cannot overflow: both have the capacity of the neighbor table.
                let _ = better.push(*addr);
            }
        }

        for (addr, nbr) in self.neighbors.iter_mut() {
            if better.contains(addr) {
                if nbr.better_parent_since.is_none() {
                    nbr.better_parent_since = Some(now);
                }
            } else {
                nbr.better_parent_since = None;
            }
        }
    }

    /// Reset the instance and set up a DAG.
    fn init_dag(
        &mut self,
        instance_id: InstanceId,
        dag_id: Ipv6Address,
        ocp: u16,
        prefix: &Ipv6Address,
        prefix_len: u8,
        prefix_flags: PrefixFlags,
    ) -> Result<()> {
        self.instance = Instance::default();

        let Some(of) = Of::from_ocp(ocp, self.config.squared_etx) else {
            net_warn!("ignoring DIO with an unsupported OF: {}", ocp);
            return Err(Error::UnsupportedObjectiveFunction(ocp));
        };

        if !self.set_prefix_from_addr(prefix, prefix_len, prefix_flags) {
            net_warn!("failed to set prefix");
            return Err(Error::InvalidPrefix);
        }

        let instance = &mut self.instance;
        instance.instance_id = instance_id;
        instance.of = of;
        instance.dtsn_out = SequenceCounter::default();
        instance.used = true;

        let dag = &mut instance.dag;
        dag.rank = Rank::INFINITE;
        dag.last_advertised_rank = Rank::INFINITE;
        dag.lowest_rank = Rank::INFINITE;
        dag.dao_last_seqno = SequenceCounter::default();
        dag.dao_last_acked_seqno = SequenceCounter::default();
        dag.dag_id = dag_id;

        Ok(())
    }

    fn init_dag_from_dio(&mut self, dio: &RplDio) -> Result<()> {
        let Some(prefix) = dio.prefix_information else {
            net_warn!("failed to set prefix");
            return Err(Error::InvalidPrefix);
        };
        let config = dio.dodag_configuration;

        self.init_dag(
            dio.rpl_instance_id,
            dio.dodag_id,
            config.objective_code_point,
            &prefix.prefix,
            prefix.prefix_length,
            prefix.flags,
        )?;

        let instance = &mut self.instance;
        instance.mop = dio.mode_of_operation;
        instance.mc = dio.metric_container.unwrap_or(MetricContainer::NONE);
        instance.max_rank_increase = config.max_rank_increase;
        instance.min_hop_rank_increase = config.minimum_hop_rank_increase;
        instance.default_lifetime = config.default_lifetime;
        instance.lifetime_unit = config.lifetime_unit;

        let dag = &mut instance.dag;
        dag.state = DagState::Initialized;
        dag.preference = dio.dodag_preference;
        dag.grounded = dio.grounded;
        dag.version = dio.version_number;
        dag.trickle = TrickleTimer::new(
            config.dio_interval_min,
            config.dio_interval_doublings,
            config.dio_redundancy_constant,
        );

        // Keep the lifetime advertised with the prefix.
        self.set_prefix(&prefix);

        Ok(())
    }

    /// Join the DAG a DIO advertises.
    fn process_dio_init_dag(&mut self, dio: &RplDio) -> Result<()> {
        if !matches!(
            dio.mode_of_operation,
            ModeOfOperation::NoDownwardRoutesMaintained | ModeOfOperation::NonStoringMode
        ) {
            let mop = u8::from(dio.mode_of_operation);
            net_warn!("ignoring DIO with an unsupported MOP: {}", mop);
            return Err(Error::UnsupportedModeOfOperation(mop));
        }

        if let Err(err) = self.init_dag_from_dio(dio) {
            net_warn!("failed to initialize DAG");
            return Err(err);
        }

        self.instance.of.reset();
        self.dio_reset("Join");
        self.schedule_probing();

        let prefix = self.instance.dag.prefix_info;
        net_info!(
            "initialized DAG with instance ID {}, DAG ID {}, prefix {:?}/{}, rank {}",
            self.instance.instance_id,
            self.instance.dag.dag_id,
            prefix.map(|p| p.prefix),
            prefix.map(|p| p.prefix_length).unwrap_or(0),
            self.instance.dag.rank
        );

        net_warn!("just joined, no parent yet, setting timer for leaving");
        self.schedule_leaving();
        Ok(())
    }

    /// Update the RPL neighbor behind `from` with the content of its DIO.
    fn update_nbr_from_dio(&mut self, from: &Ipv6Address, dio: &RplDio) -> Option<HardwareAddress> {
        let addr = self.neighbor_cache.lookup(from)?;
        if !self.neighbors.contains(&addr) && !self.add_neighbor(addr) {
            net_warn!("failed to add neighbor {}", from);
            return None;
        }

        let nbr = self.neighbors.get_mut(&addr)?;
        nbr.rank = Rank(dio.rank);
        nbr.dtsn = dio.dtsn;
        nbr.mc = dio.metric_container.unwrap_or(MetricContainer::NONE);
        Some(addr)
    }

    fn process_dio_from_current_dag(
        &mut self,
        from: &Ipv6Address,
        lladdr: HardwareAddress,
        dio: &RplDio,
    ) {
        let rank = Rank(dio.rank);
        if rank < self.root_rank() {
            net_info!("dropping DIO with rank {} below the root rank", rank);
            return;
        }

        if self.instance.dag.version.greater_than(&dio.version_number) {
            if rank == self.root_rank() {
                // The root runs an old version: tell it about the current one.
                self.dio_reset("Heard old version from root");
            }
            return;
        }

        if !rank.is_infinite() {
            self.instance.dag.trickle.hear_consistent();
        }

        if dio.version_number.greater_than(&self.instance.dag.version) {
            if self.is_root() {
                net_warn!(
                    "inconsistent DIO version (current: {}, received: {}), initiate global repair",
                    self.instance.dag.version,
                    dio.version_number
                );
                self.instance.dag.version = dio.version_number;
                self.global_repair("Inconsistent DIO version");
            } else {
                net_warn!(
                    "new DIO version (current: {}, received: {}), apply global repair",
                    self.instance.dag.version,
                    dio.version_number
                );
                self.global_repair_non_root(dio);
            }
            if !self.instance.used {
                return;
            }
        }

        if !self.neighbor_cache.fill(*from, lladdr, self.now) {
            net_warn!("IPv6 cache full, dropping DIO");
            return;
        }

        let known = self.neighbor_from_ip(from);
        let last_dtsn = known
            .and_then(|addr| self.neighbors.get(&addr))
            .map(|nbr| nbr.dtsn)
            .unwrap_or_default();

        let Some(nbr) = self.update_nbr_from_dio(from, dio) else {
            net_warn!("neighbor table full, dropping DIO");
            return;
        };

        let from_parent = self.instance.dag.preferred_parent == Some(nbr);
        if self.instance.dag.lifetime == 0 || (known.is_some() && from_parent) {
            net_info!("refreshing lifetime");
            self.instance.dag.lifetime =
                u32::from(self.instance.lifetime_unit).saturating_mul(self.config.dag_lifetime);
        }

        if self.instance.mop != ModeOfOperation::NoDownwardRoutesMaintained
            && from_parent
            && dio.dtsn.greater_than(&last_dtsn)
        {
            let old = self.instance.dtsn_out;
            self.instance.dtsn_out.increment();
            net_warn!(
                "DTSN increment {}->{}, schedule new DAO with DTSN {}",
                old,
                self.instance.dtsn_out,
                self.instance.dtsn_out
            );
            self.schedule_dao();
        }
    }

    /// Process a DIO received from `from` (link-layer address `lladdr`).
    pub fn process_dio(&mut self, from: Ipv6Address, lladdr: HardwareAddress, dio: &RplDio) {
        if !self.instance.used && self.process_dio_init_dag(dio).is_err() {
            net_warn!("failed to init DAG");
            return;
        }

        if self.instance.used
            && self.instance.instance_id == dio.rpl_instance_id
            && self.instance.dag.dag_id == dio.dodag_id
        {
            self.process_dio_from_current_dag(&from, lladdr, dio);
            self.update_state();
        }
    }

    /// Process a DIS. A multicast DIS resets the Trickle timer, a unicast one is answered
    /// with a unicast DIO.
    pub fn process_dis(&mut self, from: Ipv6Address, lladdr: HardwareAddress, multicast: bool) {
        if multicast {
            self.dio_reset("Multicast DIS");
        } else if self.neighbor_cache.fill(from, lladdr, self.now) {
            net_info!("unicast DIS, reply to sender");
            self.dio_output(Some(from));
        }
    }

    /// Process a DAO at the root: update the link from `from` to its parent.
    pub fn process_dao(&mut self, from: Ipv6Address, dao: &RplDao) {
        let graph = self.graph();
        // Without transit information, the route gets the default lifetime.
        let lifetime = dao
            .transit_information
            .map(|t| t.path_lifetime)
            .unwrap_or(self.instance.default_lifetime);
        let parent = dao.parent_address();

        if lifetime == 0 {
            if let Some(parent) = parent {
                self.source_routes.expire_parent(&graph, &from, &parent);
            }
        } else {
            let secs = if lifetime == consts::INFINITE_LIFETIME {
                consts::ROUTE_INFINITE_LIFETIME
            } else {
                self.instance.lifetime_secs(lifetime)
            };
            if self
                .source_routes
                .update_node(&graph, &from, parent.as_ref(), secs)
                .is_none()
            {
                net_warn!("failed to add link on incoming DAO");
                return;
            }
        }

        if dao.expect_ack && self.config.with_dao_ack {
            self.schedule_dao_ack(from, dao.sequence);
        }
    }

    /// Process a DAO-ACK for our DAO with sequence number `sequence`.
    pub fn process_dao_ack(&mut self, sequence: SequenceCounter, status: u8) {
        let dag = &mut self.instance.dag;
        if sequence.greater_than(&dag.dao_last_acked_seqno) {
            dag.dao_last_acked_seqno = sequence;
        }

        if sequence != dag.dao_last_seqno {
            return;
        }

        let accepted = status < DAO_ACK_UNABLE_TO_ACCEPT;
        if dag.state == DagState::Joined && accepted {
            dag.state = DagState::Reachable;
            self.dio_reset("Reachable");
        }
        // Let the pending retransmission be replaced by a refresh.
        self.notify_dao_ack();

        if !accepted {
            net_warn!(
                "DAO-NACK received with seqno {}, status {}, poison and leave",
                sequence,
                status
            );
            self.instance.dag.state = DagState::Poisoning;
        }
    }

    /// Process the RPL data-plane information of a packet from `sender`.
    ///
    /// Returns `false` when the packet must be dropped.
    pub fn process_hbh(
        &mut self,
        sender: Option<HardwareAddress>,
        sender_rank: u16,
        loop_detected: bool,
        rank_error_signaled: bool,
    ) -> bool {
        let mut drop = false;

        if loop_detected {
            if rank_error_signaled && self.config.loop_error_drop {
                // Hop-by-hop loop repair: reset Trickle and drop the packet.
                self.dio_reset("HBH error");
                net_warn!("rank error and loop detected, dropping");
                drop = true;
            }
            if let Some(sender) = sender {
                self.schedule_unicast_dio(sender);
            }
        }

        if rank_error_signaled {
            if let Some(nbr) = sender.and_then(|s| self.neighbors.get_mut(&s)) {
                // The sender's rank changed since its last DIO.
                nbr.rank = Rank(sender_rank);
                self.update_state();
            }
        }

        !drop
    }

    /// Start a DAG with this node as root.
    pub(crate) fn dag_init_root(
        &mut self,
        instance_id: InstanceId,
        dag_id: Ipv6Address,
        prefix: &Ipv6Address,
        prefix_len: u8,
        prefix_flags: PrefixFlags,
    ) -> Result<()> {
        let mut version = SequenceCounter::default();

        if self.instance.used {
            if self.instance.dag.dag_id == dag_id {
                version = self.instance.dag.version.next();
            }
            self.leave();
        }

        self.init_dag(
            instance_id,
            dag_id,
            self.config.ocp,
            prefix,
            prefix_len,
            prefix_flags,
        )?;

        let config = &self.config;
        let instance = &mut self.instance;
        instance.mop = config.mode_of_operation;
        instance.max_rank_increase = config.max_rank_increase();
        instance.min_hop_rank_increase = config.min_hop_rank_increase();
        instance.default_lifetime = config.default_lifetime;
        instance.lifetime_unit = config.lifetime_unit;

        let dag = &mut instance.dag;
        dag.preference = config.preference;
        dag.grounded = config.grounded;
        dag.version = version;
        dag.rank = Rank::root(instance.min_hop_rank_increase);
        dag.lifetime = consts::ROUTE_INFINITE_LIFETIME;
        dag.trickle = TrickleTimer::new(
            config.dio_interval_min,
            config.dio_interval_doublings,
            config.dio_redundancy,
        );
        dag.state = DagState::Reachable;

        self.dio_reset("Init root");

        net_info!(
            "created DAG with instance ID {}, DAG ID {}, rank {}",
            self.instance.instance_id,
            self.instance.dag.dag_id,
            self.instance.dag.rank
        );
        Ok(())
    }

    /// Log the links of the source routing table.
    pub fn print_source_routes(&self, reason: &str) {
        if !self.is_root() {
            return;
        }
        net_info!(
            "links: {} routing links in total ({})",
            self.source_routes.num_nodes(),
            reason
        );
        for link in self.source_routes.links() {
            net_info!("links: {}", link);
        }
        net_info!("links: end of list");
    }
}
