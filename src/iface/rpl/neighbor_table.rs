//! The RPL neighbors of a node, and the selection of the preferred parent among them.
//!
//! Neighbors are keyed by link-layer address. The preferred parent is a key into the table,
//! and its entry stays locked while it is referenced.

use core::fmt;

use super::lollipop::SequenceCounter;
use super::of::{Candidate, ObjectiveFunction, OfContext};
use super::rank::Rank;
use super::Rpl;

use crate::config::RPL_NEIGHBOR_TABLE_SIZE;
use crate::iface::nbr_table::{Added, NbrTable};
use crate::time::Instant;
use crate::wire::rpl::MetricContainer;
use crate::wire::{HardwareAddress, Ipv6Address};

pub type RplNeighborTable = NbrTable<RplNeighbor, RPL_NEIGHBOR_TABLE_SIZE>;

/// What a node knows about a neighbor from its DIOs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RplNeighbor {
    pub rank: Rank,
    pub dtsn: SequenceCounter,
    pub mc: MetricContainer,
    /// Since when this neighbor would give us a better rank than our preferred parent.
    pub better_parent_since: Option<Instant>,
}

impl Default for RplNeighbor {
    fn default() -> Self {
        Self {
            rank: Rank::INFINITE,
            dtsn: SequenceCounter::default(),
            mc: MetricContainer::NONE,
            better_parent_since: None,
        }
    }
}

impl Rpl {
    /// Everything the objective function needs besides the neighbor itself.
    pub(crate) fn of_context(&self) -> OfContext<'_> {
        let dag = &self.instance.dag;
        OfContext {
            now: self.now,
            link_stats: &self.link_stats,
            min_hop_rank_increase: self.instance.min_hop_rank_increase,
            rank: dag.rank,
            used: self.instance.used,
            preferred_parent: dag.preferred_parent.and_then(|p| self.candidate(&p)),
            with_mc: self.config.with_mc,
            root_mc_type: self.config.mc_type,
            mc_type: self.instance.mc.metric_type(),
        }
    }

    pub(crate) fn candidate(&self, addr: &HardwareAddress) -> Option<Candidate<'_>> {
        self.neighbors
            .get(addr)
            .map(|nbr| Candidate { addr: *addr, nbr })
    }

    /// Return the RPL neighbor behind an IPv6 address, looked up in the neighbor cache.
    pub(crate) fn neighbor_from_ip(&self, ip: &Ipv6Address) -> Option<HardwareAddress> {
        let hw = self.neighbor_cache.lookup(ip)?;
        self.neighbors.contains(&hw).then_some(hw)
    }

    pub fn neighbor_ip_addr(&self, addr: &HardwareAddress) -> Option<Ipv6Address> {
        self.neighbor_cache.lookup_ip(addr)
    }

    /// The rank we would have with `addr` as preferred parent.
    pub fn rank_via_neighbor(&self, addr: &HardwareAddress) -> Rank {
        match self.candidate(addr) {
            Some(c) => self.instance.of.rank_via_neighbor(&self.of_context(), &c),
            None => Rank::INFINITE,
        }
    }

    pub fn neighbor_link_metric(&self, addr: &HardwareAddress) -> u16 {
        match self.candidate(addr) {
            Some(c) => self.instance.of.link_metric(&self.of_context(), &c),
            None => 0xffff,
        }
    }

    pub fn neighbor_is_fresh(&self, addr: &HardwareAddress) -> bool {
        self.link_stats
            .get(addr)
            .is_some_and(|stats| stats.is_fresh(self.now))
    }

    /// Without fresh link statistics, a neighbor is assumed reachable.
    pub fn neighbor_is_reachable(&self, addr: &HardwareAddress) -> bool {
        match self.candidate(addr) {
            Some(c) => {
                !self.neighbor_is_fresh(addr)
                    || self.instance.of.has_usable_link(&self.of_context(), &c)
            }
            None => false,
        }
    }

    pub fn neighbor_is_parent(&self, addr: &HardwareAddress) -> bool {
        self.neighbors
            .get(addr)
            .is_some_and(|nbr| nbr.rank < self.instance.dag.rank)
    }

    fn neighbor_is_acceptable_parent(&self, addr: &HardwareAddress) -> bool {
        match self.candidate(addr) {
            Some(c) => {
                let ctx = self.of_context();
                let of = &self.instance.of;
                self.acceptable_rank(of.rank_via_neighbor(&ctx, &c))
                    && of.is_acceptable_parent(&ctx, &c)
            }
            None => false,
        }
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub(crate) fn max_acceptable_rank(&self) -> Rank {
        if self.instance.max_rank_increase == 0 {
            Rank::INFINITE
        } else {
            self.instance
                .dag
                .lowest_rank
                .saturating_add(self.instance.max_rank_increase)
        }
    }

    pub(crate) fn acceptable_rank(&self, rank: Rank) -> bool {
        !rank.is_infinite() && rank >= self.root_rank() && rank <= self.max_acceptable_rank()
    }

    fn best_parent(&self, fresh_only: bool) -> Option<HardwareAddress> {
        if !self.instance.used {
            return None;
        }

        let ctx = self.of_context();
        let of = &self.instance.of;
        let mut best: Option<Candidate<'_>> = None;

        for (addr, nbr) in self.neighbors.iter() {
            let c = Candidate { addr: *addr, nbr };
            if !self.acceptable_rank(of.rank_via_neighbor(&ctx, &c))
                || !of.is_acceptable_parent(&ctx, &c)
            {
                continue;
            }
            if fresh_only && !self.neighbor_is_fresh(addr) {
                continue;
            }
            best = of.best_parent(&ctx, best, Some(c));
        }

        best.map(|c| c.addr)
    }

    /// Select the preferred parent. The root has none.
    ///
    /// With probing, a parent whose link statistics are not fresh is probed urgently. A node
    /// without a parent waits for a fresh candidate, a node with one sticks to the best until
    /// probing settles.
    pub(crate) fn select_best_parent(&mut self) -> Option<HardwareAddress> {
        if self.is_root() {
            return None;
        }

        let best = self.best_parent(false)?;
        if !self.config.with_probing {
            return Some(best);
        }

        if self.neighbor_is_fresh(&best) {
            self.instance.dag.urgent_probing_target = None;
            return Some(best);
        }

        if self.instance.dag.urgent_probing_target.is_none() {
            net_info!(
                "best parent is not fresh, schedule urgent probing to {:?}",
                self.neighbor_ip_addr(&best)
            );
            self.instance.dag.urgent_probing_target = Some(best);
            self.schedule_probing_now();
        }

        if self.instance.dag.preferred_parent == Some(best) {
            return Some(best);
        }

        match self.best_parent(true) {
            Some(fresh) => Some(fresh),
            None if self.instance.dag.preferred_parent.is_none() => None,
            None => Some(best),
        }
    }

    /// Change the preferred parent, moving the default route and the lock of the table entry.
    ///
    /// Setting the current parent again does nothing.
    pub(crate) fn set_preferred_parent(&mut self, parent: Option<HardwareAddress>) {
        let old = self.instance.dag.preferred_parent;
        if old == parent {
            return;
        }

        let old_ip = old.and_then(|addr| self.neighbor_ip_addr(&addr));
        let new_ip = parent.and_then(|addr| self.neighbor_ip_addr(&addr));
        net_info!("parent switch: {:?} -> {:?}", old_ip, new_ip);

        if let Some(old) = old {
            self.neighbors.unlock(&old);
            self.link_stats.unlock(&old);
            let via_old = self
                .routes
                .default_ipv6_route()
                .is_some_and(|route| Some(route.via_router) == old_ip);
            if via_old {
                self.routes.remove_default_ipv6_route();
            }
        }

        if let Some(parent) = parent {
            self.neighbors.lock(&parent);
            self.link_stats.lock(&parent);
            match new_ip {
                Some(ip) => {
                    if self.routes.add_default_ipv6_route(ip).is_err() {
                        net_warn!("route table full, no default route via {}", ip);
                    }
                }
                None => net_warn!("no IPv6 address for parent {}", parent),
            }
        }

        self.instance.dag.preferred_parent = parent;
        self.instance.dag.unprocessed_parent_switch = true;
    }

    /// Add a neighbor, evicting the one with the highest rank when the table is full.
    ///
    /// Returns `false` when every entry is locked.
    pub(crate) fn add_neighbor(&mut self, addr: HardwareAddress) -> bool {
        match self
            .neighbors
            .add(addr, RplNeighbor::default, |a, b| a.rank > b.rank)
        {
            Ok(Added::Evicted(evicted, _)) => {
                self.forget_neighbor(&evicted);
                true
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// Drop the references to a neighbor that left the table.
    fn forget_neighbor(&mut self, addr: &HardwareAddress) {
        let dag = &mut self.instance.dag;
        if dag.urgent_probing_target == Some(*addr) {
            dag.urgent_probing_target = None;
        }
        if dag.unicast_dio_target == Some(*addr) {
            dag.unicast_dio_target = None;
        }
        self.schedule_state_update();
    }

    pub(crate) fn remove_neighbor(&mut self, addr: &HardwareAddress) {
        if self.instance.dag.preferred_parent == Some(*addr) {
            self.set_preferred_parent(None);
        }
        if self.neighbors.remove(addr).is_some() {
            self.forget_neighbor(addr);
        }
    }

    /// Remove every neighbor and update the DAG state right away.
    pub(crate) fn remove_all_neighbors(&mut self) {
        net_info!("removing all neighbors");

        // Losing the parent this way lets the state update handle the parent switch.
        self.set_preferred_parent(None);

        loop {
            let Some(addr) = self.neighbors.keys().next() else {
                break;
            };
            self.remove_neighbor(&addr);
        }

        self.update_state();
    }

    /// A diagnostic line describing one neighbor.
    pub fn neighbor_line(&self, addr: &HardwareAddress) -> Option<NeighborLine> {
        let nbr = self.neighbors.get(addr)?;
        let stats = self.link_stats.get(addr);
        let rank_via = self.rank_via_neighbor(addr);

        Some(NeighborLine {
            ip_addr: self.neighbor_ip_addr(addr),
            rank: nbr.rank,
            link_metric: self.neighbor_link_metric(addr),
            rank_via,
            freshness: stats.map(|s| s.freshness).unwrap_or(0),
            root: nbr.rank == self.root_rank(),
            best: self.best_parent(false) == Some(*addr),
            acceptable: self.neighbor_is_acceptable_parent(addr),
            fresh: self.neighbor_is_fresh(addr),
            preferred: self.instance.dag.preferred_parent == Some(*addr),
            last_tx_mins: stats
                .and_then(|s| s.last_tx_time)
                .map(|t| (self.now - t).secs() / 60),
            better_since_mins: nbr
                .better_parent_since
                .map(|t| (self.now - t).secs() / 60),
        })
    }

    /// Log our own state followed by one line per neighbor.
    pub fn print_neighbor_list(&self, reason: &str) {
        if !self.instance.used {
            return;
        }

        let dag = &self.instance.dag;
        net_info!(
            "nbr: own state, addr {:?}, DAG state: {}, MOP {} OCP {} rank {} max-rank {}, dioint {}, nbr count {} ({})",
            self.global_address(),
            dag.state,
            u8::from(self.instance.mop),
            self.instance.of.ocp(),
            dag.rank,
            self.max_acceptable_rank(),
            dag.trickle.i_current(),
            self.neighbor_count(),
            reason
        );
        for addr in self.neighbors.keys() {
            if let Some(line) = self.neighbor_line(&addr) {
                net_info!("nbr: {}", line);
            }
        }
        net_info!("nbr: end of list");
    }
}

/// See [`Rpl::neighbor_line`].
///
/// The flags are: `r` root, `b` best parent, `a` acceptable parent, `f` fresh link,
/// `p` preferred parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborLine {
    pub ip_addr: Option<Ipv6Address>,
    pub rank: Rank,
    pub link_metric: u16,
    pub rank_via: Rank,
    pub freshness: u8,
    pub root: bool,
    pub best: bool,
    pub acceptable: bool,
    pub fresh: bool,
    pub preferred: bool,
    pub last_tx_mins: Option<u64>,
    pub better_since_mins: Option<u64>,
}

impl NeighborLine {
    fn flag(set: bool, c: char) -> char {
        if set {
            c
        } else {
            ' '
        }
    }
}

impl fmt::Display for NeighborLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip_addr {
            Some(ip) => write!(f, "{ip}")?,
            None => write!(f, "(NULL IP addr)")?,
        }
        write!(
            f,
            "{:5}, {:5} => {:5} -- {:2} {}{}{}{}{}",
            self.rank.raw_value(),
            self.link_metric,
            self.rank_via.raw_value(),
            self.freshness,
            Self::flag(self.root, 'r'),
            Self::flag(self.best, 'b'),
            Self::flag(self.acceptable, 'a'),
            Self::flag(self.fresh, 'f'),
            Self::flag(self.preferred, 'p'),
        )?;
        match self.last_tx_mins {
            Some(mins) => write!(f, " (last tx {mins} min ago")?,
            None => write!(f, " (no tx")?,
        }
        match self.better_since_mins {
            Some(mins) => write!(f, ", better since {mins} min)"),
            None => write!(f, ")"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for NeighborLine {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{} {=u16}, {=u16} => {=u16} -- {=u8} r={=bool} b={=bool} a={=bool} f={=bool} p={=bool} last tx {} min, better since {} min",
            self.ip_addr,
            self.rank.raw_value(),
            self.link_metric,
            self.rank_via.raw_value(),
            self.freshness,
            self.root,
            self.best,
            self.acceptable,
            self.fresh,
            self.preferred,
            self.last_tx_mins,
            self.better_since_mins
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::*;
    use crate::iface::link_stats::TxStatus;

    const OTHER_HW: HardwareAddress = HardwareAddress::Extended([0x02, 0, 0, 0, 0, 0, 0, 3]);

    fn ll(hw: HardwareAddress) -> Ipv6Address {
        hw.as_link_local_address().unwrap()
    }

    fn make_fresh(rpl: &mut Rpl, hw: HardwareAddress) {
        for _ in 0..8 {
            rpl.link_stats.packet_sent(&hw, TxStatus::Ok, 1, rpl.now);
        }
    }

    /// A node that heard a first DIO from the root, without a parent yet.
    fn joining_node(with_probing: bool) -> Rpl {
        let config = crate::iface::rpl::RplConfig::default()
            .set_random_seed(3)
            .set_with_probing(with_probing);
        let mut rpl = Rpl::new(config, NODE_HW, crate::time::Instant::from_secs(1));
        rpl.packet_input(&ROOT_HW, -60);
        rpl.process_dio(ll(ROOT_HW), ROOT_HW, &root_dio(128));
        rpl
    }

    #[test]
    fn dio_adds_neighbor() {
        let rpl = joining_node(false);
        assert_eq!(rpl.neighbor_count(), 1);
        assert_eq!(rpl.neighbors().get(&ROOT_HW).map(|n| n.rank), Some(Rank(128)));
        assert_eq!(rpl.neighbor_ip_addr(&ROOT_HW), Some(ll(ROOT_HW)));
        assert_eq!(rpl.neighbor_from_ip(&ll(ROOT_HW)), Some(ROOT_HW));
        assert!(rpl.neighbor_is_reachable(&ROOT_HW));
        assert!(rpl.neighbor_is_parent(&ROOT_HW));
    }

    #[test]
    fn parent_without_probing() {
        let rpl = joining_node(false);
        // No link statistics yet: the default ETX of 2.0 gives a link metric of 256.
        assert_eq!(rpl.dag().preferred_parent, Some(ROOT_HW));
        assert_eq!(rpl.dag().rank, Rank(128 + 256));
        assert!(rpl.neighbors().is_locked(&ROOT_HW));
        assert_eq!(
            rpl.routes().default_ipv6_route().map(|r| r.via_router),
            Some(ll(ROOT_HW))
        );
    }

    #[test]
    fn probing_waits_for_fresh_parent() {
        let mut rpl = joining_node(true);
        assert_eq!(rpl.dag().preferred_parent, None);
        assert_eq!(rpl.dag().urgent_probing_target, Some(ROOT_HW));

        make_fresh(&mut rpl, ROOT_HW);
        let best = rpl.select_best_parent();
        assert_eq!(best, Some(ROOT_HW));
        assert_eq!(rpl.dag().urgent_probing_target, None);
    }

    #[test]
    fn set_preferred_parent_is_idempotent() {
        let mut rpl = joining_node(false);
        rpl.instance.dag.unprocessed_parent_switch = false;

        rpl.set_preferred_parent(Some(ROOT_HW));
        assert!(!rpl.dag().unprocessed_parent_switch);
        assert!(rpl.neighbors().is_locked(&ROOT_HW));

        rpl.set_preferred_parent(None);
        assert!(rpl.dag().unprocessed_parent_switch);
        assert!(!rpl.neighbors().is_locked(&ROOT_HW));
        assert_eq!(rpl.routes().default_ipv6_route(), None);
    }

    #[test]
    fn unacceptable_rank_is_filtered() {
        let mut rpl = joining_node(false);
        rpl.instance.dag.lowest_rank = Rank(384);
        rpl.instance.max_rank_increase = 128;
        assert_eq!(rpl.max_acceptable_rank(), Rank(512));
        assert!(rpl.acceptable_rank(Rank(512)));
        assert!(!rpl.acceptable_rank(Rank(513)));
        assert!(!rpl.acceptable_rank(Rank(64)));

        rpl.instance.max_rank_increase = 0;
        assert_eq!(rpl.max_acceptable_rank(), Rank::INFINITE);
        assert!(!rpl.acceptable_rank(Rank::INFINITE));
    }

    #[test]
    fn remove_all_neighbors() {
        let mut rpl = joining_node(false);
        rpl.process_dio(ll(OTHER_HW), OTHER_HW, &root_dio(512));
        assert_eq!(rpl.neighbor_count(), 2);

        rpl.remove_all_neighbors();
        assert_eq!(rpl.neighbor_count(), 0);
        assert_eq!(rpl.dag().preferred_parent, None);
        assert_eq!(rpl.dag().rank, Rank::INFINITE);
    }

    #[test]
    fn removing_a_neighbor_clears_targets() {
        let mut rpl = joining_node(true);
        assert_eq!(rpl.dag().urgent_probing_target, Some(ROOT_HW));
        rpl.instance.dag.unicast_dio_target = Some(ROOT_HW);

        rpl.remove_neighbor(&ROOT_HW);
        assert_eq!(rpl.dag().urgent_probing_target, None);
        assert_eq!(rpl.dag().unicast_dio_target, None);
        assert!(rpl.timers.state_update.is_some());
    }

    #[test]
    fn neighbor_line() {
        let rpl = joining_node(false);
        let line = rpl.neighbor_line(&ROOT_HW).unwrap();
        assert!(line.root);
        assert!(line.preferred);
        assert!(line.best);
        assert!(line.acceptable);
        assert!(!line.fresh);

        let text = std::format!("{line}");
        assert!(text.starts_with(&std::format!("{}", ll(ROOT_HW))));
        assert!(text.contains("  128,   256 =>   384 --  0 rba p (no tx)"));

        assert_eq!(rpl.neighbor_line(&OTHER_HW), None);
    }
}
