//! Timers of the RPL core.
//!
//! Every timer is a deadline. [`Rpl::poll`] takes the expired ones out, earliest first, and
//! runs their handler. A timer set to the current instant is a deferred call: it runs in the
//! same poll, after the handler that set it returns.

use super::consts;
use super::dag::DagState;
use super::lollipop::SequenceCounter;
use super::Rpl;

use crate::iface::link_stats::FRESHNESS_HALF_LIFE;
use crate::time::{Duration, Instant};
use crate::wire::rpl::{ModeOfOperation, DAO_ACK_UNCONDITIONAL_ACCEPT};
use crate::wire::{HardwareAddress, Ipv6Address};

/// What the DAO timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum DaoAction {
    SendNew,
    Resend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum Timer {
    StateUpdate,
    DaoAck,
    UnicastDio,
    Dao(DaoAction),
    Dio,
    Probing,
    Dis,
    Leave,
    Periodic,
    LinkStats,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Timers {
    pub state_update: Option<Instant>,
    pub dao_ack: Option<Instant>,
    pub unicast_dio: Option<Instant>,
    pub dao: Option<(Instant, DaoAction)>,
    pub dio: Option<Instant>,
    pub probing: Option<Instant>,
    pub dis: Option<Instant>,
    pub leave: Option<Instant>,
    pub periodic: Option<Instant>,
    pub link_stats: Option<Instant>,
}

impl Timers {
    fn deadlines(&self) -> [(Option<Instant>, Timer); 10] {
        [
            (self.state_update, Timer::StateUpdate),
            (self.dao_ack, Timer::DaoAck),
            (self.unicast_dio, Timer::UnicastDio),
            (
                self.dao.map(|(at, _)| at),
                Timer::Dao(self.dao.map(|(_, a)| a).unwrap_or(DaoAction::SendNew)),
            ),
            (self.dio, Timer::Dio),
            (self.probing, Timer::Probing),
            (self.dis, Timer::Dis),
            (self.leave, Timer::Leave),
            (self.periodic, Timer::Periodic),
            (self.link_stats, Timer::LinkStats),
        ]
    }

    /// Take out the earliest timer expired at `now`. Timers with the same deadline come out in
    /// declaration order.
    pub fn take_expired(&mut self, now: Instant) -> Option<Timer> {
        let (_, timer) = self
            .deadlines()
            .into_iter()
            .filter_map(|(at, timer)| at.filter(|at| *at <= now).map(|at| (at, timer)))
            .min_by_key(|(at, _)| *at)?;

        match timer {
            Timer::StateUpdate => self.state_update = None,
            Timer::DaoAck => self.dao_ack = None,
            Timer::UnicastDio => self.unicast_dio = None,
            Timer::Dao(_) => self.dao = None,
            Timer::Dio => self.dio = None,
            Timer::Probing => self.probing = None,
            Timer::Dis => self.dis = None,
            Timer::Leave => self.leave = None,
            Timer::Periodic => self.periodic = None,
            Timer::LinkStats => self.link_stats = None,
        }
        Some(timer)
    }

    pub fn poll_at(&self) -> Option<Instant> {
        self.deadlines().into_iter().filter_map(|(at, _)| at).min()
    }
}

impl Rpl {
    /// A random delay in `[interval / 2, interval * 3 / 2)`.
    fn half_plus_random(&mut self, interval: Duration) -> Duration {
        let millis = interval.total_millis();
        let random = self.rand.below(millis.min(u32::MAX as u64) as u32) as u64;
        Duration::from_millis(millis / 2 + random)
    }

    /// Arm the timers that run whether or not the node is in a DAG.
    pub(crate) fn init_timers(&mut self) {
        self.timers.periodic = Some(self.now + consts::PERIODIC_DELAY);
        self.timers.link_stats = Some(self.now + FRESHNESS_HALF_LIFE);
        self.schedule_periodic_dis();
    }

    pub(crate) fn run_timer(&mut self, timer: Timer) {
        net_trace!("timer {:?} expired", timer);
        match timer {
            Timer::StateUpdate => self.update_state(),
            Timer::DaoAck => self.handle_dao_ack_timer(),
            Timer::UnicastDio => self.handle_unicast_dio_timer(),
            Timer::Dao(DaoAction::SendNew) => self.send_new_dao(),
            Timer::Dao(DaoAction::Resend) => self.resend_dao(),
            Timer::Dio => self.handle_dio_timer(),
            Timer::Probing => self.handle_probing_timer(),
            Timer::Dis => self.handle_dis_timer(),
            Timer::Leave => {
                if self.instance.used {
                    self.leave();
                }
            }
            Timer::Periodic => self.handle_periodic_timer(),
            Timer::LinkStats => {
                self.link_stats.periodic();
                self.timers.link_stats = Some(self.now + FRESHNESS_HALF_LIFE);
            }
        }
    }

    fn is_unattached(&self) -> bool {
        !self.instance.used
            || self.instance.dag.preferred_parent.is_none()
            || self.instance.dag.rank.is_infinite()
    }

    // DIS

    /// Arm the DIS timer, unless it is already running.
    pub(crate) fn schedule_periodic_dis(&mut self) {
        if self.timers.dis.is_none() {
            let delay = self.half_plus_random(self.config.dis_interval);
            self.timers.dis = Some(self.now + delay);
        }
    }

    fn handle_dis_timer(&mut self) {
        if !self.is_root() && self.is_unattached() {
            self.dis_output(None);
            self.schedule_periodic_dis();
        }
    }

    // DIO

    /// Restart the Trickle timer from its shortest interval.
    ///
    /// Nothing happens when the node may not advertise yet, or when the timer is already at
    /// its shortest interval. A leaf never restarts it.
    pub(crate) fn dio_reset(&mut self, reason: &str) {
        if !self.ready_to_advertise() || !self.instance.dag.trickle.needs_reset() {
            return;
        }

        net_info!("reset DIO timer ({})", reason);
        if !self.config.leaf_only {
            let delay = self.instance.dag.trickle.reset(&mut self.rand);
            self.timers.dio = Some(self.now + delay);
        }
    }

    fn handle_dio_timer(&mut self) {
        if !self.ready_to_advertise() {
            // Rescheduled by the next reset.
            return;
        }

        let is_root = self.is_root();
        let fired = self.instance.dag.trickle.fire(is_root, &mut self.rand);
        if fired.transmit {
            let refresh = u32::from(self.config.trickle_refresh_dao_routes);
            if is_root && refresh > 0 {
                if self.dio_send_count % refresh == 0 {
                    self.instance.dtsn_out.increment();
                    net_info!(
                        "trigger DAO updates with a DTSN increment ({})",
                        self.instance.dtsn_out
                    );
                }
                self.dio_send_count = self.dio_send_count.wrapping_add(1);
            }

            self.instance.dag.last_advertised_rank = self.instance.dag.rank;
            self.dio_output(None);
        }
        self.timers.dio = Some(self.now + fired.next);
    }

    // Unicast DIO

    pub(crate) fn schedule_unicast_dio(&mut self, target: HardwareAddress) {
        if self.instance.used {
            self.instance.dag.unicast_dio_target = Some(target);
            self.timers.unicast_dio = Some(self.now);
        }
    }

    fn handle_unicast_dio_timer(&mut self) {
        let target = self
            .instance
            .dag
            .unicast_dio_target
            .and_then(|addr| self.neighbor_ip_addr(&addr));
        if let Some(ip) = target {
            self.dio_output(Some(ip));
        }
    }

    // DAO

    fn schedule_dao_retransmission(&mut self) {
        let delay = self.half_plus_random(self.config.dao_retransmission_timeout);
        self.timers.dao = Some((self.now + delay, DaoAction::Resend));
    }

    /// Schedule the DAO that refreshes our downward route before it expires.
    fn schedule_dao_refresh(&mut self) {
        if !self.instance.used || self.instance.default_lifetime == consts::INFINITE_LIFETIME {
            return;
        }

        let lifetime = u64::from(self.instance.lifetime_unit)
            * u64::from(self.instance.default_lifetime);
        let mut target = if self.config.with_dao_ack {
            // The last DAO was acknowledged: refresh right before expiration.
            Duration::from_secs(lifetime)
        } else {
            // Two chances per lifetime.
            Duration::from_secs(lifetime) / 2
        };

        let margin_millis = consts::DAO_REFRESH_MARGIN.total_millis() as u32;
        let margin =
            consts::DAO_REFRESH_MARGIN + Duration::from_millis(self.rand.below(margin_millis) as u64);
        if target > margin {
            target = target - margin;
        }

        self.timers.dao = Some((self.now + target, DaoAction::SendNew));
    }

    /// Schedule a new DAO after a short random delay. Does nothing without downward routes.
    pub(crate) fn schedule_dao(&mut self) {
        if self.instance.used
            && self.instance.mop != ModeOfOperation::NoDownwardRoutesMaintained
        {
            let delay = self.half_plus_random(self.config.dao_delay);
            self.timers.dao = Some((self.now + delay, DaoAction::SendNew));
        }
    }

    fn send_new_dao(&mut self) {
        if self.config.with_dao_ack {
            self.instance.dag.dao_transmissions = 1;
            self.schedule_dao_retransmission();
        } else {
            // Without acknowledgements, a node is reachable as soon as its DAO is out.
            if self.instance.dag.state == DagState::Joined {
                self.instance.dag.state = DagState::Reachable;
            }
            self.dio_reset("Reachable");
            self.schedule_dao_refresh();
        }

        self.instance.dag.dao_last_seqno.increment();
        self.dao_output(self.instance.default_lifetime);
    }

    fn resend_dao(&mut self) {
        self.instance.dag.dao_transmissions = self.instance.dag.dao_transmissions.saturating_add(1);
        self.dao_output(self.instance.default_lifetime);

        if self.instance.dag.dao_transmissions < self.config.dao_max_retransmissions {
            self.schedule_dao_retransmission();
        } else {
            net_warn!(
                "no DAO-ACK after {} transmissions",
                self.instance.dag.dao_transmissions
            );
            self.local_repair("DAO max rtx");
        }
    }

    // DAO-ACK

    pub(crate) fn schedule_dao_ack(&mut self, target: Ipv6Address, sequence: SequenceCounter) {
        if self.instance.used {
            if self.instance.dag.dao_ack.push((target, sequence)).is_err() {
                net_warn!("schedule_dao_ack: queue full, dropping ACK for {}", target);
                return;
            }
            self.timers.dao_ack = Some(self.now);
        }
    }

    fn handle_dao_ack_timer(&mut self) {
        let pending = core::mem::take(&mut self.instance.dag.dao_ack);
        for (target, sequence) in pending {
            self.dao_ack_output(target, sequence, DAO_ACK_UNCONDITIONAL_ACCEPT);
        }
    }

    /// The last DAO was acknowledged. Replaces the pending retransmission with a refresh.
    pub(crate) fn notify_dao_ack(&mut self) {
        self.schedule_dao_refresh();
    }

    // Probing

    /// The neighbor to probe next.
    ///
    /// The urgent target comes first, then the preferred parent if its link statistics are
    /// stale. Otherwise, with a 2/3 chance the best-ranked stale neighbor, else the stale
    /// neighbor we transmitted to least recently.
    pub(crate) fn probing_target(&mut self) -> Option<HardwareAddress> {
        if !self.instance.used {
            return None;
        }

        let dag = &self.instance.dag;
        if let Some(urgent) = dag.urgent_probing_target {
            return Some(urgent);
        }
        if let Some(parent) = dag.preferred_parent {
            if !self.neighbor_is_fresh(&parent) {
                return Some(parent);
            }
        }

        let by_rank = self.rand.below(3) != 0;
        let now = self.now;
        let stale = self.neighbors.keys().filter(|addr| !self.neighbor_is_fresh(addr));

        if by_rank {
            stale.min_by_key(|addr| self.rank_via_neighbor(addr))
        } else {
            stale
                .filter_map(|addr| {
                    let stats = self.link_stats.get(&addr)?;
                    let age = match stats.last_tx_time {
                        Some(t) => now.saturating_duration_since(t),
                        None => Duration::MAX,
                    };
                    Some((addr, age))
                })
                .max_by_key(|(_, age)| *age)
                .map(|(addr, _)| addr)
        }
    }

    fn handle_probing_timer(&mut self) {
        let target = self.probing_target();
        match target.and_then(|addr| self.neighbor_ip_addr(&addr).map(|ip| (addr, ip))) {
            Some((addr, ip)) => {
                let last_tx_mins = self
                    .link_stats
                    .get(&addr)
                    .and_then(|s| s.last_tx_time)
                    .map(|t| self.now.saturating_duration_since(t).secs() / 60)
                    .unwrap_or(0);
                let urgent = self.instance.dag.urgent_probing_target.is_some();
                net_info!(
                    "probing {} {}last tx {} min ago",
                    ip,
                    if urgent { "(urgent) " } else { "" },
                    last_tx_mins
                );
                // The urgent target is cleared by the link-layer callback.
                self.dio_output(Some(ip));
            }
            None => net_info!("no neighbor needs probing"),
        }
        self.schedule_probing();
    }

    pub(crate) fn schedule_probing(&mut self) {
        if self.instance.used && self.config.with_probing {
            let delay = self.half_plus_random(self.config.probing_interval);
            self.timers.probing = Some(self.now + delay);
        }
    }

    pub(crate) fn schedule_probing_now(&mut self) {
        if self.instance.used && self.config.with_probing {
            let bound = consts::URGENT_PROBING_DELAY.total_millis() as u32;
            let delay = Duration::from_millis(self.rand.below(bound) as u64);
            self.timers.probing = Some(self.now + delay);
        }
    }

    // Leaving

    /// Arm the leave timer, unless it is already running.
    pub(crate) fn schedule_leaving(&mut self) {
        if self.instance.used && self.timers.leave.is_none() {
            self.timers.leave = Some(self.now + self.config.delay_before_leaving);
        }
    }

    pub(crate) fn unschedule_leaving(&mut self) {
        if self.instance.used {
            self.timers.leave = None;
        }
    }

    // Periodic

    fn handle_periodic_timer(&mut self) {
        let seconds = consts::PERIODIC_DELAY.secs() as u32;
        if self.instance.used {
            self.dag_periodic(seconds);
            self.source_routes.periodic(seconds);
        }
        if self.is_unattached() {
            self.schedule_periodic_dis();
        }

        // Part of the state is time dependent, e.g. `better_parent_since`.
        self.update_state();

        self.print_neighbor_list("Periodic");
        if self.is_root() {
            self.print_source_routes("Periodic");
        }

        self.timers.periodic = Some(self.now + consts::PERIODIC_DELAY);
    }

    /// Stop every timer belonging to the DAG.
    pub(crate) fn stop_dag_timers(&mut self) {
        let timers = &mut self.timers;
        timers.state_update = None;
        timers.leave = None;
        timers.dio = None;
        timers.unicast_dio = None;
        timers.dao = None;
        timers.probing = None;
        timers.dao_ack = None;
    }

    // State update

    pub(crate) fn schedule_state_update(&mut self) {
        if self.instance.used {
            self.timers.state_update = Some(self.now);
        }
    }

    pub(crate) fn unschedule_state_update(&mut self) {
        if self.instance.used {
            self.timers.state_update = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::*;
    use super::*;
    use crate::iface::rpl::{Rank, RplConfig};
    use crate::wire::RplRepr;

    #[test]
    fn earliest_timer_first() {
        let t0 = Instant::from_secs(10);
        let mut timers = Timers {
            periodic: Some(t0),
            dis: Some(t0 - Duration::from_secs(1)),
            state_update: Some(t0),
            dao: Some((t0 + Duration::from_secs(1), DaoAction::Resend)),
            ..Timers::default()
        };
        assert_eq!(timers.poll_at(), Some(t0 - Duration::from_secs(1)));

        assert_eq!(timers.take_expired(t0), Some(Timer::Dis));
        assert_eq!(timers.take_expired(t0), Some(Timer::StateUpdate));
        assert_eq!(timers.take_expired(t0), Some(Timer::Periodic));
        assert_eq!(timers.take_expired(t0), None);

        let later = t0 + Duration::from_secs(1);
        assert_eq!(timers.poll_at(), Some(later));
        assert_eq!(timers.take_expired(later), Some(Timer::Dao(DaoAction::Resend)));
        assert_eq!(timers.poll_at(), None);
    }

    #[test]
    fn half_plus_random_bounds() {
        let mut rpl = node(NODE_HW);
        for _ in 0..100 {
            let delay = rpl.half_plus_random(Duration::from_secs(30));
            assert!(delay >= Duration::from_secs(15));
            assert!(delay < Duration::from_secs(45));
        }
    }

    #[test]
    fn unattached_node_solicits() {
        let mut rpl = node(NODE_HW);
        let dis_at = rpl.timers.dis.unwrap();
        assert!(dis_at >= Instant::from_secs(15));
        assert!(dis_at < Instant::from_secs(45));

        rpl.poll(dis_at);
        let sent = drain(&mut rpl);
        assert_eq!(sent.len(), 1);
        assert!(sent[0].is_multicast());
        assert!(matches!(
            sent[0].repr,
            RplRepr::DodagInformationSolicitation(_)
        ));
        // The next solicitation is armed.
        assert!(rpl.timers.dis.unwrap() > dis_at);
    }

    #[test]
    fn periodic_timer_rearms() {
        let mut rpl = node(NODE_HW);
        assert_eq!(rpl.timers.periodic, Some(Instant::from_secs(60)));
        assert_eq!(rpl.timers.link_stats, Some(Instant::from_secs(15 * 60)));

        rpl.poll(Instant::from_secs(60));
        assert_eq!(rpl.timers.periodic, Some(Instant::from_secs(120)));
    }

    #[test]
    fn timers_need_an_instance() {
        let mut rpl = node(NODE_HW);
        rpl.schedule_state_update();
        rpl.schedule_leaving();
        rpl.schedule_dao();
        rpl.schedule_probing();
        rpl.schedule_unicast_dio(ROOT_HW);
        assert_eq!(rpl.timers.state_update, None);
        assert_eq!(rpl.timers.leave, None);
        assert_eq!(rpl.timers.dao, None);
        assert_eq!(rpl.timers.probing, None);
        assert_eq!(rpl.timers.unicast_dio, None);
    }

    #[test]
    fn leaving_is_armed_once() {
        let mut rpl = node(NODE_HW);
        rpl.instance.used = true;
        rpl.schedule_leaving();
        let first = rpl.timers.leave;
        assert_eq!(first, Some(Instant::ZERO + Duration::from_mins(5)));

        rpl.now = Instant::from_secs(10);
        rpl.schedule_leaving();
        assert_eq!(rpl.timers.leave, first);

        rpl.unschedule_leaving();
        assert_eq!(rpl.timers.leave, None);
    }

    #[test]
    fn dao_refresh_margin() {
        let mut rpl = node(NODE_HW);
        rpl.instance.used = true;
        rpl.instance.default_lifetime = 30;
        rpl.instance.lifetime_unit = 60;

        rpl.schedule_dao_refresh();
        let (at, action) = rpl.timers.dao.unwrap();
        assert_eq!(action, DaoAction::SendNew);
        assert!(at <= Instant::from_secs(30 * 60 - 60));
        assert!(at > Instant::from_secs(30 * 60 - 120));

        rpl.instance.default_lifetime = consts::INFINITE_LIFETIME;
        rpl.timers.dao = None;
        rpl.schedule_dao_refresh();
        assert_eq!(rpl.timers.dao, None);
    }

    #[test]
    fn dao_refresh_without_ack() {
        let config = RplConfig::default().set_with_dao_ack(false);
        let mut rpl = Rpl::new(config, NODE_HW, Instant::ZERO);
        rpl.instance.used = true;
        rpl.instance.default_lifetime = 30;
        rpl.instance.lifetime_unit = 60;

        rpl.schedule_dao_refresh();
        let (at, _) = rpl.timers.dao.unwrap();
        assert!(at <= Instant::from_secs(15 * 60 - 60));
        assert!(at > Instant::from_secs(15 * 60 - 120));
    }

    #[test]
    fn no_dao_without_downward_routes() {
        let mut rpl = node(NODE_HW);
        rpl.instance.used = true;
        rpl.instance.mop = ModeOfOperation::NoDownwardRoutesMaintained;
        rpl.schedule_dao();
        assert_eq!(rpl.timers.dao, None);

        rpl.instance.mop = ModeOfOperation::NonStoringMode;
        rpl.schedule_dao();
        let (at, action) = rpl.timers.dao.unwrap();
        assert_eq!(action, DaoAction::SendNew);
        assert!(at >= Instant::from_secs(2) && at < Instant::from_secs(6));
    }

    #[test]
    fn probing_prefers_urgent_then_stale_parent() {
        let mut rpl = node(NODE_HW);
        assert_eq!(rpl.probing_target(), None);

        rpl.instance.used = true;
        rpl.instance.dag.rank = Rank::INFINITE;
        rpl.packet_input(&ROOT_HW, -60);
        assert!(rpl.add_neighbor(ROOT_HW));
        assert_eq!(rpl.probing_target(), Some(ROOT_HW));

        rpl.instance.dag.preferred_parent = Some(ROOT_HW);
        assert_eq!(rpl.probing_target(), Some(ROOT_HW));

        let other = HardwareAddress::Extended([0x02, 0, 0, 0, 0, 0, 0, 3]);
        rpl.instance.dag.urgent_probing_target = Some(other);
        assert_eq!(rpl.probing_target(), Some(other));
    }

    #[test]
    fn stop_dag_timers_keeps_global_timers() {
        let mut rpl = node(NODE_HW);
        rpl.instance.used = true;
        rpl.schedule_leaving();
        rpl.schedule_dao();
        rpl.schedule_state_update();

        rpl.stop_dag_timers();
        assert_eq!(rpl.timers.leave, None);
        assert_eq!(rpl.timers.dao, None);
        assert_eq!(rpl.timers.state_update, None);
        assert!(rpl.timers.periodic.is_some());
        assert!(rpl.timers.dis.is_some());
    }
}
