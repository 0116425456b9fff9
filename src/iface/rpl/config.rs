use crate::time::Duration;
use crate::wire::rpl::{InstanceId, MetricType, ModeOfOperation};

use super::consts;

/// Runtime settings of the RPL core.
///
/// A root advertises these settings in its DIOs. Other nodes only use the node-local ones
/// (probing, DAO-ACK, leaf mode, timer delays) and take the DODAG-wide ones from the DIO they
/// join with.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RplConfig {
    /// Seed of the random number generator that jitters the timers. Distinct nodes should use
    /// distinct seeds.
    pub random_seed: u64,
    pub(crate) instance_id: InstanceId,
    pub(crate) mode_of_operation: ModeOfOperation,
    pub(crate) ocp: u16,
    pub(crate) with_dao_ack: bool,
    pub(crate) with_probing: bool,
    pub(crate) with_mc: bool,
    pub(crate) mc_type: MetricType,
    pub(crate) squared_etx: bool,
    pub(crate) trickle_refresh_dao_routes: u8,
    pub(crate) leaf_only: bool,
    pub(crate) loop_error_drop: bool,
    pub(crate) grounded: bool,
    pub(crate) preference: u8,

    pub(crate) dio_interval_min: u8,
    pub(crate) dio_interval_doublings: u8,
    pub(crate) dio_redundancy: u8,
    min_hop_rank_increase: Option<u16>,
    max_rank_increase: Option<u16>,

    pub(crate) dag_lifetime: u32,
    pub(crate) default_lifetime: u8,
    pub(crate) lifetime_unit: u16,

    pub(crate) probing_interval: Duration,
    pub(crate) delay_before_leaving: Duration,
    pub(crate) dis_interval: Duration,
    pub(crate) dao_delay: Duration,
    pub(crate) dao_retransmission_timeout: Duration,
    pub(crate) dao_max_retransmissions: u8,
}

impl Default for RplConfig {
    fn default() -> Self {
        Self {
            random_seed: 0,
            instance_id: InstanceId::from(consts::RPL_DEFAULT_INSTANCE),
            mode_of_operation: ModeOfOperation::NonStoringMode,
            ocp: consts::OCP_MRHOF,
            with_dao_ack: true,
            with_probing: true,
            with_mc: false,
            mc_type: MetricType::None,
            squared_etx: false,
            // Without DAO-ACKs, the root makes its children refresh their routes every 4th DIO.
            trickle_refresh_dao_routes: 0,
            leaf_only: false,
            loop_error_drop: false,
            grounded: false,
            preference: 0,
            dio_interval_min: consts::DEFAULT_DIO_INTERVAL_MIN,
            dio_interval_doublings: consts::DEFAULT_DIO_INTERVAL_DOUBLINGS,
            dio_redundancy: consts::DEFAULT_DIO_REDUNDANCY_CONSTANT,
            min_hop_rank_increase: None,
            max_rank_increase: None,
            dag_lifetime: consts::DEFAULT_DAG_LIFETIME,
            default_lifetime: consts::DEFAULT_ROUTE_LIFETIME,
            lifetime_unit: consts::DEFAULT_ROUTE_LIFETIME_UNIT,
            probing_interval: consts::DEFAULT_PROBING_INTERVAL,
            delay_before_leaving: consts::DEFAULT_DELAY_BEFORE_LEAVING,
            dis_interval: consts::DEFAULT_DIS_INTERVAL,
            dao_delay: consts::DEFAULT_DAO_DELAY,
            dao_retransmission_timeout: consts::DEFAULT_DAO_RETRANSMISSION_TIMEOUT,
            dao_max_retransmissions: consts::DEFAULT_DAO_MAX_RETRANSMISSIONS,
        }
    }
}

impl RplConfig {
    #[inline]
    pub fn set_random_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    /// Set the instance ID used when this node roots a DODAG.
    #[inline]
    pub fn set_instance_id(mut self, instance_id: InstanceId) -> Self {
        self.instance_id = instance_id;
        self
    }

    #[inline]
    pub fn set_mode_of_operation(mut self, mop: ModeOfOperation) -> Self {
        self.mode_of_operation = mop;
        self
    }

    /// Set the Objective Code Point advertised as root.
    ///
    /// Unless set explicitly, MinHopRankIncrease follows the objective function: 128 for MRHOF,
    /// 256 for OF0.
    #[inline]
    pub fn set_objective_code_point(mut self, ocp: u16) -> Self {
        self.ocp = ocp;
        self
    }

    /// Request a DAO-ACK for every DAO. A DAO-ACK also drives the Joined to Reachable transition.
    ///
    /// Disabling DAO-ACKs turns on the periodic DTSN increments of the root.
    #[inline]
    pub fn set_with_dao_ack(mut self, value: bool) -> Self {
        self.with_dao_ack = value;
        if !value && self.trickle_refresh_dao_routes == 0 {
            self.trickle_refresh_dao_routes = 4;
        }
        self
    }

    #[inline]
    pub fn set_with_probing(mut self, value: bool) -> Self {
        self.with_probing = value;
        self
    }

    /// Enable the DAG Metric Container, and set the metric a root advertises.
    #[inline]
    pub fn set_metric_container(mut self, mc_type: MetricType) -> Self {
        self.with_mc = mc_type != MetricType::None;
        self.mc_type = mc_type;
        self
    }

    /// Use the squared ETX as MRHOF link metric.
    #[inline]
    pub fn set_squared_etx(mut self, value: bool) -> Self {
        self.squared_etx = value;
        self
    }

    /// Make the root increment its DTSN every `count` sent DIOs. 0 disables the increments.
    #[inline]
    pub fn set_trickle_refresh_dao_routes(mut self, count: u8) -> Self {
        self.trickle_refresh_dao_routes = count;
        self
    }

    /// A leaf only joins: it never advertises the DODAG with multicast DIOs.
    #[inline]
    pub fn set_leaf_only(mut self, value: bool) -> Self {
        self.leaf_only = value;
        self
    }

    /// Drop packets with a rank error on a detected loop, instead of forwarding them.
    #[inline]
    pub fn set_loop_error_drop(mut self, value: bool) -> Self {
        self.loop_error_drop = value;
        self
    }

    #[inline]
    pub fn set_grounded(mut self, value: bool) -> Self {
        self.grounded = value;
        self
    }

    #[inline]
    pub fn set_preference(mut self, preference: u8) -> Self {
        self.preference = preference;
        self
    }

    /// Set the Trickle parameters: Imin as an exponent of milliseconds, the number of doublings
    /// and the redundancy constant.
    #[inline]
    pub fn set_dio_timer(mut self, interval_min: u8, doublings: u8, redundancy: u8) -> Self {
        self.dio_interval_min = interval_min;
        self.dio_interval_doublings = doublings;
        self.dio_redundancy = redundancy;
        self
    }

    #[inline]
    pub fn set_min_hop_rank_increase(mut self, value: u16) -> Self {
        self.min_hop_rank_increase = Some(value);
        self
    }

    /// Set the maximum rank increase. 0 means no limit.
    #[inline]
    pub fn set_max_rank_increase(mut self, value: u16) -> Self {
        self.max_rank_increase = Some(value);
        self
    }

    /// Set the DAG lifetime in lifetime units.
    #[inline]
    pub fn set_dag_lifetime(mut self, units: u32) -> Self {
        self.dag_lifetime = units;
        self
    }

    /// Set the route lifetime (in lifetime units) and the lifetime unit (in seconds).
    #[inline]
    pub fn set_lifetime(mut self, default_lifetime: u8, lifetime_unit: u16) -> Self {
        self.default_lifetime = default_lifetime;
        self.lifetime_unit = lifetime_unit;
        self
    }

    #[inline]
    pub fn set_probing_interval(mut self, interval: Duration) -> Self {
        self.probing_interval = interval;
        self
    }

    #[inline]
    pub fn set_delay_before_leaving(mut self, delay: Duration) -> Self {
        self.delay_before_leaving = delay;
        self
    }

    #[inline]
    pub fn set_dis_interval(mut self, interval: Duration) -> Self {
        self.dis_interval = interval;
        self
    }

    /// Set the DAO delay, the retransmission timeout and the maximum number of transmissions.
    #[inline]
    pub fn set_dao_timers(mut self, delay: Duration, timeout: Duration, max_rtx: u8) -> Self {
        self.dao_delay = delay;
        self.dao_retransmission_timeout = timeout;
        self.dao_max_retransmissions = max_rtx;
        self
    }

    pub fn min_hop_rank_increase(&self) -> u16 {
        match self.min_hop_rank_increase {
            Some(value) => value,
            None if self.ocp == consts::OCP_OF0 => consts::DEFAULT_MIN_HOP_RANK_INCREASE_OF0,
            None => consts::DEFAULT_MIN_HOP_RANK_INCREASE,
        }
    }

    pub fn max_rank_increase(&self) -> u16 {
        self.max_rank_increase
            .unwrap_or(8 * self.min_hop_rank_increase())
    }
}
