//! The Minimum Rank with Hysteresis Objective Function (RFC 6719).
//!
//! The path cost is the advertised rank (or metric container value) plus the ETX of the link.
//! A node only switches to a better parent when the gain exceeds a rank threshold, or when the
//! candidate has been better for longer than a time threshold.

use super::consts::OCP_MRHOF;
use super::of::{etx_link_metric, Candidate, ObjectiveFunction, OfContext};
use super::rank::Rank;

use crate::iface::link_stats::ETX_DIVISOR;
use crate::time::Duration;
use crate::wire::rpl::{
    EnergyType, MetricContainer, MetricObject, MetricType, AGGREGATION_ADDITIVE,
};

/// Reject parents with a higher link metric (ETX of 4).
pub const MAX_LINK_METRIC: u16 = 512;
/// Reject parents with a higher path cost (path ETX of 256).
pub const MAX_PATH_COST: u16 = 32768;
/// Hysteresis: switch only when the path cost differs by more than this (ETX of 1.5).
pub const RANK_THRESHOLD: u16 = 192;
/// Hysteresis with squared ETX (ETX of sqrt(3)).
pub const RANK_THRESHOLD_SQUARED_ETX: u16 = 384;
/// A neighbor consistently better for this long is switched to regardless of the rank gain.
pub const TIME_THRESHOLD: Duration = Duration::from_mins(10);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Mrhof {
    squared_etx: bool,
}

impl Mrhof {
    pub const OCP: u16 = OCP_MRHOF;

    /// With `squared_etx`, the link metric penalizes bad links more (ETX²).
    pub const fn new(squared_etx: bool) -> Self {
        Self { squared_etx }
    }

    fn rank_threshold(&self) -> u32 {
        if self.squared_etx {
            RANK_THRESHOLD_SQUARED_ETX as u32
        } else {
            RANK_THRESHOLD as u32
        }
    }

    fn link_metric_to_rank(&self, etx: u16) -> u16 {
        if self.squared_etx {
            let squared = (etx as u32 * etx as u32) / ETX_DIVISOR as u32;
            squared.min(0xffff) as u16
        } else {
            etx
        }
    }

    fn path_cost_base(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        if !ctx.with_mc {
            return c.nbr.rank.raw_value();
        }
        match (ctx.mc_type, c.nbr.mc.object) {
            (MetricType::Etx, MetricObject::Etx(etx)) => etx,
            (MetricType::Energy, MetricObject::Energy { estimation, .. }) => {
                (estimation as u16) << 8
            }
            _ => c.nbr.rank.raw_value(),
        }
    }

    fn preferred_path_cost(&self, ctx: &OfContext) -> u16 {
        ctx.preferred_parent
            .map(|p| self.path_cost(ctx, &p))
            .unwrap_or(0xffff)
    }

    /// Query whether a neighbor is within both the rank and the time hysteresis of the
    /// preferred parent.
    fn within_hysteresis(&self, ctx: &OfContext, c: &Candidate) -> bool {
        let path_cost = self.path_cost(ctx, c) as u32;
        let parent_path_cost = self.preferred_path_cost(ctx) as u32;

        let within_rank = path_cost + self.rank_threshold() > parent_path_cost;
        let within_time = match c.nbr.better_parent_since {
            None => true,
            Some(since) => ctx.now.saturating_duration_since(since) <= TIME_THRESHOLD,
        };

        within_rank && within_time
    }
}

impl ObjectiveFunction for Mrhof {
    fn ocp(&self) -> u16 {
        Self::OCP
    }

    fn reset(&mut self) {
        net_info!("reset MRHOF");
    }

    fn link_metric(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        etx_link_metric(ctx, c)
    }

    fn has_usable_link(&self, ctx: &OfContext, c: &Candidate) -> bool {
        self.link_metric(ctx, c) <= MAX_LINK_METRIC
    }

    fn is_acceptable_parent(&self, ctx: &OfContext, c: &Candidate) -> bool {
        self.has_usable_link(ctx, c) && self.path_cost(ctx, c) <= MAX_PATH_COST
    }

    fn path_cost(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        let base = self.path_cost_base(ctx, c);
        base.saturating_add(self.link_metric_to_rank(self.link_metric(ctx, c)))
    }

    fn rank_via_neighbor(&self, ctx: &OfContext, c: &Candidate) -> Rank {
        let min = c.nbr.rank.saturating_add(ctx.min_hop_rank_increase);
        min.max(Rank(self.path_cost(ctx, c)))
    }

    fn best_parent<'a>(
        &self,
        ctx: &OfContext,
        a: Option<Candidate<'a>>,
        b: Option<Candidate<'a>>,
    ) -> Option<Candidate<'a>> {
        let a = a.filter(|a| self.is_acceptable_parent(ctx, a));
        let b = b.filter(|b| self.is_acceptable_parent(ctx, b));

        let (a, b) = match (a, b) {
            (Some(a), Some(b)) => (a, b),
            (a, None) => return a,
            (None, b) => return b,
        };

        // Keep the preferred parent unless the other one is beyond a hysteresis.
        if ctx.is_preferred(&a) && self.within_hysteresis(ctx, &b) {
            return Some(a);
        }
        if ctx.is_preferred(&b) && self.within_hysteresis(ctx, &a) {
            return Some(b);
        }

        if self.path_cost(ctx, &a) < self.path_cost(ctx, &b) {
            Some(a)
        } else {
            Some(b)
        }
    }

    fn update_metric_container(&self, ctx: &OfContext, current: MetricContainer) -> MetricContainer {
        if !ctx.with_mc {
            return MetricContainer::NONE;
        }

        if !ctx.used {
            net_warn!("cannot update the metric container when not joined");
            return current;
        }

        let mut mc = current;
        let mc_type;
        let path_cost;
        if ctx.is_root_rank() {
            // Only the root configures the container, other nodes adopt it when joining.
            mc.flags = 0;
            mc.aggregation = AGGREGATION_ADDITIVE;
            mc.precedence = 0;
            mc_type = ctx.root_mc_type;
            path_cost = ctx.rank.raw_value();
        } else {
            mc_type = ctx.mc_type;
            path_cost = self.preferred_path_cost(ctx);
        }

        match mc_type {
            MetricType::None => mc.object = MetricObject::None,
            MetricType::Etx => mc.object = MetricObject::Etx(path_cost),
            MetricType::Energy => {
                let energy_type = if ctx.is_root_rank() {
                    EnergyType::Mains
                } else {
                    EnergyType::Battery
                };
                mc.object = MetricObject::energy(energy_type, (path_cost >> 8) as u8);
            }
            MetricType::Unknown(t) => net_warn!("MRHOF, non-supported MC {}", t),
        }
        mc
    }
}
