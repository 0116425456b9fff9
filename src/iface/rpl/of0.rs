//! Objective Function Zero (RFC 6552), with an ETX-based step of rank.

use super::consts::OCP_OF0;
use super::of::{etx_link_metric, Candidate, ObjectiveFunction, OfContext};
use super::rank::Rank;

use crate::iface::link_stats::ETX_DIVISOR;
use crate::wire::rpl::MetricContainer;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ObjectiveFunction0;

impl ObjectiveFunction0 {
    pub const OCP: u16 = OCP_OF0;

    const RANK_STRETCH: i32 = 0;
    const RANK_FACTOR: i32 = 1;

    const MIN_STEP_OF_RANK: i32 = 1;
    const MAX_STEP_OF_RANK: i32 = 9;

    /// Map the ETX of the link to a step of rank: ETX 1.0 gives 1, ETX 2.0 gives 4.
    fn step_of_rank(&self, ctx: &OfContext, c: &Candidate) -> i32 {
        (3 * etx_link_metric(ctx, c) as i32) / ETX_DIVISOR as i32 - 2
    }

    fn rank_increase(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        let increase = (Self::RANK_FACTOR * self.step_of_rank(ctx, c) + Self::RANK_STRETCH)
            * ctx.min_hop_rank_increase as i32;
        u16::try_from(increase).unwrap_or(Rank::INFINITE.raw_value())
    }
}

impl ObjectiveFunction for ObjectiveFunction0 {
    fn ocp(&self) -> u16 {
        Self::OCP
    }

    fn reset(&mut self) {
        net_info!("reset OF0");
    }

    fn link_metric(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        etx_link_metric(ctx, c)
    }

    fn has_usable_link(&self, _ctx: &OfContext, _c: &Candidate) -> bool {
        true
    }

    fn is_acceptable_parent(&self, ctx: &OfContext, c: &Candidate) -> bool {
        (Self::MIN_STEP_OF_RANK..=Self::MAX_STEP_OF_RANK).contains(&self.step_of_rank(ctx, c))
    }

    fn path_cost(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        c.nbr.rank.raw_value().saturating_add(self.link_metric(ctx, c))
    }

    fn rank_via_neighbor(&self, ctx: &OfContext, c: &Candidate) -> Rank {
        c.nbr.rank.saturating_add(self.rank_increase(ctx, c))
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

        let a_cost = self.path_cost(ctx, &a);
        let b_cost = self.path_cost(ctx, &b);

        // Path costs are coarse-grained (multiples of MinHopRankIncrease), no hysteresis.
        if a_cost != b_cost {
            return Some(if a_cost < b_cost { a } else { b });
        }

        // A tie: stick to the preferred parent, otherwise take the better link.
        if ctx.is_preferred(&a) {
            return Some(a);
        }
        if ctx.is_preferred(&b) {
            return Some(b);
        }
        if self.link_metric(ctx, &a) < self.link_metric(ctx, &b) {
            Some(a)
        } else {
            Some(b)
        }
    }

    fn update_metric_container(&self, _ctx: &OfContext, _current: MetricContainer) -> MetricContainer {
        MetricContainer::NONE
    }
}
