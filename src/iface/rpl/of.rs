//! Objective functions select parents and compute the rank of a node (RFC 6550 § 14).
//!
//! An objective function is chosen once, when joining a DODAG, from the Objective Code Point
//! carried in the DODAG Configuration option.

use super::consts::{OCP_MRHOF, OCP_OF0};
use super::mrhof::Mrhof;
use super::neighbor_table::RplNeighbor;
use super::of0::ObjectiveFunction0;
use super::rank::Rank;

use crate::iface::link_stats::LinkStatsTable;
use crate::time::Instant;
use crate::wire::rpl::{MetricContainer, MetricType};
use crate::wire::HardwareAddress;

/// A neighbor under consideration: its link-layer address and its RPL state.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub addr: HardwareAddress,
    pub nbr: &'a RplNeighbor,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

/// What an objective function may look at, besides the neighbor itself.
#[derive(Debug, Clone, Copy)]
pub struct OfContext<'a> {
    pub now: Instant,
    pub link_stats: &'a LinkStatsTable,
    pub min_hop_rank_increase: u16,
    /// Our current rank.
    pub rank: Rank,
    pub used: bool,
    pub preferred_parent: Option<Candidate<'a>>,
    /// Whether metric containers are enabled on this node.
    pub with_mc: bool,
    /// The metric container type a root configures.
    pub root_mc_type: MetricType,
    /// The metric container type of the DODAG.
    pub mc_type: MetricType,
}

impl OfContext<'_> {
    /// Query whether `c` is the preferred parent.
    pub fn is_preferred(&self, c: &Candidate) -> bool {
        self.preferred_parent.map(|p| p.addr) == Some(c.addr)
    }

    pub fn is_root_rank(&self) -> bool {
        self.rank == Rank::root(self.min_hop_rank_increase)
    }
}

pub trait ObjectiveFunction {
    /// The Objective Code Point identifying this function.
    fn ocp(&self) -> u16;

    /// Called when joining or repairing a DODAG.
    fn reset(&mut self);

    /// The metric of the link to a neighbor, 0xffff when unknown.
    fn link_metric(&self, ctx: &OfContext, c: &Candidate) -> u16;

    fn has_usable_link(&self, ctx: &OfContext, c: &Candidate) -> bool;

    fn is_acceptable_parent(&self, ctx: &OfContext, c: &Candidate) -> bool;

    /// The cost of the path to the root through a neighbor.
    fn path_cost(&self, ctx: &OfContext, c: &Candidate) -> u16;

    /// The rank we would have with this neighbor as preferred parent.
    fn rank_via_neighbor(&self, ctx: &OfContext, c: &Candidate) -> Rank;

    /// Return the better parent of the two, or `None` if neither is acceptable.
    fn best_parent<'a>(
        &self,
        ctx: &OfContext,
        a: Option<Candidate<'a>>,
        b: Option<Candidate<'a>>,
    ) -> Option<Candidate<'a>>;

    /// Return the metric container to advertise.
    fn update_metric_container(&self, ctx: &OfContext, current: MetricContainer) -> MetricContainer;
}

/// The link metric used by both objective functions: the link-stats ETX.
pub(super) fn etx_link_metric(ctx: &OfContext, c: &Candidate) -> u16 {
    ctx.link_stats.get(&c.addr).map(|s| s.etx).unwrap_or(0xffff)
}

/// The objective functions supported by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Of {
    Of0(ObjectiveFunction0),
    Mrhof(Mrhof),
}

impl Of {
    /// Build the objective function for an OCP, if supported.
    pub fn from_ocp(ocp: u16, squared_etx: bool) -> Option<Self> {
        match ocp {
            OCP_OF0 => Some(Of::Of0(ObjectiveFunction0)),
            OCP_MRHOF => Some(Of::Mrhof(Mrhof::new(squared_etx))),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn ObjectiveFunction {
        match self {
            Of::Of0(of) => of,
            Of::Mrhof(of) => of,
        }
    }
}

impl Default for Of {
    fn default() -> Self {
        Of::Mrhof(Mrhof::new(false))
    }
}

impl ObjectiveFunction for Of {
    fn ocp(&self) -> u16 {
        self.inner().ocp()
    }

    fn reset(&mut self) {
        match self {
            Of::Of0(of) => of.reset(),
            Of::Mrhof(of) => of.reset(),
        }
    }

    fn link_metric(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        self.inner().link_metric(ctx, c)
    }

    fn has_usable_link(&self, ctx: &OfContext, c: &Candidate) -> bool {
        self.inner().has_usable_link(ctx, c)
    }

    fn is_acceptable_parent(&self, ctx: &OfContext, c: &Candidate) -> bool {
        self.inner().is_acceptable_parent(ctx, c)
    }

    fn path_cost(&self, ctx: &OfContext, c: &Candidate) -> u16 {
        self.inner().path_cost(ctx, c)
    }

    fn rank_via_neighbor(&self, ctx: &OfContext, c: &Candidate) -> Rank {
        self.inner().rank_via_neighbor(ctx, c)
    }

    fn best_parent<'a>(
        &self,
        ctx: &OfContext,
        a: Option<Candidate<'a>>,
        b: Option<Candidate<'a>>,
    ) -> Option<Candidate<'a>> {
        self.inner().best_parent(ctx, a, b)
    }

    fn update_metric_container(&self, ctx: &OfContext, current: MetricContainer) -> MetricContainer {
        self.inner().update_metric_container(ctx, current)
    }
}
