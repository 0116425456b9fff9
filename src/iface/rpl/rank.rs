//! Implementation of the Rank comparison in RPL.
//!
//! A Rank can be thought of as a fixed-point number, where the position of the radix point between
//! the integer part and the fractional part is determined by `MinHopRankIncrease`.
//! `MinHopRankIncrease` is the minimum increase in Rank between a node and any of its DODAG
//! parents.
//! This value is provisioned by the DODAG root.
//!
//! Parent selection compares the full 16-bit value. The integer part, [`Rank::dag_rank`], is
//! only used for display.
//!
//! Meaning of the comparison:
//! - **Rank M is less than Rank N**: the position of M is closer to the DODAG root than the position
//!   of N. Node M may safely be a DODAG parent for node N.
//! - **Ranks are equal**: the positions of both nodes within the DODAG and with respect to the DODAG
//!   are similar or identical. Routing through a node with equal Rank may cause a routing loop.
//! - **Rank M is greater than Rank N**: the position of node M is farther from the DODAG root
//!   than the position of N. Node M may in fact be in the sub-DODAG of node N. If node N selects
//!   node M as a DODAG parent, there is a risk of creating a loop.

use super::consts::INFINITE_RANK;

/// The Rank is the expression of the relative position within a DODAG Version with regard to
/// neighbors, and it is not necessarily a good indication or a proper expression of a distance or
/// a path cost to the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Rank(pub u16);

impl core::fmt::Display for Rank {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Rank {
    pub const INFINITE: Self = Rank(INFINITE_RANK);

    /// The ROOT_RANK is the smallest rank possible.
    /// DAG_RANK(ROOT_RANK) should be 1. See RFC6550 § 17.
    pub const fn root(min_hop_rank_increase: u16) -> Self {
        Rank(min_hop_rank_increase)
    }

    /// Return the raw Rank value.
    pub const fn raw_value(&self) -> u16 {
        self.0
    }

    pub const fn is_infinite(&self) -> bool {
        self.0 == INFINITE_RANK
    }

    /// Return the integer part of the Rank.
    pub fn dag_rank(&self, min_hop_rank_increase: u16) -> u16 {
        if min_hop_rank_increase == 0 {
            return self.0;
        }
        self.0 / min_hop_rank_increase
    }

    /// Add an increase, saturating at [`Rank::INFINITE`].
    pub fn saturating_add(self, increase: u16) -> Self {
        Rank(self.0.saturating_add(increase))
    }
}

impl From<u16> for Rank {
    fn from(value: u16) -> Self {
        Rank(value)
    }
}

impl From<Rank> for u16 {
    fn from(value: Rank) -> Self {
        value.0
    }
}
