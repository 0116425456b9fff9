#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unsafe_code)]

//! A lightweight RPL (RFC 6550) control plane for constrained IPv6 nodes.
//!
//! The crate keeps a single RPL instance with one DODAG and drives it from
//! inbound control messages, link-layer transmission feedback and timers:
//!
//!  * [wire] holds the high-level representations of RPL control messages, the
//!    RPL Hop-by-Hop option and the source routing header.
//!  * [iface] holds the neighbor table, link statistics and the RPL core in
//!    [iface::rpl]: objective functions, parent selection, the DAG state machine,
//!    the timer scheduler and the non-storing source routing table.
//!
//! The core never blocks and never performs I/O. Messages to send are queued in
//! an outbox and drained by the owner with [iface::rpl::Rpl::dispatch]; time only
//! advances when the owner calls [iface::rpl::Rpl::poll].

#[cfg(all(feature = "log", feature = "defmt"))]
compile_error!("You must enable at most one of the following features: log, defmt");

use core::fmt;

#[macro_use]
mod macros;
mod rand;

pub mod iface;
pub mod time;
pub mod wire;

#[allow(unused)]
mod config {
    include!(concat!(env!("OUT_DIR"), "/config.rs"));
}

/// Error type for the setup operations of the RPL core.
///
/// Protocol-level failures (a dropped DIO, a full table, ...) are not errors: they are logged
/// and reported through `Option` or `bool` return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The Objective Code Point is not supported by this node.
    UnsupportedObjectiveFunction(u16),
    /// The Mode of Operation is not supported by this node.
    UnsupportedModeOfOperation(u8),
    /// A prefix has an invalid length or is missing the autonomous flag.
    InvalidPrefix,
    /// No global address is configured, so no DODAG can be rooted.
    NoGlobalAddress,
    /// The RPL instance is not in use.
    NotInitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnsupportedObjectiveFunction(ocp) => {
                write!(f, "unsupported objective function (OCP {ocp})")
            }
            Error::UnsupportedModeOfOperation(mop) => {
                write!(f, "unsupported mode of operation ({mop})")
            }
            Error::InvalidPrefix => write!(f, "invalid prefix"),
            Error::NoGlobalAddress => write!(f, "no global address"),
            Error::NotInitialized => write!(f, "RPL instance not initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type used by the setup operations of the RPL core.
pub type Result<T> = core::result::Result<T, Error>;
