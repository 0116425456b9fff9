use crate::time::Duration;
use crate::wire::Ipv6Address;

pub const RPL_DEFAULT_INSTANCE: u8 = 0;

// ------------------------------------
// Objective code points:
// ------------------------------------
pub const OCP_OF0: u16 = 0;
pub const OCP_MRHOF: u16 = 1;

// ------------------------------------
// Constants used for the trickle timer:
// ------------------------------------
/// Imin is 2^12 ms. RFC 6550 defaults to 2^3 ms.
pub const DEFAULT_DIO_INTERVAL_MIN: u8 = 12;
/// Imax is Imin doubled 8 times, about 17 minutes. RFC 6550 defaults to 20 doublings.
pub const DEFAULT_DIO_INTERVAL_DOUBLINGS: u8 = 8;
/// 0 disables suppression: a DIO is sent every interval.
pub const DEFAULT_DIO_REDUNDANCY_CONSTANT: u8 = 0;

// ------------------------------------
// Rank:
// ------------------------------------
/// RFC 6550 uses 256. With MRHOF and ETX, 128 makes the rank equal to the ETX path cost.
pub const DEFAULT_MIN_HOP_RANK_INCREASE: u16 = 128;
pub const DEFAULT_MIN_HOP_RANK_INCREASE_OF0: u16 = 256;
pub const DEFAULT_MAX_RANK_INCREASE: u16 = 8 * DEFAULT_MIN_HOP_RANK_INCREASE;
pub const INFINITE_RANK: u16 = 0xffff;

// ------------------------------------
// Lifetimes:
// ------------------------------------
/// Route lifetime, in lifetime units.
pub const DEFAULT_ROUTE_LIFETIME: u8 = 30;
/// Lifetime unit, in seconds.
pub const DEFAULT_ROUTE_LIFETIME_UNIT: u16 = 60;
/// DAG lifetime, in lifetime units (8 hours with the defaults).
pub const DEFAULT_DAG_LIFETIME: u32 = 8 * 60;
/// An 8-bit lifetime of all ones means infinity (RFC 6550 § 6.7.6).
pub const INFINITE_LIFETIME: u8 = 0xff;
/// Lifetime, in seconds, of routes and DAGs that never expire.
pub const ROUTE_INFINITE_LIFETIME: u32 = 0xffff_ffff;

// ---------------------------------------
// Constants used for the lollipop counter:
// ---------------------------------------
pub const SEQUENCE_WINDOW: u8 = 16;
pub const LOLLIPOP_CIRCULAR_REGION: u8 = 127;
pub const LOLLIPOP_INIT: u8 = u8::MAX - SEQUENCE_WINDOW + 1;

// ---------------------------------------
// Timers:
// ---------------------------------------
pub const DEFAULT_DIS_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_DAO_DELAY: Duration = Duration::from_secs(4);
pub const DEFAULT_DAO_RETRANSMISSION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DAO_MAX_RETRANSMISSIONS: u8 = 5;
pub const DEFAULT_PROBING_INTERVAL: Duration = Duration::from_secs(90);
pub const DEFAULT_DELAY_BEFORE_LEAVING: Duration = Duration::from_mins(5);
pub const PERIODIC_DELAY: Duration = Duration::from_secs(60);
/// A node with a DAG lifetime below this solicits a DIO from its parent.
pub const DAG_LIFETIME_DIS_THRESHOLD: u32 = 300;
/// Routes are refreshed this long (plus a random part of it) before they expire.
pub const DAO_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Upper bound of the random delay of an urgent probe.
pub const URGENT_PROBING_DELAY: Duration = Duration::from_secs(4);

/// Prefix of the DODAG a root starts when none was set.
pub const DEFAULT_ROOT_PREFIX: Ipv6Address = Ipv6Address::new(0xfd00, 0, 0, 0, 0, 0, 0, 0);
/// Length of the prefix a root advertises.
pub const ROOT_PREFIX_LEN: u8 = 64;
