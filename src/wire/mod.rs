/*! Packet representations used by the RPL core.

The `wire` module deals with the packet *representation* of everything the RPL core consumes
or produces:

 * IPv6 and IEEE 802.15.4 addresses, with the helpers the core needs to derive
   interface identifiers and compare prefixes.
 * The `Repr` family of RPL control messages (DIS, DIO, DAO, DAO-ACK) and their options.
 * The RPL Hop-by-Hop option, with a `Packet` wrapper to read and write it from
   octets, and the RPL Source Route Header.

The `Packet` family of data structures guarantees that, if the `Packet::check_len()` method
returned `Ok(())`, then no accessor or setter method will panic. When parsing untrusted input,
it is *necessary* to use `Packet::new_checked()`.
*/

mod field {
    pub type Field = ::core::ops::Range<usize>;
}

pub mod ieee802154;
/// IPv6 addresses.
pub mod ipv6;
pub mod rpl;

use core::fmt;

pub use self::ieee802154::Address as Ieee802154Address;
pub use self::ipv6::{
    Address as Ipv6Address, AddressExt as Ipv6AddressExt, Cidr as Ipv6Cidr, Repr as Ipv6Repr,
};

/// Link-layer address of a neighbor.
pub type HardwareAddress = Ieee802154Address;

pub use self::rpl::{
    DestinationAdvertisementObject as RplDao, DestinationAdvertisementObjectAck as RplDaoAck,
    DodagInformationObject as RplDio, DodagInformationSolicitation as RplDis,
    HopByHopHeader as RplHopByHopHeader, HopByHopOption as RplHopByHopOption,
    InstanceId as RplInstanceId, ModeOfOperation as RplModeOfOperation, Repr as RplRepr,
    RoutedPacket, RoutingHeader, SourceRoute as RplSourceRoute,
};

/// Parsing a packet failed.
///
/// Either it is malformed, or it is not supported by smolrpl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Error;

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "wire::Error")
    }
}

pub type Result<T> = core::result::Result<T, Error>;
