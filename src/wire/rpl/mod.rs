//! High-level representations of RPL control messages (RFC 6550 § 6) and of the RPL
//! extension headers (RFC 6553, RFC 6554).
//!
//! Control messages are exchanged between the RPL core and the ICMPv6 layer as `Repr` values;
//! the byte-level encoding is left to that layer.

mod hbh;
mod instance_id;
pub mod options;
mod srh;

use crate::iface::rpl::lollipop::SequenceCounter;
use crate::wire::ipv6::{Address, Repr as Ipv6Repr};

pub use self::hbh::{
    HopByHopHeader, HopByHopOption, Packet as HopByHopPacket, HEADER_LEN as HOP_BY_HOP_HEADER_LEN,
    OPTION_TYPE as HOP_BY_HOP_OPTION_TYPE,
};
pub use self::instance_id::InstanceId;
pub use self::options::{
    DodagConfiguration, EnergyType, MetricContainer, MetricObject, MetricType, PrefixFlags,
    PrefixInformation, Target, TransitInformation, AGGREGATION_ADDITIVE,
};
pub use self::srh::{Addresses as SourceRouteAddresses, RoutingHeader, SourceRoute, ROUTING_TYPE_SRH};

enum_with_unknown! {
    /// RPL Control Message subtypes.
    pub enum RplControlMessage(u8) {
        DodagInformationSolicitation = 0x00,
        DodagInformationObject = 0x01,
        DestinationAdvertisementObject = 0x02,
        DestinationAdvertisementObjectAck = 0x03,
    }
}

enum_with_unknown! {
    pub enum ModeOfOperation(u8) {
        NoDownwardRoutesMaintained = 0x00,
        NonStoringMode = 0x01,
        StoringModeWithoutMulticast = 0x02,
        StoringModeWithMulticast = 0x03,
    }
}

impl Default for ModeOfOperation {
    fn default() -> Self {
        Self::NonStoringMode
    }
}

/// DAO-ACK status: unqualified acceptance.
pub const DAO_ACK_UNCONDITIONAL_ACCEPT: u8 = 0;
/// DAO-ACK status: accepted, but the parent should find an alternate.
pub const DAO_ACK_ACCEPT: u8 = 1;
/// DAO-ACK status: the node is unable to accept the DAO.
pub const DAO_ACK_UNABLE_TO_ACCEPT: u8 = 128;
/// DAO-ACK status: the root is unable to add the route.
pub const DAO_ACK_UNABLE_TO_ADD_ROUTE_AT_ROOT: u8 = 255;

/// A high-level representation of a RPL control packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Repr {
    DodagInformationSolicitation(DodagInformationSolicitation),
    DodagInformationObject(DodagInformationObject),
    DestinationAdvertisementObject(DestinationAdvertisementObject),
    DestinationAdvertisementObjectAck(DestinationAdvertisementObjectAck),
}

impl Repr {
    pub fn control_message(&self) -> RplControlMessage {
        match self {
            Repr::DodagInformationSolicitation(_) => RplControlMessage::DodagInformationSolicitation,
            Repr::DodagInformationObject(_) => RplControlMessage::DodagInformationObject,
            Repr::DestinationAdvertisementObject(_) => {
                RplControlMessage::DestinationAdvertisementObject
            }
            Repr::DestinationAdvertisementObjectAck(_) => {
                RplControlMessage::DestinationAdvertisementObjectAck
            }
        }
    }
}

/// A high-level representation of a RPL DODAG Information Solicitation (DIS).
///
/// Solicited information is not used: every DIS solicits all DODAGs in range.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DodagInformationSolicitation {
    pub flags: u8,
}

/// A high-level representation of a RPL DODAG Information Object (DIO).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DodagInformationObject {
    pub rpl_instance_id: InstanceId,
    pub version_number: SequenceCounter,
    pub rank: u16,
    pub grounded: bool,
    pub mode_of_operation: ModeOfOperation,
    pub dodag_preference: u8,
    pub dtsn: SequenceCounter,
    pub dodag_id: Address,
    pub dodag_configuration: DodagConfiguration,
    pub metric_container: Option<MetricContainer>,
    pub prefix_information: Option<PrefixInformation>,
}

/// A high-level representation of a RPL Destination Advertisement Object (DAO).
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct DestinationAdvertisementObject {
    pub rpl_instance_id: InstanceId,
    pub expect_ack: bool,
    pub sequence: SequenceCounter,
    pub dodag_id: Option<Address>,
    pub target: Option<Target>,
    pub transit_information: Option<TransitInformation>,
}

impl DestinationAdvertisementObject {
    /// The path lifetime of the transit information, or 0 (no-path) when absent.
    pub fn path_lifetime(&self) -> u8 {
        self.transit_information
            .map(|t| t.path_lifetime)
            .unwrap_or(0)
    }

    /// The parent address advertised in the transit information.
    pub fn parent_address(&self) -> Option<Address> {
        self.transit_information.and_then(|t| t.parent_address)
    }
}

/// A high-level representation of a RPL Destination Advertisement Object Acknowledgement
/// (DAO-ACK).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct DestinationAdvertisementObjectAck {
    pub rpl_instance_id: InstanceId,
    pub sequence: SequenceCounter,
    pub status: u8,
    pub dodag_id: Option<Address>,
}

impl core::fmt::Display for Repr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Repr::DodagInformationSolicitation(_) => write!(f, "DIS"),
            Repr::DodagInformationObject(DodagInformationObject {
                rpl_instance_id,
                version_number,
                rank,
                grounded,
                mode_of_operation,
                dodag_preference,
                dtsn,
                dodag_id,
                ..
            }) => write!(
                f,
                "DIO IID={rpl_instance_id} V={} R={rank} G={grounded} \
                MOP={mode_of_operation:?} Pref={dodag_preference} \
                DTSN={} DODAGID={dodag_id}",
                version_number.value(),
                dtsn.value()
            ),
            Repr::DestinationAdvertisementObject(DestinationAdvertisementObject {
                rpl_instance_id,
                expect_ack,
                sequence,
                dodag_id,
                ..
            }) => write!(
                f,
                "DAO IID={rpl_instance_id} Ack={expect_ack} Seq={} DODAGID={dodag_id:?}",
                sequence.value()
            ),
            Repr::DestinationAdvertisementObjectAck(DestinationAdvertisementObjectAck {
                rpl_instance_id,
                sequence,
                status,
                dodag_id,
            }) => write!(
                f,
                "DAO-ACK IID={rpl_instance_id} Seq={} Status={status} DODAGID={dodag_id:?}",
                sequence.value()
            ),
        }
    }
}

/// The parts of an IPv6 packet the RPL extension header logic inspects and rewrites.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RoutedPacket {
    pub ip: Ipv6Repr,
    pub hop_by_hop: Option<HopByHopHeader>,
    pub routing: Option<RoutingHeader>,
}

impl RoutedPacket {
    /// A packet without extension headers.
    pub fn new(src_addr: Address, dst_addr: Address, hop_limit: u8) -> Self {
        Self {
            ip: Ipv6Repr {
                src_addr,
                dst_addr,
                hop_limit,
            },
            hop_by_hop: None,
            routing: None,
        }
    }

    /// Return the RPL source route header, if any.
    pub fn source_route(&self) -> Option<&SourceRoute> {
        match &self.routing {
            Some(RoutingHeader::Rpl(srh)) => Some(srh),
            _ => None,
        }
    }
}
