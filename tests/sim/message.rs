use smolrpl::iface::Transmit;
use smolrpl::time::Instant;
use smolrpl::wire::{HardwareAddress, RoutedPacket, RplDao, RplDaoAck, RplDio, RplRepr};

use super::Position;

/// A control message put on the air by a node.
#[derive(Debug, Clone)]
pub struct Message {
    pub at: Instant,
    pub from: (usize, Position),
    /// Link-layer destination, [`HardwareAddress::BROADCAST`] for multicast messages.
    pub to: HardwareAddress,
    pub transmit: Transmit,
    /// The IPv6 headers of a routed unicast message, after the sender updated them.
    pub packet: Option<RoutedPacket>,
}

impl Message {
    pub fn is_broadcast(&self) -> bool {
        self.to == HardwareAddress::BROADCAST
    }

    pub fn is_dis(&self) -> bool {
        matches!(self.transmit.repr, RplRepr::DodagInformationSolicitation(_))
    }

    pub fn is_dio(&self) -> bool {
        self.dio().is_some()
    }

    pub fn is_dao(&self) -> bool {
        self.dao().is_some()
    }

    pub fn is_dao_ack(&self) -> bool {
        self.dao_ack().is_some()
    }

    pub fn dio(&self) -> Option<&RplDio> {
        match &self.transmit.repr {
            RplRepr::DodagInformationObject(dio) => Some(dio),
            _ => None,
        }
    }

    pub fn dao(&self) -> Option<&RplDao> {
        match &self.transmit.repr {
            RplRepr::DestinationAdvertisementObject(dao) => Some(dao),
            _ => None,
        }
    }

    pub fn dao_ack(&self) -> Option<&RplDaoAck> {
        match &self.transmit.repr {
            RplRepr::DestinationAdvertisementObjectAck(ack) => Some(ack),
            _ => None,
        }
    }

    /// A DIO advertising an infinite rank.
    pub fn is_poisoning_dio(&self) -> bool {
        self.dio().is_some_and(|dio| dio.rank == 0xffff)
    }

    /// A DAO retracting the route to its target.
    pub fn is_no_path_dao(&self) -> bool {
        self.dao()
            .and_then(|dao| dao.transit_information)
            .is_some_and(|transit| transit.path_lifetime == 0)
    }

    pub fn has_hbh(&self) -> bool {
        self.packet.as_ref().is_some_and(|p| p.hop_by_hop.is_some())
    }

    pub fn has_routing(&self) -> bool {
        self.packet.as_ref().is_some_and(|p| p.routing.is_some())
    }
}
