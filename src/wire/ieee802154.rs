use core::fmt;

use super::ipv6::{Address as Ipv6Address, AddressExt};

/// A IEEE 802.15.4 address.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Address {
    Absent,
    Short([u8; 2]),
    Extended([u8; 8]),
}

impl Address {
    /// The broadcast address.
    pub const BROADCAST: Address = Address::Short([0xff; 2]);

    /// Query whether the address is an unicast address.
    pub fn is_unicast(&self) -> bool {
        !self.is_broadcast() && *self != Address::Absent
    }

    /// Query whether this address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Build an address from a 2 or 8 octet slice.
    pub fn from_bytes(a: &[u8]) -> Option<Self> {
        match a.len() {
            2 => {
                let mut b = [0u8; 2];
                b.copy_from_slice(a);
                Some(Address::Short(b))
            }
            8 => {
                let mut b = [0u8; 8];
                b.copy_from_slice(a);
                Some(Address::Extended(b))
            }
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Absent => &[],
            Address::Short(value) => value,
            Address::Extended(value) => value,
        }
    }

    /// Convert the extended address to an Extended Unique Identifier (EUI-64)
    pub fn as_eui_64(&self) -> Option<[u8; 8]> {
        match self {
            Address::Absent | Address::Short(_) => None,
            Address::Extended(value) => {
                let mut bytes = *value;
                bytes[0] ^= 1 << 1;
                Some(bytes)
            }
        }
    }

    /// Return the interface identifier derived from this address (RFC 4944 § 6).
    ///
    /// A short address maps to `0000:00ff:fe00:XXXX`.
    pub fn interface_identifier(&self) -> Option<[u8; 8]> {
        match self {
            Address::Absent => None,
            Address::Short(value) => Some([0, 0, 0, 0xff, 0xfe, 0, value[0], value[1]]),
            Address::Extended(_) => self.as_eui_64(),
        }
    }

    /// Convert the address to a link-local IPv6 address.
    pub fn as_link_local_address(&self) -> Option<Ipv6Address> {
        let iid = self.interface_identifier()?;
        Some(Ipv6Address::from_prefix_and_iid(
            &super::ipv6::LINK_LOCAL_PREFIX,
            &iid,
        ))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "not-present"),
            Self::Short(bytes) => write!(f, "{:02x}-{:02x}", bytes[0], bytes[1]),
            Self::Extended(bytes) => write!(
                f,
                "{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}-{:02x}",
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]
            ),
        }
    }
}
