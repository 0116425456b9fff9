use crate::config::RPL_MAX_SOURCE_ROUTE_HOPS;
use crate::wire::ipv6::{Address, AddressExt, ADDR_SIZE};

/// Routing type of the RPL Source Route Header (RFC 6554).
pub const ROUTING_TYPE_SRH: u8 = 3;

/// Routing header followed by the RPL Source Route fixed part (4 + 4 octets).
const FIXED_LEN: usize = 8;

pub type Addresses = heapless::Vec<Address, RPL_MAX_SOURCE_ROUTE_HOPS>;

/// A high-level representation of a RPL Source Route Header.
///
/// ```txt
/// 0                   1                   2                   3
/// 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Next Header  |  Hdr Ext Len  | Routing Type  | Segments Left |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// | CmprI | CmprE |  Pad  |               Reserved                |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// .                        Addresses[1..n]                        .
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Addresses are kept uncompressed. `cmpr_i` and `cmpr_e` record how many leading octets they
/// share with the IPv6 destination address.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SourceRoute {
    pub segments_left: u8,
    pub cmpr_i: u8,
    pub cmpr_e: u8,
    pub addresses: Addresses,
}

impl SourceRoute {
    /// Return the number of octets this header occupies on the wire, padding included.
    pub fn buffer_len(&self) -> usize {
        let n = self.addresses.len();
        let len = if n == 0 {
            FIXED_LEN
        } else {
            FIXED_LEN
                + (n - 1) * (ADDR_SIZE - self.cmpr_i as usize)
                + (ADDR_SIZE - self.cmpr_e as usize)
        };
        len.div_ceil(8) * 8
    }

    /// Number of padding octets appended to reach an 8-octet boundary.
    pub fn padding(&self) -> usize {
        let n = self.addresses.len();
        let unpadded = if n == 0 {
            FIXED_LEN
        } else {
            FIXED_LEN
                + (n - 1) * (ADDR_SIZE - self.cmpr_i as usize)
                + (ADDR_SIZE - self.cmpr_e as usize)
        };
        self.buffer_len() - unpadded
    }

    /// Process the header as an intermediate hop (RFC 6554 § 4.2).
    ///
    /// The next address to visit is swapped with `dst_addr` and `segments_left` is decremented.
    /// Returns `false` when `segments_left` is zero or points outside the address vector.
    pub fn advance(&mut self, dst_addr: &mut Address) -> bool {
        if self.segments_left == 0 {
            return false;
        }

        let n = self.addresses.len();
        let Some(i) = n.checked_sub(self.segments_left as usize) else {
            return false;
        };

        let cmpr = if self.segments_left == 1 {
            self.cmpr_e
        } else {
            self.cmpr_i
        } as usize;

        let current = *dst_addr;
        let mut next = current.octets();
        next[cmpr..].copy_from_slice(&self.addresses[i].octets()[cmpr..]);

        *dst_addr = Address::from_bytes(&next);
        self.addresses[i] = current;
        self.segments_left -= 1;
        true
    }
}

impl core::fmt::Display for SourceRoute {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "SRH segments_left={} cmpr_i={} cmpr_e={} [",
            self.segments_left, self.cmpr_i, self.cmpr_e
        )?;
        for (i, addr) in self.addresses.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{addr}")?;
        }
        write!(f, "]")
    }
}

/// The IPv6 routing header of a packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum RoutingHeader {
    Rpl(SourceRoute),
    Other { routing_type: u8 },
}

impl RoutingHeader {
    pub fn routing_type(&self) -> u8 {
        match self {
            RoutingHeader::Rpl(_) => ROUTING_TYPE_SRH,
            RoutingHeader::Other { routing_type } => *routing_type,
        }
    }
}
