#![deny(missing_docs)]

use core::fmt;

pub use core::net::Ipv6Addr as Address;

/// Size of IPv6 adderess in octets.
///
/// [RFC 8200 § 2]: https://www.rfc-editor.org/rfc/rfc4291#section-2
pub const ADDR_SIZE: usize = 16;

/// The link-local all nodes multicast address.
pub const LINK_LOCAL_ALL_NODES: Address = Address::new(0xff02, 0, 0, 0, 0, 0, 0, 1);

/// The link-local all RPL nodes multicast address.
pub const LINK_LOCAL_ALL_RPL_NODES: Address = Address::new(0xff02, 0, 0, 0, 0, 0, 0, 0x1a);

/// The `fe80::/64` link-local prefix.
pub const LINK_LOCAL_PREFIX: Address = Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 0);

/// The hop limit used for locally originated packets.
pub const DEFAULT_HOP_LIMIT: u8 = 64;

/// Helpers on top of [`Address`] used by the routing core.
pub trait AddressExt {
    /// Construct an IPv6 address from a sequence of octets, in big-endian.
    ///
    /// # Panics
    /// The function panics if `data` is not sixteen octets long.
    fn from_bytes(data: &[u8]) -> Address;

    /// Build an address from the first 8 octets of `prefix` and an interface identifier.
    fn from_prefix_and_iid(prefix: &Address, iid: &[u8; 8]) -> Address;

    /// Query whether the IPv6 address is a link-local unicast address (`fe80::/10`).
    fn is_link_local(&self) -> bool;

    /// Query whether the IPv6 address is a unicast address that is neither link-local,
    /// loopback nor unspecified.
    fn is_global_unicast(&self) -> bool;

    /// Return the interface identifier (the last 8 octets).
    fn interface_identifier(&self) -> [u8; 8];

    /// Replace the top 64 bits with the `fe80::` prefix.
    fn to_link_local(&self) -> Address;

    /// Query whether the first `prefix_len` bits of both addresses are equal.
    fn matches_prefix(&self, other: &Address, prefix_len: u8) -> bool;

    /// Return the number of leading octets both addresses have in common.
    fn matching_octets(&self, other: &Address) -> usize;

    /// Helper function used to mask an address given a prefix.
    fn mask(&self, mask: u8) -> [u8; ADDR_SIZE];
}

impl AddressExt for Address {
    fn from_bytes(data: &[u8]) -> Address {
        let mut bytes = [0; ADDR_SIZE];
        bytes.copy_from_slice(data);
        Address::from(bytes)
    }

    fn from_prefix_and_iid(prefix: &Address, iid: &[u8; 8]) -> Address {
        let mut bytes = prefix.octets();
        bytes[8..].copy_from_slice(iid);
        Address::from(bytes)
    }

    fn is_link_local(&self) -> bool {
        let octets = self.octets();
        octets[0] == 0xfe && octets[1] & 0xc0 == 0x80
    }

    fn is_global_unicast(&self) -> bool {
        !(self.is_multicast() || self.is_unspecified() || self.is_loopback() || self.is_link_local())
    }

    fn interface_identifier(&self) -> [u8; 8] {
        let mut iid = [0; 8];
        iid.copy_from_slice(&self.octets()[8..]);
        iid
    }

    fn to_link_local(&self) -> Address {
        Address::from_prefix_and_iid(&LINK_LOCAL_PREFIX, &self.interface_identifier())
    }

    fn matches_prefix(&self, other: &Address, prefix_len: u8) -> bool {
        self.mask(prefix_len) == other.mask(prefix_len)
    }

    fn matching_octets(&self, other: &Address) -> usize {
        self.octets()
            .iter()
            .zip(other.octets().iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    fn mask(&self, mask: u8) -> [u8; ADDR_SIZE] {
        assert!(mask <= 128);
        let mut bytes = [0u8; ADDR_SIZE];
        let idx = (mask as usize) / 8;
        let modulus = (mask as usize) % 8;
        let octets = self.octets();
        let (first, second) = octets.split_at(idx);
        bytes[0..idx].copy_from_slice(first);
        if idx < ADDR_SIZE {
            let part = second[0];
            bytes[idx] = part & (!(0xff >> modulus) as u8);
        }
        bytes
    }
}

/// A specification of an IPv6 CIDR block, containing an address and a variable-length
/// subnet masking prefix length.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cidr {
    address: Address,
    prefix_len: u8,
}

impl Cidr {
    /// Create an IPv6 CIDR block from the given address and prefix length.
    ///
    /// # Panics
    /// This function panics if the prefix length is larger than 128.
    pub const fn new(address: Address, prefix_len: u8) -> Cidr {
        assert!(prefix_len <= 128);
        Cidr {
            address,
            prefix_len,
        }
    }

    /// Return the address of this IPv6 CIDR block.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Return the prefix length of this IPv6 CIDR block.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Query whether the subnetwork described by this IPv6 CIDR block contains
    /// the given address.
    pub fn contains_addr(&self, addr: &Address) -> bool {
        self.address.matches_prefix(addr, self.prefix_len)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

/// The IPv6 header fields the RPL extension header logic looks at.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// IPv6 source address.
    pub src_addr: Address,
    /// IPv6 destination address.
    pub dst_addr: Address,
    /// IPv6 hop limit.
    pub hop_limit: u8,
}
