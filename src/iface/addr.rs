use heapless::Vec;

use crate::config::IFACE_MAX_ADDR_COUNT;
use crate::wire::{Ipv6Address, Ipv6AddressExt, Ipv6Cidr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressTableFull;

impl core::fmt::Display for AddressTableFull {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Address table full")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AddressTableFull {}

/// How an address was configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressOrigin {
    /// Derived from a prefix advertised in the DODAG.
    Autoconf,
    /// Set by the application.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceAddress {
    pub cidr: Ipv6Cidr,
    pub origin: AddressOrigin,
}

/// The unicast addresses assigned to the interface.
#[derive(Debug, Default)]
pub struct Addresses {
    storage: Vec<InterfaceAddress, IFACE_MAX_ADDR_COUNT>,
}

impl Addresses {
    pub fn new() -> Self {
        Self {
            storage: Vec::new(),
        }
    }

    /// Add an address. Adding an address that is already assigned does nothing.
    pub fn add(
        &mut self,
        cidr: Ipv6Cidr,
        origin: AddressOrigin,
    ) -> Result<(), AddressTableFull> {
        if self.contains(&cidr.address()) {
            return Ok(());
        }
        self.storage
            .push(InterfaceAddress { cidr, origin })
            .map_err(|_| AddressTableFull)
    }

    pub fn remove(&mut self, addr: &Ipv6Address) -> Option<InterfaceAddress> {
        let i = self
            .storage
            .iter()
            .position(|a| a.cidr.address() == *addr)?;
        Some(self.storage.remove(i))
    }

    pub fn contains(&self, addr: &Ipv6Address) -> bool {
        self.storage.iter().any(|a| a.cidr.address() == *addr)
    }

    pub fn lookup(&self, addr: &Ipv6Address) -> Option<&InterfaceAddress> {
        self.storage.iter().find(|a| a.cidr.address() == *addr)
    }

    /// Return a global unicast address of the interface, optionally restricted to a prefix.
    ///
    /// When several addresses qualify, the most recently added one is returned.
    pub fn global_address(&self, prefix: Option<(&Ipv6Address, u8)>) -> Option<Ipv6Address> {
        self.storage
            .iter()
            .rev()
            .map(|a| a.cidr.address())
            .filter(|addr| !addr.is_link_local() && !addr.is_multicast())
            .find(|addr| match prefix {
                Some((prefix, len)) => prefix.matches_prefix(addr, len),
                None => true,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterfaceAddress> {
        self.storage.iter()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
