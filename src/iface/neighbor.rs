// Heads up! Before working on this file you should read, at least,
// RFC 4861 § 7.3 (neighbor reachability) and RFC 6775 § 5.

use heapless::LinearMap;

use crate::config::IFACE_NEIGHBOR_CACHE_COUNT;
use crate::time::Instant;
use crate::wire::{HardwareAddress, Ipv6Address, Ipv6AddressExt};

/// A cached neighbor.
///
/// A neighbor mapping translates from an IPv6 address to a link-layer address, and records
/// when it was last confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Neighbor {
    hardware_addr: HardwareAddress,
    filled_at: Instant,
}

impl Neighbor {
    pub fn hardware_addr(&self) -> HardwareAddress {
        self.hardware_addr
    }

    pub fn filled_at(&self) -> Instant {
        self.filled_at
    }
}

/// A neighbor cache backed by a fixed-size map.
///
/// When the cache is full, the entry that was filled the longest time ago is evicted.
#[derive(Debug)]
pub struct Cache {
    storage: LinearMap<Ipv6Address, Neighbor, IFACE_NEIGHBOR_CACHE_COUNT>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            storage: LinearMap::new(),
        }
    }

    /// Insert or refresh a mapping.
    ///
    /// Returns `false` when either address is not unicast; nothing is stored in that case.
    pub fn fill(
        &mut self,
        protocol_addr: Ipv6Address,
        hardware_addr: HardwareAddress,
        timestamp: Instant,
    ) -> bool {
        if protocol_addr.is_multicast() || protocol_addr.is_unspecified() {
            return false;
        }
        if !hardware_addr.is_unicast() {
            return false;
        }

        let neighbor = Neighbor {
            hardware_addr,
            filled_at: timestamp,
        };

        match self.storage.insert(protocol_addr, neighbor) {
            Ok(Some(old_neighbor)) => {
                if old_neighbor.hardware_addr != hardware_addr {
                    net_trace!(
                        "replaced {} => {} (was {})",
                        protocol_addr,
                        hardware_addr,
                        old_neighbor.hardware_addr
                    );
                }
            }
            Ok(None) => {
                net_trace!("filled {} => {} (was empty)", protocol_addr, hardware_addr);
            }
            Err((protocol_addr, neighbor)) => {
                // The fixed-size storage is full, evict the oldest entry.
                let Some(old_protocol_addr) = self
                    .storage
                    .iter()
                    .min_by_key(|(_, n)| n.filled_at)
                    .map(|(addr, _)| *addr)
                else {
                    return false;
                };

                let old_neighbor = self.storage.remove(&old_protocol_addr);
                if self.storage.insert(protocol_addr, neighbor).is_err() {
                    return false;
                }
                if let Some(old_neighbor) = old_neighbor {
                    net_trace!(
                        "filled {} => {} (evicted {} => {})",
                        protocol_addr,
                        hardware_addr,
                        old_protocol_addr,
                        old_neighbor.hardware_addr
                    );
                }
            }
        }
        true
    }

    /// Return the link-layer address of an IPv6 neighbor.
    pub fn lookup(&self, protocol_addr: &Ipv6Address) -> Option<HardwareAddress> {
        if protocol_addr.is_multicast() {
            return Some(HardwareAddress::BROADCAST);
        }
        self.storage.get(protocol_addr).map(|n| n.hardware_addr)
    }

    /// Return the IPv6 address of a neighbor, given its link-layer address.
    ///
    /// Link-local addresses are preferred, since that is what neighbors use to talk to each
    /// other.
    pub fn lookup_ip(&self, hardware_addr: &HardwareAddress) -> Option<Ipv6Address> {
        let mut found = None;
        for (ip, n) in self.storage.iter() {
            if n.hardware_addr != *hardware_addr {
                continue;
            }
            if ip.is_link_local() {
                return Some(*ip);
            }
            found.get_or_insert(*ip);
        }
        found
    }

    pub fn remove(&mut self, protocol_addr: &Ipv6Address) -> Option<Neighbor> {
        self.storage.remove(protocol_addr)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn flush(&mut self) {
        self.storage.clear()
    }
}
