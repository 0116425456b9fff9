use heapless::Vec;

use crate::config::IFACE_MAX_ROUTE_COUNT;
use crate::time::Instant;
use crate::wire::{Ipv6Address, Ipv6Cidr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RouteTableFull;

impl core::fmt::Display for RouteTableFull {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "route table full")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RouteTableFull {}

/// A route towards `cidr` through the neighbor `via_router`.
///
/// RPL installs a single one of these: the default route through the preferred parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Route {
    pub cidr: Ipv6Cidr,
    pub via_router: Ipv6Address,
    /// `None` never expires.
    pub expires_at: Option<Instant>,
}

impl Route {
    const DEFAULT: Ipv6Cidr = Ipv6Cidr::new(Ipv6Address::UNSPECIFIED, 0);

    /// The `::/0` route through `parent`.
    pub fn default_via(parent: Ipv6Address) -> Route {
        Route {
            cidr: Self::DEFAULT,
            via_router: parent,
            expires_at: None,
        }
    }

    pub fn is_default(&self) -> bool {
        self.cidr == Self::DEFAULT
    }

    fn is_usable(&self, addr: &Ipv6Address, now: Instant) -> bool {
        self.expires_at.map_or(true, |t| now <= t) && self.cidr.contains_addr(addr)
    }
}

/// The routing table of the interface.
#[derive(Debug, Default)]
pub struct Routes {
    storage: Vec<Route, IFACE_MAX_ROUTE_COUNT>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `route`, or fail when the table is full.
    pub fn add(&mut self, route: Route) -> Result<(), RouteTableFull> {
        self.storage.push(route).map_err(|_| RouteTableFull)
    }

    /// Point the default route at `gateway`, returning the route it replaces.
    pub fn add_default_ipv6_route(
        &mut self,
        gateway: Ipv6Address,
    ) -> Result<Option<Route>, RouteTableFull> {
        let old = self.remove_default_ipv6_route();
        self.add(Route::default_via(gateway))?;
        Ok(old)
    }

    pub fn remove_default_ipv6_route(&mut self) -> Option<Route> {
        let index = self.storage.iter().position(Route::is_default)?;
        Some(self.storage.swap_remove(index))
    }

    pub fn default_ipv6_route(&self) -> Option<&Route> {
        self.storage.iter().find(|r| r.is_default())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.storage.iter()
    }

    /// The router of the longest unexpired prefix that contains `addr`.
    pub fn lookup(&self, addr: &Ipv6Address, now: Instant) -> Option<Ipv6Address> {
        self.storage
            .iter()
            .filter(|r| r.is_usable(addr, now))
            .max_by_key(|r| r.cidr.prefix_len())
            .map(|r| r.via_router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IN_PREFIX: Ipv6Address = Ipv6Address::new(0xfd00, 0, 0, 2, 0, 0, 0, 13);
    const ELSEWHERE: Ipv6Address = Ipv6Address::new(0xfd00, 0, 0, 0x3364, 0, 0, 0, 1);
    const PARENT_A: Ipv6Address = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 0xa);
    const PARENT_B: Ipv6Address = Ipv6Address::new(0xfe80, 0, 0, 0, 0, 0, 0, 0xb);

    #[test]
    fn default_route_follows_the_parent() {
        let mut routes = Routes::new();
        let t = Instant::ZERO;
        assert_eq!(routes.lookup(&IN_PREFIX, t), None);

        assert_eq!(routes.add_default_ipv6_route(PARENT_A), Ok(None));
        assert_eq!(routes.lookup(&ELSEWHERE, t), Some(PARENT_A));

        let old = routes.add_default_ipv6_route(PARENT_B).unwrap();
        assert_eq!(old.map(|r| r.via_router), Some(PARENT_A));
        assert_eq!(routes.iter().count(), 1);
        assert_eq!(
            routes.default_ipv6_route().map(|r| r.via_router),
            Some(PARENT_B)
        );

        assert!(routes.remove_default_ipv6_route().is_some());
        assert_eq!(routes.lookup(&IN_PREFIX, t), None);
    }

    #[test]
    fn longest_prefix_until_it_expires() {
        let mut routes = Routes::new();
        routes.add_default_ipv6_route(PARENT_A).unwrap();
        routes
            .add(Route {
                cidr: Ipv6Cidr::new(Ipv6Address::new(0xfd00, 0, 0, 2, 0, 0, 0, 0), 64),
                via_router: PARENT_B,
                expires_at: Some(Instant::from_secs(10)),
            })
            .unwrap();

        let t = Instant::from_secs(10);
        assert_eq!(routes.lookup(&IN_PREFIX, t), Some(PARENT_B));
        assert_eq!(routes.lookup(&ELSEWHERE, t), Some(PARENT_A));
        assert_eq!(routes.lookup(&IN_PREFIX, Instant::from_secs(11)), Some(PARENT_A));
    }

    #[test]
    fn full_table() {
        let mut routes = Routes::new();
        for i in 0..IFACE_MAX_ROUTE_COUNT {
            let mut route = Route::default_via(PARENT_A);
            route.cidr = Ipv6Cidr::new(Ipv6Address::new(0xfd00, i as u16, 0, 0, 0, 0, 0, 0), 32);
            routes.add(route).unwrap();
        }
        assert_eq!(routes.add_default_ipv6_route(PARENT_B), Err(RouteTableFull));
    }
}
