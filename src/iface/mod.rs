/*! Routing state of a network interface.

The `iface` module holds the tables a RPL node keeps about its interface and its
neighborhood: assigned addresses, routes, the IPv6 neighbor cache, link statistics
and the generic neighbor table they are built on. The RPL core itself lives in
[rpl].
*/

mod addr;
mod link_stats;
mod nbr_table;
mod neighbor;
mod route;
pub mod rpl;

pub use self::addr::{AddressOrigin, AddressTableFull, Addresses, InterfaceAddress};
pub use self::link_stats::{LinkStats, LinkStatsTable, TxStatus, ETX_DIVISOR};
pub use self::nbr_table::{Added, NbrTable, TableFull};
pub use self::neighbor::{Cache as NeighborCache, Neighbor};
pub use self::route::{Route, RouteTableFull, Routes};
pub use self::rpl::{Rpl, RplConfig, RoutingDriver, Transmit};
