//! Per-neighbor link statistics.
//!
//! The ETX of every link is kept as an exponentially weighted moving average over the number of
//! transmissions the MAC layer reports per packet. A freshness counter tracks whether enough
//! recent transmissions back the estimate.

use crate::config::RPL_LINK_STATS_TABLE_SIZE;
use crate::iface::nbr_table::{Added, NbrTable};
use crate::time::{Duration, Instant};
use crate::wire::HardwareAddress;

/// Fixed-point divisor of the ETX (RFC 6551, RFC 6719): an ETX of 1.0 is 128.
pub const ETX_DIVISOR: u16 = 128;

/// Statistics without a transmission for this long are not fresh.
pub const FRESHNESS_EXPIRATION_TIME: Duration = Duration::from_mins(10);
/// Period at which freshness counters are halved.
pub const FRESHNESS_HALF_LIFE: Duration = Duration::from_mins(15);
/// Statistics are fresh when the freshness counter reaches this value.
pub const FRESHNESS_TARGET: u8 = 4;
pub const FRESHNESS_MAX: u8 = 16;

const EWMA_SCALE: u32 = 100;
const EWMA_ALPHA: u32 = 10;
const EWMA_BOOTSTRAP_ALPHA: u32 = 25;

/// Added to the reported transmission count when a packet was not acknowledged.
const ETX_NOACK_PENALTY: u16 = 12;
const ETX_DEFAULT: u16 = 2 * ETX_DIVISOR;

const RSSI_HIGH: i16 = -60;
const RSSI_LOW: i16 = -90;
const ETX_INIT_MAX: u16 = 3;

/// Outcome of a link-layer transmission, as reported by the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxStatus {
    Ok,
    NoAck,
    Collision,
    Err,
}

/// Statistics of the link to one neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// ETX, in units of 1/[`ETX_DIVISOR`].
    pub etx: u16,
    /// Moving average of the received signal strength, in dBm.
    pub rssi: i16,
    pub freshness: u8,
    pub last_tx_time: Option<Instant>,
}

impl LinkStats {
    fn new(etx: u16, rssi: i16) -> Self {
        Self {
            etx,
            rssi,
            freshness: 0,
            last_tx_time: None,
        }
    }

    /// Query whether the statistics are backed by enough recent transmissions.
    pub fn is_fresh(&self, now: Instant) -> bool {
        match self.last_tx_time {
            Some(last_tx) => {
                now - last_tx < FRESHNESS_EXPIRATION_TIME && self.freshness >= FRESHNESS_TARGET
            }
            None => false,
        }
    }

    /// A rough ETX guess from the RSSI: a linear packet reception ratio between -90 dBm (0%)
    /// and -60 dBm (100%).
    fn etx_from_rssi(rssi: i16) -> u16 {
        if rssi == 0 {
            return ETX_DEFAULT;
        }
        let bounded = rssi.clamp(RSSI_LOW + 1, RSSI_HIGH);
        let etx = ((RSSI_HIGH - RSSI_LOW) as u16 * ETX_DIVISOR) / (bounded - RSSI_LOW) as u16;
        etx.min(ETX_INIT_MAX * ETX_DIVISOR)
    }
}

/// The link statistics of all known neighbors.
#[derive(Debug)]
pub struct LinkStatsTable {
    table: NbrTable<LinkStats, RPL_LINK_STATS_TABLE_SIZE>,
    init_etx_from_rssi: bool,
}

impl Default for LinkStatsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStatsTable {
    pub const fn new() -> Self {
        Self {
            table: NbrTable::new(),
            init_etx_from_rssi: false,
        }
    }

    /// Guess the initial ETX of a new neighbor from its RSSI, instead of using the default.
    pub fn set_init_etx_from_rssi(&mut self, value: bool) {
        self.init_etx_from_rssi = value;
    }

    pub fn get(&self, addr: &HardwareAddress) -> Option<&LinkStats> {
        self.table.get(addr)
    }

    /// Pin the statistics of a neighbor, e.g. the preferred parent.
    pub fn lock(&mut self, addr: &HardwareAddress) -> bool {
        self.table.lock(addr)
    }

    pub fn unlock(&mut self, addr: &HardwareAddress) -> bool {
        self.table.unlock(addr)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HardwareAddress, &LinkStats)> {
        self.table.iter()
    }

    fn initial_etx(&self, rssi: i16) -> u16 {
        if self.init_etx_from_rssi {
            LinkStats::etx_from_rssi(rssi)
        } else {
            ETX_DEFAULT
        }
    }

    fn add(&mut self, addr: HardwareAddress, rssi: i16) -> bool {
        let stats = LinkStats::new(self.initial_etx(rssi), rssi);
        // Make room by dropping the neighbor we have not talked to for the longest time.
        match self.table.add(addr, || stats, |a, b| a.last_tx_time < b.last_tx_time) {
            Ok(Added::Evicted(old, _)) => {
                net_trace!("link-stats: {} replaces {}", addr, old);
                true
            }
            Ok(_) => true,
            Err(_) => false,
        }
    }

    /// Update the statistics after a transmission to `addr` needing `numtx` attempts.
    ///
    /// Collisions and transmission errors are not the link's fault and are ignored.
    pub fn packet_sent(&mut self, addr: &HardwareAddress, status: TxStatus, numtx: u8, now: Instant) {
        if status != TxStatus::Ok && status != TxStatus::NoAck {
            return;
        }

        if !self.table.contains(addr) && !self.add(*addr, 0) {
            return;
        }
        let Some(stats) = self.table.get_mut(addr) else {
            return;
        };

        stats.last_tx_time = Some(now);
        stats.freshness = stats.freshness.saturating_add(numtx).min(FRESHNESS_MAX);

        let alpha = if stats.is_fresh(now) {
            EWMA_ALPHA
        } else {
            EWMA_BOOTSTRAP_ALPHA
        };

        let mut numtx = u16::from(numtx);
        if status == TxStatus::NoAck {
            numtx += ETX_NOACK_PENALTY;
        }

        let packet_etx = u32::from(numtx) * u32::from(ETX_DIVISOR);
        let etx = (u32::from(stats.etx) * (EWMA_SCALE - alpha) + packet_etx * alpha) / EWMA_SCALE;
        stats.etx = etx.min(u32::from(u16::MAX)) as u16;
    }

    /// Update the statistics after a reception from `addr`.
    pub fn packet_input(&mut self, addr: &HardwareAddress, rssi: i16) {
        match self.table.get_mut(addr) {
            Some(stats) => {
                let avg = (i32::from(stats.rssi) * (EWMA_SCALE - EWMA_ALPHA) as i32
                    + i32::from(rssi) * EWMA_ALPHA as i32)
                    / EWMA_SCALE as i32;
                stats.rssi = avg as i16;
            }
            None => {
                self.add(*addr, rssi);
            }
        }
    }

    /// Age the freshness counter of every neighbor. Meant to be called every
    /// [`FRESHNESS_HALF_LIFE`].
    pub fn periodic(&mut self) {
        for (_, stats) in self.table.iter_mut() {
            stats.freshness >>= 1;
        }
    }

    pub fn reset(&mut self) {
        self.table.clear();
    }
}
