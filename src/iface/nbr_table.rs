//! A fixed-capacity table of per-neighbor data, keyed by link-layer address.
//!
//! When the table is full, adding a new neighbor evicts the worst *unlocked* entry according
//! to a caller-provided policy. Locked entries are never evicted. The evicted entry is handed
//! back to the caller, which acts as the table's removal callback.

use heapless::Vec;

use crate::wire::HardwareAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TableFull;

impl core::fmt::Display for TableFull {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Neighbor table full")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TableFull {}

#[derive(Debug, Clone)]
struct Slot<V> {
    key: HardwareAddress,
    value: V,
    locked: bool,
}

/// The outcome of [`NbrTable::add`].
#[derive(Debug, PartialEq, Eq)]
pub enum Added<V> {
    /// The key was already present; its value was left untouched.
    Existing,
    /// A free slot was used.
    Inserted,
    /// The slot of another neighbor was reused; that neighbor is returned.
    Evicted(HardwareAddress, V),
}

#[derive(Debug, Clone)]
pub struct NbrTable<V, const N: usize> {
    slots: Vec<Slot<V>, N>,
}

impl<V, const N: usize> Default for NbrTable<V, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, const N: usize> NbrTable<V, N> {
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    fn index_of(&self, key: &HardwareAddress) -> Option<usize> {
        self.slots.iter().position(|s| s.key == *key)
    }

    /// Add `key` to the table, creating its value with `init` when it is new.
    ///
    /// `is_worse(a, b)` returns `true` when `a` is less valuable than `b`. It is only called on
    /// unlocked entries, and only when the table is full.
    pub fn add<F, W>(&mut self, key: HardwareAddress, init: F, is_worse: W) -> Result<Added<V>, TableFull>
    where
        F: FnOnce() -> V,
        W: Fn(&V, &V) -> bool,
    {
        if self.index_of(&key).is_some() {
            return Ok(Added::Existing);
        }

        let slot = Slot {
            key,
            value: init(),
            locked: false,
        };

        let slot = match self.slots.push(slot) {
            Ok(()) => {
                net_trace!("nbr-table: added {}", key);
                return Ok(Added::Inserted);
            }
            Err(slot) => slot,
        };

        let mut worst: Option<usize> = None;
        for (i, s) in self.slots.iter().enumerate() {
            if s.locked {
                continue;
            }
            worst = match worst {
                Some(w) if !is_worse(&s.value, &self.slots[w].value) => Some(w),
                _ => Some(i),
            };
        }

        let Some(worst) = worst else {
            net_debug!("nbr-table: no room for {}, all entries locked", key);
            return Err(TableFull);
        };

        let old = core::mem::replace(&mut self.slots[worst], slot);
        net_trace!("nbr-table: added {} (evicted {})", key, old.key);
        Ok(Added::Evicted(old.key, old.value))
    }

    pub fn get(&self, key: &HardwareAddress) -> Option<&V> {
        self.slots.iter().find(|s| s.key == *key).map(|s| &s.value)
    }

    pub fn get_mut(&mut self, key: &HardwareAddress) -> Option<&mut V> {
        self.slots
            .iter_mut()
            .find(|s| s.key == *key)
            .map(|s| &mut s.value)
    }

    pub fn contains(&self, key: &HardwareAddress) -> bool {
        self.index_of(key).is_some()
    }

    /// Pin an entry so it can not be evicted. Returns `false` if the key is unknown.
    pub fn lock(&mut self, key: &HardwareAddress) -> bool {
        match self.index_of(key) {
            Some(i) => {
                self.slots[i].locked = true;
                true
            }
            None => false,
        }
    }

    pub fn unlock(&mut self, key: &HardwareAddress) -> bool {
        match self.index_of(key) {
            Some(i) => {
                self.slots[i].locked = false;
                true
            }
            None => false,
        }
    }

    pub fn is_locked(&self, key: &HardwareAddress) -> bool {
        self.index_of(key)
            .map(|i| self.slots[i].locked)
            .unwrap_or(false)
    }

    /// Remove an entry, locked or not.
    pub fn remove(&mut self, key: &HardwareAddress) -> Option<V> {
        let i = self.index_of(key)?;
        Some(self.slots.remove(i).value)
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = HardwareAddress> + '_ {
        self.slots.iter().map(|s| s.key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HardwareAddress, &V)> {
        self.slots.iter().map(|s| (&s.key, &s.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&HardwareAddress, &mut V)> {
        self.slots.iter_mut().map(|s| (&s.key, &mut s.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> HardwareAddress {
        HardwareAddress::Short([0, n])
    }

    fn larger_is_worse(a: &u16, b: &u16) -> bool {
        a > b
    }

    #[test]
    fn add_and_get() {
        let mut table: NbrTable<u16, 2> = NbrTable::new();
        assert_eq!(table.add(addr(1), || 10, larger_is_worse), Ok(Added::Inserted));
        assert_eq!(table.add(addr(1), || 99, larger_is_worse), Ok(Added::Existing));
        assert_eq!(table.get(&addr(1)), Some(&10));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn evicts_worst_unlocked() {
        let mut table: NbrTable<u16, 2> = NbrTable::new();
        table.add(addr(1), || 1000, larger_is_worse).unwrap();
        table.add(addr(2), || 500, larger_is_worse).unwrap();
        table.lock(&addr(1));

        assert_eq!(
            table.add(addr(3), || 700, larger_is_worse),
            Ok(Added::Evicted(addr(2), 500))
        );
        assert!(table.contains(&addr(1)));
        assert!(table.contains(&addr(3)));
        assert!(!table.contains(&addr(2)));
    }

    #[test]
    fn full_of_locked_entries() {
        let mut table: NbrTable<u16, 1> = NbrTable::new();
        table.add(addr(1), || 1, larger_is_worse).unwrap();
        assert!(table.lock(&addr(1)));
        assert_eq!(table.add(addr(2), || 2, larger_is_worse), Err(TableFull));

        assert!(table.unlock(&addr(1)));
        assert!(!table.is_locked(&addr(1)));
        assert_eq!(table.remove(&addr(1)), Some(1));
        assert!(table.is_empty());
    }
}
