use std::sync::atomic::{AtomicUsize, Ordering};

use crate::util::bsearch::bsearch;

/// Per-connection hazard slot matrix: `sessions` reader sessions, each with
/// `slots_per_session` publish slots. A slot holding `0` is free; any other
/// value is a published page pointer (see `evict::page::page_ptr`).
pub struct HazardTable {
    slots_per_session: usize,
    slots: Vec<AtomicUsize>,
}

impl HazardTable {
    pub fn new(sessions: usize, slots_per_session: usize) -> Self {
        let mut slots = Vec::with_capacity(sessions * slots_per_session);
        slots.resize_with(sessions * slots_per_session, || AtomicUsize::new(0));
        Self {
            slots_per_session,
            slots,
        }
    }

    fn index(&self, session: usize, slot: usize) -> usize {
        assert!(slot < self.slots_per_session);
        session * self.slots_per_session + slot
    }

    /// A reader publishes its hazard before dereferencing the page, then
    /// must re-check the edge's state (see `Reference::state`).
    pub fn publish(&self, session: usize, slot: usize, ptr: usize) {
        let idx = self.index(session, slot);
        self.slots[idx].store(ptr, Ordering::SeqCst);
    }

    pub fn withdraw(&self, session: usize, slot: usize) {
        let idx = self.index(session, slot);
        self.slots[idx].store(0, Ordering::SeqCst);
    }

    /// Build a sorted, compacted snapshot of every live hazard reference.
    /// Rebuilt on every retry: hazard references are transient and a stale
    /// snapshot would defeat the whole handshake.
    pub fn snapshot(&self) -> HazardSnapshot {
        let mut seen: Vec<usize> = self
            .slots
            .iter()
            .map(|s| s.load(Ordering::SeqCst))
            .filter(|&ptr| ptr != 0)
            .collect();
        seen.sort_unstable();
        seen.dedup();
        HazardSnapshot(seen)
    }
}

/// A sorted array of live reader page pointers, binary-searchable.
pub struct HazardSnapshot(Vec<usize>);

impl HazardSnapshot {
    pub fn contains(&self, ptr: usize) -> bool {
        let n = self.0.len() as u32;
        if n == 0 {
            return false;
        }
        let k = bsearch(ptr, 0u32, n - 1, |i| self.0[i as usize]);
        self.0[k as usize] == ptr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_withdraw() {
        let table = HazardTable::new(2, 4);
        assert!(!table.snapshot().contains(0xdead));
        table.publish(1, 2, 0xdead);
        assert!(table.snapshot().contains(0xdead));
        table.withdraw(1, 2);
        assert!(!table.snapshot().contains(0xdead));
    }

    #[test]
    fn test_snapshot_is_sorted_and_deduped() {
        let table = HazardTable::new(3, 2);
        table.publish(0, 0, 300);
        table.publish(0, 1, 100);
        table.publish(1, 0, 200);
        table.publish(2, 0, 100);
        let snap = table.snapshot();
        assert!(snap.contains(100));
        assert!(snap.contains(200));
        assert!(snap.contains(300));
        assert!(!snap.contains(150));
    }
}
