use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::evict::page::Page;

/// An on-disk address: an opaque byte blob plus its length, as handed back
/// by the block manager. The eviction core never interprets the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr {
    pub bytes: Bytes,
    pub size: u32,
}

impl Addr {
    pub fn new(bytes: Bytes, size: u32) -> Self {
        Self { bytes, size }
    }
}

/// The four states a parent edge can be in. Transitions are driven either by
/// a reader (DISK -> READING -> MEM) or by an evictor (MEM <-> LOCKED).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RefState {
    Disk,
    Reading,
    Mem,
    Locked,
}

impl RefState {
    fn as_u8(self) -> u8 {
        match self {
            RefState::Disk => 0,
            RefState::Reading => 1,
            RefState::Mem => 2,
            RefState::Locked => 3,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => RefState::Disk,
            1 => RefState::Reading,
            2 => RefState::Mem,
            _ => RefState::Locked,
        }
    }
}

struct Slot {
    page: Option<Arc<Page>>,
    addr: Option<Addr>,
}

/// A child edge of an internal page (or the tree's root edge). `state` is
/// the single point of coordination with hazard-pointer readers: a reader
/// publishes its hazard and re-checks `state`, an evictor stores LOCKED and
/// then re-checks the hazard snapshot. Both sides use SeqCst so that at
/// least one of them observes the other.
pub struct Reference {
    state: AtomicU8,
    slot: Mutex<Slot>,
}

impl Reference {
    pub fn on_disk(addr: Addr) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(RefState::Disk.as_u8()),
            slot: Mutex::new(Slot {
                page: None,
                addr: Some(addr),
            }),
        })
    }

    pub fn in_memory(page: Arc<Page>) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(RefState::Mem.as_u8()),
            slot: Mutex::new(Slot {
                page: Some(page),
                addr: None,
            }),
        })
    }

    pub fn state(&self) -> RefState {
        RefState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_state(&self, state: RefState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Atomically move LOCKED -> `state`, asserting the prior state really
    /// was LOCKED. Used by the commit/unlock paths, never by readers.
    pub fn unlock_to(&self, state: RefState) {
        let prev = self.state.swap(state.as_u8(), Ordering::SeqCst);
        debug_assert_eq!(RefState::from_u8(prev), RefState::Locked);
    }

    pub fn page(&self) -> Option<Arc<Page>> {
        self.slot.lock().page.clone()
    }

    pub fn addr(&self) -> Option<Addr> {
        self.slot.lock().addr.clone()
    }

    pub fn set_page(&self, page: Option<Arc<Page>>) {
        self.slot.lock().page = page;
    }

    pub fn set_addr(&self, addr: Option<Addr>) {
        self.slot.lock().addr = addr;
    }

    /// Raw identity of the in-memory page this edge currently holds, used
    /// as the sort/search key in hazard snapshots. `None` when on disk.
    pub fn page_ptr(&self) -> Option<usize> {
        self.slot
            .lock()
            .page
            .as_ref()
            .map(|p| Arc::as_ptr(p) as usize)
    }
}
