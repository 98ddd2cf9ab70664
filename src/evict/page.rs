use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::evict::reference::{Addr, Reference};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageKind {
    LeafCol,
    LeafRow,
    IntCol,
    IntRow,
}

impl PageKind {
    pub fn is_leaf(self) -> bool {
        matches!(self, PageKind::LeafCol | PageKind::LeafRow)
    }
}

/// Set by reconciliation on a dirty page; at most one `RecOutcome` other
/// than `None` holds at a time (data model invariant: the flags are
/// mutually exclusive).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RecOutcome {
    None,
    Empty,
    Replace,
    Split,
    SplitMerge,
}

/// What reconciliation produced for a dirty page, paired with the
/// `RecOutcome` flag that says which variant applies.
pub enum Modify {
    Replace { addr: Addr },
    Split { page: Arc<Page> },
}

struct Inner {
    rec: RecOutcome,
    modify: Option<Modify>,
    dirty: bool,
    children: Vec<Arc<Reference>>,
}

/// A node of the tree. Internal pages carry an ordered array of child
/// edges; leaves carry none. `parent_ref` is a non-owning back-pointer to
/// the edge that owns this page -- ownership runs edge -> page, never the
/// reverse, so the back-pointer is a `Weak`.
pub struct Page {
    pub kind: PageKind,
    parent_ref: Mutex<Option<Weak<Reference>>>,
    pub read_gen: AtomicU64,
    inner: Mutex<Inner>,
}

impl Page {
    pub fn new_leaf(kind: PageKind) -> Arc<Self> {
        assert!(kind.is_leaf());
        Arc::new(Self {
            kind,
            parent_ref: Mutex::new(None),
            read_gen: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                rec: RecOutcome::None,
                modify: None,
                dirty: false,
                children: Vec::new(),
            }),
        })
    }

    pub fn new_internal(kind: PageKind, children: Vec<Arc<Reference>>) -> Arc<Self> {
        assert!(!kind.is_leaf());
        Arc::new(Self {
            kind,
            parent_ref: Mutex::new(None),
            read_gen: AtomicU64::new(0),
            inner: Mutex::new(Inner {
                rec: RecOutcome::None,
                modify: None,
                dirty: false,
                children,
            }),
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.kind.is_leaf()
    }

    pub fn is_internal(&self) -> bool {
        !self.is_leaf()
    }

    pub fn parent_ref(&self) -> Option<Arc<Reference>> {
        self.parent_ref.lock().as_ref().and_then(Weak::upgrade)
    }

    pub fn set_parent_ref(&self, edge: Weak<Reference>) {
        *self.parent_ref.lock() = Some(edge);
    }

    pub fn touch(&self) {
        self.read_gen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rec(&self) -> RecOutcome {
        self.inner.lock().rec
    }

    pub fn set_rec(&self, rec: RecOutcome) {
        self.inner.lock().rec = rec;
    }

    pub fn dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.inner.lock().dirty = dirty;
    }

    pub fn take_modify(&self) -> Option<Modify> {
        self.inner.lock().modify.take()
    }

    pub fn set_modify(&self, modify: Option<Modify>) {
        self.inner.lock().modify = modify;
    }

    pub fn children_snapshot(&self) -> Vec<Arc<Reference>> {
        self.inner.lock().children.clone()
    }

    pub fn set_children(&self, children: Vec<Arc<Reference>>) {
        self.inner.lock().children = children;
    }

    pub fn mergeable_outcome(rec: RecOutcome) -> bool {
        matches!(
            rec,
            RecOutcome::Empty | RecOutcome::Split | RecOutcome::SplitMerge
        )
    }
}

/// Raw identity of a page -- hazard snapshots and `last_page` tracking
/// both key on this.
pub fn page_ptr(page: &Arc<Page>) -> usize {
    Arc::as_ptr(page) as usize
}
