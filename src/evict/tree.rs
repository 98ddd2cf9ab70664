use std::sync::Arc;

use parking_lot::Mutex;

use crate::evict::reference::Reference;

/// Holds the tree's root edge. The root has no parent page to own it, so
/// unlike every other edge (owned by its parent's children array) the root
/// `Reference` is owned here.
pub struct EvictTree {
    root: Mutex<Arc<Reference>>,
}

impl EvictTree {
    pub fn new(root: Arc<Reference>) -> Self {
        Self {
            root: Mutex::new(root),
        }
    }

    pub fn root(&self) -> Arc<Reference> {
        self.root.lock().clone()
    }

    pub fn is_root(&self, edge: &Arc<Reference>) -> bool {
        Arc::ptr_eq(&*self.root.lock(), edge)
    }
}
