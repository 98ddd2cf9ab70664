use std::sync::Arc;

use crate::api::collab::BlockManager;
use crate::api::error::{Error, Result};
use crate::evict::page::{Modify, Page, RecOutcome};
use crate::evict::reference::{RefState, Reference};
use crate::evict::tree::EvictTree;

/// What the driver should do with the evicted page once its edge has been
/// spliced. `RootSplitRecurse` is the one case the driver must act on
/// immediately: the new root has no parent to absorb it later, so it has
/// to be re-reconciled right away.
pub enum CommitAction {
    Discard,
    KeepResident,
    RootSplitRecurse(Arc<Page>),
}

/// Splice `edge` to reflect the outcome of evicting `page`, per the parent-
/// edge state machine. `edge` must already be LOCKED (acquired by
/// `review`/`hazard_exclusive`).
pub fn commit(
    tree: &EvictTree,
    page: &Arc<Page>,
    edge: &Arc<Reference>,
    bm: &dyn BlockManager,
) -> Result<CommitAction> {
    if page.dirty() {
        dirty_commit(tree, page, edge, bm)
    } else {
        clean_commit(edge)
    }
}

fn clean_commit(edge: &Arc<Reference>) -> Result<CommitAction> {
    // Edge already carries the correct `addr`; only the in-memory page
    // pointer needs to go.
    edge.set_page(None);
    edge.unlock_to(RefState::Disk);
    Ok(CommitAction::Discard)
}

fn dirty_commit(
    tree: &EvictTree,
    page: &Arc<Page>,
    edge: &Arc<Reference>,
    bm: &dyn BlockManager,
) -> Result<CommitAction> {
    match page.rec() {
        RecOutcome::Empty => {
            if tree.is_root(edge) {
                if let Some(old) = edge.addr() {
                    bm.free(&old)?;
                }
                edge.set_addr(None);
                edge.set_page(None);
                edge.unlock_to(RefState::Disk);
                Ok(CommitAction::Discard)
            } else {
                // Parent case: the page stays resident for a future parent
                // eviction to merge away; no edge change at all.
                edge.unlock_to(RefState::Mem);
                Ok(CommitAction::KeepResident)
            }
        }
        RecOutcome::Replace => {
            let modify = page
                .take_modify()
                .ok_or_else(|| Error::Protocol("REC_REPLACE page carries no modify record".into()))?;
            let new_addr = match modify {
                Modify::Replace { addr } => addr,
                _ => return Err(Error::Protocol("modify record does not match REC_REPLACE".into())),
            };
            if let Some(old) = edge.addr() {
                bm.free(&old)?;
            }
            // Writes to addr/page must happen-before the publishing store
            // that moves state to DISK (release semantics on unlock_to).
            edge.set_addr(Some(new_addr));
            edge.set_page(None);
            edge.unlock_to(RefState::Disk);
            Ok(CommitAction::Discard)
        }
        RecOutcome::Split => {
            let modify = page
                .take_modify()
                .ok_or_else(|| Error::Protocol("REC_SPLIT page carries no modify record".into()))?;
            let new_page = match modify {
                Modify::Split { page } => page,
                _ => return Err(Error::Protocol("modify record does not match REC_SPLIT".into())),
            };
            new_page.set_parent_ref(Arc::downgrade(edge));
            edge.set_page(Some(new_page.clone()));
            edge.unlock_to(RefState::Mem);

            if tree.is_root(edge) {
                Ok(CommitAction::RootSplitRecurse(new_page))
            } else {
                Ok(CommitAction::Discard)
            }
        }
        RecOutcome::SplitMerge | RecOutcome::None => Err(Error::Protocol(
            "dirty commit requires REC_EMPTY, REC_REPLACE or REC_SPLIT".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evict::page::PageKind;
    use crate::evict::reference::Addr;
    use bytes::Bytes;
    use std::sync::Mutex as StdMutex;

    struct FakeBm {
        freed: StdMutex<Vec<Addr>>,
    }

    impl FakeBm {
        fn new() -> Self {
            Self {
                freed: StdMutex::new(Vec::new()),
            }
        }
    }

    impl BlockManager for FakeBm {
        fn alloc(&self, bytes: Bytes) -> Result<Addr> {
            Ok(Addr::new(bytes, 0))
        }

        fn free(&self, addr: &Addr) -> Result<()> {
            self.freed.lock().unwrap().push(addr.clone());
            Ok(())
        }
    }

    fn setup_parent_leaf(dirty: bool, rec: RecOutcome) -> (Arc<Page>, Arc<Reference>, EvictTree) {
        let leaf = Page::new_leaf(PageKind::LeafRow);
        leaf.set_dirty(dirty);
        leaf.set_rec(rec);
        let edge = Reference::in_memory(leaf.clone());
        leaf.set_parent_ref(Arc::downgrade(&edge));
        edge.set_state(RefState::Locked);

        // A distinct root so `edge` above is a parent-owned edge, not root.
        let root_page = Page::new_internal(PageKind::IntRow, vec![edge.clone()]);
        let root_edge = Reference::in_memory(root_page);
        let tree = EvictTree::new(root_edge);

        (leaf, edge, tree)
    }

    #[test]
    fn test_clean_commit_parent() {
        let (page, edge, tree) = setup_parent_leaf(false, RecOutcome::None);
        let bm = FakeBm::new();
        let action = commit(&tree, &page, &edge, &bm).unwrap();
        assert!(matches!(action, CommitAction::Discard));
        assert_eq!(edge.state(), RefState::Disk);
        assert!(edge.page().is_none());
    }

    #[test]
    fn test_dirty_replace_frees_old_addr() {
        let (page, edge, tree) = setup_parent_leaf(true, RecOutcome::Replace);
        edge.set_addr(Some(Addr::new(Bytes::from_static(b"old"), 3)));
        page.set_modify(Some(Modify::Replace {
            addr: Addr::new(Bytes::from_static(b"new"), 3),
        }));

        let bm = FakeBm::new();
        let action = commit(&tree, &page, &edge, &bm).unwrap();
        assert!(matches!(action, CommitAction::Discard));
        assert_eq!(edge.state(), RefState::Disk);
        assert_eq!(edge.addr().unwrap().bytes, Bytes::from_static(b"new"));
        assert_eq!(bm.freed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dirty_empty_parent_case_keeps_resident() {
        let (page, edge, tree) = setup_parent_leaf(true, RecOutcome::Empty);
        let bm = FakeBm::new();
        let action = commit(&tree, &page, &edge, &bm).unwrap();
        assert!(matches!(action, CommitAction::KeepResident));
        assert_eq!(edge.state(), RefState::Mem);
        assert!(edge.page().is_some());
    }

    #[test]
    fn test_dirty_empty_root_case_discards() {
        let root_page = Page::new_leaf(PageKind::LeafRow);
        root_page.set_dirty(true);
        root_page.set_rec(RecOutcome::Empty);
        let root_edge = Reference::in_memory(root_page.clone());
        root_edge.set_state(RefState::Locked);
        root_edge.set_addr(Some(Addr::new(Bytes::from_static(b"root"), 4)));
        let tree = EvictTree::new(root_edge.clone());

        let bm = FakeBm::new();
        let action = commit(&tree, &root_page, &root_edge, &bm).unwrap();
        assert!(matches!(action, CommitAction::Discard));
        assert_eq!(root_edge.state(), RefState::Disk);
        assert!(root_edge.addr().is_none());
        assert_eq!(bm.freed.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dirty_split_root_recurses() {
        let root_page = Page::new_leaf(PageKind::LeafRow);
        root_page.set_dirty(true);
        root_page.set_rec(RecOutcome::Split);
        let new_root = Page::new_internal(PageKind::IntRow, vec![]);
        root_page.set_modify(Some(Modify::Split {
            page: new_root.clone(),
        }));
        let root_edge = Reference::in_memory(root_page.clone());
        root_edge.set_state(RefState::Locked);
        let tree = EvictTree::new(root_edge.clone());

        let bm = FakeBm::new();
        let action = commit(&tree, &root_page, &root_edge, &bm).unwrap();
        match action {
            CommitAction::RootSplitRecurse(p) => assert!(Arc::ptr_eq(&p, &new_root)),
            _ => panic!("expected RootSplitRecurse"),
        }
        assert_eq!(root_edge.state(), RefState::Mem);
    }
}
