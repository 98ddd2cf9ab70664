use std::sync::Arc;

use log::{debug, trace};

use crate::api::collab::{BlockManager, PageSink, Reconciler};
use crate::api::error::{Error, Result};
use crate::evict::commit::{commit, CommitAction};
use crate::evict::discard::discard;
use crate::evict::flags::EvictFlags;
use crate::evict::hazard::HazardTable;
use crate::evict::lock::{review, unlock};
use crate::evict::page::{Page, RecOutcome};
use crate::evict::reference::RefState;
use crate::evict::tree::EvictTree;

/// Bounds the root-split re-reconciliation recursion (§4.1 root REC_SPLIT
/// case). Finite block-manager address width means this terminates in
/// practice in one or two levels; this guards against a runaway loop.
pub const MAX_ROOT_SPLIT_CASCADE: usize = 8;

/// Evict `page`. `flags.single` means the caller already holds tree-wide
/// exclusivity (sync/close); `flags.wait` means hazard contention should be
/// spun out rather than surfaced.
pub fn evict(
    tree: &EvictTree,
    page: Arc<Page>,
    flags: EvictFlags,
    hazard: &HazardTable,
    reconciler: &dyn Reconciler,
    bm: &dyn BlockManager,
    sink: &dyn PageSink,
) -> Result<()> {
    if page.rec() == RecOutcome::SplitMerge {
        trace!("evict: page carries REC_SPLIT_MERGE, refreshing instead of evicting");
        page.touch();
        if let Some(edge) = page.parent_ref() {
            edge.set_state(RefState::Mem);
        }
        return Ok(());
    }

    let last_page = review(&page, flags, hazard)?;
    let edge = page
        .parent_ref()
        .expect("evicted page has no owning edge (tree invariant violated)");

    let outcome = (|| -> Result<CommitAction> {
        if page.dirty() {
            reconciler.reconcile(&page)?;
        }
        commit(tree, &page, &edge, bm)
    })();

    let action = match outcome {
        Ok(action) => action,
        Err(e) => {
            if !flags.is_single() {
                unlock(&page, &last_page, hazard)?;
            }
            return Err(e);
        }
    };

    match action {
        CommitAction::Discard => {
            debug!("evict: committed, discarding evicted subtree");
            discard(&page, sink);
            Ok(())
        }
        CommitAction::KeepResident => {
            debug!("evict: REC_EMPTY parent case, page stays resident for later merge");
            Ok(())
        }
        CommitAction::RootSplitRecurse(new_root) => {
            debug!("evict: root split, re-reconciling the new root");
            discard(&page, sink);
            cascade_root_split(tree, new_root, reconciler, bm, sink, 1)
        }
    }
}

/// The new root produced by a root-level REC_SPLIT has no parent to absorb
/// it later, so it is immediately re-reconciled. The new page has no
/// readers yet (nothing has published a hazard on it), so the lock is taken
/// directly rather than through the hazard handshake.
fn cascade_root_split(
    tree: &EvictTree,
    new_root: Arc<Page>,
    reconciler: &dyn Reconciler,
    bm: &dyn BlockManager,
    sink: &dyn PageSink,
    depth: usize,
) -> Result<()> {
    if depth > MAX_ROOT_SPLIT_CASCADE {
        return Err(Error::Other(
            "root split cascade exceeded MAX_ROOT_SPLIT_CASCADE".into(),
        ));
    }

    new_root.set_dirty(true);
    new_root.set_rec(RecOutcome::None);
    reconciler.reconcile(&new_root)?;

    let edge = new_root
        .parent_ref()
        .expect("new root has no owning edge");
    edge.set_state(RefState::Locked);

    match commit(tree, &new_root, &edge, bm)? {
        CommitAction::Discard => {
            discard(&new_root, sink);
            Ok(())
        }
        CommitAction::KeepResident => Ok(()),
        CommitAction::RootSplitRecurse(next_root) => {
            discard(&new_root, sink);
            cascade_root_split(tree, next_root, reconciler, bm, sink, depth + 1)
        }
    }
}
