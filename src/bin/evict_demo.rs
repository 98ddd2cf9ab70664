use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use log::info;

use evictree::api::collab::{BlockManager, PageSink, Reconciler};
use evictree::api::error::Result;
use evictree::disk::blockmgr::InMemoryBlockManager;
use evictree::evict::flags::EvictFlags;
use evictree::evict::hazard::HazardTable;
use evictree::evict::page::{Modify, Page, PageKind, RecOutcome};
use evictree::evict::reference::Reference;
use evictree::evict::tree::EvictTree;
use evictree::evict::driver;

/// Stands in for real reconciliation: serializes a dirty leaf into a tiny
/// fixed byte image and persists it through the block manager, the way a
/// production reconciler would after actually encoding the page.
struct DemoReconciler {
    bm: Arc<dyn BlockManager>,
}

impl Reconciler for DemoReconciler {
    fn reconcile(&self, page: &Arc<Page>) -> Result<()> {
        let image = Bytes::from_static(b"demo-page-image");
        let addr = self.bm.alloc(image)?;
        page.set_rec(RecOutcome::Replace);
        page.set_modify(Some(Modify::Replace { addr }));
        Ok(())
    }
}

struct LoggingSink;

impl PageSink for LoggingSink {
    fn rec_track_wrapup(&self, _page: &Arc<Page>) {
        info!("rec_track_wrapup: resolving tracked allocations");
    }

    fn page_out(&self, _page: &Arc<Page>) {
        info!("page_out: releasing page memory");
    }
}

fn main() {
    env_logger::init();

    let bm: Arc<dyn BlockManager> = Arc::new(InMemoryBlockManager::new());
    let reconciler = DemoReconciler { bm: bm.clone() };
    let sink = LoggingSink;
    let hazard = HazardTable::new(1, 4);

    let leaf = Page::new_leaf(PageKind::LeafRow);
    leaf.set_dirty(true);
    let edge = Reference::in_memory(leaf.clone());
    leaf.set_parent_ref(Arc::downgrade(&edge));
    let tree = EvictTree::new(edge);

    let started = SystemTime::now();
    driver::evict(
        &tree,
        leaf,
        EvictFlags::empty(),
        &hazard,
        &reconciler,
        bm.as_ref(),
        &sink,
    )
    .expect("evict should succeed on an uncontended dirty leaf");
    let elapsed = started.elapsed().unwrap_or_default();

    let root = tree.root();
    info!(
        "evicted dirty leaf in {:?}: edge state = {:?}, addr size = {:?}",
        elapsed,
        root.state(),
        root.addr().map(|a| a.size)
    );
}
