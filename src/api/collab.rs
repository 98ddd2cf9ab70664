use std::sync::Arc;

use bytes::Bytes;

use crate::api::error::Result;
use crate::evict::page::Page;
use crate::evict::reference::Addr;

/// Serializes a dirty page into a byte image (or split result), setting
/// exactly one `RecOutcome` flag and populating the page's modify record.
/// Reconciliation itself is out of scope here; this is the seam the
/// eviction core calls into.
pub trait Reconciler {
    fn reconcile(&self, page: &Arc<Page>) -> Result<()>;
}

/// Owns the persistent address space. The eviction core treats `Addr`
/// blobs as opaque; only the block manager interprets them.
pub trait BlockManager {
    fn alloc(&self, bytes: Bytes) -> Result<Addr>;
    fn free(&self, addr: &Addr) -> Result<()>;
}

/// Resolves a discarded page's remaining memory-side bookkeeping:
/// `page_out` releases the page's own storage, `rec_track_wrapup` resolves
/// any objects staged by reconciliation (e.g. allocations tracked for a
/// deferred free) and is called first.
pub trait PageSink {
    fn rec_track_wrapup(&self, page: &Arc<Page>);
    fn page_out(&self, page: &Arc<Page>);
}
