use std::sync::Arc;

use crate::api::collab::PageSink;
use crate::evict::page::Page;
use crate::evict::reference::RefState;

/// Recursively frees `page` and every descendant merged into it. Descendants
/// are, by construction, resident and LOCKED (review/excl only merges
/// locked, mergeable children), so the recursion terminates naturally at
/// the first DISK child.
pub fn discard(page: &Arc<Page>, sink: &dyn PageSink) {
    if page.is_internal() {
        for child_ref in page.children_snapshot() {
            if child_ref.state() == RefState::Disk {
                continue;
            }
            if let Some(child) = child_ref.page() {
                discard(&child, sink);
            }
        }
    }

    if page.take_modify().is_some() {
        sink.rec_track_wrapup(page);
    }

    sink.page_out(page);
}
