//! Single-slot mailbox polled by the browser companion.

use parking_lot::Mutex;
use reelforge_core::QueueItem;
use tracing::{info, warn};

/// Holds at most one pending instruction.
///
/// `put` replaces an unclaimed item; `take_next` claims and clears it in one
/// step, so an item is handed out at most once.
#[derive(Debug, Default)]
pub struct ExtensionQueue {
    slot: Mutex<Option<QueueItem>>,
}

impl ExtensionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `item`, returning the unclaimed item it replaced.
    pub fn put(&self, item: QueueItem) -> Option<QueueItem> {
        let id = item.id;
        let replaced = self.slot.lock().replace(item);
        match &replaced {
            Some(old) => warn!(replaced = %old.id, %id, "Replaced unclaimed extension item"),
            None => info!(%id, "Queued extension item"),
        }
        replaced
    }

    /// Claim the pending item, if any.
    pub fn take_next(&self) -> Option<QueueItem> {
        self.slot.lock().take()
    }

    /// Whether an item is waiting.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}
