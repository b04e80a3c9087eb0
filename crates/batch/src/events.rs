//! Notifications emitted by a running batch

use crossbeam_channel::Sender;
use serde::Serialize;

/// Event emitted by the batch worker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Work items were enumerated; sent before the first item runs
    Started { total: usize },
    /// An item finished and its row was written
    Progress { done: usize, total: usize, label: String },
    /// An item failed; the batch continues
    ItemFailed { file: String, window: usize, message: String },
    /// A discovered file was excluded before any item was built
    FileRejected { file: String, message: String },
    /// Every item was attempted. Sent once, never after cancellation or failure.
    Completed { processed: usize, failed: usize },
    Cancelled { processed: usize },
    /// The batch stopped on an unrecoverable error
    Failed { message: String },
}

impl BatchEvent {
    /// True for the event that ends a batch
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchEvent::Completed { .. } | BatchEvent::Cancelled { .. } | BatchEvent::Failed { .. }
        )
    }
}

/// Receiver of batch events
pub trait BatchObserver {
    fn on_event(&self, event: BatchEvent);
}

impl BatchObserver for Sender<BatchEvent> {
    fn on_event(&self, event: BatchEvent) {
        // a dropped receiver must not stop the batch
        let _ = self.send(event);
    }
}

/// Observer that discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl BatchObserver for NullObserver {
    fn on_event(&self, _event: BatchEvent) {}
}
