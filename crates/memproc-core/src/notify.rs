use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};

/// Completed refreshes reported to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefreshEvent {
    /// The process list was rebuilt from scratch.
    ProcessTotal,

    /// Registry hives, user profiles and the physical memory map were
    /// refreshed.
    Registry,
}

/// A subscriber to refresh notifications.
///
/// Notifications are delivered on the refresh thread while the global
/// coordination lock is held. Subscribers must not block.
pub trait VmmNotify: Send + Sync {
    /// Called after a refresh completed.
    fn notify(&self, event: RefreshEvent);
}

impl VmmNotify for Sender<RefreshEvent> {
    fn notify(&self, event: RefreshEvent) {
        // A disconnected receiver simply stops listening.
        let _ = self.send(event);
    }
}
