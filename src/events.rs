//! Process-wide notifications for UI collaborators
//!
//! The sync layer never navigates or renders; it announces conditions on this
//! bus and lets whoever owns the screen decide what to do.

use crate::realtime::ConnectionState;
use tokio::sync::broadcast;

/// Default event channel capacity
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Conditions surfaced to the UI layer
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Credentials were wiped after a failed refresh or a second 401
    SessionExpired,

    /// Reconnection was abandoned
    ConnectionLost { attempts: u32 },

    /// Server asked the client to reload
    ReloadRequested,

    /// Server revoked the session
    ForcedLogout,

    /// Server entered maintenance; not recoverable from the client
    Maintenance { message: Option<String> },

    /// Realtime channel moved to a new state
    StateChanged(ConnectionState),
}

/// Broadcast bus for [`SyncEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Get an event subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Never fails the caller.
    pub fn emit(&self, event: SyncEvent) {
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(receivers, "Sync event published");
            }
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(?event, "Sync event dropped, no receivers subscribed");
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
