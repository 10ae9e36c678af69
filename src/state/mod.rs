// Session event publication
//
// The controller announces what happened on a tokio broadcast channel so a
// display layer can react without polling. Publishing never blocks and never
// fails: if nobody is listening the event is simply dropped.

use crate::models::{SessionState, Trigger};
use camino::Utf8PathBuf;
use tokio::sync::broadcast;

/// Something observable changed in the session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A trigger succeeded and moved the session
    StateChanged {
        trigger: Trigger,
        from: SessionState,
        to: SessionState,
    },

    /// Session configuration was edited or replaced
    ConfigurationChanged,

    /// A configuration snapshot was written for a scan start
    SnapshotWritten { path: Utf8PathBuf },

    /// A trigger was rejected or its engine call failed
    OperationFailed { trigger: Trigger, reason: String },
}

/// Broadcast sender for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Buffer size per subscriber before the oldest events are overwritten
    pub const CAPACITY: usize = 100;

    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(Self::CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
