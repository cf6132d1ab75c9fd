//! Channel-addressed event bus for document status updates (spec §4.1).

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use amber_core::types::DocumentStatus;

/// Default broadcast buffer per channel. Slow SSE subscribers lag
/// rather than block publishers; a lagged receiver simply skips ahead.
const CHANNEL_CAPACITY: usize = 256;

/// A document status transition, published on `document:<id>:status`
/// (spec §4.1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub document_id: String,
    pub tenant_id: String,
    pub old_status: DocumentStatus,
    pub new_status: DocumentStatus,
    pub progress: Option<f32>,
    pub details: Option<serde_json::Value>,
}

impl StatusEvent {
    #[must_use]
    pub fn channel_for(document_id: &str) -> String {
        format!("document:{document_id}:status")
    }
}

/// Publishes and subscribes to named event channels. One broadcast
/// channel is created lazily per channel name and reused for the life
/// of the process.
pub struct EventBus {
    channels: DashMap<String, broadcast::Sender<StatusEvent>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Publish a status event to `document:<document_id>:status`. A
    /// channel with no current subscribers is a normal, silent no-op.
    pub fn emit_state_change(&self, event: StatusEvent) {
        let channel = StatusEvent::channel_for(&event.document_id);
        let sender = self
            .channels
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone();
        if sender.send(event).is_err() {
            debug!(%channel, "no subscribers for status event");
        }
    }

    /// Subscribe to a document's status channel. Returns events
    /// published from this call onward only.
    #[must_use]
    pub fn subscribe(&self, document_id: &str) -> broadcast::Receiver<StatusEvent> {
        let channel = StatusEvent::channel_for(document_id);
        self.channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
