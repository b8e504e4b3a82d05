//! Real-time event bridge
//!
//! The protocol client pushes events into an unbounded channel; one task
//! drains it and hands each event to the observers while the bridge is
//! active. A single consumer keeps device-push order.
//!
//! ```text
//! ┌──────────┐  EventSink   ┌─────────────┐  on_event   ┌───────────┐
//! │ Protocol │─────────────►│ Drain task  │────────────►│ Observers │
//! │ client   │   (mpsc)     │ (if active) │             └───────────┘
//! └──────────┘              └─────────────┘
//! ```

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, trace};
use zkbridge_types::RealtimeEvent;

use crate::client::EventSink;

/// Receives pushed events while real-time mode is on
///
/// Called from the drain task; implementations must not block.
pub trait EventObserver: Send + Sync {
    fn on_event(&self, event: &RealtimeEvent);
}

/// Logs every event
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl EventObserver for LogObserver {
    fn on_event(&self, event: &RealtimeEvent) {
        info!(
            user_id = %event.user_id,
            timestamp = %event.timestamp,
            status = event.status,
            punch = event.punch,
            "Real-time attendance event"
        );
    }
}

/// Fans events out to broadcast subscribers
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<RealtimeEvent>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.tx.subscribe()
    }
}

impl EventObserver for BroadcastObserver {
    fn on_event(&self, event: &RealtimeEvent) {
        // No subscribers is not an error
        let _ = self.tx.send(event.clone());
    }
}

/// Delivery side of one real-time registration
pub(crate) struct RealtimeBridge {
    active: Arc<RwLock<bool>>,
    task: JoinHandle<()>,
}

impl RealtimeBridge {
    /// Start draining; the returned sink goes to the protocol client
    pub(crate) fn open(observers: Vec<Arc<dyn EventObserver>>) -> (Self, EventSink) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let active = Arc::new(RwLock::new(true));

        let gate = active.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                deliver(&gate, &observers, &event);
            }
        });

        (Self { active, task }, tx)
    }

    /// Stop delivery; returns only once no observer call is in flight
    pub(crate) fn close(self) {
        *self.active.write() = false;
        self.task.abort();
    }
}

fn deliver(active: &RwLock<bool>, observers: &[Arc<dyn EventObserver>], event: &RealtimeEvent) {
    let active = active.read();
    if !*active {
        trace!("Dropping event for {} after real-time mode ended", event.user_id);
        return;
    }

    for observer in observers {
        observer.on_event(event);
    }
}
