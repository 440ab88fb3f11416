//! Event surface consumed by UI/logging collaborators.
//!
//! Events are observable side effects, delivered over a tokio broadcast
//! channel. Emission never blocks and never fails: if nobody is
//! subscribed the event is dropped.

use drift_types::AccountId;
use tokio::sync::broadcast;

/// Observable wallet core events.
#[derive(Clone, Debug, PartialEq)]
pub enum WalletEvent {
    QueueUpdated { pending: usize },
    SyncStarted,
    SyncCompleted { executed: usize, failed: usize },
    TransactionRetry { id: String, retry_count: u32 },
    TransactionFailed { id: String, error: String },
    ConflictDetected { description: String },
    BalanceCached { account: AccountId },
    CacheInvalidated { prefix: String },
}

/// Broadcast fan-out for [`WalletEvent`].
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<WalletEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: WalletEvent) {
        // no subscribers is fine
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
