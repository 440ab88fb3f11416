//! Connectivity signal.
//!
//! Online/offline transitions arrive as discrete events from the host
//! environment and are fanned out over a tokio watch channel. The queue
//! subscribes to trigger an out-of-band drain on every offline→online
//! edge; other components just read the current status.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkStatus {
    Online,
    Offline,
}

/// Shared handle to the connectivity signal.
#[derive(Clone)]
pub struct Connectivity {
    sender: Arc<watch::Sender<NetworkStatus>>,
}

impl Connectivity {
    pub fn new(initial: NetworkStatus) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn set_online(&self) {
        self.sender.send_if_modified(|status| {
            let changed = *status != NetworkStatus::Online;
            *status = NetworkStatus::Online;
            changed
        });
    }

    pub fn set_offline(&self) {
        self.sender.send_if_modified(|status| {
            let changed = *status != NetworkStatus::Offline;
            *status = NetworkStatus::Offline;
            changed
        });
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow() == NetworkStatus::Online
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
        self.sender.subscribe()
    }
}
