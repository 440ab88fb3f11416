//! Offline-resilient wallet core.
//!
//! Everything a wallet needs to keep working through connectivity
//! gaps: a TTL cache over a durable store, a priority transaction
//! queue that buffers while offline and drains on reconnect, a
//! session registry with device-trust scoring, a local/network state
//! reconciler, and threshold-secret-sharing social recovery.
//!
//! [`core::WalletCore`] assembles the components from injected
//! collaborators; each component is also usable on its own.

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod core;
pub mod error;
pub mod events;
pub mod queue;
pub mod reconcile;
pub mod recovery;
pub mod session;

pub use cache::CacheStore;
pub use config::CoreConfig;
pub use connectivity::{Connectivity, NetworkStatus};
pub use crate::core::WalletCore;
pub use error::CoreError;
pub use events::{EventBus, WalletEvent};
pub use queue::{DrainReport, TransactionQueue};
pub use reconcile::{StateDiff, StateReconciler};
pub use recovery::RecoveryCoordinator;
pub use session::SessionRegistry;
