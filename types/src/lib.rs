//! Fundamental types for the Drift wallet core.
//!
//! This crate defines the types shared across every other crate in the
//! workspace: identifiers, timestamps, the offline transaction model,
//! wallet snapshots, recovery records, and sessions. Everything here is
//! serde-serializable because the durable store persists JSON records.

pub mod ids;
pub mod keys;
pub mod recovery;
pub mod session;
pub mod snapshot;
pub mod time;
pub mod transaction;

pub use ids::{AccountId, ContactId, DeviceId, Mint, NftId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use recovery::{RecoveryMetadata, RecoverySession, RecoverySessionStatus, RecoveryShare};
pub use session::{DeviceMetadata, Session};
pub use snapshot::{SnapshotPatch, WalletSnapshot};
pub use time::{Clock, SystemClock, Timestamp};
pub use transaction::{NewOfflineTransaction, OfflineTransaction, Priority, TxPayload, TxStatus};
