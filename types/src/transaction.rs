//! Offline transaction model.
//!
//! Transactions are enqueued while the wallet may be disconnected and
//! executed later by the queue's drain loop. The payload is a tagged
//! union keyed by `kind` so each variant carries exactly the fields that
//! kind needs and handling is exhaustive at compile time.

use crate::ids::{AccountId, Mint, NftId};
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Queue priority. Ordering is total: `High > Medium > Low`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Numeric rank for sorting (higher executes first).
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

/// Lifecycle status of a queued transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Executed,
    Failed,
    Conflict,
}

/// Kind-specific transaction payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum TxPayload {
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: f64,
    },
    Stake {
        wallet: AccountId,
        amount: f64,
    },
    Unstake {
        wallet: AccountId,
        amount: f64,
    },
    Purchase {
        buyer: AccountId,
        item: String,
        amount: f64,
    },
    NftTransfer {
        nft_id: NftId,
        from: AccountId,
        to: AccountId,
    },
    Swap {
        wallet: AccountId,
        from_mint: Mint,
        to_mint: Mint,
        amount_in: f64,
        amount_out: f64,
    },
}

impl TxPayload {
    /// The `kind` tag as persisted.
    pub fn kind(&self) -> &'static str {
        match self {
            TxPayload::Transfer { .. } => "transfer",
            TxPayload::Stake { .. } => "stake",
            TxPayload::Unstake { .. } => "unstake",
            TxPayload::Purchase { .. } => "purchase",
            TxPayload::NftTransfer { .. } => "nft-transfer",
            TxPayload::Swap { .. } => "swap",
        }
    }

    /// The account this payload debits and the debited amount, if any.
    ///
    /// Used for cumulative overdraft simulation during conflict detection.
    pub fn debit(&self) -> Option<(&AccountId, f64)> {
        match self {
            TxPayload::Transfer { from, amount, .. } => Some((from, *amount)),
            TxPayload::Stake { wallet, amount } => Some((wallet, *amount)),
            TxPayload::Purchase { buyer, amount, .. } => Some((buyer, *amount)),
            TxPayload::Swap {
                wallet, amount_in, ..
            } => Some((wallet, *amount_in)),
            TxPayload::Unstake { .. } | TxPayload::NftTransfer { .. } => None,
        }
    }
}

impl fmt::Display for TxPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

/// A transaction owned by the queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfflineTransaction {
    pub id: String,
    pub payload: TxPayload,
    pub priority: Priority,
    pub status: TxStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Caller-supplied fields for `enqueue`; the queue fills in the rest.
#[derive(Clone, Debug)]
pub struct NewOfflineTransaction {
    pub payload: TxPayload,
    pub priority: Priority,
    /// Retry budget; `None` uses the queue's configured default.
    pub max_retries: Option<u32>,
}
