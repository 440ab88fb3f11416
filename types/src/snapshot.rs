//! Wallet snapshots: point-in-time views of holdings.
//!
//! Two instances exist at runtime: the *local* snapshot (provisional,
//! mutated by optimistic queue execution) and the *network* snapshot
//! (authoritative, mutated only by ledger fetches).

use crate::ids::{Mint, NftId};
use crate::keys::PublicKey;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A point-in-time view of wallet holdings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletSnapshot {
    pub public_key: PublicKey,
    pub balance: f64,
    #[serde(default)]
    pub token_balances: BTreeMap<Mint, f64>,
    #[serde(default)]
    pub nfts: BTreeSet<NftId>,
    pub staked_amount: f64,
    /// Ledger height at fetch time; only meaningful on the network snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    pub timestamp: Timestamp,
}

impl WalletSnapshot {
    /// An empty snapshot for a key, taken at `now`.
    pub fn empty(public_key: PublicKey, now: Timestamp) -> Self {
        Self {
            public_key,
            balance: 0.0,
            token_balances: BTreeMap::new(),
            nfts: BTreeSet::new(),
            staked_amount: 0.0,
            block_height: None,
            timestamp: now,
        }
    }

    /// Apply a partial update, refreshing the snapshot timestamp.
    pub fn apply(&mut self, patch: SnapshotPatch, now: Timestamp) {
        if let Some(balance) = patch.balance {
            self.balance = balance;
        }
        if let Some(tokens) = patch.token_balances {
            for (mint, amount) in tokens {
                self.token_balances.insert(mint, amount);
            }
        }
        if let Some(nfts) = patch.nfts {
            self.nfts = nfts;
        }
        if let Some(staked) = patch.staked_amount {
            self.staked_amount = staked;
        }
        if let Some(height) = patch.block_height {
            self.block_height = Some(height);
        }
        self.timestamp = now;
    }
}

/// A partial snapshot update. `None` fields are left untouched;
/// `token_balances` entries are merged in, `nfts` replaces the set.
#[derive(Clone, Debug, Default)]
pub struct SnapshotPatch {
    pub balance: Option<f64>,
    pub token_balances: Option<BTreeMap<Mint, f64>>,
    pub nfts: Option<BTreeSet<NftId>>,
    pub staked_amount: Option<f64>,
    pub block_height: Option<u64>,
}

impl SnapshotPatch {
    pub fn balance(balance: f64) -> Self {
        Self {
            balance: Some(balance),
            ..Default::default()
        }
    }

    pub fn staked(staked_amount: f64) -> Self {
        Self {
            staked_amount: Some(staked_amount),
            ..Default::default()
        }
    }
}
