//! Local/network state reconciliation.
//!
//! The reconciler tracks two snapshots of the same wallet: the local
//! one, advanced optimistically as queued transactions execute, and the
//! network one, refreshed from ledger fetches. Divergence is resolved
//! network-authoritatively with an additive merge, so purely-local
//! holdings (a token the network fetch did not report, an NFT minted
//! offline) are retained rather than wiped.

use crate::cache::CacheStore;
use crate::config::CoreConfig;
use crate::events::{EventBus, WalletEvent};
use crate::CoreError;
use drift_ledger::{AccountHoldings, LedgerClient};
use drift_store::{KvStore, KvStoreExt};
use drift_types::{Clock, PublicKey, SnapshotPatch, TxPayload, WalletSnapshot};
use std::sync::{Arc, RwLock};

const LOCAL_KEY: &str = "state:local";
const NETWORK_KEY: &str = "state:network";

/// One comparison of the two snapshots.
#[derive(Clone, Debug)]
pub struct StateDiff {
    pub local: WalletSnapshot,
    pub network: WalletSnapshot,
    /// Human-readable mismatch descriptions; empty when in sync.
    pub conflicts: Vec<String>,
}

pub struct StateReconciler {
    local: RwLock<Option<WalletSnapshot>>,
    network: RwLock<Option<WalletSnapshot>>,
    public_key: PublicKey,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<CacheStore>,
    events: EventBus,
    epsilon: f64,
    balance_ttl_secs: i64,
}

impl StateReconciler {
    pub fn new(
        public_key: PublicKey,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn LedgerClient>,
        cache: Arc<CacheStore>,
        events: EventBus,
        config: &CoreConfig,
    ) -> Self {
        let local = store
            .get::<WalletSnapshot>(LOCAL_KEY)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "local snapshot hydration failed");
                None
            });
        let network = store
            .get::<WalletSnapshot>(NETWORK_KEY)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "network snapshot hydration failed");
                None
            });
        Self {
            local: RwLock::new(local),
            network: RwLock::new(network),
            public_key,
            store,
            clock,
            ledger,
            cache,
            events,
            epsilon: config.sync_epsilon,
            balance_ttl_secs: config.balance_cache_ttl_secs,
        }
    }

    pub fn get_local_state(&self) -> Option<WalletSnapshot> {
        self.local.read().expect("state lock poisoned").clone()
    }

    pub fn get_network_state(&self) -> Option<WalletSnapshot> {
        self.network.read().expect("state lock poisoned").clone()
    }

    /// Patch the local snapshot, creating an empty one first if needed.
    pub fn update_local_state(&self, patch: SnapshotPatch) {
        let now = self.clock.now();
        let mut guard = self.local.write().expect("state lock poisoned");
        let snapshot = guard.get_or_insert_with(|| WalletSnapshot::empty(self.public_key, now));
        snapshot.apply(patch, now);
        self.persist(LOCAL_KEY, snapshot);
    }

    /// Patch the network snapshot, creating an empty one first if needed.
    pub fn update_network_state(&self, patch: SnapshotPatch) {
        let now = self.clock.now();
        let mut guard = self.network.write().expect("state lock poisoned");
        let snapshot = guard.get_or_insert_with(|| WalletSnapshot::empty(self.public_key, now));
        snapshot.apply(patch, now);
        self.persist(NETWORK_KEY, snapshot);
    }

    /// Advance the local snapshot past an executed transaction.
    pub fn apply_execution(&self, payload: &TxPayload) {
        let now = self.clock.now();
        let mut guard = self.local.write().expect("state lock poisoned");
        let snapshot = guard.get_or_insert_with(|| WalletSnapshot::empty(self.public_key, now));

        match payload {
            TxPayload::Transfer { amount, .. } | TxPayload::Purchase { amount, .. } => {
                snapshot.balance -= amount;
            }
            TxPayload::Stake { amount, .. } => {
                snapshot.balance -= amount;
                snapshot.staked_amount += amount;
            }
            TxPayload::Unstake { amount, .. } => {
                snapshot.balance += amount;
                snapshot.staked_amount -= amount;
            }
            TxPayload::NftTransfer { nft_id, .. } => {
                snapshot.nfts.remove(nft_id);
            }
            TxPayload::Swap {
                from_mint,
                to_mint,
                amount_in,
                amount_out,
                ..
            } => {
                *snapshot.token_balances.entry(from_mint.clone()).or_insert(0.0) -= amount_in;
                *snapshot.token_balances.entry(to_mint.clone()).or_insert(0.0) += amount_out;
            }
        }
        snapshot.timestamp = now;
        self.persist(LOCAL_KEY, snapshot);
    }

    /// Compare the two snapshots. Fails when either is missing.
    pub fn compute_differences(&self) -> Result<StateDiff, CoreError> {
        let local = self
            .get_local_state()
            .ok_or(CoreError::SnapshotMissing("local"))?;
        let network = self
            .get_network_state()
            .ok_or(CoreError::SnapshotMissing("network"))?;
        let conflicts = self.conflicts_between(&local, &network);
        Ok(StateDiff {
            local,
            network,
            conflicts,
        })
    }

    /// Whether the snapshots agree within the configured tolerance.
    /// `None` when either snapshot is missing.
    pub fn is_synced(&self) -> Option<bool> {
        let local = self.get_local_state()?;
        let network = self.get_network_state()?;
        Some(self.conflicts_between(&local, &network).is_empty())
    }

    fn conflicts_between(&self, local: &WalletSnapshot, network: &WalletSnapshot) -> Vec<String> {
        let mut conflicts = Vec::new();

        if (local.balance - network.balance).abs() > self.epsilon {
            conflicts.push(format!(
                "Balance mismatch: local {}, network {}",
                local.balance, network.balance
            ));
        }
        if (local.staked_amount - network.staked_amount).abs() > self.epsilon {
            conflicts.push(format!(
                "Staked amount mismatch: local {}, network {}",
                local.staked_amount, network.staked_amount
            ));
        }

        let mut mismatched_mints: Vec<String> = Vec::new();
        for mint in local
            .token_balances
            .keys()
            .chain(network.token_balances.keys())
        {
            let l = local.token_balances.get(mint).copied().unwrap_or(0.0);
            let n = network.token_balances.get(mint).copied().unwrap_or(0.0);
            if (l - n).abs() > self.epsilon {
                let mint = mint.as_str().to_string();
                if !mismatched_mints.contains(&mint) {
                    mismatched_mints.push(mint);
                }
            }
        }
        if !mismatched_mints.is_empty() {
            conflicts.push(format!(
                "Token balance mismatch: {}",
                mismatched_mints.join(", ")
            ));
        }

        if local.nfts != network.nfts {
            let local_only: Vec<&str> = local
                .nfts
                .difference(&network.nfts)
                .map(|id| id.as_str())
                .collect();
            let network_only: Vec<&str> = network
                .nfts
                .difference(&local.nfts)
                .map(|id| id.as_str())
                .collect();
            conflicts.push(format!(
                "NFT set mismatch: local only [{}], network only [{}]",
                local_only.join(", "),
                network_only.join(", ")
            ));
        }
        conflicts
    }

    /// Merge divergent snapshots network-authoritatively and make the
    /// result the new local state. Emits one event per conflict.
    pub fn resolve_conflicts(&self) -> Result<WalletSnapshot, CoreError> {
        let diff = self.compute_differences()?;
        for description in &diff.conflicts {
            tracing::warn!(conflict = %description, "state conflict resolved network-authoritatively");
            self.events.emit(WalletEvent::ConflictDetected {
                description: description.clone(),
            });
        }

        let merged = merge_network_authoritative(&diff.local, &diff.network, self.clock.now());
        {
            let mut guard = self.local.write().expect("state lock poisoned");
            *guard = Some(merged.clone());
        }
        self.persist(LOCAL_KEY, &merged);
        Ok(merged)
    }

    /// Fetch holdings from the ledger, refresh the network snapshot and
    /// reconcile local state against it. Idempotent: a second call with
    /// no intervening change is a no-op beyond the fetch.
    pub async fn sync_with_network(&self) -> Result<(), CoreError> {
        let holdings = self.ledger.fetch_holdings(&self.public_key).await?;
        let now = self.clock.now();
        let network = snapshot_from_holdings(self.public_key, holdings, now);

        {
            let mut guard = self.network.write().expect("state lock poisoned");
            *guard = Some(network.clone());
        }
        self.persist(NETWORK_KEY, &network);
        self.cache_network_view(&network);

        let local_absent = self.get_local_state().is_none();
        if local_absent {
            let mut guard = self.local.write().expect("state lock poisoned");
            *guard = Some(network.clone());
            drop(guard);
            self.persist(LOCAL_KEY, &network);
            return Ok(());
        }

        match self.is_synced() {
            Some(true) => {
                // adopt the network view wholesale so timestamps track
                let mut guard = self.local.write().expect("state lock poisoned");
                *guard = Some(network.clone());
                drop(guard);
                self.persist(LOCAL_KEY, &network);
            }
            _ => {
                self.resolve_conflicts()?;
            }
        }
        Ok(())
    }

    fn cache_network_view(&self, snapshot: &WalletSnapshot) {
        let key = format!("balance:{}", self.public_key.to_hex());
        if let Err(e) = self.cache.set(&key, &snapshot.balance, self.balance_ttl_secs) {
            tracing::debug!(error = %e, "network balance not cached");
        }
    }

    fn persist(&self, key: &str, snapshot: &WalletSnapshot) {
        if let Err(e) = self.store.put(key, snapshot) {
            tracing::warn!(key, error = %e, "snapshot not persisted");
        }
    }
}

fn snapshot_from_holdings(
    public_key: PublicKey,
    holdings: AccountHoldings,
    now: drift_types::Timestamp,
) -> WalletSnapshot {
    WalletSnapshot {
        public_key,
        balance: holdings.balance,
        token_balances: holdings.token_balances,
        nfts: holdings.nfts,
        staked_amount: holdings.staked_amount,
        block_height: holdings.block_height,
        timestamp: now,
    }
}

/// Network values win for balances; token maps prefer network entries
/// but keep local-only mints; NFT sets are unioned.
fn merge_network_authoritative(
    local: &WalletSnapshot,
    network: &WalletSnapshot,
    now: drift_types::Timestamp,
) -> WalletSnapshot {
    let mut token_balances = local.token_balances.clone();
    for (mint, amount) in &network.token_balances {
        token_balances.insert(mint.clone(), *amount);
    }
    let nfts = local.nfts.union(&network.nfts).cloned().collect();

    WalletSnapshot {
        public_key: network.public_key,
        balance: network.balance,
        token_balances,
        nfts,
        staked_amount: network.staked_amount,
        block_height: network.block_height,
        timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_types::{Mint, NftId, Timestamp};
    use std::collections::{BTreeMap, BTreeSet};

    fn snap(balance: f64) -> WalletSnapshot {
        let mut s = WalletSnapshot::empty(PublicKey([9; 32]), Timestamp::from_secs(1));
        s.balance = balance;
        s
    }

    #[test]
    fn merge_prefers_network_balance_and_unions_nfts() {
        let mut local = snap(80.0);
        local.nfts.insert(NftId::new("nft_offline"));
        local.token_balances.insert(Mint::new("usdc"), 10.0);

        let mut network = snap(100.0);
        network.nfts.insert(NftId::new("nft_chain"));
        network.token_balances.insert(Mint::new("sol"), 2.0);

        let merged = merge_network_authoritative(&local, &network, Timestamp::from_secs(5));
        assert_eq!(merged.balance, 100.0);
        assert!(merged.nfts.contains(&NftId::new("nft_offline")));
        assert!(merged.nfts.contains(&NftId::new("nft_chain")));
        assert_eq!(merged.token_balances[&Mint::new("usdc")], 10.0);
        assert_eq!(merged.token_balances[&Mint::new("sol")], 2.0);
    }

    #[test]
    fn merge_network_token_entry_wins() {
        let mut local = snap(0.0);
        local.token_balances.insert(Mint::new("usdc"), 10.0);
        let mut network = snap(0.0);
        network.token_balances.insert(Mint::new("usdc"), 7.5);

        let merged = merge_network_authoritative(&local, &network, Timestamp::from_secs(5));
        assert_eq!(merged.token_balances[&Mint::new("usdc")], 7.5);
    }

    #[test]
    fn holdings_conversion_carries_all_fields() {
        let mut token_balances = BTreeMap::new();
        token_balances.insert(Mint::new("sol"), 3.0);
        let mut nfts = BTreeSet::new();
        nfts.insert(NftId::new("n1"));

        let snapshot = snapshot_from_holdings(
            PublicKey([9; 32]),
            AccountHoldings {
                balance: 12.0,
                token_balances,
                nfts,
                staked_amount: 4.0,
                block_height: Some(77),
            },
            Timestamp::from_secs(9),
        );
        assert_eq!(snapshot.balance, 12.0);
        assert_eq!(snapshot.block_height, Some(77));
        assert_eq!(snapshot.timestamp, Timestamp::from_secs(9));
    }
}
