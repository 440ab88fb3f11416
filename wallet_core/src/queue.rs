//! Priority transaction queue with offline buffering.
//!
//! Transactions are held in priority order (high, medium, low), FIFO
//! within a tier. While offline everything buffers; a drain runs on the
//! periodic tick and on every offline-to-online transition. Drains are
//! mutually exclusive, so a transaction is never submitted twice.

use crate::cache::CacheStore;
use crate::config::CoreConfig;
use crate::connectivity::Connectivity;
use crate::events::{EventBus, WalletEvent};
use crate::reconcile::StateReconciler;
use crate::CoreError;
use drift_crypto::Signer;
use drift_ledger::{LedgerClient, SignedSubmission};
use drift_store::{KvStore, KvStoreExt};
use drift_types::{
    Clock, NewOfflineTransaction, OfflineTransaction, Priority, TxPayload, TxStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

const STORE_KEY: &str = "queue:transactions";

/// Outcome of one [`TransactionQueue::sync_pending`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// False when the drain was skipped (offline, or already running).
    pub ran: bool,
    pub executed: usize,
    pub failed: usize,
}

pub struct TransactionQueue {
    txs: Mutex<Vec<OfflineTransaction>>,
    /// Held for the duration of a drain. `try_lock` makes overlapping
    /// drains no-ops instead of queueing behind each other.
    drain_guard: tokio::sync::Mutex<()>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn Signer>,
    reconciler: Arc<StateReconciler>,
    cache: Arc<CacheStore>,
    connectivity: Connectivity,
    events: EventBus,
    config: CoreConfig,
}

impl TransactionQueue {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        reconciler: Arc<StateReconciler>,
        cache: Arc<CacheStore>,
        connectivity: Connectivity,
        events: EventBus,
        config: CoreConfig,
    ) -> Self {
        let queue = Self {
            txs: Mutex::new(Vec::new()),
            drain_guard: tokio::sync::Mutex::new(()),
            store,
            clock,
            ledger,
            signer,
            reconciler,
            cache,
            connectivity,
            events,
            config,
        };
        queue.hydrate();
        queue
    }

    fn hydrate(&self) {
        match self.store.get::<Vec<OfflineTransaction>>(STORE_KEY) {
            Ok(Some(txs)) => {
                tracing::debug!(count = txs.len(), "transaction queue hydrated");
                *self.txs.lock().expect("queue lock poisoned") = txs;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "queue hydration failed, starting empty"),
        }
    }

    /// Add a transaction to the queue. Returns the stored transaction
    /// with its generated id.
    pub fn enqueue(&self, new: NewOfflineTransaction) -> Result<OfflineTransaction, CoreError> {
        let tx = OfflineTransaction {
            id: drift_utils::random_id("tx"),
            payload: new.payload,
            priority: new.priority,
            status: TxStatus::Pending,
            retry_count: 0,
            max_retries: new.max_retries.unwrap_or(self.config.default_max_retries),
            created_at: self.clock.now(),
            executed_at: None,
            error: None,
        };

        let pending = {
            let mut txs = self.txs.lock().expect("queue lock poisoned");
            if txs.len() >= self.config.max_queue_size {
                return Err(CoreError::QueueFull {
                    max: self.config.max_queue_size,
                });
            }
            let at = insertion_index(&txs, tx.priority);
            txs.insert(at, tx.clone());
            self.persist(&txs);
            txs.iter().filter(|t| t.status == TxStatus::Pending).count()
        };

        tracing::debug!(tx_id = %tx.id, kind = tx.payload.kind(), priority = ?tx.priority, "transaction queued");
        self.events.emit(WalletEvent::QueueUpdated { pending });
        Ok(tx)
    }

    pub fn list_queue(&self) -> Vec<OfflineTransaction> {
        self.txs.lock().expect("queue lock poisoned").clone()
    }

    pub fn list_pending(&self) -> Vec<OfflineTransaction> {
        self.txs
            .lock()
            .expect("queue lock poisoned")
            .iter()
            .filter(|tx| tx.status == TxStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn list_executed(&self) -> Vec<OfflineTransaction> {
        self.txs
            .lock()
            .expect("queue lock poisoned")
            .iter()
            .filter(|tx| tx.status == TxStatus::Executed)
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.txs
            .lock()
            .expect("queue lock poisoned")
            .iter()
            .filter(|tx| tx.status == TxStatus::Pending)
            .count()
    }

    pub fn clear(&self) {
        let mut txs = self.txs.lock().expect("queue lock poisoned");
        txs.clear();
        self.persist(&txs);
        self.events.emit(WalletEvent::QueueUpdated { pending: 0 });
    }

    /// Mark pending transactions whose cumulative debits overdraw the
    /// cached balance of their account. Accounts with no cached balance
    /// are left pending; the ledger is the judge of those.
    pub fn resolve_conflicts(&self) {
        let mut conflicts: Vec<(String, String)> = Vec::new();
        {
            let mut txs = self.txs.lock().expect("queue lock poisoned");
            let mut spent: HashMap<String, f64> = HashMap::new();

            for tx in txs.iter_mut().filter(|tx| tx.status == TxStatus::Pending) {
                let Some((account, amount)) = tx.payload.debit() else {
                    continue;
                };
                let Some(balance) = self.cache.get::<f64>(&format!("balance:{account}"))
                else {
                    continue;
                };
                let running = spent.entry(account.as_str().to_string()).or_insert(0.0);
                if *running + amount > balance {
                    let description = format!(
                        "Insufficient balance: {} requires {} with {} already committed of {}",
                        account,
                        amount,
                        running,
                        balance
                    );
                    tx.status = TxStatus::Conflict;
                    tx.error = Some(description.clone());
                    conflicts.push((tx.id.clone(), description));
                } else {
                    *running += amount;
                }
            }
            if !conflicts.is_empty() {
                self.persist(&txs);
            }
        }
        for (tx_id, description) in conflicts {
            tracing::warn!(tx_id = %tx_id, "transaction conflicts with cached balance");
            self.events
                .emit(WalletEvent::ConflictDetected { description });
        }
    }

    /// Drain pending transactions against the ledger.
    ///
    /// Skipped while offline and while another drain holds the guard.
    /// Transactions are executed strictly in priority order; transient
    /// failures consume a retry and leave the transaction pending,
    /// permanent failures fail it immediately.
    pub async fn sync_pending(&self) -> Result<DrainReport, CoreError> {
        if !self.connectivity.is_online() {
            return Ok(DrainReport::default());
        }
        let Ok(_guard) = self.drain_guard.try_lock() else {
            return Ok(DrainReport::default());
        };

        self.prune();
        self.resolve_conflicts();
        self.events.emit(WalletEvent::SyncStarted);

        let batch: Vec<OfflineTransaction> = {
            let mut txs = self.txs.lock().expect("queue lock poisoned");
            // insertion keeps tiers ordered; the stable sort is a
            // safeguard for hydrated state written by older versions
            txs.sort_by_key(|tx| std::cmp::Reverse(tx.priority.rank()));
            txs.iter()
                .filter(|tx| tx.status == TxStatus::Pending)
                .cloned()
                .collect()
        };

        let mut executed = 0;
        let mut failed = 0;
        for tx in batch {
            // connectivity may drop mid-drain
            if !self.connectivity.is_online() {
                break;
            }
            match self.execute(&tx).await {
                Outcome::Executed => executed += 1,
                Outcome::Failed => failed += 1,
                Outcome::Retrying => {}
            }
        }

        self.prune();
        {
            let txs = self.txs.lock().expect("queue lock poisoned");
            self.persist(&txs);
        }

        tracing::info!(executed, failed, "queue drain finished");
        self.events.emit(WalletEvent::SyncCompleted { executed, failed });
        self.events.emit(WalletEvent::QueueUpdated {
            pending: self.pending_count(),
        });
        Ok(DrainReport {
            ran: true,
            executed,
            failed,
        })
    }

    async fn execute(&self, tx: &OfflineTransaction) -> Outcome {
        let payload = match serde_json::to_vec(&tx.payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.mark_failed(&tx.id, format!("unserializable payload: {e}"));
                return Outcome::Failed;
            }
        };
        let signature = match self.signer.sign(&payload) {
            Ok(sig) => sig,
            Err(e) => {
                self.mark_failed(&tx.id, e.to_string());
                return Outcome::Failed;
            }
        };
        let submission = SignedSubmission {
            public_key: self.signer.public_key(),
            payload,
            signature,
        };

        match self.ledger.submit(&submission).await {
            Ok(receipt) => {
                tracing::debug!(tx_id = %tx.id, tx_hash = %receipt.tx_hash, "transaction executed");
                self.reconciler.apply_execution(&tx.payload);
                self.update_caches(&tx.payload);
                self.mark_executed(&tx.id);
                Outcome::Executed
            }
            Err(e) if e.is_transient() => {
                let retry_count = tx.retry_count + 1;
                if retry_count >= tx.max_retries {
                    tracing::warn!(tx_id = %tx.id, error = %e, "retry budget exhausted");
                    self.mark_failed(&tx.id, e.to_string());
                    Outcome::Failed
                } else {
                    tracing::debug!(tx_id = %tx.id, retry_count, error = %e, "transient failure, will retry");
                    self.mark_retrying(&tx.id, retry_count);
                    self.events.emit(WalletEvent::TransactionRetry {
                        id: tx.id.clone(),
                        retry_count,
                    });
                    Outcome::Retrying
                }
            }
            Err(e) => {
                tracing::warn!(tx_id = %tx.id, error = %e, "transaction rejected");
                self.mark_failed(&tx.id, e.to_string());
                Outcome::Failed
            }
        }
    }

    /// Fold an executed payload into the balance/stake/nft caches so
    /// subsequent conflict checks see the spend.
    fn update_caches(&self, payload: &TxPayload) {
        let ttl = self.config.balance_cache_ttl_secs;
        let adjust = |account: &drift_types::AccountId, delta: f64| {
            let key = format!("balance:{account}");
            if let Some(balance) = self.cache.get::<f64>(&key) {
                if self.cache.set(&key, &(balance + delta), ttl).is_ok() {
                    self.events.emit(WalletEvent::BalanceCached {
                        account: account.clone(),
                    });
                }
            }
        };
        let adjust_stake = |account: &drift_types::AccountId, delta: f64| {
            let key = format!("stake:{account}");
            if let Some(staked) = self.cache.get::<f64>(&key) {
                let _ = self.cache.set(&key, &(staked + delta), ttl);
            }
        };
        match payload {
            TxPayload::Transfer { from, to, amount } => {
                adjust(from, -amount);
                adjust(to, *amount);
            }
            TxPayload::Stake { wallet, amount } => {
                adjust(wallet, -amount);
                adjust_stake(wallet, *amount);
            }
            TxPayload::Unstake { wallet, amount } => {
                adjust(wallet, *amount);
                adjust_stake(wallet, -amount);
            }
            TxPayload::Purchase { buyer, amount, .. } => adjust(buyer, -amount),
            TxPayload::NftTransfer { nft_id, to, .. } => {
                let _ = self
                    .cache
                    .set(&format!("nft:{nft_id}:owner"), &to.as_str(), ttl);
            }
            TxPayload::Swap { wallet, amount_in, .. } => adjust(wallet, -amount_in),
        }
    }

    /// Drop failed transactions and executed transactions past the
    /// retention window. Pending and conflicted entries survive.
    fn prune(&self) {
        let now = self.clock.now();
        let retention = self.config.executed_retention();
        let mut txs = self.txs.lock().expect("queue lock poisoned");
        let before = txs.len();
        txs.retain(|tx| match tx.status {
            TxStatus::Pending | TxStatus::Conflict => true,
            TxStatus::Failed => false,
            TxStatus::Executed => tx
                .executed_at
                .map_or(true, |at| !at.has_elapsed(retention, now)),
        });
        if txs.len() != before {
            self.persist(&txs);
        }
    }

    fn mark_executed(&self, id: &str) {
        let now = self.clock.now();
        let mut txs = self.txs.lock().expect("queue lock poisoned");
        if let Some(tx) = txs.iter_mut().find(|tx| tx.id == id) {
            tx.status = TxStatus::Executed;
            tx.executed_at = Some(now);
            tx.error = None;
        }
        self.persist(&txs);
    }

    fn mark_retrying(&self, id: &str, retry_count: u32) {
        let mut txs = self.txs.lock().expect("queue lock poisoned");
        if let Some(tx) = txs.iter_mut().find(|tx| tx.id == id) {
            tx.retry_count = retry_count;
        }
        self.persist(&txs);
    }

    fn mark_failed(&self, id: &str, error: String) {
        let mut txs = self.txs.lock().expect("queue lock poisoned");
        if let Some(tx) = txs.iter_mut().find(|tx| tx.id == id) {
            tx.status = TxStatus::Failed;
            tx.retry_count = tx.max_retries.max(tx.retry_count);
            tx.error = Some(error.clone());
        }
        drop(txs);
        self.events.emit(WalletEvent::TransactionFailed {
            id: id.to_string(),
            error,
        });
    }

    fn persist(&self, txs: &[OfflineTransaction]) {
        if let Err(e) = self.store.put(STORE_KEY, &txs.to_vec()) {
            tracing::warn!(error = %e, "queue not persisted");
        }
    }
}

enum Outcome {
    Executed,
    Retrying,
    Failed,
}

/// Position for a new transaction: after the last entry of its own or a
/// higher tier, before the first entry of a lower tier.
fn insertion_index(txs: &[OfflineTransaction], priority: Priority) -> usize {
    txs.iter()
        .position(|tx| tx.priority.rank() < priority.rank())
        .unwrap_or(txs.len())
}
