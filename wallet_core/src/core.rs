//! Wallet core assembly.
//!
//! [`WalletCore`] wires the cache, session registry, transaction queue,
//! state reconciler and recovery coordinator together over explicitly
//! injected collaborators (store, ledger client, signer, clock). There
//! are no globals: tests construct a core from nullable collaborators
//! and drive it deterministically.

use crate::cache::CacheStore;
use crate::config::CoreConfig;
use crate::connectivity::{Connectivity, NetworkStatus};
use crate::events::EventBus;
use crate::queue::TransactionQueue;
use crate::reconcile::StateReconciler;
use crate::recovery::RecoveryCoordinator;
use crate::session::SessionRegistry;
use crate::CoreError;
use drift_crypto::Signer;
use drift_ledger::LedgerClient;
use drift_store::KvStore;
use drift_types::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct WalletCore {
    pub cache: Arc<CacheStore>,
    pub sessions: Arc<SessionRegistry>,
    pub queue: Arc<TransactionQueue>,
    pub reconciler: Arc<StateReconciler>,
    pub recovery: Arc<RecoveryCoordinator>,
    events: EventBus,
    connectivity: Connectivity,
    config: CoreConfig,
    shutdown: watch::Sender<bool>,
}

impl WalletCore {
    pub fn new(
        config: CoreConfig,
        store: Arc<dyn KvStore>,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let events = EventBus::default();
        let connectivity = Connectivity::new(NetworkStatus::Online);
        let (shutdown, _) = watch::channel(false);

        let cache = Arc::new(CacheStore::new(
            store.clone(),
            clock.clone(),
            events.clone(),
        ));
        let reconciler = Arc::new(StateReconciler::new(
            signer.public_key(),
            store.clone(),
            clock.clone(),
            ledger.clone(),
            cache.clone(),
            events.clone(),
            &config,
        ));
        let queue = Arc::new(TransactionQueue::new(
            store.clone(),
            clock.clone(),
            ledger,
            signer,
            reconciler.clone(),
            cache.clone(),
            connectivity.clone(),
            events.clone(),
            config.clone(),
        ));
        let sessions = Arc::new(SessionRegistry::new(
            store.clone(),
            clock.clone(),
            connectivity.clone(),
            config.clone(),
        ));
        let recovery = Arc::new(RecoveryCoordinator::new(store, clock, config.clone()));

        Ok(Self {
            cache,
            sessions,
            queue,
            reconciler,
            recovery,
            events,
            connectivity,
            config,
            shutdown,
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Spawn the periodic maintenance tasks: queue drain, cache sweep,
    /// session cleanup, and the drain-on-reconnect listener. Tasks run
    /// until [`WalletCore::shutdown`].
    pub fn spawn_background_tasks(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(4);

        {
            let core = self.clone();
            let mut shutdown = self.shutdown.subscribe();
            let mut tick = tokio::time::interval(Duration::from_secs(
                self.config.drain_interval_secs.max(1),
            ));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tick.tick() => {
                            if let Err(e) = core.queue.sync_pending().await {
                                tracing::warn!(error = %e, "periodic drain failed");
                            }
                        }
                    }
                }
            }));
        }

        {
            let core = self.clone();
            let mut shutdown = self.shutdown.subscribe();
            let mut tick = tokio::time::interval(Duration::from_secs(
                self.config.cache_sweep_interval_secs.max(1),
            ));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tick.tick() => {
                            let swept = core.cache.sweep();
                            if swept > 0 {
                                tracing::debug!(swept, "cache sweep");
                            }
                        }
                    }
                }
            }));
        }

        {
            let core = self.clone();
            let mut shutdown = self.shutdown.subscribe();
            let mut tick = tokio::time::interval(Duration::from_secs(
                self.config.session_cleanup_interval_secs.max(1),
            ));
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tick.tick() => {
                            core.sessions.cleanup_expired_sessions().await;
                            core.recovery.cleanup_expired_sessions().await;
                        }
                    }
                }
            }));
        }

        {
            let core = self.clone();
            let mut shutdown = self.shutdown.subscribe();
            let mut status = self.connectivity.subscribe();
            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        changed = status.changed() => {
                            if changed.is_err() {
                                break;
                            }
                            let online = *status.borrow_and_update() == NetworkStatus::Online;
                            if online {
                                tracing::info!("back online, draining queue");
                                if let Err(e) = core.queue.sync_pending().await {
                                    tracing::warn!(error = %e, "reconnect drain failed");
                                }
                            }
                        }
                    }
                }
            }));
        }

        handles
    }

    /// Signal background tasks to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
