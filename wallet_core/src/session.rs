//! Session lifecycle and device-trust scoring.
//!
//! Sessions have a sliding expiry and a heuristic trust score in
//! `[0, 1]`. Refreshing a lapsed session is always rejected, never
//! silently resurrected. While offline, refreshes succeed but grant a
//! much shorter extension so a session cannot be kept alive
//! indefinitely without reconnecting.

use crate::config::CoreConfig;
use crate::connectivity::Connectivity;
use crate::CoreError;
use drift_store::{KvStore, KvStoreExt};
use drift_types::{Clock, DeviceId, DeviceMetadata, PublicKey, Session, Timestamp};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

// Trust is scored in integer tenths; a full house lands exactly on 1.0.
const BASE_TRUST_TENTHS: u32 = 5;
const KNOWN_DEVICE_BONUS_TENTHS: u32 = 2;
const KNOWN_FINGERPRINT_BONUS_TENTHS: u32 = 2;
const TRUSTED_EXECUTION_BONUS_TENTHS: u32 = 1;
const TRUST_CAP_TENTHS: u32 = 10;

const CURRENT_KEY: &str = "session:current";

/// What the registry remembers about a device across sessions.
#[derive(Clone, Debug, Default)]
struct DeviceRecord {
    /// Expiry of the most recent session created on this device.
    last_session_expiry: Option<Timestamp>,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<String, Session>,
    metadata: HashMap<String, DeviceMetadata>,
    devices: HashMap<DeviceId, DeviceRecord>,
    /// Client fingerprints observed on any device.
    fingerprints: HashSet<String>,
    current: Option<String>,
}

/// Session registry. Refreshes of the same session are serialized by an
/// internal guard so concurrent calls cannot double-extend or race the
/// suspicious-activity check.
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    connectivity: Connectivity,
    config: CoreConfig,
}

impl SessionRegistry {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        connectivity: Connectivity,
        config: CoreConfig,
    ) -> Self {
        let registry = Self {
            state: Mutex::new(RegistryState::default()),
            store,
            clock,
            connectivity,
            config,
        };
        registry.hydrate();
        registry
    }

    fn hydrate(&self) {
        let mut state = self
            .state
            .try_lock()
            .expect("registry is exclusively owned during construction");

        let keys = match self.store.keys_with_prefix("session:") {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, "session hydration failed, starting empty");
                return;
            }
        };
        for key in keys {
            if key == CURRENT_KEY {
                if let Ok(Some(id)) = self.store.get::<String>(&key) {
                    state.current = Some(id);
                }
                continue;
            }
            match self.store.get::<Session>(&key) {
                Ok(Some(session)) => {
                    let device = state.devices.entry(session.device_id.clone()).or_default();
                    device.last_session_expiry = Some(
                        device
                            .last_session_expiry
                            .map_or(session.expires_at, |t| t.max(session.expires_at)),
                    );
                    state.sessions.insert(session.id.clone(), session);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(key = %key, error = %e, "unreadable session record"),
            }
        }
    }

    /// Create a session for a connected wallet and make it current.
    pub async fn create_session(
        &self,
        public_key: PublicKey,
        metadata: DeviceMetadata,
    ) -> Result<Session, CoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let trust_score = self.compute_trust(&state, &metadata, now);

        let session = Session {
            id: drift_utils::random_id("session"),
            public_key,
            device_id: metadata.device_id.clone(),
            created_at: now,
            expires_at: now.plus(self.config.session_timeout()),
            last_activity: now,
            trust_score,
            suspicious: false,
        };

        state
            .fingerprints
            .insert(metadata.fingerprint());
        let device = state.devices.entry(metadata.device_id.clone()).or_default();
        device.last_session_expiry = Some(session.expires_at);

        state.metadata.insert(session.id.clone(), metadata);
        state.sessions.insert(session.id.clone(), session.clone());
        state.current = Some(session.id.clone());

        self.persist_session(&session);
        if let Err(e) = self.store.put(CURRENT_KEY, &session.id) {
            tracing::warn!(error = %e, "current-session pointer not persisted");
        }

        tracing::info!(session_id = %session.id, device = %session.device_id, trust = session.trust_score, "session created");
        Ok(session)
    }

    /// The current session, or `None` if there is none or it lapsed.
    /// Expired sessions are left in place for the cleanup sweep.
    pub async fn get_current_session(&self) -> Option<Session> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        let id = state.current.as_ref()?;
        state
            .sessions
            .get(id)
            .filter(|session| !session.is_expired(now))
            .cloned()
    }

    /// Extend a session's expiry and update its activity/trust.
    ///
    /// Online refreshes grant the full session timeout; offline ones only
    /// a short extension. Refreshing a missing or lapsed session fails.
    pub async fn refresh_session(&self, id: &str) -> Result<Session, CoreError> {
        let now = self.clock.now();
        let online = self.connectivity.is_online();
        let mut state = self.state.lock().await;

        let Some(existing) = state.sessions.get(id) else {
            return Err(CoreError::SessionNotFound(id.to_string()));
        };
        if existing.is_expired(now) {
            return Err(CoreError::SessionExpired(id.to_string()));
        }

        let suspicious = existing.suspicious
            || existing.last_activity.elapsed_since(now)
                < self.config.suspicious_interval().as_millis() as u64;

        let extension = if online {
            self.config.session_timeout()
        } else {
            self.config.offline_refresh_extension()
        };

        let trust_score = state
            .metadata
            .get(id)
            .map(|metadata| self.compute_trust(&state, metadata, now))
            .unwrap_or(existing.trust_score);

        let session = state.sessions.get_mut(id).expect("checked above");
        session.expires_at = now.plus(extension);
        session.last_activity = now;
        session.trust_score = trust_score;
        session.suspicious = suspicious;
        let session = session.clone();

        if let Some(device) = state.devices.get_mut(&session.device_id) {
            device.last_session_expiry = Some(session.expires_at);
        }

        self.persist_session(&session);
        Ok(session)
    }

    /// Force a session to lapse immediately.
    pub async fn expire_session(&self, id: &str) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(id) else {
            return Err(CoreError::SessionNotFound(id.to_string()));
        };
        // strict `now > expires_at` comparison: step one tick back
        session.expires_at = Timestamp::from_millis(now.as_millis().saturating_sub(1));
        let session = session.clone();
        self.persist_session(&session);
        Ok(())
    }

    /// Whether a session exists and has not lapsed.
    pub async fn validate_session(&self, id: &str) -> bool {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state
            .sessions
            .get(id)
            .is_some_and(|session| !session.is_expired(now))
    }

    pub async fn get_active_sessions(&self) -> Vec<Session> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state
            .sessions
            .values()
            .filter(|session| !session.is_expired(now))
            .cloned()
            .collect()
    }

    /// Whether step-up authentication is needed.
    ///
    /// Fails safe: absence of a session (or `None`) requires MFA. A
    /// session requires MFA when its trust score is below 0.5, when it
    /// is younger than the freshness window, or when the
    /// suspicious-activity heuristic tripped.
    pub async fn requires_mfa(&self, id: Option<&str>) -> bool {
        let now = self.clock.now();
        let state = self.state.lock().await;

        let id = match id {
            Some(id) => id,
            None => match &state.current {
                Some(current) => current.as_str(),
                None => return true,
            },
        };
        let Some(session) = state.sessions.get(id) else {
            return true;
        };
        if session.is_expired(now) {
            return true;
        }
        if session.trust_score < f64::from(BASE_TRUST_TENTHS) / 10.0 {
            return true;
        }
        if !session
            .created_at
            .has_elapsed(self.config.mfa_freshness_window(), now)
        {
            return true;
        }
        session.suspicious
    }

    /// Remove lapsed sessions. Returns how many were removed.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let expired: Vec<String> = state
            .sessions
            .values()
            .filter(|session| session.is_expired(now))
            .map(|session| session.id.clone())
            .collect();

        for id in &expired {
            state.sessions.remove(id);
            state.metadata.remove(id);
            if state.current.as_deref() == Some(id) {
                state.current = None;
                let _ = self.store.delete(CURRENT_KEY);
            }
            if let Err(e) = self.store.delete(&format!("session:{id}")) {
                tracing::warn!(session_id = %id, error = %e, "session record not deleted");
            }
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired sessions cleaned up");
        }
        expired.len()
    }

    /// Trust heuristic: base 0.5, plus bonuses for a known device, a
    /// recognized client fingerprint, and a trusted execution context.
    /// Capped at 1.0.
    fn compute_trust(&self, state: &RegistryState, metadata: &DeviceMetadata, now: Timestamp) -> f64 {
        let mut tenths = BASE_TRUST_TENTHS;

        let device_known = state
            .devices
            .get(&metadata.device_id)
            .and_then(|record| record.last_session_expiry)
            .is_some_and(|expiry| {
                // non-expired, or expired recently enough
                !expiry.has_elapsed(std::time::Duration::ZERO, now)
                    || expiry.elapsed_since(now)
                        <= self.config.device_recency_window().as_millis() as u64
            });
        if device_known {
            tenths += KNOWN_DEVICE_BONUS_TENTHS;
        }
        if state.fingerprints.contains(&metadata.fingerprint()) {
            tenths += KNOWN_FINGERPRINT_BONUS_TENTHS;
        }
        if metadata.trusted_execution {
            tenths += TRUSTED_EXECUTION_BONUS_TENTHS;
        }
        f64::from(tenths.min(TRUST_CAP_TENTHS)) / 10.0
    }

    fn persist_session(&self, session: &Session) {
        if let Err(e) = self.store.put(&format!("session:{}", session.id), session) {
            tracing::warn!(session_id = %session.id, error = %e, "session record not persisted");
        }
    }
}
