//! Social recovery coordination.
//!
//! Setup splits the wallet secret into threshold shares, one per
//! trusted contact, each sealed under a key derived from the contact id.
//! Recovery runs inside a time-limited session: contacts submit their
//! shares, and once the threshold is met the secret is reconstructed.
//! Unlike the other components, persistence failures here are errors,
//! not log lines: losing a share record silently could make the wallet
//! unrecoverable.

use crate::config::CoreConfig;
use crate::CoreError;
use drift_crypto::{combine_secret, decrypt_share, encrypt_share, split_secret};
use drift_store::{KvStore, KvStoreExt};
use drift_types::{
    Clock, ContactId, RecoveryMetadata, RecoverySession, RecoverySessionStatus, RecoveryShare,
    Timestamp,
};
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use zeroize::Zeroize;

const METADATA_KEY: &str = "recovery:metadata";
const SHARE_PREFIX: &str = "recovery:share:";
const SESSION_PREFIX: &str = "recovery:session:";

#[derive(Default)]
struct RecoveryState {
    metadata: Option<RecoveryMetadata>,
    /// Keyed by contact id.
    shares: HashMap<String, RecoveryShare>,
    sessions: HashMap<String, RecoverySession>,
}

pub struct RecoveryCoordinator {
    state: Mutex<RecoveryState>,
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl RecoveryCoordinator {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: CoreConfig) -> Self {
        let coordinator = Self {
            state: Mutex::new(RecoveryState::default()),
            store,
            clock,
            config,
        };
        coordinator.hydrate();
        coordinator
    }

    fn hydrate(&self) {
        let mut state = self
            .state
            .try_lock()
            .expect("coordinator is exclusively owned during construction");

        match self.store.get::<RecoveryMetadata>(METADATA_KEY) {
            Ok(metadata) => state.metadata = metadata,
            Err(e) => tracing::warn!(error = %e, "recovery metadata hydration failed"),
        }
        if let Ok(keys) = self.store.keys_with_prefix(SHARE_PREFIX) {
            for key in keys {
                if let Ok(Some(share)) = self.store.get::<RecoveryShare>(&key) {
                    state
                        .shares
                        .insert(share.contact_id.as_str().to_string(), share);
                }
            }
        }
        if let Ok(keys) = self.store.keys_with_prefix(SESSION_PREFIX) {
            for key in keys {
                if let Ok(Some(session)) = self.store.get::<RecoverySession>(&key) {
                    state.sessions.insert(session.id.clone(), session);
                }
            }
        }
    }

    pub async fn is_recovery_setup(&self) -> bool {
        self.state.lock().await.metadata.is_some()
    }

    /// Split `secret` across `contacts` and persist the shares.
    /// Replaces any previous setup.
    pub async fn setup_recovery(
        &self,
        secret: &[u8],
        contacts: &[ContactId],
    ) -> Result<RecoveryMetadata, CoreError> {
        let threshold = self.config.recovery_threshold;
        if contacts.len() < threshold {
            return Err(CoreError::NotEnoughContacts {
                needed: threshold,
                got: contacts.len(),
            });
        }
        if contacts.len() > self.config.recovery_max_shares {
            return Err(CoreError::TooManyContacts {
                max: self.config.recovery_max_shares,
                got: contacts.len(),
            });
        }

        let now = self.clock.now();
        let mut raw_shares = split_secret(secret, contacts.len(), threshold, &mut OsRng)?;

        let mut state = self.state.lock().await;

        // drop the previous generation before writing the new one
        for contact in state.shares.keys() {
            self.store.delete(&format!("{SHARE_PREFIX}{contact}"))?;
        }
        state.shares.clear();

        for (contact, raw) in contacts.iter().zip(raw_shares.iter_mut()) {
            let share_data = if self.config.encrypt_shares {
                let sealed = encrypt_share(raw, contact);
                raw.zeroize();
                sealed
            } else {
                std::mem::take(raw)
            };
            let share = RecoveryShare {
                id: drift_utils::random_id("share"),
                share_data,
                contact_id: contact.clone(),
                encrypted: self.config.encrypt_shares,
                created_at: now,
                expires_at: None,
            };
            self.store
                .put(&format!("{SHARE_PREFIX}{contact}"), &share)?;
            state
                .shares
                .insert(contact.as_str().to_string(), share);
        }

        let metadata = RecoveryMetadata {
            threshold,
            total_shares: contacts.len(),
            contacts: contacts.to_vec(),
            shares_encrypted: self.config.encrypt_shares,
            created_at: now,
        };
        self.store.put(METADATA_KEY, &metadata)?;
        state.metadata = Some(metadata.clone());

        tracing::info!(
            contacts = contacts.len(),
            threshold,
            "recovery configured"
        );
        Ok(metadata)
    }

    /// The share held for a contact, if recovery is configured.
    pub async fn get_share_for_contact(&self, contact: &ContactId) -> Option<RecoveryShare> {
        self.state.lock().await.shares.get(contact.as_str()).cloned()
    }

    /// Open a recovery session. Only one active session per user.
    pub async fn initiate_recovery(&self, user_id: &str) -> Result<RecoverySession, CoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let Some(metadata) = state.metadata.clone() else {
            return Err(CoreError::RecoveryNotConfigured);
        };
        if state.sessions.values().any(|session| {
            session.user_id == user_id
                && session.status.is_active()
                && !session_lapsed(session, now)
        }) {
            return Err(CoreError::RecoverySessionAlreadyExists(user_id.to_string()));
        }

        let session = RecoverySession {
            id: drift_utils::random_id("recovery"),
            user_id: user_id.to_string(),
            required_shares: metadata.threshold,
            collected_shares: Vec::new(),
            status: RecoverySessionStatus::Pending,
            initiated_at: now,
            expires_at: now.plus(self.config.recovery_grace_period()),
        };
        self.persist_session(&session)?;
        state.sessions.insert(session.id.clone(), session.clone());

        tracing::info!(
            session_id = %session.id,
            grace = %drift_utils::format_duration(self.config.recovery_grace_period_secs),
            "recovery session opened"
        );
        Ok(session)
    }

    /// Submit a contact's share to an open session.
    ///
    /// One share per contact; reaching the threshold completes the
    /// session. Terminal sessions behave as not found.
    pub async fn add_share_to_session(
        &self,
        session_id: &str,
        share: RecoveryShare,
    ) -> Result<RecoverySession, CoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let Some(session) = state.sessions.get_mut(session_id) else {
            return Err(CoreError::RecoverySessionNotFound(session_id.to_string()));
        };
        if session.status.is_terminal() {
            return Err(CoreError::RecoverySessionNotFound(session_id.to_string()));
        }
        if session_lapsed(session, now) {
            session.status = RecoverySessionStatus::Expired;
            let session = session.clone();
            self.persist_session(&session)?;
            return Err(CoreError::RecoverySessionExpired(session_id.to_string()));
        }
        if session.has_share_from(&share.contact_id) {
            return Err(CoreError::DuplicateShare(share.contact_id));
        }

        session.collected_shares.push(share);
        session.status = if session.collected_shares.len() >= session.required_shares {
            RecoverySessionStatus::Completed
        } else {
            RecoverySessionStatus::Collecting
        };
        let session = session.clone();
        self.persist_session(&session)?;

        tracing::debug!(
            session_id = %session.id,
            collected = session.collected_shares.len(),
            required = session.required_shares,
            status = ?session.status,
            "share accepted"
        );
        Ok(session)
    }

    /// Reconstruct the secret from a completed session's shares.
    ///
    /// A session past its grace period cannot recover, completed or not.
    pub async fn recover_key(&self, session_id: &str) -> Result<Vec<u8>, CoreError> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;

        let Some(session) = state.sessions.get_mut(session_id) else {
            return Err(CoreError::RecoverySessionNotFound(session_id.to_string()));
        };
        if session_lapsed(session, now) {
            if session.status.is_active() {
                session.status = RecoverySessionStatus::Expired;
                let session = session.clone();
                self.persist_session(&session)?;
            }
            return Err(CoreError::RecoverySessionExpired(session_id.to_string()));
        }
        if session.status != RecoverySessionStatus::Completed {
            return Err(CoreError::RecoverySessionNotCompleted(
                session_id.to_string(),
            ));
        }

        let mut plain_shares: Vec<Vec<u8>> = Vec::with_capacity(session.collected_shares.len());
        for share in &session.collected_shares {
            if share.encrypted {
                plain_shares.push(decrypt_share(&share.share_data, &share.contact_id)?);
            } else {
                plain_shares.push(share.share_data.clone());
            }
        }

        let secret = combine_secret(&plain_shares);
        for share in plain_shares.iter_mut() {
            share.zeroize();
        }
        let secret = secret?;

        tracing::info!(session_id = %session_id, "secret reconstructed");
        Ok(secret)
    }

    pub async fn get_active_recovery_session(&self, user_id: &str) -> Option<RecoverySession> {
        let now = self.clock.now();
        let state = self.state.lock().await;
        state
            .sessions
            .values()
            .find(|session| {
                session.user_id == user_id
                    && session.status.is_active()
                    && !session_lapsed(session, now)
            })
            .cloned()
    }

    /// Abort an open session. Terminal or missing sessions error.
    pub async fn cancel_recovery_session(&self, session_id: &str) -> Result<(), CoreError> {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(session_id) else {
            return Err(CoreError::RecoverySessionNotFound(session_id.to_string()));
        };
        if session.status.is_terminal() {
            return Err(CoreError::RecoverySessionNotFound(session_id.to_string()));
        }
        session.status = RecoverySessionStatus::Failed;
        let session = session.clone();
        self.persist_session(&session)?;
        tracing::info!(session_id = %session_id, "recovery session cancelled");
        Ok(())
    }

    /// Mark lapsed open sessions as expired. Returns how many changed.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let mut expired = 0;
        let lapsed: Vec<String> = state
            .sessions
            .values()
            .filter(|session| session.status.is_active() && session_lapsed(session, now))
            .map(|session| session.id.clone())
            .collect();
        for id in lapsed {
            if let Some(session) = state.sessions.get_mut(&id) {
                session.status = RecoverySessionStatus::Expired;
                let session = session.clone();
                if let Err(e) = self.persist_session(&session) {
                    tracing::warn!(session_id = %id, error = %e, "expired session not persisted");
                }
                expired += 1;
            }
        }
        expired
    }

    fn persist_session(&self, session: &RecoverySession) -> Result<(), CoreError> {
        self.store
            .put(&format!("{SESSION_PREFIX}{}", session.id), session)?;
        Ok(())
    }
}

fn session_lapsed(session: &RecoverySession, now: Timestamp) -> bool {
    now > session.expires_at
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_nullables::NullClock;
    use drift_store::MemoryStore;
    use std::time::Duration;

    fn contacts(n: usize) -> Vec<ContactId> {
        (0..n).map(|i| ContactId::new(format!("contact-{i}"))).collect()
    }

    fn coordinator() -> (RecoveryCoordinator, Arc<NullClock>) {
        let clock = Arc::new(NullClock::at_secs(100));
        let coordinator = RecoveryCoordinator::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            CoreConfig::default(),
        );
        (coordinator, clock)
    }

    #[tokio::test]
    async fn setup_rejects_too_few_or_too_many_contacts() {
        let (coordinator, _) = coordinator();
        assert!(matches!(
            coordinator.setup_recovery(b"secret", &contacts(2)).await,
            Err(CoreError::NotEnoughContacts { needed: 3, got: 2 })
        ));
        assert!(matches!(
            coordinator.setup_recovery(b"secret", &contacts(11)).await,
            Err(CoreError::TooManyContacts { max: 10, got: 11 })
        ));
        assert!(!coordinator.is_recovery_setup().await);
    }

    #[tokio::test]
    async fn initiate_requires_setup() {
        let (coordinator, _) = coordinator();
        assert!(matches!(
            coordinator.initiate_recovery("user-1").await,
            Err(CoreError::RecoveryNotConfigured)
        ));
    }

    #[tokio::test]
    async fn threshold_of_shares_recovers_the_secret() {
        let (coordinator, _) = coordinator();
        let secret = b"very secret signing key".to_vec();
        let contacts = contacts(5);
        let metadata = coordinator.setup_recovery(&secret, &contacts).await.unwrap();
        assert_eq!(metadata.threshold, 3);
        assert_eq!(metadata.total_shares, 5);

        let session = coordinator.initiate_recovery("user-1").await.unwrap();
        for contact in contacts.iter().take(3) {
            let share = coordinator.get_share_for_contact(contact).await.unwrap();
            coordinator
                .add_share_to_session(&session.id, share)
                .await
                .unwrap();
        }
        let recovered = coordinator.recover_key(&session.id).await.unwrap();
        assert_eq!(recovered, secret);
    }

    #[tokio::test]
    async fn duplicate_contact_share_rejected() {
        let (coordinator, _) = coordinator();
        let contacts = contacts(3);
        coordinator.setup_recovery(b"secret", &contacts).await.unwrap();
        let session = coordinator.initiate_recovery("user-1").await.unwrap();

        let share = coordinator
            .get_share_for_contact(&contacts[0])
            .await
            .unwrap();
        coordinator
            .add_share_to_session(&session.id, share.clone())
            .await
            .unwrap();
        assert!(matches!(
            coordinator.add_share_to_session(&session.id, share).await,
            Err(CoreError::DuplicateShare(_))
        ));
    }

    #[tokio::test]
    async fn only_one_active_session() {
        let (coordinator, _) = coordinator();
        coordinator.setup_recovery(b"secret", &contacts(3)).await.unwrap();
        coordinator.initiate_recovery("user-1").await.unwrap();
        assert!(matches!(
            coordinator.initiate_recovery("user-1").await,
            Err(CoreError::RecoverySessionAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn lapsed_session_rejects_shares_and_recovery() {
        let (coordinator, clock) = coordinator();
        let contacts = contacts(3);
        coordinator.setup_recovery(b"secret", &contacts).await.unwrap();
        let session = coordinator.initiate_recovery("user-1").await.unwrap();

        clock.advance(Duration::from_secs(25 * 60 * 60));
        let share = coordinator
            .get_share_for_contact(&contacts[0])
            .await
            .unwrap();
        assert!(matches!(
            coordinator.add_share_to_session(&session.id, share).await,
            Err(CoreError::RecoverySessionExpired(_))
        ));
        // the failed submission already marked it terminal
        assert!(matches!(
            coordinator.recover_key(&session.id).await,
            Err(CoreError::RecoverySessionExpired(_))
        ));
        // and a fresh session can now be opened
        coordinator.initiate_recovery("user-1").await.unwrap();
    }

    #[tokio::test]
    async fn incomplete_session_cannot_recover() {
        let (coordinator, _) = coordinator();
        let contacts = contacts(4);
        coordinator.setup_recovery(b"secret", &contacts).await.unwrap();
        let session = coordinator.initiate_recovery("user-1").await.unwrap();

        let share = coordinator
            .get_share_for_contact(&contacts[0])
            .await
            .unwrap();
        coordinator
            .add_share_to_session(&session.id, share)
            .await
            .unwrap();
        assert!(matches!(
            coordinator.recover_key(&session.id).await,
            Err(CoreError::RecoverySessionNotCompleted(_))
        ));
    }

    #[tokio::test]
    async fn cancelled_session_is_terminal() {
        let (coordinator, _) = coordinator();
        coordinator.setup_recovery(b"secret", &contacts(3)).await.unwrap();
        let session = coordinator.initiate_recovery("user-1").await.unwrap();

        coordinator.cancel_recovery_session(&session.id).await.unwrap();
        assert!(matches!(
            coordinator.cancel_recovery_session(&session.id).await,
            Err(CoreError::RecoverySessionNotFound(_))
        ));
        assert!(coordinator
            .get_active_recovery_session("user-1")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn active_sessions_are_scoped_per_user() {
        let (coordinator, _) = coordinator();
        coordinator.setup_recovery(b"secret", &contacts(3)).await.unwrap();
        coordinator.initiate_recovery("user-1").await.unwrap();

        // another user is not blocked by user-1's open session
        let other = coordinator.initiate_recovery("user-2").await.unwrap();
        assert_eq!(other.user_id, "user-2");

        assert!(coordinator
            .get_active_recovery_session("user-1")
            .await
            .is_some());
        assert!(coordinator
            .get_active_recovery_session("user-3")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn completed_session_cannot_recover_after_grace() {
        let (coordinator, clock) = coordinator();
        let contacts = contacts(3);
        coordinator.setup_recovery(b"secret", &contacts).await.unwrap();
        let session = coordinator.initiate_recovery("user-1").await.unwrap();
        for contact in &contacts {
            let share = coordinator.get_share_for_contact(contact).await.unwrap();
            coordinator
                .add_share_to_session(&session.id, share)
                .await
                .unwrap();
        }

        clock.advance(Duration::from_secs(25 * 60 * 60));
        assert!(matches!(
            coordinator.recover_key(&session.id).await,
            Err(CoreError::RecoverySessionExpired(_))
        ));
    }

    #[tokio::test]
    async fn cleanup_expires_lapsed_sessions() {
        let (coordinator, clock) = coordinator();
        coordinator.setup_recovery(b"secret", &contacts(3)).await.unwrap();
        coordinator.initiate_recovery("user-1").await.unwrap();

        assert_eq!(coordinator.cleanup_expired_sessions().await, 0);
        clock.advance(Duration::from_secs(25 * 60 * 60));
        assert_eq!(coordinator.cleanup_expired_sessions().await, 1);
        assert_eq!(coordinator.cleanup_expired_sessions().await, 0);
    }
}
