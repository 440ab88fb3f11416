//! Social recovery records.
//!
//! A lost key is recovered by collecting threshold secret-sharing shares
//! from trusted contacts inside a time-limited recovery session.

use crate::ids::ContactId;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// One share of the split secret, held by a single contact.
///
/// Immutable after setup except deletion on re-setup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryShare {
    pub id: String,
    /// Opaque share bytes (first byte is the evaluation point index).
    #[serde(with = "hex_bytes")]
    pub share_data: Vec<u8>,
    pub contact_id: ContactId,
    pub encrypted: bool,
    pub created_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<Timestamp>,
}

/// State machine status of a recovery session.
///
/// `Pending → Collecting → Completed`, with `Expired` on grace-period
/// timeout and `Failed` on explicit cancellation. Terminal states have
/// no outgoing transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoverySessionStatus {
    Pending,
    Collecting,
    Completed,
    Expired,
    Failed,
}

impl RecoverySessionStatus {
    /// Still open for share collection (subject to the expiry check).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Collecting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired | Self::Failed)
    }
}

/// A multi-party recovery attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoverySession {
    pub id: String,
    pub user_id: String,
    /// Shares needed to reconstruct (the configured threshold).
    pub required_shares: usize,
    /// Collected shares, unique per contact.
    pub collected_shares: Vec<RecoveryShare>,
    pub status: RecoverySessionStatus,
    pub initiated_at: Timestamp,
    pub expires_at: Timestamp,
}

impl RecoverySession {
    /// Whether `contact` already submitted a share to this session.
    pub fn has_share_from(&self, contact: &ContactId) -> bool {
        self.collected_shares
            .iter()
            .any(|share| share.contact_id == *contact)
    }
}

/// Persisted recovery configuration, written at setup time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMetadata {
    pub threshold: usize,
    pub total_shares: usize,
    pub contacts: Vec<ContactId>,
    pub shares_encrypted: bool,
    pub created_at: Timestamp,
}

/// Serialize binary blobs as hex strings inside JSON records.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_serializes_data_as_hex() {
        let share = RecoveryShare {
            id: "share-1".into(),
            share_data: vec![0xde, 0xad, 0xbe, 0xef],
            contact_id: ContactId::new("alice"),
            encrypted: false,
            created_at: Timestamp::from_secs(1),
            expires_at: None,
        };
        let json = serde_json::to_value(&share).unwrap();
        assert_eq!(json["share_data"], "deadbeef");
        let back: RecoveryShare = serde_json::from_value(json).unwrap();
        assert_eq!(back, share);
    }

    #[test]
    fn status_classification() {
        assert!(RecoverySessionStatus::Pending.is_active());
        assert!(RecoverySessionStatus::Collecting.is_active());
        assert!(RecoverySessionStatus::Completed.is_terminal());
        assert!(RecoverySessionStatus::Expired.is_terminal());
        assert!(RecoverySessionStatus::Failed.is_terminal());
    }
}
