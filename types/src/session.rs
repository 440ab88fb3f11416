//! Wallet session records and device metadata.

use crate::ids::DeviceId;
use crate::keys::PublicKey;
use crate::time::Timestamp;
use serde::{Deserialize, Serialize};

/// A connected-wallet session with sliding expiry and a trust score.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub public_key: PublicKey,
    pub device_id: DeviceId,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    pub last_activity: Timestamp,
    /// Heuristic confidence in `[0, 1]`; below 0.5 requires MFA.
    pub trust_score: f64,
    /// Set when two consecutive operations arrive implausibly close.
    #[serde(default)]
    pub suspicious: bool,
}

impl Session {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// Device/client information supplied by the caller at connect time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceMetadata {
    pub device_id: DeviceId,
    /// Client signature: user agent or equivalent platform string.
    pub user_agent: String,
    pub platform: String,
    /// Whether the caller attests a trusted execution context.
    #[serde(default)]
    pub trusted_execution: bool,
}

impl DeviceMetadata {
    /// The client fingerprint used for trust scoring.
    pub fn fingerprint(&self) -> String {
        format!("{}|{}", self.user_agent, self.platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_strict() {
        let session = Session {
            id: "s1".into(),
            public_key: PublicKey([1u8; 32]),
            device_id: DeviceId::new("d1"),
            created_at: Timestamp::from_secs(0),
            expires_at: Timestamp::from_secs(100),
            last_activity: Timestamp::from_secs(0),
            trust_score: 0.5,
            suspicious: false,
        };
        assert!(!session.is_expired(Timestamp::from_secs(100)));
        assert!(session.is_expired(Timestamp::from_millis(100_001)));
    }
}
