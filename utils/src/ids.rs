//! Random identifier generation.

use rand::RngCore;

/// Generate a prefixed random identifier, e.g. `tx_9f2c4be01a6d8370`.
///
/// 64 bits of randomness, collision-safe for the lifetimes involved
/// here (queue entries, sessions, shares).
pub fn random_id(prefix: &str) -> String {
    let mut bytes = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{prefix}_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_prefix() {
        let id = random_id("tx");
        assert!(id.starts_with("tx_"));
        assert_eq!(id.len(), "tx_".len() + 16);
    }

    #[test]
    fn ids_are_unique() {
        let a = random_id("session");
        let b = random_id("session");
        assert_ne!(a, b);
    }
}
