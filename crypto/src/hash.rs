//! Blake2b hashing and key derivation.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use drift_types::ContactId;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Derive the symmetric key a contact's recovery share is encrypted under.
///
/// Domain-separated so the same contact id used elsewhere never yields
/// the same key material.
pub fn derive_contact_key(contact: &ContactId) -> [u8; 32] {
    blake2b_256_multi(&[contact.as_str().as_bytes(), b"drift-recovery-share-v1"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_deterministic() {
        assert_eq!(blake2b_256(b"hello drift"), blake2b_256(b"hello drift"));
    }

    #[test]
    fn blake2b_different_inputs() {
        assert_ne!(blake2b_256(b"hello"), blake2b_256(b"world"));
    }

    #[test]
    fn blake2b_multi_equivalent() {
        let single = blake2b_256(b"helloworld");
        let multi = blake2b_256_multi(&[b"hello", b"world"]);
        assert_eq!(single, multi);
    }

    #[test]
    fn contact_keys_differ_per_contact() {
        let k1 = derive_contact_key(&ContactId::new("alice"));
        let k2 = derive_contact_key(&ContactId::new("bob"));
        assert_ne!(k1, k2);
    }
}
