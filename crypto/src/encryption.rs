//! Recovery-share encryption.
//!
//! Each contact's share is sealed with ChaCha20-Poly1305 under a key
//! derived from the contact id (see [`crate::hash::derive_contact_key`]).
//! A random 96-bit nonce is prepended to the ciphertext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use drift_types::ContactId;
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("ciphertext too short")]
    TooShort,
    #[error("decryption failed: authentication check failed")]
    AuthenticationFailed,
}

const NONCE_LEN: usize = 12;

/// Encrypt a recovery share for a contact.
///
/// Returns `nonce || ciphertext || tag`.
pub fn encrypt_share(share: &[u8], contact: &ContactId) -> Vec<u8> {
    let key = crate::hash::derive_contact_key(contact);
    let cipher = ChaCha20Poly1305::new_from_slice(&key).expect("valid key length");

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from(nonce_bytes);

    let ciphertext = cipher
        .encrypt(&nonce, share)
        .expect("encryption should not fail");

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt a recovery share previously sealed with [`encrypt_share`].
pub fn decrypt_share(sealed: &[u8], contact: &ContactId) -> Result<Vec<u8>, EncryptionError> {
    if sealed.len() <= NONCE_LEN {
        return Err(EncryptionError::TooShort);
    }
    let key = crate::hash::derive_contact_key(contact);
    let cipher = ChaCha20Poly1305::new_from_slice(&key).expect("valid key length");

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&sealed[..NONCE_LEN]);
    let nonce = Nonce::from(nonce_bytes);

    cipher
        .decrypt(&nonce, &sealed[NONCE_LEN..])
        .map_err(|_| EncryptionError::AuthenticationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let contact = ContactId::new("alice");
        let share = vec![1u8, 2, 3, 4, 5];
        let sealed = encrypt_share(&share, &contact);
        assert_ne!(&sealed[NONCE_LEN..NONCE_LEN + share.len()], &share[..]);
        assert_eq!(decrypt_share(&sealed, &contact).unwrap(), share);
    }

    #[test]
    fn wrong_contact_fails_authentication() {
        let sealed = encrypt_share(b"share bytes", &ContactId::new("alice"));
        assert_eq!(
            decrypt_share(&sealed, &ContactId::new("bob")).unwrap_err(),
            EncryptionError::AuthenticationFailed
        );
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let contact = ContactId::new("alice");
        let mut sealed = encrypt_share(b"share bytes", &contact);
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;
        assert_eq!(
            decrypt_share(&sealed, &contact).unwrap_err(),
            EncryptionError::AuthenticationFailed
        );
    }

    #[test]
    fn truncated_input_rejected() {
        assert_eq!(
            decrypt_share(&[0u8; 12], &ContactId::new("alice")).unwrap_err(),
            EncryptionError::TooShort
        );
    }
}
