//! Ed25519 message signing and the wallet's signing capability.

use drift_types::{KeyPair, PrivateKey, PublicKey, Signature};
use ed25519_dalek::{Signer as DalekSigner, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("no key material available for signing")]
    NoKey,
    #[error("signing failed: {0}")]
    Backend(String),
}

/// The signing capability consumed by the transaction queue.
///
/// Given an opaque payload, produce a signature under the wallet's key.
/// Key storage/derivation lives behind this seam.
pub trait Signer: Send + Sync {
    fn public_key(&self) -> PublicKey;
    fn sign(&self, payload: &[u8]) -> Result<Signature, SignError>;
}

/// In-memory Ed25519 signer backed by a key pair.
pub struct Ed25519Signer {
    keypair: KeyPair,
}

impl Ed25519Signer {
    pub fn new(keypair: KeyPair) -> Self {
        Self { keypair }
    }
}

impl Signer for Ed25519Signer {
    fn public_key(&self) -> PublicKey {
        self.keypair.public
    }

    fn sign(&self, payload: &[u8]) -> Result<Signature, SignError> {
        Ok(sign_message(payload, &self.keypair.private))
    }
}

/// Sign a message with a private key, returning the signature.
pub fn sign_message(message: &[u8], private_key: &PrivateKey) -> Signature {
    let signing_key = SigningKey::from_bytes(&private_key.0);
    Signature(signing_key.sign(message).to_bytes())
}

/// Verify a signature against a message and public key.
///
/// Returns `true` if the signature is valid, `false` otherwise.
pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_key.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}
