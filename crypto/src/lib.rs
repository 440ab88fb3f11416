//! Cryptographic primitives for the Drift wallet core.
//!
//! - **Ed25519** for transaction signing (the wallet's signing capability)
//! - **Blake2b** for hashing and per-contact key derivation
//! - **ChaCha20-Poly1305** AEAD for recovery-share encryption
//! - **Shamir secret sharing** over GF(2^8) for threshold key recovery

pub mod encryption;
pub mod hash;
pub mod keys;
pub mod shamir;
pub mod sign;

pub use encryption::{decrypt_share, encrypt_share, EncryptionError};
pub use hash::{blake2b_256, blake2b_256_multi, derive_contact_key};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use shamir::{combine_secret, split_secret, ShamirError};
pub use sign::{sign_message, verify_signature, Ed25519Signer, SignError, Signer};
