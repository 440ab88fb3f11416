//! Identifier newtypes.
//!
//! All identifiers are opaque strings from the wallet's point of view:
//! accounts are encoded public keys, mints and NFT ids come from the
//! ledger, contact and device ids from the host application.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id! {
    /// An on-ledger account (encoded public key).
    AccountId
}

string_id! {
    /// A token mint address.
    Mint
}

string_id! {
    /// An NFT identifier.
    NftId
}

string_id! {
    /// A trusted contact holding a recovery share.
    ContactId
}

string_id! {
    /// A device known to the session registry.
    DeviceId
}
