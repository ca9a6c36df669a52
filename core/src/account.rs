//! Core identity types for the wallet: addresses, key sources, accounts.
//!
//! These types form the vocabulary of everything else in the crate. They
//! are intentionally small, immutable value objects — an [`Account`] is
//! never mutated in place, renaming one produces a new value.
//!
//! A [`KeySourceId`] is content-derived: hashing the normalized seed words
//! yields the same id every time, so re-importing a seed phrase the user
//! already has never creates a duplicate source and never requires
//! re-storing the secret to find out.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

// ---------------------------------------------------------------------------
// Hex newtypes
// ---------------------------------------------------------------------------

macro_rules! hex_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Wraps a hex string, normalizing to lowercase so that
            /// comparisons and map lookups are case-insensitive.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into().to_lowercase())
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

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let short = if self.0.len() > 14 { &self.0[..14] } else { &self.0 };
                write!(f, "{}({}…)", stringify!($name), short)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

hex_newtype!(
    /// An on-chain address (account, contract, or pool-internal address),
    /// stored as a lowercase hex string.
    Address
);

hex_newtype!(
    /// A ledger transaction identifier.
    TxHash
);

hex_newtype!(
    /// The class hash of a deployed account contract.
    ClassHash
);

// ---------------------------------------------------------------------------
// KeySource
// ---------------------------------------------------------------------------

/// The kind of secret a key source is backed by.
///
/// Closed variant set — hardware keys or watch-only imports would be new
/// variants, and every match in the crate would have to handle them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeySourceKind {
    /// Keys derived from a BIP-39-style seed phrase.
    SeedPhrase,
}

/// A stable, non-secret identifier for a secret origin.
///
/// Derived as `SHA-256("umbra.keysource" || kind_tag || normalized words)`,
/// hex-encoded. Deterministic by construction: the same secret always maps
/// to the same id without the secret ever being stored alongside it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySourceId(String);

impl KeySourceId {
    /// Derives the id for a seed-phrase source from its normalized words.
    ///
    /// Words are trimmed and lowercased before hashing so that whitespace
    /// or capitalization differences on re-import don't mint a new source.
    pub fn from_seed_words<S: AsRef<str>>(words: &[S]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"umbra.keysource");
        hasher.update([KeySourceKind::SeedPhrase as u8]);
        for word in words {
            hasher.update(word.as_ref().trim().to_lowercase().as_bytes());
            hasher.update([0x00]);
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeySourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for KeySourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeySourceId({}…)", &self.0[..12.min(self.0.len())])
    }
}

/// A secret origin: its stable id plus what kind of secret backs it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySource {
    pub id: KeySourceId,
    pub kind: KeySourceKind,
}

impl KeySource {
    pub fn seed_phrase<S: AsRef<str>>(words: &[S]) -> Self {
        Self {
            id: KeySourceId::from_seed_words(words),
            kind: KeySourceKind::SeedPhrase,
        }
    }
}

// ---------------------------------------------------------------------------
// KeyInstance / Account
// ---------------------------------------------------------------------------

/// Which key source and derivation index produced an account's keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyInstance {
    /// The secret origin the account's keys derive from.
    pub source: KeySourceId,
    /// Derivation index within the source. Account N of a seed phrase.
    pub index: u32,
}

/// A wallet account: an on-chain address, a display name, and the key
/// instance that produced it.
///
/// Immutable value object. [`renamed`](Self::renamed) returns a new
/// `Account` — nothing in this crate mutates an account in place, which
/// is what makes it safe to hand copies to background tasks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub name: String,
    pub key: KeyInstance,
}

impl Account {
    pub fn new(address: Address, name: impl Into<String>, key: KeyInstance) -> Self {
        Self {
            address,
            name: name.into(),
            key,
        }
    }

    /// Returns a copy of this account with a new display name.
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            address: self.address.clone(),
            name: name.into(),
            key: self.key.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
