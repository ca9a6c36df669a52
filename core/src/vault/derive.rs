//! Deterministic key derivation from seed words.
//!
//! The real curve arithmetic lives behind the chain client and pool SDK;
//! what this module owns is the *derivation schedule* — which bytes of
//! key material exist, and from what:
//!
//! - one signing key per account, from `(seed entropy, account index)`;
//! - one privacy-pool spending key per (account, token) pair, from a path
//!   hashed over `(account address, token contract, pool contract)`.
//!
//! Both are SHA-256 constructions with domain-separation tags, so the
//! same seed always reproduces the same keys and no two purposes can
//! collide.

use sha2::{Digest, Sha256};
use std::fmt;

use crate::account::Address;
use crate::collaborators::seed_store::SeedPhrase;
use crate::token::Token;

// ---------------------------------------------------------------------------
// Key types
// ---------------------------------------------------------------------------

macro_rules! key_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name([u8; 32]);

        impl $name {
            pub fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        // Redacted: key material must never reach a log line.
        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}(<redacted>)", stringify!($name))
            }
        }
    };
}

key_newtype!(
    /// Transaction-signing key for one account.
    SigningKey
);

key_newtype!(
    /// Privacy-pool spending key for one (account, token) pair. Required
    /// to decrypt and authorize shielded operations.
    SpendingKey
);

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Seed entropy: a stable digest of the normalized words.
fn entropy(words: &SeedPhrase) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"umbra.entropy");
    for word in words.words() {
        hasher.update(word.trim().to_lowercase().as_bytes());
        hasher.update([0x00]);
    }
    hasher.finalize().into()
}

/// Derives the signing key for the account at `index` under this seed.
pub fn signing_key(words: &SeedPhrase, index: u32) -> SigningKey {
    let mut hasher = Sha256::new();
    hasher.update(b"umbra.signing");
    hasher.update(entropy(words));
    hasher.update(index.to_le_bytes());
    SigningKey(hasher.finalize().into())
}

/// The derivation path for a (account, token) spending key: a digest of
/// the account address and the token's two contracts. Deterministic, so
/// re-unlocking an account always lands on the same pool identity.
pub fn spending_path(account: &Address, token: &Token) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"umbra.pool.path");
    hasher.update(account.as_str().as_bytes());
    hasher.update([0x00]);
    hasher.update(token.contract.as_str().as_bytes());
    hasher.update([0x00]);
    hasher.update(token.pool_contract.as_str().as_bytes());
    hasher.finalize().into()
}

/// Derives the privacy-pool spending key for one (account, token) pair.
pub fn spending_key(words: &SeedPhrase, account: &Address, token: &Token) -> SpendingKey {
    let mut hasher = Sha256::new();
    hasher.update(b"umbra.spending");
    hasher.update(entropy(words));
    hasher.update(spending_path(account, token));
    SpendingKey(hasher.finalize().into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
