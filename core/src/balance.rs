//! # Balance Snapshots & the Dual Cache
//!
//! Balances in this crate are ephemeral, immutable snapshots — the chain
//! is authoritative, the cache is a view. Two kinds exist:
//!
//! - [`PublicBalance`]: a plain spendable amount on the public token
//!   contract.
//! - [`PrivateBalance`]: the privacy-pool side. While an account is
//!   *locked* the snapshot is a sentinel carrying no secret-derived data
//!   at all; once unlocked it carries the decrypted spendable and pending
//!   amounts plus the pool's conversion rate.
//!
//! ## The rate invariant
//!
//! `spendable == decrypted * rate`, always. The only way to build an
//! unlocked snapshot is [`PrivateBalance::unlocked`], which computes
//! `spendable` from its inputs — it is never stored independently, so it
//! can never drift.
//!
//! ## Merge semantics
//!
//! [`BalanceCache::merge_public`]/[`merge_private`](BalanceCache::merge_private)
//! are per-entry upserts: refreshing account X never disturbs the cached
//! entries of account Y. A wholesale replace would silently blank out
//! every account that wasn't part of the refresh batch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::Address;
use crate::token::{Token, TokenId};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while constructing balance snapshots.
#[derive(Debug, Error)]
pub enum BalanceError {
    /// `decrypted * rate` does not fit in a u128. If you're hitting this,
    /// either the pool reported garbage or someone owns more than the
    /// addressable supply of the universe.
    #[error("rate overflow: decrypted {decrypted} * rate {rate} (token {token})")]
    RateOverflow {
        token: TokenId,
        decrypted: u128,
        rate: u128,
    },
}

// ---------------------------------------------------------------------------
// PublicBalance
// ---------------------------------------------------------------------------

/// A spendable public token amount, in smallest units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicBalance {
    pub token: Token,
    pub amount: u128,
}

impl PublicBalance {
    pub fn new(token: Token, amount: u128) -> Self {
        Self { token, amount }
    }
}

// ---------------------------------------------------------------------------
// PrivateBalance
// ---------------------------------------------------------------------------

/// A privacy-pool balance snapshot.
///
/// `Locked` is the sentinel for accounts whose spending key is not in
/// memory: amounts are not materialized and the variant carries nothing
/// derived from secret state. `Unlocked` amounts come from the pool SDK's
/// decrypted state at refresh time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PrivateBalance {
    Locked {
        token: Token,
    },
    Unlocked {
        token: Token,
        /// Conversion rate from pool units to smallest public units.
        rate: u128,
        /// Decrypted spendable amount, in pool units.
        decrypted: u128,
        /// Decrypted pending (just-received, pre-rollover) amount, in
        /// pool units.
        pending: u128,
        /// `decrypted * rate`, in smallest public units. Recomputed by
        /// the constructor on every update, never stored independently.
        spendable: u128,
    },
}

impl PrivateBalance {
    /// The locked sentinel for a token.
    pub fn locked(token: Token) -> Self {
        Self::Locked { token }
    }

    /// Builds an unlocked snapshot, computing the spendable amount from
    /// the decrypted amount and rate.
    pub fn unlocked(
        token: Token,
        rate: u128,
        decrypted: u128,
        pending: u128,
    ) -> Result<Self, BalanceError> {
        let spendable = decrypted
            .checked_mul(rate)
            .ok_or_else(|| BalanceError::RateOverflow {
                token: token.id.clone(),
                decrypted,
                rate,
            })?;
        Ok(Self::Unlocked {
            token,
            rate,
            decrypted,
            pending,
            spendable,
        })
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    pub fn token(&self) -> &Token {
        match self {
            Self::Locked { token } | Self::Unlocked { token, .. } => token,
        }
    }

    /// Spendable amount in smallest public units; `None` while locked.
    pub fn spendable(&self) -> Option<u128> {
        match self {
            Self::Locked { .. } => None,
            Self::Unlocked { spendable, .. } => Some(*spendable),
        }
    }
}

// ---------------------------------------------------------------------------
// BalanceKey / BalanceCache
// ---------------------------------------------------------------------------

/// Cache key: one (account, token) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    pub account: Address,
    pub token: TokenId,
}

impl BalanceKey {
    pub fn new(account: Address, token: TokenId) -> Self {
        Self { account, token }
    }
}

/// The dual balance cache owned by the ledger.
///
/// Holds no authoritative state — it can be cleared at any time (and is,
/// on every network switch) and rebuilt from refreshes. Not thread-safe
/// by itself; the ledger keeps it behind its own lock.
#[derive(Debug, Default)]
pub struct BalanceCache {
    public: HashMap<BalanceKey, PublicBalance>,
    private: HashMap<BalanceKey, PrivateBalance>,
}

impl BalanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every cached entry. Used on network switch and logout.
    pub fn clear(&mut self) {
        self.public.clear();
        self.private.clear();
    }

    /// Per-entry upsert of public balances. Entries not named in the
    /// batch are preserved untouched.
    pub fn merge_public(&mut self, entries: impl IntoIterator<Item = (BalanceKey, PublicBalance)>) {
        for (key, balance) in entries {
            self.public.insert(key, balance);
        }
    }

    /// Per-entry upsert of private balances.
    pub fn merge_private(
        &mut self,
        entries: impl IntoIterator<Item = (BalanceKey, PrivateBalance)>,
    ) {
        for (key, balance) in entries {
            self.private.insert(key, balance);
        }
    }

    pub fn public(&self, key: &BalanceKey) -> Option<&PublicBalance> {
        self.public.get(key)
    }

    pub fn private(&self, key: &BalanceKey) -> Option<&PrivateBalance> {
        self.private.get(key)
    }

    /// All cached public balances for one account.
    pub fn public_for(&self, account: &Address) -> Vec<&PublicBalance> {
        self.public
            .iter()
            .filter(|(k, _)| &k.account == account)
            .map(|(_, b)| b)
            .collect()
    }

    /// All cached private balances for one account.
    pub fn private_for(&self, account: &Address) -> Vec<&PrivateBalance> {
        self.private
            .iter()
            .filter(|(k, _)| &k.account == account)
            .map(|(_, b)| b)
            .collect()
    }

    /// Rewrites the token-metadata price of every cached entry from the
    /// given quote map. Amounts are not touched: this is the price loop's
    /// read-merge-write step, and it must be able to interleave with
    /// event-driven refreshes without clobbering them.
    pub fn reprice(&mut self, quotes: &HashMap<TokenId, f64>) {
        for balance in self.public.values_mut() {
            if let Some(price) = quotes.get(&balance.token.id) {
                balance.token = balance.token.with_price(*price);
            }
        }
        for balance in self.private.values_mut() {
            let token = match balance {
                PrivateBalance::Locked { token } => token,
                PrivateBalance::Unlocked { token, .. } => token,
            };
            if let Some(price) = quotes.get(&token.id) {
                *token = token.with_price(*price);
            }
        }
    }

    pub fn public_len(&self) -> usize {
        self.public.len()
    }

    pub fn private_len(&self) -> usize {
        self.private.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
