//! The privacy-pool SDK seam.
//!
//! The pool SDK is an opaque black box: given a derived spending key and
//! a pool contract, it decrypts the account's shielded state and produces
//! signable calldata for pool operations. Proof generation happens inside
//! the SDK; the core only decides *when* each operation is invoked and
//! what gets cached around it.

use async_trait::async_trait;
use thiserror::Error;

use crate::account::Address;
use crate::collaborators::chain::Calldata;
use crate::vault::derive::SpendingKey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the pool SDK.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Anything the SDK reports: decryption failure, proving failure,
    /// malformed pool state.
    #[error("privacy pool sdk error: {0}")]
    Sdk(String),
}

// ---------------------------------------------------------------------------
// PoolState
// ---------------------------------------------------------------------------

/// Decrypted shielded state for one (spending key, pool) pair.
///
/// Amounts are in pool units; `rate` converts them to smallest public
/// units. `pending` is just-received balance that needs a rollover before
/// it becomes spendable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolState {
    pub balance: u128,
    pub pending: u128,
    pub rate: u128,
}

// ---------------------------------------------------------------------------
// PrivacyPool
// ---------------------------------------------------------------------------

/// Collaborator trait for the privacy-pool SDK.
///
/// Operation methods return calldata to be signed and submitted by the
/// caller — the SDK never submits anything itself.
#[async_trait]
pub trait PrivacyPool: Send + Sync {
    /// Decrypts the current shielded state.
    async fn state(&self, key: &SpendingKey, pool: &Address) -> Result<PoolState, PoolError>;

    /// The account's address *inside* the pool, derived from its spending
    /// key. Shielded events reference this address, so the ledger indexes
    /// it for event correlation while the account is unlocked.
    fn pool_address(&self, key: &SpendingKey, pool: &Address) -> Address;

    /// Moves `amount` of public balance into the pool.
    async fn fund(
        &self,
        key: &SpendingKey,
        pool: &Address,
        from: &Address,
        amount: u128,
    ) -> Result<Vec<Calldata>, PoolError>;

    /// Shielded transfer to another pool address.
    async fn transfer(
        &self,
        key: &SpendingKey,
        pool: &Address,
        to_pool_address: &Address,
        amount: u128,
    ) -> Result<Vec<Calldata>, PoolError>;

    /// Withdraws shielded balance back to a public address.
    async fn withdraw(
        &self,
        key: &SpendingKey,
        pool: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<Vec<Calldata>, PoolError>;

    /// Rolls pending balance into spendable balance.
    async fn rollover(&self, key: &SpendingKey, pool: &Address) -> Result<Vec<Calldata>, PoolError>;
}
