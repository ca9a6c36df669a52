//! The pending-operation stack.
//!
//! Every submitted operation gets one entry, created at submission and
//! removed when its confirmation awaiter observes success or terminal
//! failure. Entries are never mutated in place — there is no "status"
//! field to update, removal *is* the status change.

use crate::account::{Address, TxHash};
use crate::token::TokenId;

// ---------------------------------------------------------------------------
// OperationKind
// ---------------------------------------------------------------------------

/// What a pending operation is doing, with its semantic fields.
///
/// Public-side amounts are in smallest public units; private-side
/// amounts are in pool units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OperationKind {
    /// Public balance moving into the privacy pool.
    Fund {
        account: Address,
        token: TokenId,
        amount: u128,
    },
    PublicTransfer {
        from: Address,
        to: Address,
        token: TokenId,
        amount: u128,
    },
    /// Shielded transfer to another pool address.
    PrivateTransfer {
        from: Address,
        to_pool_address: Address,
        token: TokenId,
        amount: u128,
    },
    /// Shielded balance leaving the pool for a public address.
    Withdraw {
        from: Address,
        to: Address,
        token: TokenId,
        amount: u128,
    },
    DeployAccount {
        account: Address,
    },
    /// Public deposit into a swap venue.
    SwapDeposit {
        from: Address,
        venue: Address,
        token: TokenId,
        amount: u128,
    },
}

/// One in-flight operation: its kind plus the transaction the network
/// accepted it under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingOperation {
    pub kind: OperationKind,
    pub tx_hash: TxHash,
}

// ---------------------------------------------------------------------------
// PendingStack
// ---------------------------------------------------------------------------

/// Insertion-ordered set of in-flight operations.
#[derive(Debug, Default)]
pub struct PendingStack {
    entries: Vec<PendingOperation>,
}

impl PendingStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: PendingOperation) {
        self.entries.push(operation);
    }

    /// Removes and returns the entry for `tx`, if present.
    pub fn remove(&mut self, tx: &TxHash) -> Option<PendingOperation> {
        let index = self.entries.iter().position(|op| &op.tx_hash == tx)?;
        Some(self.entries.remove(index))
    }

    /// The current entries, oldest first.
    pub fn entries(&self) -> &[PendingOperation] {
        &self.entries
    }

    /// Drops every entry. Used when the owning tracker is reset.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, tx: &TxHash) -> bool {
        self.entries.iter().any(|op| &op.tx_hash == tx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
