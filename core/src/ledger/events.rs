//! Event-to-account correlation.
//!
//! Incoming chain events carry raw payload fields; the router turns them
//! into refresh deltas by matching those fields against two tables:
//!
//! - watched account addresses, for public transfer events;
//! - the pool-address index, for shielded pool events. The index only
//!   covers *unlocked* accounts — a locked account's pool address is not
//!   in memory, so its shielded activity cannot be correlated and it is
//!   simply not reactively updated while locked.
//!
//! Both tables are keyed by the emitting contract first, so correlation
//! is two map lookups plus a scan over the event payload, never a scan
//! over all watched accounts per event.

use std::collections::HashMap;

use crate::account::Address;
use crate::collaborators::chain::ChainEvent;
use crate::token::{Token, TokenId};

// ---------------------------------------------------------------------------
// RefreshDelta
// ---------------------------------------------------------------------------

/// Which side of the dual cache a delta touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Public,
    Private,
}

/// One (account, token) pair that needs re-fetching, produced by event
/// correlation and consumed by the debounce driver.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefreshDelta {
    pub account: Address,
    pub token: TokenId,
    pub side: Side,
}

// ---------------------------------------------------------------------------
// EventRouter
// ---------------------------------------------------------------------------

/// The correlation tables for the active network.
///
/// Rebuilt from scratch on network switch; the pool-address index is
/// rebuilt on every lock/unlock transition.
#[derive(Debug, Default)]
pub struct EventRouter {
    /// public token contract → token id
    by_public_contract: HashMap<Address, TokenId>,
    /// pool contract → token id
    by_pool_contract: HashMap<Address, TokenId>,
    /// watched account addresses
    accounts: HashMap<Address, ()>,
    /// pool address → owning (account, token), unlocked accounts only
    pool_index: HashMap<Address, (Address, TokenId)>,
}

impl EventRouter {
    /// Builds the contract tables for one network's token set.
    pub fn new(tokens: &[Token]) -> Self {
        let mut router = Self::default();
        for token in tokens {
            router
                .by_public_contract
                .insert(token.contract.clone(), token.id.clone());
            router
                .by_pool_contract
                .insert(token.pool_contract.clone(), token.id.clone());
        }
        router
    }

    /// Replaces the watched-account table.
    pub fn set_accounts<I: IntoIterator<Item = Address>>(&mut self, accounts: I) {
        self.accounts = accounts.into_iter().map(|a| (a, ())).collect();
    }

    /// Replaces the pool-address index. Called with the complete set of
    /// currently unlocked (pool address → account, token) entries.
    pub fn set_pool_index<I: IntoIterator<Item = (Address, (Address, TokenId))>>(
        &mut self,
        entries: I,
    ) {
        self.pool_index = entries.into_iter().collect();
    }

    /// Correlates one event into zero or more refresh deltas.
    pub fn correlate(&self, event: &ChainEvent) -> Vec<RefreshDelta> {
        if let Some(token) = self.by_public_contract.get(&event.contract) {
            return self.match_public(event, token);
        }
        if self.by_pool_contract.contains_key(&event.contract) {
            return self.match_private(event);
        }
        Vec::new()
    }

    fn match_public(&self, event: &ChainEvent, token: &TokenId) -> Vec<RefreshDelta> {
        let mut deltas = Vec::new();
        for field in &event.data {
            let address = Address::new(field.as_str());
            if self.accounts.contains_key(&address) {
                deltas.push(RefreshDelta {
                    account: address,
                    token: token.clone(),
                    side: Side::Public,
                });
            }
        }
        deltas
    }

    fn match_private(&self, event: &ChainEvent) -> Vec<RefreshDelta> {
        let mut deltas = Vec::new();
        for field in &event.data {
            let address = Address::new(field.as_str());
            if let Some((account, token)) = self.pool_index.get(&address) {
                deltas.push(RefreshDelta {
                    account: account.clone(),
                    token: token.clone(),
                    side: Side::Private,
                });
            }
        }
        deltas
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
