//! The balance ledger itself.
//!
//! One `RwLock`ed state block holds everything that must reset together
//! on a network switch: the dual cache, the correlation tables, the
//! unlocked spending-key cache, and an epoch counter. Background tasks
//! capture the epoch they were spawned under and drop their results if
//! the epoch has moved on — an aborted task that was already past its
//! last await point can still race the reset, and the epoch check is
//! what makes that race harmless.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::account::{Account, Address};
use crate::balance::{BalanceCache, BalanceKey, PrivateBalance, PublicBalance};
use crate::collaborators::chain::ChainClient;
use crate::collaborators::pool::PrivacyPool;
use crate::collaborators::prices::PriceFeed;
use crate::config::{
    DEBOUNCE_WINDOW, POOL_EVENTS, PRICE_REFRESH_INTERVAL, PUBLIC_BALANCE_SELECTOR,
    PUBLIC_TRANSFER_EVENT,
};
use crate::error::CoreResult;
use crate::ledger::events::{EventRouter, RefreshDelta, Side};
use crate::tasks::TaskSet;
use crate::token::{NetworkId, NetworkTokens, Token, TokenId};
use crate::vault::derive::SpendingKey;
use crate::vault::{CredentialRequest, CredentialVault};

// ---------------------------------------------------------------------------
// LedgerState
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LedgerState {
    /// Active network; `None` until the first `set_network`.
    network: Option<NetworkId>,
    /// Bumped on every network switch. Batch results carrying a stale
    /// epoch are discarded instead of merged.
    epoch: u64,
    cache: BalanceCache,
    router: EventRouter,
    /// Accounts currently being watched for events and refreshes.
    accounts: Vec<Account>,
    /// Derived spending keys for unlocked (account, token) pairs. The
    /// only place in the crate secret material rests between vault calls.
    keys: HashMap<(Address, TokenId), SpendingKey>,
    unlocked: HashSet<Address>,
}

struct Inner {
    chain: Arc<dyn ChainClient>,
    pool: Arc<dyn PrivacyPool>,
    prices: Arc<dyn PriceFeed>,
    tokens: NetworkTokens,
    state: RwLock<LedgerState>,
}

// ---------------------------------------------------------------------------
// BalanceLedger
// ---------------------------------------------------------------------------

/// The dual public/private balance cache and its convergence machinery.
pub struct BalanceLedger {
    inner: Arc<Inner>,
    vault: Arc<CredentialVault>,
    tasks: TaskSet,
}

impl BalanceLedger {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        pool: Arc<dyn PrivacyPool>,
        prices: Arc<dyn PriceFeed>,
        vault: Arc<CredentialVault>,
        tokens: NetworkTokens,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                chain,
                pool,
                prices,
                tokens,
                state: RwLock::new(LedgerState::default()),
            }),
            vault,
            tasks: TaskSet::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Network lifecycle
    // -----------------------------------------------------------------------

    /// Switches the active network: tears down every background task,
    /// resets the caches and the unlocked set, then resubscribes the new
    /// network's token contracts. Teardown is atomic with respect to the
    /// cache — nothing spawned for the old network can write past it.
    pub fn set_network(&self, network: NetworkId) {
        self.tasks.abort_all();

        let tokens: Vec<Token> = self.inner.tokens.tokens_for(&network).to_vec();
        let (delta_tx, delta_rx) = mpsc::unbounded_channel();

        let epoch = {
            let mut state = self.inner.state.write();
            state.epoch += 1;
            state.network = Some(network.clone());
            state.cache.clear();
            state.keys.clear();
            state.unlocked.clear();
            let watched: Vec<Address> = state.accounts.iter().map(|a| a.address.clone()).collect();
            state.router = EventRouter::new(&tokens);
            state.router.set_accounts(watched);
            state.epoch
        };
        info!(%network, tokens = tokens.len(), epoch, "network set");

        // One watcher per contract stream. Streams are opened before the
        // tasks start so no event between subscribe and spawn is lost to
        // ordering.
        for token in &tokens {
            let public = self
                .inner
                .chain
                .subscribe_events(&token.contract, &[PUBLIC_TRANSFER_EVENT]);
            let pool = self
                .inner
                .chain
                .subscribe_events(&token.pool_contract, &POOL_EVENTS);
            for stream in [public, pool] {
                let inner = Arc::clone(&self.inner);
                let tx = delta_tx.clone();
                let mut stream = stream;
                self.tasks.spawn(async move {
                    while let Some(event) = stream.next().await {
                        let deltas = inner.state.read().router.correlate(&event);
                        for delta in deltas {
                            if tx.send(delta).is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        }

        let inner = Arc::clone(&self.inner);
        self.tasks
            .spawn(async move { debounce_driver(inner, epoch, delta_rx).await });

        let inner = Arc::clone(&self.inner);
        self.tasks.spawn(async move { price_loop(inner, epoch).await });
    }

    /// Replaces the watched-account set. Takes effect for correlation
    /// immediately; cached balances of unwatched accounts are left in
    /// place until the next network switch clears them.
    pub fn watch_accounts(&self, accounts: Vec<Account>) {
        let mut state = self.inner.state.write();
        state
            .router
            .set_accounts(accounts.iter().map(|a| a.address.clone()).collect::<Vec<_>>());
        state.accounts = accounts;
    }

    pub fn network(&self) -> Option<NetworkId> {
        self.inner.state.read().network.clone()
    }

    // -----------------------------------------------------------------------
    // Refresh
    // -----------------------------------------------------------------------

    /// Re-fetches balances for exactly the given accounts: public-side
    /// for `public_for`, private-side for `private_for`, across every
    /// token configured on the active network. Per-pair failures keep
    /// the stale cached entry; they never abort the rest of the batch.
    pub async fn request_refresh(&self, public_for: &[Account], private_for: &[Account]) {
        let (epoch, tokens) = {
            let state = self.inner.state.read();
            let Some(network) = state.network.clone() else {
                return;
            };
            (state.epoch, self.inner.tokens.tokens_for(&network).to_vec())
        };

        let mut deltas = HashSet::new();
        for account in public_for {
            for token in &tokens {
                deltas.insert(RefreshDelta {
                    account: account.address.clone(),
                    token: token.id.clone(),
                    side: Side::Public,
                });
            }
        }
        for account in private_for {
            for token in &tokens {
                deltas.insert(RefreshDelta {
                    account: account.address.clone(),
                    token: token.id.clone(),
                    side: Side::Private,
                });
            }
        }
        self.inner.refresh_batch(epoch, deltas).await;
    }

    // -----------------------------------------------------------------------
    // Lock / unlock
    // -----------------------------------------------------------------------

    /// Unlocks the privacy-pool side of the given accounts: one vault
    /// round trip (the vault recovers each distinct key source exactly
    /// once), one derived spending key per (account, token) pair, then a
    /// refresh of just the affected accounts.
    pub async fn unlock_private_balances(&self, accounts: &[Account]) -> CoreResult<()> {
        let tokens = {
            let state = self.inner.state.read();
            let Some(network) = state.network.clone() else {
                return Ok(());
            };
            self.inner.tokens.tokens_for(&network).to_vec()
        };

        let request = CredentialRequest::SigningAndTokenKeys {
            signing_for: Vec::new(),
            tokens_for: accounts
                .iter()
                .map(|a| (a.clone(), tokens.clone()))
                .collect(),
        };
        let response = self
            .vault
            .request_access(request, "Unlock private balances")
            .await?;
        let derived = response.spending_keys()?.clone();

        {
            let mut state = self.inner.state.write();
            for account in accounts {
                state.unlocked.insert(account.address.clone());
            }
            state.keys.extend(derived);
            self.rebuild_pool_index(&mut state, &tokens);
        }
        info!(accounts = accounts.len(), "private balances unlocked");

        self.request_refresh(&[], accounts).await;
        Ok(())
    }

    /// Locks the given accounts: derived keys are dropped synchronously
    /// before anything else happens, then the cache is rewritten so the
    /// amounts are withdrawn, not merely flagged.
    pub async fn lock_private_balances(&self, accounts: &[Account]) {
        let tokens = {
            let mut state = self.inner.state.write();
            let Some(network) = state.network.clone() else {
                return;
            };
            let addresses: HashSet<&Address> = accounts.iter().map(|a| &a.address).collect();
            state.keys.retain(|(account, _), _| !addresses.contains(account));
            for address in &addresses {
                state.unlocked.remove(*address);
            }
            let tokens = self.inner.tokens.tokens_for(&network).to_vec();
            self.rebuild_pool_index(&mut state, &tokens);
            tokens
        };
        debug!(accounts = accounts.len(), tokens = tokens.len(), "private balances locked");

        self.request_refresh(&[], accounts).await;
    }

    /// Whether the account's privacy-pool side is currently unlocked.
    pub fn is_unlocked(&self, account: &Address) -> bool {
        self.inner.state.read().unlocked.contains(account)
    }

    /// A clone of the cached spending key for one (account, token) pair.
    /// Present only while the account is unlocked.
    pub fn spending_key(&self, account: &Address, token: &TokenId) -> Option<SpendingKey> {
        self.inner
            .state
            .read()
            .keys
            .get(&(account.clone(), token.clone()))
            .cloned()
    }

    fn rebuild_pool_index(&self, state: &mut LedgerState, tokens: &[Token]) {
        let mut entries = Vec::with_capacity(state.keys.len());
        for ((account, token_id), key) in &state.keys {
            let Some(token) = tokens.iter().find(|t| &t.id == token_id) else {
                continue;
            };
            let pool_address = self.inner.pool.pool_address(key, &token.pool_contract);
            entries.push((pool_address, (account.clone(), token_id.clone())));
        }
        state.router.set_pool_index(entries);
    }

    // -----------------------------------------------------------------------
    // Cache reads
    // -----------------------------------------------------------------------

    pub fn public_balance(&self, account: &Address, token: &TokenId) -> Option<PublicBalance> {
        self.inner
            .state
            .read()
            .cache
            .public(&BalanceKey::new(account.clone(), token.clone()))
            .cloned()
    }

    pub fn private_balance(&self, account: &Address, token: &TokenId) -> Option<PrivateBalance> {
        self.inner
            .state
            .read()
            .cache
            .private(&BalanceKey::new(account.clone(), token.clone()))
            .cloned()
    }
}

impl Inner {
    /// Executes one refresh batch and merges the results, unless the
    /// epoch moved while the fetches were in flight.
    async fn refresh_batch(&self, epoch: u64, deltas: HashSet<RefreshDelta>) {
        if deltas.is_empty() {
            return;
        }
        let tokens: HashMap<TokenId, Token> = {
            let state = self.state.read();
            let Some(network) = state.network.clone() else {
                return;
            };
            self.tokens
                .tokens_for(&network)
                .iter()
                .map(|t| (t.id.clone(), t.clone()))
                .collect()
        };

        let mut public_updates: Vec<(BalanceKey, PublicBalance)> = Vec::new();
        let mut private_updates: Vec<(BalanceKey, PrivateBalance)> = Vec::new();
        let mut failed = 0usize;

        for delta in &deltas {
            let Some(token) = tokens.get(&delta.token) else {
                continue;
            };
            let key = BalanceKey::new(delta.account.clone(), delta.token.clone());
            match delta.side {
                Side::Public => match self.fetch_public(&delta.account, token).await {
                    Ok(balance) => public_updates.push((key, balance)),
                    Err(detail) => {
                        failed += 1;
                        warn!(account = %delta.account, token = %token.symbol, detail, "public balance fetch failed; keeping stale entry");
                    }
                },
                Side::Private => {
                    let spending_key = self
                        .state
                        .read()
                        .keys
                        .get(&(delta.account.clone(), delta.token.clone()))
                        .cloned();
                    match spending_key {
                        None => private_updates.push((key, PrivateBalance::locked(token.clone()))),
                        Some(spending_key) => {
                            match self.fetch_private(&spending_key, token).await {
                                Ok(balance) => private_updates.push((key, balance)),
                                Err(detail) => {
                                    failed += 1;
                                    warn!(account = %delta.account, token = %token.symbol, detail, "private balance fetch failed; keeping stale entry");
                                }
                            }
                        }
                    }
                }
            }
        }

        let mut state = self.state.write();
        if state.epoch != epoch {
            debug!(epoch, current = state.epoch, "discarding refresh batch from a previous network");
            return;
        }
        // A lock transition that landed while the fetches were in flight
        // wins over fetched plaintext: an `Unlocked` result for an account
        // that is no longer unlocked must not re-enter the cache.
        private_updates.retain(|(key, balance)| {
            balance.is_locked() || state.unlocked.contains(&key.account)
        });
        state.cache.merge_public(public_updates);
        state.cache.merge_private(private_updates);
        if failed > 0 {
            warn!(failed, total = deltas.len(), "refresh batch completed with partial failures");
        }
    }

    async fn fetch_public(&self, account: &Address, token: &Token) -> Result<PublicBalance, String> {
        let result = self
            .chain
            .call_contract(
                &token.contract,
                PUBLIC_BALANCE_SELECTOR,
                &[account.as_str().to_string()],
            )
            .await
            .map_err(|e| e.to_string())?;
        let raw = result.first().ok_or("empty balance response")?;
        let amount: u128 = raw
            .parse()
            .map_err(|_| format!("unparseable balance '{raw}'"))?;
        Ok(PublicBalance::new(token.clone(), amount))
    }

    async fn fetch_private(
        &self,
        key: &SpendingKey,
        token: &Token,
    ) -> Result<PrivateBalance, String> {
        let state = self
            .pool
            .state(key, &token.pool_contract)
            .await
            .map_err(|e| e.to_string())?;
        PrivateBalance::unlocked(token.clone(), state.rate, state.balance, state.pending)
            .map_err(|e| e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// The debounce driver: the only task that executes refresh batches.
///
/// The first delta after an idle period arms a fixed window; when the
/// window expires, everything accumulated so far drains into exactly one
/// batch. Deltas arriving while that batch executes stay queued in the
/// channel and arm the next window as soon as the batch returns — one
/// follow-up batch, never two in flight, never a dropped delta.
async fn debounce_driver(
    inner: Arc<Inner>,
    epoch: u64,
    mut rx: mpsc::UnboundedReceiver<RefreshDelta>,
) {
    while let Some(first) = rx.recv().await {
        tokio::time::sleep(DEBOUNCE_WINDOW).await;

        let mut deltas = HashSet::new();
        deltas.insert(first);
        while let Ok(delta) = rx.try_recv() {
            deltas.insert(delta);
        }

        debug!(pairs = deltas.len(), "debounce window expired; refreshing");
        inner.refresh_batch(epoch, deltas).await;
    }
}

/// The price loop: read-merge-write of price fields only, on a fixed
/// interval. A failed fetch keeps the previous quotes and is retried on
/// the next tick.
async fn price_loop(inner: Arc<Inner>, epoch: u64) {
    let mut ticker = tokio::time::interval(PRICE_REFRESH_INTERVAL);
    loop {
        ticker.tick().await;

        let (network, tokens) = {
            let state = inner.state.read();
            let Some(network) = state.network.clone() else {
                return;
            };
            (network.clone(), inner.tokens.tokens_for(&network).to_vec())
        };
        if tokens.is_empty() {
            continue;
        }

        match inner.prices.prices(&network, &tokens).await {
            Ok(quotes) => {
                let mut state = inner.state.write();
                if state.epoch != epoch {
                    return;
                }
                state.cache.reprice(&quotes);
                debug!(quotes = quotes.len(), "prices refreshed");
            }
            Err(e) => warn!(error = %e, "price fetch failed; keeping previous quotes"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
