//! The transaction tracker.
//!
//! One method per operation kind, each with the same spine: ask the
//! vault for exactly the keys the operation needs, run any pre-step
//! (rollover of pending pool balance), sign and submit, push a pending
//! entry, and hand confirmation to a supervised awaiter. The caller gets
//! the transaction hash back as soon as the network accepts the
//! submission; everything after that is the awaiter's problem, and
//! awaiter failures go to the notification sink, never back to the
//! caller.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::account::{Account, Address, ClassHash, TxHash};
use crate::collaborators::chain::{Calldata, ChainClient, SignedCall};
use crate::collaborators::kv::KvStore;
use crate::collaborators::notify::{NotificationSink, Notice};
use crate::collaborators::pool::PrivacyPool;
use crate::error::CoreResult;
use crate::tasks::TaskSet;
use crate::token::Token;
use crate::tracker::deploy::{DeployStatus, DeployTracker};
use crate::tracker::pending::{OperationKind, PendingOperation, PendingStack};
use crate::vault::derive::{SigningKey, SpendingKey};
use crate::vault::{CredentialRequest, CredentialVault};

struct Inner {
    chain: Arc<dyn ChainClient>,
    pool: Arc<dyn PrivacyPool>,
    sink: Arc<dyn NotificationSink>,
    deploy: DeployTracker,
    pending: RwLock<PendingStack>,
}

// ---------------------------------------------------------------------------
// TransactionTracker
// ---------------------------------------------------------------------------

/// Submits signed operations and reconciles their confirmation.
pub struct TransactionTracker {
    inner: Arc<Inner>,
    vault: Arc<CredentialVault>,
    tasks: TaskSet,
}

impl TransactionTracker {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        pool: Arc<dyn PrivacyPool>,
        vault: Arc<CredentialVault>,
        kv: Arc<dyn KvStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                chain: chain.clone(),
                pool,
                sink,
                deploy: DeployTracker::new(chain, kv),
                pending: RwLock::new(PendingStack::new()),
            }),
            vault,
            tasks: TaskSet::new(),
        }
    }

    /// Current in-flight operations, oldest first.
    pub fn pending_operations(&self) -> Vec<PendingOperation> {
        self.inner.pending.read().entries().to_vec()
    }

    /// Last known deploy status of `address`; never hits the network.
    pub fn deploy_status(&self, address: &Address) -> DeployStatus {
        self.inner.deploy.status(address)
    }

    /// Resolves deploy statuses, consulting the persisted class-hash
    /// cache before any RPC. See [`DeployTracker::check_accounts_deployed`].
    pub async fn check_accounts_deployed(
        &self,
        addresses: &[Address],
    ) -> HashMap<Address, DeployStatus> {
        self.inner.deploy.check_accounts_deployed(addresses).await
    }

    /// Tears down volatile state on network switch or logout: aborts
    /// every outstanding confirmation awaiter, empties the pending stack,
    /// and drops all deploy statuses back to `Unknown`. The persisted
    /// class-hash cache survives.
    pub fn reset(&self) {
        self.tasks.abort_all();
        self.inner.pending.write().clear();
        self.inner.deploy.clear();
        info!("tracker reset");
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Moves `amount` (smallest public units) of `token` into the
    /// privacy pool.
    pub async fn fund(&self, account: &Account, token: &Token, amount: u128) -> CoreResult<TxHash> {
        let reason = format!("Fund {} {} into the privacy pool", amount, token.symbol);
        let (signing, spending) = self.operation_keys(account, token, &reason).await?;

        let calls = self
            .inner
            .pool
            .fund(&spending, &token.pool_contract, &account.address, amount)
            .await?;
        self.submit(
            account,
            calls,
            &signing,
            OperationKind::Fund {
                account: account.address.clone(),
                token: token.id.clone(),
                amount,
            },
            None,
        )
        .await
    }

    /// Plain public token transfer.
    pub async fn public_transfer(
        &self,
        from: &Account,
        to: &Address,
        token: &Token,
        amount: u128,
    ) -> CoreResult<TxHash> {
        let reason = format!("Transfer {} {} to {}", amount, token.symbol, to);
        let signing = self.signing_key_for(from, &reason).await?;

        let calls = vec![Calldata::new(
            token.contract.clone(),
            "transfer",
            vec![to.as_str().to_string(), amount.to_string()],
        )];
        self.submit(
            from,
            calls,
            &signing,
            OperationKind::PublicTransfer {
                from: from.address.clone(),
                to: to.clone(),
                token: token.id.clone(),
                amount,
            },
            None,
        )
        .await
    }

    /// Shielded transfer of `amount` (pool units) to another pool
    /// address. Rolls pending balance over first when the spendable
    /// component alone cannot cover the amount.
    pub async fn private_transfer(
        &self,
        from: &Account,
        to_pool_address: &Address,
        token: &Token,
        amount: u128,
    ) -> CoreResult<TxHash> {
        let reason = format!("Send {} {} privately", amount, token.symbol);
        let (signing, spending) = self.operation_keys(from, token, &reason).await?;

        let mut calls = self
            .rollover_prelude(&spending, &token.pool_contract, amount)
            .await?;
        calls.extend(
            self.inner
                .pool
                .transfer(&spending, &token.pool_contract, to_pool_address, amount)
                .await?,
        );
        self.submit(
            from,
            calls,
            &signing,
            OperationKind::PrivateTransfer {
                from: from.address.clone(),
                to_pool_address: to_pool_address.clone(),
                token: token.id.clone(),
                amount,
            },
            None,
        )
        .await
    }

    /// Withdraws `amount` (pool units) of shielded balance to a public
    /// address, rolling pending balance over first when needed.
    pub async fn withdraw(
        &self,
        from: &Account,
        to: &Address,
        token: &Token,
        amount: u128,
    ) -> CoreResult<TxHash> {
        let reason = format!("Withdraw {} {} to {}", amount, token.symbol, to);
        let (signing, spending) = self.operation_keys(from, token, &reason).await?;

        let mut calls = self
            .rollover_prelude(&spending, &token.pool_contract, amount)
            .await?;
        calls.extend(
            self.inner
                .pool
                .withdraw(&spending, &token.pool_contract, to, amount)
                .await?,
        );
        self.submit(
            from,
            calls,
            &signing,
            OperationKind::Withdraw {
                from: from.address.clone(),
                to: to.clone(),
                token: token.id.clone(),
                amount,
            },
            None,
        )
        .await
    }

    /// Deploys the account contract.
    ///
    /// Requires a definitive `NotDeployed` status from a prior check:
    /// `Unknown` fails with `DeployAmbiguous`, anything further along
    /// with `AlreadyDeployed`. The status moves to `Deploying` before
    /// submission and is rolled back on any pre-confirmation failure.
    pub async fn deploy_account(
        &self,
        account: &Account,
        class_hash: ClassHash,
    ) -> CoreResult<TxHash> {
        self.inner.deploy.mark_deploying(&account.address)?;

        let result = self.deploy_submit(account, &class_hash).await;
        if result.is_err() {
            self.inner.deploy.revert_deploying(&account.address);
        }
        result
    }

    async fn deploy_submit(&self, account: &Account, class_hash: &ClassHash) -> CoreResult<TxHash> {
        let reason = format!("Deploy account {}", account.name);
        let signing = self.signing_key_for(account, &reason).await?;

        let calls = vec![Calldata::new(
            account.address.clone(),
            "deploy_account",
            vec![class_hash.as_str().to_string()],
        )];
        self.submit(
            account,
            calls,
            &signing,
            OperationKind::DeployAccount {
                account: account.address.clone(),
            },
            Some((account.address.clone(), class_hash.clone())),
        )
        .await
    }

    /// Deposits `amount` (smallest public units) into a swap venue.
    pub async fn deposit_for_swap(
        &self,
        from: &Account,
        venue: &Address,
        token: &Token,
        amount: u128,
    ) -> CoreResult<TxHash> {
        let reason = format!("Deposit {} {} for swap", amount, token.symbol);
        let signing = self.signing_key_for(from, &reason).await?;

        let calls = vec![
            Calldata::new(
                token.contract.clone(),
                "approve",
                vec![venue.as_str().to_string(), amount.to_string()],
            ),
            Calldata::new(
                venue.clone(),
                "deposit",
                vec![token.contract.as_str().to_string(), amount.to_string()],
            ),
        ];
        self.submit(
            from,
            calls,
            &signing,
            OperationKind::SwapDeposit {
                from: from.address.clone(),
                venue: venue.clone(),
                token: token.id.clone(),
                amount,
            },
            None,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// One vault round trip for a signing key alone.
    async fn signing_key_for(&self, account: &Account, reason: &str) -> CoreResult<SigningKey> {
        let request = CredentialRequest::SigningAndTokenKeys {
            signing_for: vec![account.clone()],
            tokens_for: HashMap::new(),
        };
        let response = self.vault.request_access(request, reason).await?;
        Ok(response.signing_key(&account.address)?.clone())
    }

    /// One vault round trip for the signing key plus the spending key of
    /// one (account, token) pair.
    async fn operation_keys(
        &self,
        account: &Account,
        token: &Token,
        reason: &str,
    ) -> CoreResult<(SigningKey, SpendingKey)> {
        let request = CredentialRequest::SigningAndTokenKeys {
            signing_for: vec![account.clone()],
            tokens_for: HashMap::from([(account.clone(), vec![token.clone()])]),
        };
        let response = self.vault.request_access(request, reason).await?;

        let signing = response.signing_key(&account.address)?.clone();
        let spending = response.spending_key(&account.address, &token.id)?.clone();
        Ok((signing, spending))
    }

    /// Rollover pre-step: when the spendable pool balance alone cannot
    /// cover `amount` and there is pending balance to draw on, prepend
    /// the rollover calls.
    async fn rollover_prelude(
        &self,
        key: &SpendingKey,
        pool_contract: &Address,
        amount: u128,
    ) -> CoreResult<Vec<Calldata>> {
        let state = self.inner.pool.state(key, pool_contract).await?;
        if state.pending > 0 && amount > state.balance {
            debug!(
                spendable = state.balance,
                pending = state.pending,
                amount,
                "rolling pending balance over before spend"
            );
            Ok(self.inner.pool.rollover(key, pool_contract).await?)
        } else {
            Ok(Vec::new())
        }
    }

    /// Signs, submits, records the pending entry, and spawns the
    /// confirmation awaiter.
    async fn submit(
        &self,
        signer: &Account,
        calls: Vec<Calldata>,
        signing: &SigningKey,
        kind: OperationKind,
        deploy: Option<(Address, ClassHash)>,
    ) -> CoreResult<TxHash> {
        let signed = SignedCall::sign(signer.address.clone(), calls, signing);
        let tx = self.inner.chain.submit(signed).await?;
        debug!(tx = %tx, kind = ?kind, "operation submitted");

        self.inner.pending.write().push(PendingOperation {
            kind,
            tx_hash: tx.clone(),
        });
        self.spawn_awaiter(tx.clone(), deploy);
        Ok(tx)
    }

    /// Fire-and-forget confirmation awaiter. Success removes the pending
    /// entry (and finalizes a deploy); failure removes it, rolls back any
    /// optimistic deploy status, and tells the sink.
    fn spawn_awaiter(&self, tx: TxHash, deploy: Option<(Address, ClassHash)>) {
        let inner = Arc::clone(&self.inner);
        self.tasks.spawn(async move {
            match inner.chain.wait_for_transaction(&tx).await {
                Ok(()) => {
                    inner.pending.write().remove(&tx);
                    if let Some((address, class_hash)) = deploy {
                        inner.deploy.confirm_deployed(&address, class_hash).await;
                    }
                    debug!(tx = %tx, "operation confirmed");
                }
                Err(e) => {
                    inner.pending.write().remove(&tx);
                    if let Some((address, _)) = deploy {
                        inner.deploy.revert_deploying(&address);
                    }
                    warn!(tx = %tx, error = %e, "operation failed");
                    inner
                        .sink
                        .notify(Notice::error("Transaction failed", e.to_string()));
                }
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
