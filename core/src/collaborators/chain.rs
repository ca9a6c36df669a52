//! The ledger RPC/WS client seam.
//!
//! Contract reads, transaction submission, confirmation waits, and event
//! subscriptions. The client owns connection management, retries at the
//! transport level, and the actual wire encoding — the core only cares
//! about one error distinction: [`ChainError::ContractNotFound`] versus
//! everything else. "Not found" is the *only* signal that an account is
//! genuinely undeployed; any other failure is ambiguous and must never be
//! treated as "safe to deploy" (see [`crate::tracker::deploy`]).

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::account::{Address, ClassHash, TxHash};
use crate::vault::derive::SigningKey;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the chain client.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The addressed contract does not exist on-chain. For account
    /// addresses this is the definitive "not deployed" answer.
    #[error("contract not found at {0}")]
    ContractNotFound(Address),

    /// Any other RPC/WS failure: timeouts, node errors, malformed
    /// responses. Deliberately opaque — call sites must not pattern-match
    /// their way into treating one of these as "not deployed".
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The network accepted and then rejected the transaction.
    #[error("transaction {0} rejected: {1}")]
    Rejected(TxHash, String),
}

// ---------------------------------------------------------------------------
// ChainEvent
// ---------------------------------------------------------------------------

/// One decoded event from a contract's event stream.
///
/// `keys` are the event's selector keys (e.g. `"Transfer"` plus indexed
/// fields); `data` is the flat payload, with addresses rendered in the
/// same lowercase hex form as [`Address`]. The ledger correlates events
/// to accounts by matching payload fields against its watch tables.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// The emitting contract.
    pub contract: Address,
    pub keys: Vec<String>,
    pub data: Vec<String>,
}

// ---------------------------------------------------------------------------
// Calldata / SignedCall
// ---------------------------------------------------------------------------

/// One contract invocation inside an operation. Opaque to the core —
/// built either directly (public transfers) or by the privacy-pool SDK
/// (shielded operations), then signed and submitted as a batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Calldata {
    pub to: Address,
    pub selector: String,
    pub args: Vec<String>,
}

impl Calldata {
    pub fn new(to: Address, selector: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            to,
            selector: selector.into(),
            args,
        }
    }
}

/// A signed batch of calls, ready for submission.
///
/// The signature scheme itself is a collaborator concern; the core binds
/// the calls to the signer's key with a SHA-256 digest envelope that the
/// client implementation translates to the network's real signature.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedCall {
    pub signer: Address,
    pub calls: Vec<Calldata>,
    /// Digest over signer, calls, and signing key material.
    pub digest: String,
}

impl SignedCall {
    /// Binds `calls` to `signer` using its signing key.
    pub fn sign(signer: Address, calls: Vec<Calldata>, key: &SigningKey) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"umbra.signed-call");
        hasher.update(signer.as_str().as_bytes());
        for call in &calls {
            hasher.update([0x00]);
            hasher.update(call.to.as_str().as_bytes());
            hasher.update([0x00]);
            hasher.update(call.selector.as_bytes());
            for arg in &call.args {
                hasher.update([0x01]);
                hasher.update(arg.as_bytes());
            }
        }
        hasher.update([0x02]);
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self {
            signer,
            calls,
            digest,
        }
    }
}

// ---------------------------------------------------------------------------
// ChainClient
// ---------------------------------------------------------------------------

/// Collaborator trait for the remote ledger.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read-only contract call. Returns the raw result felts as strings.
    async fn call_contract(
        &self,
        to: &Address,
        selector: &str,
        args: &[String],
    ) -> Result<Vec<String>, ChainError>;

    /// Class hash of the contract deployed at `address`, or
    /// [`ChainError::ContractNotFound`].
    async fn class_hash_at(&self, address: &Address) -> Result<ClassHash, ChainError>;

    /// Submits a signed operation. Returns as soon as the network has
    /// accepted it into the mempool; confirmation is a separate wait.
    async fn submit(&self, call: SignedCall) -> Result<TxHash, ChainError>;

    /// Resolves when the transaction is confirmed, or errors when it is
    /// terminally rejected.
    async fn wait_for_transaction(&self, tx: &TxHash) -> Result<(), ChainError>;

    /// Subscribes to events emitted by `contract` matching any of `keys`.
    /// The stream ends when the underlying connection is torn down.
    fn subscribe_events(&self, contract: &Address, keys: &[&str]) -> BoxStream<'static, ChainEvent>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
