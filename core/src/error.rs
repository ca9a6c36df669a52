//! # Crate-Wide Error Taxonomy
//!
//! One enum, because the taxonomy spans components: a vault cancellation
//! has to flow untouched through the ledger's unlock path and the
//! tracker's operation methods up to the UI, where it is *silent* — a
//! dismissed prompt is not an error the user needs to be told about.
//!
//! Handling rules, by variant:
//!
//! - `Cancelled` — swallow silently at the UI boundary.
//! - `AuthenticationFailed` — surface, retryable.
//! - `KeyNotFound` — programmer error (the vault returned a response
//!   missing an expected entry). Log loudly; there is no user remedy.
//! - `Chain` / `Storage` / `SeedStore` / `Pool` — infrastructure;
//!   surface as a dismissible notice with optional technical detail.
//! - `DeployAmbiguous` — a deployment check failed for reasons other
//!   than "account absent". Never auto-resolved; blocks deploy attempts
//!   until a fresh check settles it.

use thiserror::Error;

use crate::account::Address;
use crate::collaborators::chain::ChainError;
use crate::collaborators::kv::KvError;
use crate::collaborators::pool::PoolError;
use crate::collaborators::seed_store::SeedStoreError;

/// The wallet core's failure taxonomy.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The user dismissed a credential prompt. Not an error condition —
    /// never surfaced as one.
    #[error("operation cancelled by user")]
    Cancelled,

    /// Wrong passphrase or biometric mismatch. Retryable.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A credential response is missing an entry the caller asked for.
    /// Internal invariant violation.
    #[error("missing key material: {0}")]
    KeyNotFound(String),

    /// Deploy status for the account is `Unknown`; deployment is blocked
    /// until a fresh check resolves it.
    #[error("deploy status for {0} is ambiguous; refusing to deploy")]
    DeployAmbiguous(Address),

    /// Deployment was requested for an account that is already deployed
    /// or currently deploying.
    #[error("account {0} is already deployed or deploying")]
    AlreadyDeployed(Address),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Storage(#[from] KvError),

    #[error(transparent)]
    SeedStore(#[from] SeedStoreError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the UI should stay quiet about this error.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
