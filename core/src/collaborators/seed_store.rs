//! The encrypted-at-rest seed phrase store.
//!
//! The platform implementation sits on top of the OS keystore / secure
//! enclave. The core never sees how words are encrypted — it only asks
//! for them back, either by proving knowledge of the passphrase or by
//! passing a biometric check that the store itself performs.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::account::KeySourceId;

// ---------------------------------------------------------------------------
// SeedPhrase
// ---------------------------------------------------------------------------

/// Decrypted seed words, held in memory only for the scope of a single
/// derivation inside the vault.
///
/// `Debug` is deliberately redacted — seed words must never end up in a
/// log line, panic message, or error chain.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedPhrase(Vec<String>);

impl SeedPhrase {
    pub fn new(words: Vec<String>) -> Self {
        Self(words)
    }

    pub fn words(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Debug for SeedPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedPhrase(<{} words, redacted>)", self.0.len())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the seed store.
#[derive(Debug, Error)]
pub enum SeedStoreError {
    /// No seed phrase has been enrolled for the requested source.
    #[error("no seed phrase enrolled for source {0}")]
    NotEnrolled(KeySourceId),

    /// Biometric hardware is gone (revoked enrollment, hardware fault,
    /// OS policy change). Distinct from a failed match — the vault
    /// durably disables the biometric path when it sees this.
    #[error("biometric hardware unavailable")]
    BiometricsUnavailable,

    /// Keystore I/O failure.
    #[error("seed store i/o error: {0}")]
    Io(String),
}

// ---------------------------------------------------------------------------
// SeedStore
// ---------------------------------------------------------------------------

/// Collaborator trait for the platform seed phrase vault.
///
/// Recovery methods return `Ok(None)` when the challenge itself failed
/// (wrong passphrase, dismissed or mismatched biometric) and `Err` only
/// for infrastructure problems. The distinction matters: `None` is a user
/// outcome, `Err` is a system outcome.
#[async_trait]
pub trait SeedStore: Send + Sync {
    /// Enrolls a seed phrase under the given passphrase.
    async fn setup(
        &self,
        passphrase: &str,
        words: &SeedPhrase,
        source: &KeySourceId,
    ) -> Result<(), SeedStoreError>;

    /// Recovers the seed phrase by passphrase. `Ok(None)` means the
    /// passphrase did not match.
    async fn seed_with_passphrase(
        &self,
        passphrase: &str,
    ) -> Result<Option<SeedPhrase>, SeedStoreError>;

    /// Recovers the seed phrase behind the OS biometric sheet, showing
    /// `prompt` to the user. `Ok(None)` means the user dismissed the
    /// sheet (mismatch retries are handled inside the sheet itself).
    async fn seed_with_biometrics(
        &self,
        prompt: &str,
        source: &KeySourceId,
    ) -> Result<Option<SeedPhrase>, SeedStoreError>;

    /// Whether biometric hardware is currently usable. Cheap, synchronous,
    /// consulted before every biometric attempt.
    fn biometrics_available(&self) -> bool;

    /// Wipes the stored secrets for the given sources.
    async fn reset(&self, sources: &[KeySourceId]) -> Result<(), SeedStoreError>;
}
