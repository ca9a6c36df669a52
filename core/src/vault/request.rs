//! The vault's closed request/response schema.
//!
//! Each [`CredentialRequest`] variant fixes the shape of its response —
//! there is no free-form payload. Callers destructure the response
//! through the typed accessors, which turn a missing entry into
//! [`CoreError::KeyNotFound`]: if the vault answered a request without
//! the material the request named, that's a programmer error and it
//! should fail loudly, not quietly sign with the wrong key.

use std::collections::HashMap;

use crate::account::{Account, Address, KeySourceId};
use crate::collaborators::seed_store::SeedPhrase;
use crate::error::{CoreError, CoreResult};
use crate::token::{Token, TokenId};
use crate::vault::derive::{SigningKey, SpendingKey};

// ---------------------------------------------------------------------------
// CredentialRequest
// ---------------------------------------------------------------------------

/// What a caller is asking the vault for.
#[derive(Clone, Debug)]
pub enum CredentialRequest {
    /// The plain passphrase. Needed once, to bootstrap biometric
    /// enrollment — the passphrase is what the seed store's encryption
    /// is keyed on.
    Passphrase,

    /// The decrypted seed words of one key source.
    SeedPhrase { source: KeySourceId },

    /// Derived key material: transaction-signing keys for `signing_for`,
    /// and privacy-pool spending keys for every (account, token) pair in
    /// `tokens_for`.
    SigningAndTokenKeys {
        signing_for: Vec<Account>,
        tokens_for: HashMap<Account, Vec<Token>>,
    },
}

// ---------------------------------------------------------------------------
// CredentialResponse
// ---------------------------------------------------------------------------

/// The vault's answer, shaped by the request variant.
#[derive(Debug)]
pub enum CredentialResponse {
    Passphrase(String),
    SeedPhrase(SeedPhrase),
    SigningAndTokenKeys {
        signing: HashMap<Address, SigningKey>,
        spending: HashMap<(Address, TokenId), SpendingKey>,
    },
}

impl CredentialResponse {
    /// Consumes the response as a passphrase.
    pub fn into_passphrase(self) -> CoreResult<String> {
        match self {
            Self::Passphrase(p) => Ok(p),
            other => Err(CoreError::KeyNotFound(format!(
                "expected passphrase response, got {}",
                other.variant_name()
            ))),
        }
    }

    /// Consumes the response as seed words.
    pub fn into_seed_phrase(self) -> CoreResult<SeedPhrase> {
        match self {
            Self::SeedPhrase(words) => Ok(words),
            other => Err(CoreError::KeyNotFound(format!(
                "expected seed phrase response, got {}",
                other.variant_name()
            ))),
        }
    }

    /// The signing key derived for `account`.
    pub fn signing_key(&self, account: &Address) -> CoreResult<&SigningKey> {
        match self {
            Self::SigningAndTokenKeys { signing, .. } => signing.get(account).ok_or_else(|| {
                CoreError::KeyNotFound(format!("no signing key for account {account}"))
            }),
            other => Err(CoreError::KeyNotFound(format!(
                "expected key response, got {}",
                other.variant_name()
            ))),
        }
    }

    /// The spending key derived for (`account`, `token`).
    pub fn spending_key(&self, account: &Address, token: &TokenId) -> CoreResult<&SpendingKey> {
        match self {
            Self::SigningAndTokenKeys { spending, .. } => spending
                .get(&(account.clone(), token.clone()))
                .ok_or_else(|| {
                    CoreError::KeyNotFound(format!(
                        "no spending key for account {account} / token {token}"
                    ))
                }),
            other => Err(CoreError::KeyNotFound(format!(
                "expected key response, got {}",
                other.variant_name()
            ))),
        }
    }

    /// All derived spending keys, keyed by (account, token).
    pub fn spending_keys(&self) -> CoreResult<&HashMap<(Address, TokenId), SpendingKey>> {
        match self {
            Self::SigningAndTokenKeys { spending, .. } => Ok(spending),
            other => Err(CoreError::KeyNotFound(format!(
                "expected key response, got {}",
                other.variant_name()
            ))),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Self::Passphrase(_) => "Passphrase",
            Self::SeedPhrase(_) => "SeedPhrase",
            Self::SigningAndTokenKeys { .. } => "SigningAndTokenKeys",
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt
// ---------------------------------------------------------------------------

/// The prompt currently presented to the user, if any. The UI observes
/// this through [`CredentialVault::prompt_state`](super::CredentialVault::prompt_state)
/// and renders accordingly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prompt {
    /// Ask the user to type their passphrase, then call
    /// `submit_passphrase` or `cancel`.
    Passphrase { reason: String },

    /// The OS biometric sheet is up; nothing to submit — the seed store
    /// resolves this one itself.
    Biometrics { reason: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_signing_key_is_key_not_found() {
        let response = CredentialResponse::SigningAndTokenKeys {
            signing: HashMap::new(),
            spending: HashMap::new(),
        };
        let result = response.signing_key(&Address::new("0xnope"));
        assert!(matches!(result, Err(CoreError::KeyNotFound(_))));
    }

    #[test]
    fn wrong_variant_is_key_not_found() {
        let response = CredentialResponse::Passphrase("hunter2".into());
        assert!(matches!(
            response.into_seed_phrase(),
            Err(CoreError::KeyNotFound(_))
        ));
    }
}
