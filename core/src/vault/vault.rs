//! The credential vault.
//!
//! See the module docs in [`super`] for the prompt lifecycle. The short
//! version: one async mutex serializes requests FIFO, one `watch`
//! channel exposes the live prompt to the UI, one `oneshot` carries the
//! user's reply back in. Seed words recovered from the platform store
//! exist only inside the request that needed them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::account::KeySourceId;
use crate::collaborators::kv::{self, KvStore};
use crate::collaborators::seed_store::{SeedPhrase, SeedStore, SeedStoreError};
use crate::config::KV_BIOMETRICS_ENABLED;
use crate::error::{CoreError, CoreResult};
use crate::vault::derive;
use crate::vault::request::{CredentialRequest, CredentialResponse, Prompt};

// ---------------------------------------------------------------------------
// PromptReply
// ---------------------------------------------------------------------------

/// The UI's answer to a passphrase prompt.
enum PromptReply {
    Submitted(String),
    Dismissed,
}

// ---------------------------------------------------------------------------
// CredentialVault
// ---------------------------------------------------------------------------

/// Brokers one-at-a-time access to secret material.
///
/// Cheap to share: hold it in an `Arc` and hand clones of that to the
/// ledger and tracker. All state lives behind internal locks.
pub struct CredentialVault {
    seed_store: Arc<dyn SeedStore>,
    kv: Arc<dyn KvStore>,

    /// FIFO single-flight gate. `tokio::sync::Mutex` wakes waiters in
    /// request order, so concurrent callers queue rather than clobbering
    /// each other's prompts.
    flight: tokio::sync::Mutex<()>,

    /// The live prompt, observed by the UI.
    prompt_tx: watch::Sender<Option<Prompt>>,

    /// Resolver for the live passphrase prompt, if one is waiting.
    pending: Mutex<Option<oneshot::Sender<PromptReply>>>,
}

impl CredentialVault {
    pub fn new(seed_store: Arc<dyn SeedStore>, kv: Arc<dyn KvStore>) -> Self {
        let (prompt_tx, _) = watch::channel(None);
        Self {
            seed_store,
            kv,
            flight: tokio::sync::Mutex::new(()),
            prompt_tx,
            pending: Mutex::new(None),
        }
    }

    /// The UI's view of the prompt lifecycle. `None` means no prompt is
    /// live.
    pub fn prompt_state(&self) -> watch::Receiver<Option<Prompt>> {
        self.prompt_tx.subscribe()
    }

    /// Resolves the live passphrase prompt with the user's input.
    /// Ignored (with a warning) if no prompt is waiting.
    pub fn submit_passphrase(&self, passphrase: impl Into<String>) {
        match self.pending.lock().take() {
            Some(tx) => {
                let _ = tx.send(PromptReply::Submitted(passphrase.into()));
            }
            None => warn!("passphrase submitted with no live prompt"),
        }
    }

    /// Dismisses the live passphrase prompt.
    pub fn cancel(&self) {
        match self.pending.lock().take() {
            Some(tx) => {
                let _ = tx.send(PromptReply::Dismissed);
            }
            None => warn!("prompt cancelled with no live prompt"),
        }
    }

    /// Persists the biometric-unlock flag. Enabling assumes the caller
    /// has already bootstrapped enrollment via a `Passphrase` request.
    pub async fn set_biometrics_enabled(&self, enabled: bool) -> CoreResult<()> {
        kv::set(self.kv.as_ref(), KV_BIOMETRICS_ENABLED, &enabled).await?;
        info!(enabled, "biometric unlock flag updated");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // request_access
    // -----------------------------------------------------------------------

    /// Requests secret material, prompting the user as needed.
    ///
    /// `reason` is the human-readable prompt description ("Transfer 5 STRK
    /// to …"). Fails with [`CoreError::Cancelled`] if the user dismisses
    /// the prompt and [`CoreError::AuthenticationFailed`] if the
    /// passphrase doesn't match. Concurrent calls queue FIFO.
    pub async fn request_access(
        &self,
        request: CredentialRequest,
        reason: &str,
    ) -> CoreResult<CredentialResponse> {
        let _turn = self.flight.lock().await;
        debug!(reason, "credential request admitted");

        match request {
            CredentialRequest::Passphrase => {
                let (passphrase, _words) = self.passphrase_challenge(reason).await?;
                Ok(CredentialResponse::Passphrase(passphrase))
            }

            CredentialRequest::SeedPhrase { source } => {
                let words = self.recover_seed(&source, reason).await?;
                Ok(CredentialResponse::SeedPhrase(words))
            }

            CredentialRequest::SigningAndTokenKeys {
                signing_for,
                tokens_for,
            } => {
                // Recover each distinct key source exactly once, in the
                // order the request mentions it.
                let mut seeds: HashMap<KeySourceId, SeedPhrase> = HashMap::new();
                let sources = signing_for
                    .iter()
                    .map(|a| &a.key.source)
                    .chain(tokens_for.keys().map(|a| &a.key.source));
                for source in sources {
                    if !seeds.contains_key(source) {
                        let words = self.recover_seed(source, reason).await?;
                        seeds.insert(source.clone(), words);
                    }
                }

                let mut signing = HashMap::new();
                for account in &signing_for {
                    let words = seeds.get(&account.key.source).ok_or_else(|| {
                        CoreError::KeyNotFound(format!(
                            "no recovered seed for source {:?}",
                            account.key.source
                        ))
                    })?;
                    signing.insert(
                        account.address.clone(),
                        derive::signing_key(words, account.key.index),
                    );
                }

                let mut spending = HashMap::new();
                for (account, tokens) in &tokens_for {
                    let words = seeds.get(&account.key.source).ok_or_else(|| {
                        CoreError::KeyNotFound(format!(
                            "no recovered seed for source {:?}",
                            account.key.source
                        ))
                    })?;
                    for token in tokens {
                        spending.insert(
                            (account.address.clone(), token.id.clone()),
                            derive::spending_key(words, &account.address, token),
                        );
                    }
                }

                // `seeds` (and every SeedPhrase in it) drops here — the
                // decrypted words never outlive the derivation.
                Ok(CredentialResponse::SigningAndTokenKeys { signing, spending })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: recovery paths
    // -----------------------------------------------------------------------

    /// Recovers seed words, preferring the biometric path when enabled
    /// and alive, falling back to a passphrase challenge otherwise.
    async fn recover_seed(&self, source: &KeySourceId, reason: &str) -> CoreResult<SeedPhrase> {
        let biometrics_enabled = kv::get(self.kv.as_ref(), KV_BIOMETRICS_ENABLED)
            .await?
            .unwrap_or(false);

        if biometrics_enabled {
            if self.seed_store.biometrics_available() {
                self.set_prompt(Prompt::Biometrics {
                    reason: reason.to_string(),
                });
                let outcome = {
                    let _guard = PromptGuard { vault: self };
                    self.seed_store.seed_with_biometrics(reason, source).await
                };

                match outcome {
                    Ok(Some(words)) => return Ok(words),
                    Ok(None) => return Err(CoreError::Cancelled),
                    Err(SeedStoreError::BiometricsUnavailable) => {
                        // Hardware vanished mid-flight. Disable durably
                        // before falling back so the dead path is never
                        // retried, not even across restarts.
                        self.disable_biometrics_durably().await?;
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                self.disable_biometrics_durably().await?;
            }
        }

        let (_passphrase, words) = self.passphrase_challenge(reason).await?;
        Ok(words)
    }

    /// Surfaces a passphrase prompt, waits for the UI to resolve it, and
    /// validates the input against the seed store.
    async fn passphrase_challenge(&self, reason: &str) -> CoreResult<(String, SeedPhrase)> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(tx);
        self.set_prompt(Prompt::Passphrase {
            reason: reason.to_string(),
        });

        // A dropped sender (e.g. a second cancel racing the first) reads
        // as a dismissal. The guard clears the prompt on every exit from
        // the await, including this future being dropped mid-flight.
        let reply = {
            let _guard = PromptGuard { vault: self };
            rx.await.unwrap_or(PromptReply::Dismissed)
        };

        match reply {
            PromptReply::Dismissed => Err(CoreError::Cancelled),
            PromptReply::Submitted(passphrase) => {
                match self.seed_store.seed_with_passphrase(&passphrase).await? {
                    Some(words) => Ok((passphrase, words)),
                    None => Err(CoreError::AuthenticationFailed),
                }
            }
        }
    }

    async fn disable_biometrics_durably(&self) -> CoreResult<()> {
        warn!("biometric hardware unavailable; durably disabling biometric unlock");
        kv::set(self.kv.as_ref(), KV_BIOMETRICS_ENABLED, &false).await?;
        Ok(())
    }

    fn set_prompt(&self, prompt: Prompt) {
        self.prompt_tx.send_replace(Some(prompt));
    }

    fn clear_prompt(&self) {
        self.pending.lock().take();
        self.prompt_tx.send_replace(None);
    }
}

/// Clears the vault's prompt state when dropped, so an abandoned request
/// (caller's future dropped while a prompt was live) cannot leave a
/// phantom prompt behind.
struct PromptGuard<'a> {
    vault: &'a CredentialVault,
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        self.vault.clear_prompt();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, Address, KeyInstance};
    use crate::testing::{test_account, test_token, MemoryKv, MockSeedStore, PASSPHRASE};
    use crate::token::Token;

    fn vault_with(store: MockSeedStore) -> (Arc<CredentialVault>, Arc<MemoryKv>) {
        let kv = Arc::new(MemoryKv::new());
        let vault = Arc::new(CredentialVault::new(Arc::new(store), kv.clone()));
        (vault, kv)
    }

    /// Waits until the prompt state becomes `Some`, returning it.
    async fn wait_for_prompt(vault: &CredentialVault) -> Prompt {
        let mut rx = vault.prompt_state();
        loop {
            if let Some(prompt) = rx.borrow_and_update().clone() {
                return prompt;
            }
            rx.changed().await.expect("vault dropped");
        }
    }

    fn prompt_reason(prompt: &Prompt) -> String {
        match prompt {
            Prompt::Passphrase { reason } | Prompt::Biometrics { reason } => reason.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // 1. Passphrase request: happy path
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn passphrase_request_resolves_on_submit() {
        let (vault, _) = vault_with(MockSeedStore::standard());

        let v = Arc::clone(&vault);
        let task = tokio::spawn(async move {
            v.request_access(CredentialRequest::Passphrase, "Enable biometrics")
                .await
        });

        let prompt = wait_for_prompt(&vault).await;
        assert!(matches!(prompt, Prompt::Passphrase { .. }));

        vault.submit_passphrase(PASSPHRASE);
        let response = task.await.unwrap().unwrap();
        assert_eq!(response.into_passphrase().unwrap(), PASSPHRASE);

        // Prompt must be cleared after resolution.
        assert!(vault.prompt_state().borrow().is_none());
    }

    // -----------------------------------------------------------------------
    // 2. Wrong passphrase fails but leaves the vault re-enterable
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn wrong_passphrase_is_retryable() {
        let (vault, _) = vault_with(MockSeedStore::standard());

        let v = Arc::clone(&vault);
        let task = tokio::spawn(async move {
            v.request_access(CredentialRequest::Passphrase, "test").await
        });
        wait_for_prompt(&vault).await;
        vault.submit_passphrase("not the passphrase");

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CoreError::AuthenticationFailed)));
        assert!(vault.prompt_state().borrow().is_none());

        // A fresh, independent request must work.
        let v = Arc::clone(&vault);
        let task = tokio::spawn(async move {
            v.request_access(CredentialRequest::Passphrase, "test").await
        });
        wait_for_prompt(&vault).await;
        vault.submit_passphrase(PASSPHRASE);
        assert!(task.await.unwrap().is_ok());
    }

    // -----------------------------------------------------------------------
    // 3. Cancellation is Cancelled, not an error state
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn dismissal_yields_cancelled() {
        let (vault, _) = vault_with(MockSeedStore::standard());

        let v = Arc::clone(&vault);
        let task = tokio::spawn(async move {
            v.request_access(CredentialRequest::Passphrase, "test").await
        });
        wait_for_prompt(&vault).await;
        vault.cancel();

        let result = task.await.unwrap();
        assert!(matches!(result, Err(CoreError::Cancelled)));
        assert!(result.unwrap_err().is_silent());
        assert!(vault.prompt_state().borrow().is_none());
    }

    #[tokio::test]
    async fn abandoned_request_clears_the_prompt() {
        let (vault, _) = vault_with(MockSeedStore::standard());

        let v = Arc::clone(&vault);
        let task = tokio::spawn(async move {
            v.request_access(CredentialRequest::Passphrase, "test").await
        });
        wait_for_prompt(&vault).await;

        // Drop the requesting future while its prompt is live.
        task.abort();
        let _ = task.await;

        assert!(vault.prompt_state().borrow().is_none());

        // And the vault is re-enterable afterwards.
        let v = Arc::clone(&vault);
        let task = tokio::spawn(async move {
            v.request_access(CredentialRequest::Passphrase, "again").await
        });
        wait_for_prompt(&vault).await;
        vault.submit_passphrase(PASSPHRASE);
        assert!(task.await.unwrap().is_ok());
    }

    // -----------------------------------------------------------------------
    // 4. Concurrent requests queue FIFO instead of clobbering
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn concurrent_requests_queue() {
        let (vault, _) = vault_with(MockSeedStore::standard());

        let v1 = Arc::clone(&vault);
        let first = tokio::spawn(async move {
            v1.request_access(CredentialRequest::Passphrase, "first").await
        });
        let v2 = Arc::clone(&vault);
        let second = tokio::spawn(async move {
            v2.request_access(CredentialRequest::Passphrase, "second").await
        });

        // Serve whichever got in first, then the other. Both must
        // resolve; neither prompt may be lost.
        let served = prompt_reason(&wait_for_prompt(&vault).await);
        vault.submit_passphrase(PASSPHRASE);

        // The first prompt can linger in the watch state until the queued
        // request surfaces its own; submit only once the other request's
        // prompt is live.
        let mut rx = vault.prompt_state();
        loop {
            let live = rx.borrow_and_update().clone();
            if let Some(prompt) = live {
                if prompt_reason(&prompt) != served {
                    break;
                }
            }
            rx.changed().await.expect("vault dropped");
        }
        vault.submit_passphrase(PASSPHRASE);

        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
        assert!(vault.prompt_state().borrow().is_none());
    }

    // -----------------------------------------------------------------------
    // 5. Biometric path: no passphrase prompt involved
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn biometric_unlock_skips_passphrase() {
        let store = MockSeedStore::standard();
        let (vault, kv) = vault_with(store);
        kv::set(kv.as_ref(), KV_BIOMETRICS_ENABLED, &true).await.unwrap();

        let source = MockSeedStore::standard_source();
        let response = vault
            .request_access(CredentialRequest::SeedPhrase { source }, "Reveal seed")
            .await
            .unwrap();

        let words = response.into_seed_phrase().unwrap();
        assert_eq!(words, MockSeedStore::standard_words());
        assert!(vault.prompt_state().borrow().is_none());
    }

    // -----------------------------------------------------------------------
    // 6. Hardware loss durably disables biometrics before falling back
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn hardware_loss_disables_flag_then_falls_back() {
        let store = MockSeedStore::standard().without_biometric_hardware();
        let bio_calls = store.biometric_attempts();
        let (vault, kv) = vault_with(store);
        kv::set(kv.as_ref(), KV_BIOMETRICS_ENABLED, &true).await.unwrap();

        let v = Arc::clone(&vault);
        let source = MockSeedStore::standard_source();
        let task = tokio::spawn(async move {
            v.request_access(CredentialRequest::SeedPhrase { source }, "test")
                .await
        });

        // Falls back to the passphrase challenge.
        let prompt = wait_for_prompt(&vault).await;
        assert!(matches!(prompt, Prompt::Passphrase { .. }));
        vault.submit_passphrase(PASSPHRASE);
        assert!(task.await.unwrap().is_ok());

        // The flag was persisted false *before* the fallback resolved,
        // and the dead path was never attempted.
        let flag = kv::get(kv.as_ref(), KV_BIOMETRICS_ENABLED).await.unwrap();
        assert_eq!(flag, Some(false));
        assert_eq!(bio_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    // -----------------------------------------------------------------------
    // 7. Key derivation: one seed recovery per distinct source
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn key_request_recovers_each_source_once() {
        let store = MockSeedStore::standard();
        let recoveries = store.biometric_attempts();
        let (vault, kv) = vault_with(store);
        kv::set(kv.as_ref(), KV_BIOMETRICS_ENABLED, &true).await.unwrap();

        let a = test_account(0);
        let b = test_account(1);
        let token: Token = test_token("STRK", 1);

        let request = CredentialRequest::SigningAndTokenKeys {
            signing_for: vec![a.clone(), b.clone()],
            tokens_for: HashMap::from([
                (a.clone(), vec![token.clone()]),
                (b.clone(), vec![token.clone()]),
            ]),
        };
        let response = vault.request_access(request, "Unlock").await.unwrap();

        // Both accounts share one seed source: exactly one recovery.
        assert_eq!(recoveries.load(std::sync::atomic::Ordering::SeqCst), 1);

        assert!(response.signing_key(&a.address).is_ok());
        assert!(response.signing_key(&b.address).is_ok());
        assert!(response.spending_key(&a.address, &token.id).is_ok());

        // Distinct accounts get distinct material.
        assert_ne!(
            response.signing_key(&a.address).unwrap(),
            response.signing_key(&b.address).unwrap()
        );

        // Asking for an account the request never named is KeyNotFound.
        let stranger = Address::new("0xstranger");
        assert!(matches!(
            response.signing_key(&stranger),
            Err(CoreError::KeyNotFound(_))
        ));
    }

    // -----------------------------------------------------------------------
    // 8. Accounts from different sources each get their own recovery
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn derivation_is_per_source_not_per_account() {
        let store = MockSeedStore::standard();
        let recoveries = store.biometric_attempts();
        let (vault, kv) = vault_with(store);
        kv::set(kv.as_ref(), KV_BIOMETRICS_ENABLED, &true).await.unwrap();

        // Three accounts, one shared source: still one recovery.
        let accounts: Vec<Account> = (0..3).map(test_account).collect();
        let request = CredentialRequest::SigningAndTokenKeys {
            signing_for: accounts.clone(),
            tokens_for: HashMap::new(),
        };
        vault.request_access(request, "Sign").await.unwrap();
        assert_eq!(recoveries.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Same again: an independent request recovers again (nothing is
        // cached across requests — the vault holds no secrets at rest).
        let request = CredentialRequest::SigningAndTokenKeys {
            signing_for: accounts,
            tokens_for: HashMap::new(),
        };
        vault.request_access(request, "Sign").await.unwrap();
        assert_eq!(recoveries.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    // -----------------------------------------------------------------------
    // 9. Deterministic derivation across unlocks
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn same_request_derives_same_keys() {
        let (vault, kv) = vault_with(MockSeedStore::standard());
        kv::set(kv.as_ref(), KV_BIOMETRICS_ENABLED, &true).await.unwrap();

        let account = test_account(0);
        let token = test_token("STRK", 1);
        let request = || CredentialRequest::SigningAndTokenKeys {
            signing_for: vec![account.clone()],
            tokens_for: HashMap::from([(account.clone(), vec![token.clone()])]),
        };

        let first = vault.request_access(request(), "a").await.unwrap();
        let second = vault.request_access(request(), "b").await.unwrap();

        assert_eq!(
            first.spending_key(&account.address, &token.id).unwrap(),
            second.spending_key(&account.address, &token.id).unwrap()
        );
    }

    // -----------------------------------------------------------------------
    // 10. KeyInstance sanity for fixtures
    // -----------------------------------------------------------------------

    #[test]
    fn fixture_accounts_share_a_source() {
        let a = test_account(0);
        let b = test_account(1);
        assert_eq!(a.key.source, b.key.source);
        assert_ne!(a.address, b.address);
        let _ = KeyInstance {
            source: a.key.source.clone(),
            index: 9,
        };
    }
}
