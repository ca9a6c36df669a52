//! Shared test doubles and fixtures.
//!
//! Every collaborator trait gets an in-memory implementation here, with
//! just enough knobs to script the scenarios the tests need. Compiled
//! only under `cfg(test)`.

use async_trait::async_trait;
use futures::stream::BoxStream;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::account::{Account, Address, ClassHash, KeyInstance, KeySourceId, TxHash};
use crate::collaborators::chain::{Calldata, ChainClient, ChainError, ChainEvent, SignedCall};
use crate::collaborators::kv::{KvError, KvStore};
use crate::collaborators::notify::{NotificationSink, Notice};
use crate::collaborators::pool::{PoolError, PoolState, PrivacyPool};
use crate::collaborators::prices::{PriceError, PriceFeed};
use crate::collaborators::seed_store::{SeedPhrase, SeedStore, SeedStoreError};
use crate::token::{NetworkId, Token, TokenId};
use crate::vault::derive::SpendingKey;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// The passphrase [`MockSeedStore::standard`] accepts.
pub const PASSPHRASE: &str = "correct horse battery staple";

const STANDARD_WORDS: [&str; 12] = [
    "abandon", "ability", "able", "about", "above", "absent", "absorb", "abstract", "absurd",
    "abuse", "access", "accident",
];

/// A deterministic account at derivation `index`, backed by the standard
/// mock seed source.
pub fn test_account(index: u32) -> Account {
    Account::new(
        Address::new(format!("0xacc{index:02x}")),
        format!("Account {index}"),
        KeyInstance {
            source: MockSeedStore::standard_source(),
            index,
        },
    )
}

/// A deterministic token whose contract pair is derived from `index`.
pub fn test_token(symbol: &str, index: u32) -> Token {
    Token::new(
        Address::new(format!("0xerc{index:02x}")),
        Address::new(format!("0xpool{index:02x}")),
        symbol,
        18,
    )
}

// ---------------------------------------------------------------------------
// MemoryKv
// ---------------------------------------------------------------------------

/// In-memory key-value store.
#[derive(Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, KvError> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: String) -> Result<(), KvError> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), KvError> {
        self.entries.write().clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSeedStore
// ---------------------------------------------------------------------------

/// Scriptable seed store. The standard instance holds one enrolled seed
/// phrase, accepts [`PASSPHRASE`], and has working biometric hardware.
pub struct MockSeedStore {
    words: SeedPhrase,
    hardware_present: bool,
    /// Counts `seed_with_biometrics` calls.
    biometric_attempts: Arc<AtomicUsize>,
}

impl MockSeedStore {
    pub fn standard() -> Self {
        Self {
            words: Self::standard_words(),
            hardware_present: true,
            biometric_attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Same store, but `biometrics_available` reports `false`.
    pub fn without_biometric_hardware(mut self) -> Self {
        self.hardware_present = false;
        self
    }

    pub fn standard_words() -> SeedPhrase {
        SeedPhrase::new(STANDARD_WORDS.iter().map(|w| w.to_string()).collect())
    }

    /// The key source id of the standard seed phrase.
    pub fn standard_source() -> KeySourceId {
        KeySourceId::from_seed_words(&STANDARD_WORDS)
    }

    /// Handle on the biometric-attempt counter, valid after the store has
    /// been moved into a vault.
    pub fn biometric_attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.biometric_attempts)
    }
}

#[async_trait]
impl SeedStore for MockSeedStore {
    async fn setup(
        &self,
        _passphrase: &str,
        _words: &SeedPhrase,
        _source: &KeySourceId,
    ) -> Result<(), SeedStoreError> {
        Ok(())
    }

    async fn seed_with_passphrase(
        &self,
        passphrase: &str,
    ) -> Result<Option<SeedPhrase>, SeedStoreError> {
        if passphrase == PASSPHRASE {
            Ok(Some(self.words.clone()))
        } else {
            Ok(None)
        }
    }

    async fn seed_with_biometrics(
        &self,
        _prompt: &str,
        _source: &KeySourceId,
    ) -> Result<Option<SeedPhrase>, SeedStoreError> {
        self.biometric_attempts.fetch_add(1, Ordering::SeqCst);
        if self.hardware_present {
            Ok(Some(self.words.clone()))
        } else {
            Err(SeedStoreError::BiometricsUnavailable)
        }
    }

    fn biometrics_available(&self) -> bool {
        self.hardware_present
    }

    async fn reset(&self, _sources: &[KeySourceId]) -> Result<(), SeedStoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockChain
// ---------------------------------------------------------------------------

/// What `class_hash_at` should answer for one address.
#[derive(Clone)]
pub enum ClassHashAnswer {
    Deployed(ClassHash),
    NotFound,
    RpcError,
}

/// What `wait_for_transaction` should do for one tx.
#[derive(Clone)]
pub enum ConfirmAnswer {
    Confirm,
    Reject(String),
    /// Never resolves. The test drives whatever was waiting by aborting
    /// or dropping it.
    Hang,
}

/// Scriptable chain client: per-address class-hash answers, per-tx
/// confirmation outcomes, a broadcast bus for events, and counters.
pub struct MockChain {
    class_hashes: Mutex<HashMap<Address, ClassHashAnswer>>,
    class_hash_calls: AtomicUsize,
    contract_calls: AtomicUsize,
    public_balances: RwLock<HashMap<(Address, Address), u128>>,
    failing_contracts: RwLock<std::collections::HashSet<Address>>,
    confirmations: Mutex<HashMap<TxHash, ConfirmAnswer>>,
    submitted: Mutex<Vec<SignedCall>>,
    events: broadcast::Sender<ChainEvent>,
}

impl Default for MockChain {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            class_hashes: Mutex::new(HashMap::new()),
            class_hash_calls: AtomicUsize::new(0),
            contract_calls: AtomicUsize::new(0),
            public_balances: RwLock::new(HashMap::new()),
            failing_contracts: RwLock::new(std::collections::HashSet::new()),
            confirmations: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            events,
        }
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_class_hash(&self, address: Address, answer: ClassHashAnswer) {
        self.class_hashes.lock().insert(address, answer);
    }

    /// How many times `class_hash_at` has been called.
    pub fn class_hash_calls(&self) -> usize {
        self.class_hash_calls.load(Ordering::SeqCst)
    }

    /// How many times `call_contract` has been called.
    pub fn contract_calls(&self) -> usize {
        self.contract_calls.load(Ordering::SeqCst)
    }

    /// Sets the public balance returned for `(token_contract, account)`.
    pub fn set_public_balance(&self, contract: Address, account: Address, amount: u128) {
        self.public_balances.write().insert((contract, account), amount);
    }

    /// Makes every `call_contract` against `contract` fail with an RPC
    /// error.
    pub fn fail_calls_to(&self, contract: Address) {
        self.failing_contracts.write().insert(contract);
    }

    pub fn set_confirmation(&self, tx: TxHash, answer: ConfirmAnswer) {
        self.confirmations.lock().insert(tx, answer);
    }

    /// Everything passed to `submit`, in order.
    pub fn submitted(&self) -> Vec<SignedCall> {
        self.submitted.lock().clone()
    }

    /// Pushes an event onto the bus. Dropped silently if nothing is
    /// subscribed yet.
    pub fn emit(&self, event: ChainEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn call_contract(
        &self,
        to: &Address,
        _selector: &str,
        args: &[String],
    ) -> Result<Vec<String>, ChainError> {
        self.contract_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_contracts.read().contains(to) {
            return Err(ChainError::Rpc("injected rpc failure".into()));
        }
        let account = Address::new(args.first().cloned().unwrap_or_default());
        let amount = self
            .public_balances
            .read()
            .get(&(to.clone(), account))
            .copied()
            .unwrap_or(0);
        Ok(vec![amount.to_string()])
    }

    async fn class_hash_at(&self, address: &Address) -> Result<ClassHash, ChainError> {
        self.class_hash_calls.fetch_add(1, Ordering::SeqCst);
        let answer = self
            .class_hashes
            .lock()
            .get(address)
            .cloned()
            .unwrap_or(ClassHashAnswer::NotFound);
        match answer {
            ClassHashAnswer::Deployed(hash) => Ok(hash),
            ClassHashAnswer::NotFound => Err(ChainError::ContractNotFound(address.clone())),
            ClassHashAnswer::RpcError => Err(ChainError::Rpc("injected rpc failure".into())),
        }
    }

    async fn submit(&self, call: SignedCall) -> Result<TxHash, ChainError> {
        let mut submitted = self.submitted.lock();
        let tx = TxHash::new(format!("0xtx{:02x}", submitted.len()));
        submitted.push(call);
        Ok(tx)
    }

    async fn wait_for_transaction(&self, tx: &TxHash) -> Result<(), ChainError> {
        let answer = self
            .confirmations
            .lock()
            .get(tx)
            .cloned()
            .unwrap_or(ConfirmAnswer::Confirm);
        match answer {
            ConfirmAnswer::Confirm => Ok(()),
            ConfirmAnswer::Reject(reason) => Err(ChainError::Rejected(tx.clone(), reason)),
            ConfirmAnswer::Hang => futures::future::pending().await,
        }
    }

    fn subscribe_events(&self, contract: &Address, keys: &[&str]) -> BoxStream<'static, ChainEvent> {
        let rx = self.events.subscribe();
        let contract = contract.clone();
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        Box::pin(futures::stream::unfold(rx, move |mut rx| {
            let contract = contract.clone();
            let keys = keys.clone();
            async move {
                loop {
                    match rx.recv().await {
                        Ok(event)
                            if event.contract == contract
                                && event.keys.iter().any(|k| keys.contains(k)) =>
                        {
                            return Some((event, rx));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        }))
    }
}

// ---------------------------------------------------------------------------
// MockPool
// ---------------------------------------------------------------------------

/// Scriptable privacy-pool SDK. Shielded state is keyed by
/// `(spending key, pool contract)`; unset pairs decrypt to all zeros with
/// a unit rate. `state` reads can be parked behind a gate to script
/// in-flight fetches.
#[derive(Default)]
pub struct MockPool {
    states: RwLock<HashMap<(SpendingKey, Address), PoolState>>,
    state_calls: AtomicUsize,
    gate: Mutex<Option<Arc<tokio::sync::Semaphore>>>,
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, key: SpendingKey, pool: Address, state: PoolState) {
        self.states.write().insert((key, pool), state);
    }

    /// How many times `state` has been entered, parked calls included.
    pub fn state_calls(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    /// Parks subsequent `state` calls until [`release_state_reads`](Self::release_state_reads).
    pub fn hold_state_reads(&self) {
        *self.gate.lock() = Some(Arc::new(tokio::sync::Semaphore::new(0)));
    }

    /// Releases every parked and future `state` call.
    pub fn release_state_reads(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(1024);
        }
    }
}

#[async_trait]
impl PrivacyPool for MockPool {
    async fn state(&self, key: &SpendingKey, pool: &Address) -> Result<PoolState, PoolError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }
        Ok(self
            .states
            .read()
            .get(&(key.clone(), pool.clone()))
            .copied()
            .unwrap_or(PoolState {
                balance: 0,
                pending: 0,
                rate: 1,
            }))
    }

    fn pool_address(&self, key: &SpendingKey, pool: &Address) -> Address {
        Address::new(format!(
            "0xshield{}{}",
            hex::encode(&key.as_bytes()[..4]),
            &pool.as_str()[2..]
        ))
    }

    async fn fund(
        &self,
        _key: &SpendingKey,
        pool: &Address,
        from: &Address,
        amount: u128,
    ) -> Result<Vec<Calldata>, PoolError> {
        Ok(vec![Calldata::new(
            pool.clone(),
            "fund",
            vec![from.as_str().to_string(), amount.to_string()],
        )])
    }

    async fn transfer(
        &self,
        _key: &SpendingKey,
        pool: &Address,
        to_pool_address: &Address,
        amount: u128,
    ) -> Result<Vec<Calldata>, PoolError> {
        Ok(vec![Calldata::new(
            pool.clone(),
            "transfer",
            vec![to_pool_address.as_str().to_string(), amount.to_string()],
        )])
    }

    async fn withdraw(
        &self,
        _key: &SpendingKey,
        pool: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<Vec<Calldata>, PoolError> {
        Ok(vec![Calldata::new(
            pool.clone(),
            "withdraw",
            vec![to.as_str().to_string(), amount.to_string()],
        )])
    }

    async fn rollover(&self, _key: &SpendingKey, pool: &Address) -> Result<Vec<Calldata>, PoolError> {
        Ok(vec![Calldata::new(pool.clone(), "rollover", vec![])])
    }
}

// ---------------------------------------------------------------------------
// StaticPrices
// ---------------------------------------------------------------------------

/// Price feed answering from a fixed table. Missing tokens are simply
/// absent from the response, and the feed can be switched to fail.
#[derive(Default)]
pub struct StaticPrices {
    quotes: RwLock<HashMap<TokenId, f64>>,
    failing: std::sync::atomic::AtomicBool,
}

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, token: TokenId, price: f64) {
        self.quotes.write().insert(token, price);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceFeed for StaticPrices {
    async fn prices(
        &self,
        _network: &NetworkId,
        tokens: &[Token],
    ) -> Result<HashMap<TokenId, f64>, PriceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PriceError::Unavailable("injected outage".into()));
        }
        let quotes = self.quotes.read();
        Ok(tokens
            .iter()
            .filter_map(|t| quotes.get(&t.id).map(|p| (t.id.clone(), *p)))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Notification sink that records everything it is told.
#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
