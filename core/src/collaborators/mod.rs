//! # External Collaborator Seams
//!
//! Everything the wallet core talks to but does not own, specified as
//! trait boundaries. Transport, persistence, and cryptography are the
//! collaborator's problem — this keeps the core testable without spinning
//! up a node, a secure enclave, or a proving system.
//!
//! ```text
//! seed_store.rs — encrypted-at-rest seed phrase vault (enclave/keystore)
//! kv.rs         — small typed key-value store (settings + durable caches)
//! chain.rs      — ledger RPC/WS client (calls, submission, events)
//! pool.rs       — privacy-pool SDK (decryption + signable calldata)
//! notify.rs     — non-blocking notification sink for the UI
//! prices.rs     — token quote feed
//! ```
//!
//! No wire format is owned here; every binary/serialization format
//! belongs to the implementation behind the trait.

pub mod chain;
pub mod kv;
pub mod notify;
pub mod pool;
pub mod prices;
pub mod seed_store;

pub use chain::{Calldata, ChainClient, ChainError, ChainEvent, SignedCall};
pub use kv::{KvError, KvStore, TypedKey};
pub use notify::{Notice, NotificationSink, Severity};
pub use pool::{PoolError, PoolState, PrivacyPool};
pub use prices::{PriceError, PriceFeed};
pub use seed_store::{SeedPhrase, SeedStore, SeedStoreError};
