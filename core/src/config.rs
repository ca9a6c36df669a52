//! # Core Configuration & Constants
//!
//! Every magic number in the wallet core lives here. If you're hardcoding
//! a constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! Timing values were tuned against real devnet event bursts: a privacy
//! pool transfer emits two to four events inside ~200ms, so the debounce
//! window has to be comfortably wider than that but short enough that the
//! balance view doesn't feel laggy.

use std::collections::HashMap;
use std::time::Duration;

use crate::account::{Address, ClassHash};
use crate::collaborators::kv::TypedKey;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Fixed delay after the first chain event in a burst during which further
/// events are coalesced into a single batched balance refresh.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// How often the price loop re-fetches quotes for every configured token
/// on the active network. Prices are display data — a minute of staleness
/// is invisible, a request per event would hammer the quote service.
pub const PRICE_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Key-Value Store Schema
// ---------------------------------------------------------------------------
//
// The external key-value store is schemaless bytes; these typed keys are
// the complete set of entries this crate reads or writes. Values are JSON.

/// Whether biometric unlock is enabled on this device. The vault flips
/// this to `false` durably when biometric hardware disappears, so a dead
/// path is never retried across restarts.
pub const KV_BIOMETRICS_ENABLED: TypedKey<bool> = TypedKey::new("device.biometrics.enabled");

/// Class hashes of accounts whose deployment has been confirmed on-chain.
/// A cache hit here short-circuits the deployment check without any RPC.
pub const KV_CLASS_HASHES: TypedKey<HashMap<Address, ClassHash>> =
    TypedKey::new("accounts.class_hashes");

// ---------------------------------------------------------------------------
// Event Keys
// ---------------------------------------------------------------------------

/// Event key watched on each token's public contract.
pub const PUBLIC_TRANSFER_EVENT: &str = "Transfer";

/// Selector for the public balance query on a token contract.
pub const PUBLIC_BALANCE_SELECTOR: &str = "balance_of";

/// Event keys watched on each token's privacy-pool contract.
pub const POOL_EVENTS: [&str; 3] = ["Fund", "Transfer", "Withdraw"];
