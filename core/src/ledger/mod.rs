//! # Balance Ledger — Eventually-Consistent Dual Balance Cache
//!
//! The ledger owns the wallet's view of balances: the public side read
//! off token contracts, and the privacy-pool side decrypted through
//! cached spending keys while an account is unlocked. The chain is
//! authoritative; the ledger converges on it lazily:
//!
//! - chain events are correlated to watched accounts and coalesced by a
//!   debounce window into batched refreshes;
//! - `request_refresh` forces the question for specific accounts;
//! - a price loop rewrites quote metadata on a fixed interval without
//!   ever touching amounts.
//!
//! ## Architecture
//!
//! ```text
//! events.rs — event-to-account correlation tables
//! ledger.rs — the ledger: state block, refresh batches, background tasks
//! ```
//!
//! Locking is the ledger's one secret-adjacent duty: unlocking derives
//! spending keys through the vault and caches them here; locking drops
//! them synchronously and withdraws the decrypted amounts from the
//! cache in the same breath.

pub mod events;

mod ledger;

pub use ledger::BalanceLedger;
