// Copyright (c) 2026 Umbra Labs. MIT License.
// See LICENSE for details.

//! # Umbra Wallet Core
//!
//! The trust and state orchestration layer of the Umbra privacy wallet.
//! Everything that touches secret material, cached balances, or in-flight
//! transactions goes through this crate. Everything that renders pixels,
//! encrypts seed phrases at rest, generates zero-knowledge proofs, or talks
//! raw RPC lives on the other side of a collaborator trait.
//!
//! ## Architecture
//!
//! Three components, in dependency order:
//!
//! - **vault** — the credential vault. Brokers one-at-a-time access to
//!   secret material (passphrase, seed words, derived keys), gated by a
//!   biometric check or a passphrase challenge. Nobody else derives keys.
//! - **ledger** — the balance ledger. A dual cache of public and
//!   privacy-pool balances per account, converged lazily against chain
//!   events through a debounced batch refresher, plus a price loop.
//! - **tracker** — the transaction tracker. Submits signed operations,
//!   keeps an insertion-ordered pending stack, and runs the
//!   account-deployment state machine.
//!
//! Supporting modules: **account**/**token**/**balance** (the value-object
//! vocabulary), **collaborators** (the external seams), **tasks** (a
//! supervised set of background task handles), **config** (every magic
//! number), **error** (the crate-wide failure taxonomy).
//!
//! ## Design Philosophy
//!
//! 1. Decrypted secrets never outlive their authorized scope.
//! 2. A stale cached balance beats a thrown error.
//! 3. Ambiguity is never resolved optimistically — an unknown deploy
//!    status blocks deployment until a fresh check settles it.
//! 4. If it touches money, it has tests. Plural.

pub mod account;
pub mod balance;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod ledger;
pub mod tasks;
pub mod token;
pub mod tracker;
pub mod vault;

#[cfg(test)]
pub(crate) mod testing;
