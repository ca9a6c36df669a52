//! # Transaction Tracker — Submission, Confirmation, Deployment
//!
//! The tracker is the only component that submits anything to the chain.
//! It owns two pieces of mutable state: the insertion-ordered stack of
//! in-flight operations, and the per-address deploy-status machine with
//! its persisted class-hash cache.
//!
//! ## Architecture
//!
//! ```text
//! pending.rs — PendingOperation and the pending stack
//! deploy.rs  — the deploy-status state machine + class-hash cache
//! tracker.rs — the operation methods and confirmation awaiters
//! ```
//!
//! Confirmation is asynchronous by design: operation methods return the
//! accepted transaction hash immediately, and a supervised awaiter per
//! entry reconciles the outcome later. The balance ledger hears about
//! settled operations the same way it hears about everything else — as
//! chain events.

pub mod deploy;
pub mod pending;

mod tracker;

pub use deploy::{DeployStatus, DeployTracker};
pub use pending::{OperationKind, PendingOperation, PendingStack};
pub use tracker::TransactionTracker;
