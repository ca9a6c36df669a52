//! # Credential Vault — Gated Access to Secret Material
//!
//! Nothing in the wallet derives or holds raw secrets on its own;
//! everything goes through [`CredentialVault::request_access`]. The vault
//! decides how to satisfy a request — biometric unlock when it's enabled
//! and the hardware is alive, a passphrase challenge otherwise — recovers
//! the seed phrase from the platform store, derives exactly the material
//! asked for, and lets the words drop before returning.
//!
//! ## Architecture
//!
//! ```text
//! request.rs — the closed request/response schema
//! derive.rs  — deterministic key derivation from recovered seed words
//! vault.rs   — the vault itself: prompt lifecycle, FIFO single-flight
//! ```
//!
//! ## Prompt lifecycle
//!
//! At most one prompt is ever live. Concurrent `request_access` calls are
//! serialized FIFO — the second caller waits its turn rather than
//! clobbering the first caller's pending prompt. Every exit path, success
//! or not, clears the prompt state; a stuck prompt is a correctness bug.

pub mod derive;
pub mod request;

mod vault;

pub use request::{CredentialRequest, CredentialResponse, Prompt};
pub use vault::CredentialVault;
