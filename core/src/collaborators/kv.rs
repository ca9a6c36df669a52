//! Typed access to the external key-value store.
//!
//! The store itself is schemaless strings; [`TypedKey`] pins each entry
//! this crate uses to a concrete type, and the `get`/`set` helpers do the
//! JSON round trip. The complete schema lives in [`crate::config`] — two
//! keys, on purpose. This is a settings-and-small-caches store, not a
//! database.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the key-value store.
#[derive(Debug, Error)]
pub enum KvError {
    /// Backend read/write failure.
    #[error("kv store i/o error: {0}")]
    Io(String),

    /// A stored value failed to decode as its declared type. Either the
    /// schema changed without a migration or something else wrote to our
    /// key.
    #[error("corrupt value under key '{key}': {detail}")]
    Corrupt { key: String, detail: String },
}

// ---------------------------------------------------------------------------
// KvStore
// ---------------------------------------------------------------------------

/// Collaborator trait for the platform key-value store.
///
/// Raw string values; typing is layered on top via [`get`]/[`set`] and
/// [`TypedKey`].
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, KvError>;
    async fn set_raw(&self, key: &str, value: String) -> Result<(), KvError>;
    async fn remove(&self, key: &str) -> Result<(), KvError>;
    async fn clear(&self) -> Result<(), KvError>;
}

// ---------------------------------------------------------------------------
// TypedKey
// ---------------------------------------------------------------------------

/// A key-value entry with a compile-time value type.
///
/// `PhantomData<fn() -> T>` rather than `PhantomData<T>` so the key is
/// `Send + Sync + Copy` regardless of `T`.
pub struct TypedKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for TypedKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedKey<T> {}

/// Reads and decodes a typed entry. `Ok(None)` when the key is absent.
pub async fn get<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: TypedKey<T>,
) -> Result<Option<T>, KvError> {
    match store.get_raw(key.name()).await? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| KvError::Corrupt {
                key: key.name().to_string(),
                detail: e.to_string(),
            }),
    }
}

/// Encodes and writes a typed entry.
pub async fn set<T: Serialize>(
    store: &dyn KvStore,
    key: TypedKey<T>,
    value: &T,
) -> Result<(), KvError> {
    let raw = serde_json::to_string(value).map_err(|e| KvError::Corrupt {
        key: key.name().to_string(),
        detail: e.to_string(),
    })?;
    store.set_raw(key.name(), raw).await
}
