//! # Token Definitions & Network Configuration
//!
//! A [`Token`] pairs a public fungible-token contract with its
//! privacy-pool counterpart. Token IDs are deterministic SHA-256 hashes
//! of the two contract addresses — the same pair always gets the same ID,
//! no registry needed, no coordination required.
//!
//! Which tokens exist on which network is configuration, assembled once at
//! wallet construction into a [`NetworkTokens`] table. It is never derived
//! at runtime: the ledger only ever watches contracts it was configured
//! with.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use crate::account::Address;

// ---------------------------------------------------------------------------
// NetworkId
// ---------------------------------------------------------------------------

/// Identifies a ledger network (chain). Compared case-insensitively via
/// the same lowercase normalization as addresses.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(String);

impl NetworkId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().to_lowercase())
    }

    /// Mainnet — the real deal. Mistakes here cost real money.
    pub fn mainnet() -> Self {
        Self::new("umbra-mainnet")
    }

    /// Testnet — where we break things on purpose and call it "testing."
    pub fn testnet() -> Self {
        Self::new("umbra-testnet")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetworkId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// A unique, content-addressed identifier for a token.
///
/// Computed as `SHA-256(contract || 0x00 || pool_contract)`, hex-encoded.
/// The separator byte prevents ambiguity when one address's suffix matches
/// another's prefix.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(String);

impl TokenId {
    /// Derives a `TokenId` from the token's canonical contract pair.
    pub fn derive(contract: &Address, pool_contract: &Address) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(contract.as_str().as_bytes());
        hasher.update([0x00]);
        hasher.update(pool_contract.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({}…)", &self.0[..12.min(self.0.len())])
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// A fungible asset the wallet knows how to hold: its public contract, the
/// matching privacy-pool contract, and display metadata.
///
/// `price` is the only field that changes after construction, and only the
/// ledger's price loop rewrites it — balance amounts are never touched by
/// a price refresh. All amounts elsewhere in the crate are `u128` in
/// smallest units; `decimals` is for display only, the core never divides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    /// The public fungible-token contract.
    pub contract: Address,
    /// The privacy-pool contract shielding this token.
    pub pool_contract: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Latest quote in the user's display currency, if one has been
    /// fetched. Refreshed by the ledger's price loop, independent of
    /// balance amounts.
    pub price: Option<f64>,
}

impl Token {
    pub fn new(
        contract: Address,
        pool_contract: Address,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Self {
        Self {
            id: TokenId::derive(&contract, &pool_contract),
            contract,
            pool_contract,
            symbol: symbol.into(),
            decimals,
            price: None,
        }
    }

    /// Returns a copy with the price replaced. Everything else — contracts,
    /// id, decimals — is untouched.
    pub fn with_price(&self, price: f64) -> Self {
        Self {
            price: Some(price),
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// NetworkTokens
// ---------------------------------------------------------------------------

/// The network → token-set mapping. Built once at construction and handed
/// to the ledger; switching networks selects a row out of this table.
#[derive(Clone, Debug, Default)]
pub struct NetworkTokens {
    networks: HashMap<NetworkId, Vec<Token>>,
}

impl NetworkTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the token set for a network. Builder-style.
    pub fn with_network(mut self, network: NetworkId, tokens: Vec<Token>) -> Self {
        self.networks.insert(network, tokens);
        self
    }

    /// Tokens configured for the given network. Unknown networks have an
    /// empty token set rather than being an error — the ledger just has
    /// nothing to watch there.
    pub fn tokens_for(&self, network: &NetworkId) -> &[Token] {
        self.networks
            .get(network)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Looks up a configured token by id on the given network.
    pub fn token(&self, network: &NetworkId, id: &TokenId) -> Option<&Token> {
        self.tokens_for(network).iter().find(|t| &t.id == id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
