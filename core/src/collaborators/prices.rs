//! The token quote feed.
//!
//! Supplies display-currency prices for the ledger's price loop. Quotes
//! are best-effort: a failed fetch keeps the previous prices and the loop
//! tries again next interval.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::token::{NetworkId, Token, TokenId};

/// Errors surfaced by the quote feed.
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("price feed unavailable: {0}")]
    Unavailable(String),
}

/// Collaborator trait for the price-quote service.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Current quotes for the given tokens. Tokens missing from the
    /// returned map simply keep their previous price.
    async fn prices(
        &self,
        network: &NetworkId,
        tokens: &[Token],
    ) -> Result<HashMap<TokenId, f64>, PriceError>;
}
