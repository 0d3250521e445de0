use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single point of a coin's price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// One entry of the provider's coin catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinListing {
    /// Provider id used for price lookups (e.g. "bitcoin")
    pub id: String,

    /// Ticker, as returned by the provider (e.g. "btc")
    pub symbol: String,

    /// Human-readable name (e.g. "Bitcoin")
    pub name: String,
}

impl CoinListing {
    /// Selection label shown to the user, e.g. "Bitcoin (BTC)".
    /// Also used as the stored `asset_name` of a transaction.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.symbol.to_uppercase())
    }

    /// Case-insensitive match against id, symbol or name.
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        q.is_empty()
            || self.id.to_lowercase().contains(&q)
            || self.symbol.to_lowercase().contains(&q)
            || self.name.to_lowercase().contains(&q)
    }
}

/// Last observed unit price per asset symbol.
///
/// Lives for the lifetime of the process only; it is rebuilt from scratch on
/// restart and never written to the record store.
#[derive(Debug, Clone, Default)]
pub struct PriceCache {
    entries: HashMap<String, f64>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.entries.get(symbol).copied()
    }

    pub fn set(&mut self, symbol: &str, price: f64) {
        self.entries.insert(symbol.to_string(), price);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
