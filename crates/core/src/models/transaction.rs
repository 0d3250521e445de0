use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Text format of the `date` column (minute precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// A single buy of a crypto asset, as persisted in the record store.
///
/// `invested_cash` is stored redundantly and must always equal
/// `quantity * purchase_price`. The `last_*` fields are a snapshot taken at
/// the last refresh and are never used for displayed figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Store-assigned identifier
    pub id: i64,

    /// When the purchase happened (user supplied, editable)
    pub timestamp: NaiveDateTime,

    /// Display name, e.g. "Bitcoin (BTC)"
    pub asset_name: String,

    /// Price provider lookup key, e.g. "bitcoin"
    pub asset_symbol: String,

    /// Units bought (> 0)
    pub quantity: f64,

    /// Unit price paid (>= 0)
    pub purchase_price: f64,

    /// `quantity * purchase_price` at the time of the last write
    pub invested_cash: f64,

    /// Unit price seen at the last refresh
    pub last_price: Option<f64>,

    /// Profit/loss computed at the last refresh
    pub last_profit_loss: Option<f64>,
}

/// An unsaved transaction, passed to `TransactionStore::create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub timestamp: NaiveDateTime,
    pub asset_name: String,
    pub asset_symbol: String,
    pub quantity: f64,
    pub purchase_price: f64,
    pub invested_cash: f64,
    pub last_price: Option<f64>,
    pub last_profit_loss: Option<f64>,
}

impl NewTransaction {
    /// Build a transaction from quantity and price; `invested_cash` is derived.
    pub fn new(
        timestamp: NaiveDateTime,
        asset_name: impl Into<String>,
        asset_symbol: impl Into<String>,
        quantity: f64,
        purchase_price: f64,
    ) -> Self {
        Self {
            timestamp,
            asset_name: asset_name.into(),
            asset_symbol: asset_symbol.into(),
            quantity,
            purchase_price,
            invested_cash: quantity * purchase_price,
            last_price: None,
            last_profit_loss: None,
        }
    }
}

/// How the user entered the size of a buy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransactionInput {
    /// Number of units bought; invested cash is derived
    Quantity(f64),
    /// Cash spent; quantity is derived from the purchase price
    Investment(f64),
}

/// Partial update applied by `TransactionStore::update`.
///
/// Only `Some` fields are written. Asset name and symbol are not editable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionUpdate {
    pub timestamp: Option<NaiveDateTime>,
    pub quantity: Option<f64>,
    pub purchase_price: Option<f64>,
    pub invested_cash: Option<f64>,
    pub last_price: Option<f64>,
    pub last_profit_loss: Option<f64>,
}

impl TransactionUpdate {
    /// Returns `true` when no field would be written.
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none()
            && self.quantity.is_none()
            && self.purchase_price.is_none()
            && self.invested_cash.is_none()
            && self.last_price.is_none()
            && self.last_profit_loss.is_none()
    }

    /// Snapshot-only update written after a price refresh.
    pub fn snapshot(last_price: f64, last_profit_loss: f64) -> Self {
        Self {
            last_price: Some(last_price),
            last_profit_loss: Some(last_profit_loss),
            ..Self::default()
        }
    }
}

/// A user edit of an existing transaction, validated by the tracker
/// before it becomes a `TransactionUpdate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionEdit {
    pub timestamp: Option<NaiveDateTime>,
    pub quantity: Option<f64>,
    pub purchase_price: Option<f64>,
    pub invested_cash: Option<f64>,
}

/// Format a timestamp the way the `date` column stores it.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored or user-entered timestamp.
///
/// Accepts `YYYY-MM-DD HH:MM`, `YYYY-MM-DD HH:MM:SS` and a bare date
/// (midnight).
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, CoreError> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| {
            CoreError::ValidationError(format!(
                "Invalid timestamp '{raw}': expected YYYY-MM-DD HH:MM"
            ))
        })
}
