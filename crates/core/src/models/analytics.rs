use serde::{Deserialize, Serialize};

use super::transaction::Transaction;

/// Figures for a single transaction at the current price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetrics {
    /// Price used for the figures, `None` when unavailable
    pub current_price: Option<f64>,

    /// `invested_cash + profit_loss`
    pub current_value: Option<f64>,

    /// `(current_price - purchase_price) * quantity`
    pub profit_loss: Option<f64>,

    /// Profit/loss as a percentage of invested cash
    pub yield_pct: Option<f64>,
}

/// Per-asset breakdown: all transactions of one asset summed together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    /// Display name of the asset
    pub asset_name: String,

    /// Price lookup key of the asset
    pub asset_symbol: String,

    /// Number of transactions for this asset
    pub transaction_count: usize,

    /// Total units held
    pub quantity: f64,

    /// Sum of invested cash
    pub invested: f64,

    /// Sum of per-transaction profit/loss
    pub profit_loss: f64,

    /// `profit_loss * 100 / invested`, computed from the sums
    pub yield_pct: Option<f64>,

    /// `invested + profit_loss`
    pub current_value: f64,

    /// False when the asset's price was unavailable
    pub priced: bool,
}

/// Portfolio-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub transaction_count: usize,
    pub total_invested: f64,
    pub total_profit_loss: f64,
    pub total_yield: Option<f64>,

    /// `total_invested + total_profit_loss`
    pub current_value: f64,

    /// Symbols that had no price (their profit/loss counts as zero)
    pub unpriced_symbols: Vec<String>,
}

/// One transaction paired with its computed figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub transaction: Transaction,
    pub metrics: TransactionMetrics,
}

/// Everything a front end needs to draw one refresh of the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioView {
    pub rows: Vec<TransactionRow>,
    pub assets: Vec<AssetSummary>,
    pub summary: PortfolioSummary,
}
