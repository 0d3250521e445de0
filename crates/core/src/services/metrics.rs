//! Financial arithmetic over transactions.
//!
//! Pure functions, no I/O. Prices are supplied by the caller through a
//! lookup closure keyed by asset symbol.

use std::collections::HashMap;

use crate::models::analytics::{AssetSummary, PortfolioSummary, TransactionMetrics};
use crate::models::transaction::Transaction;

/// `(current_price - purchase_price) * quantity`. No validation of inputs.
pub fn profit_loss(quantity: f64, purchase_price: f64, current_price: f64) -> f64 {
    (current_price - purchase_price) * quantity
}

/// Units bought for `total_investment` at `purchase_price`.
/// Returns `0.0` when the price is zero or negative.
pub fn quantity_from_investment(total_investment: f64, purchase_price: f64) -> f64 {
    if purchase_price > 0.0 {
        total_investment / purchase_price
    } else {
        0.0
    }
}

/// Cash needed to buy `quantity` units at `purchase_price`.
pub fn investment_from_quantity(quantity: f64, purchase_price: f64) -> f64 {
    quantity * purchase_price
}

/// Profit/loss as a percentage of invested cash.
/// `None` when nothing was invested.
pub fn percentage_yield(profit_loss: f64, invested_cash: f64) -> Option<f64> {
    if invested_cash == 0.0 {
        None
    } else {
        Some(profit_loss * 100.0 / invested_cash)
    }
}

/// Figures for one transaction. All `None` when the price is unavailable.
pub fn transaction_metrics(tx: &Transaction, current_price: Option<f64>) -> TransactionMetrics {
    match current_price {
        Some(price) => {
            let pl = profit_loss(tx.quantity, tx.purchase_price, price);
            TransactionMetrics {
                current_price: Some(price),
                current_value: Some(tx.invested_cash + pl),
                profit_loss: Some(pl),
                yield_pct: percentage_yield(pl, tx.invested_cash),
            }
        }
        None => TransactionMetrics {
            current_price: None,
            current_value: None,
            profit_loss: None,
            yield_pct: None,
        },
    }
}

/// Group transactions by asset symbol and sum invested cash and profit/loss.
///
/// Yield is derived from the sums, not averaged over transactions, so larger
/// buys weigh more. Assets appear in order of first occurrence. A transaction
/// without a price adds its invested cash and zero profit/loss, and marks the
/// asset as not priced.
pub fn aggregate_by_asset<F>(transactions: &[Transaction], price_lookup: F) -> Vec<AssetSummary>
where
    F: Fn(&str) -> Option<f64>,
{
    let mut order: Vec<AssetSummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for tx in transactions {
        let idx = *index.entry(tx.asset_symbol.as_str()).or_insert_with(|| {
            order.push(AssetSummary {
                asset_name: tx.asset_name.clone(),
                asset_symbol: tx.asset_symbol.clone(),
                transaction_count: 0,
                quantity: 0.0,
                invested: 0.0,
                profit_loss: 0.0,
                yield_pct: None,
                current_value: 0.0,
                priced: true,
            });
            order.len() - 1
        });

        let entry = &mut order[idx];
        entry.transaction_count += 1;
        entry.quantity += tx.quantity;
        entry.invested += tx.invested_cash;
        match price_lookup(&tx.asset_symbol) {
            Some(price) => entry.profit_loss += profit_loss(tx.quantity, tx.purchase_price, price),
            None => entry.priced = false,
        }
    }

    for summary in &mut order {
        summary.yield_pct = percentage_yield(summary.profit_loss, summary.invested);
        summary.current_value = summary.invested + summary.profit_loss;
    }
    order
}

/// Portfolio-wide totals; equal to the sum over `aggregate_by_asset`.
pub fn aggregate_portfolio<F>(transactions: &[Transaction], price_lookup: F) -> PortfolioSummary
where
    F: Fn(&str) -> Option<f64>,
{
    let assets = aggregate_by_asset(transactions, price_lookup);
    summarize_assets(&assets, transactions.len())
}

/// Fold per-asset summaries into portfolio totals.
pub fn summarize_assets(assets: &[AssetSummary], transaction_count: usize) -> PortfolioSummary {
    let total_invested: f64 = assets.iter().map(|a| a.invested).sum();
    let total_profit_loss: f64 = assets.iter().map(|a| a.profit_loss).sum();
    let unpriced_symbols = assets
        .iter()
        .filter(|a| !a.priced)
        .map(|a| a.asset_symbol.clone())
        .collect();

    PortfolioSummary {
        transaction_count,
        total_invested,
        total_profit_loss,
        total_yield: percentage_yield(total_profit_loss, total_invested),
        current_value: total_invested + total_profit_loss,
        unpriced_symbols,
    }
}
