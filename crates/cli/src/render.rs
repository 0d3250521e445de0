//! Plain-text rendering of transactions, portfolio views and price data.

use crypto_portfolio_core::models::analytics::PortfolioView;
use crypto_portfolio_core::models::price::{CoinListing, PricePoint};
use crypto_portfolio_core::models::transaction::{format_timestamp, Transaction};

const UNAVAILABLE: &str = "n/a";

/// Cash amount: no decimals from 1,000 up, two decimals below.
pub fn format_currency(value: f64, currency: &str) -> String {
    let decimals = if value / 1000.0 >= 1.0 { 0 } else { 2 };
    money(value, decimals, currency)
}

/// Unit price with four decimals.
pub fn format_price(value: f64, currency: &str) -> String {
    money(value, 4, currency)
}

pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:+.2}%"),
        None => UNAVAILABLE.to_string(),
    }
}

fn money(value: f64, decimals: usize, currency: &str) -> String {
    let digits = group_thousands(value.abs(), decimals);
    let negative = value < 0.0 && digits.chars().any(|c| c.is_ascii_digit() && c != '0');
    let sign = if negative { "-" } else { "" };
    if currency.eq_ignore_ascii_case("usd") {
        format!("{sign}${digits}")
    } else {
        format!("{sign}{digits} {}", currency.to_uppercase())
    }
}

fn group_thousands(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (formatted.as_str(), None),
    };

    let mut out = String::with_capacity(formatted.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

fn opt_currency(value: Option<f64>, currency: &str) -> String {
    value
        .map(|v| format_currency(v, currency))
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

fn opt_price(value: Option<f64>, currency: &str) -> String {
    value
        .map(|v| format_price(v, currency))
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

/// Stored rows with the snapshot taken at the last refresh.
pub fn print_transactions(transactions: &[Transaction], currency: &str) {
    if transactions.is_empty() {
        println!("No transactions recorded.");
        return;
    }
    println!(
        "{:>5}  {:<16}  {:<22}  {:>14}  {:>16}  {:>14}  {:>16}  {:>14}",
        "ID", "Date", "Asset", "Quantity", "Purchase Price", "Invested", "Last Price", "Last P&L"
    );
    for tx in transactions {
        println!(
            "{:>5}  {:<16}  {:<22}  {:>14.4}  {:>16}  {:>14}  {:>16}  {:>14}",
            tx.id,
            format_timestamp(&tx.timestamp),
            truncate(&tx.asset_name, 22),
            tx.quantity,
            format_price(tx.purchase_price, currency),
            format_currency(tx.invested_cash, currency),
            opt_price(tx.last_price, currency),
            opt_currency(tx.last_profit_loss, currency),
        );
    }
}

/// Dashboard: totals, per-asset breakdown and every transaction.
pub fn print_view(view: &PortfolioView, currency: &str) {
    let s = &view.summary;
    println!("Portfolio");
    println!("  Transactions:   {}", s.transaction_count);
    println!("  Total invested: {}", format_currency(s.total_invested, currency));
    println!("  Current value:  {}", format_currency(s.current_value, currency));
    println!(
        "  Profit/Loss:    {} ({})",
        format_currency(s.total_profit_loss, currency),
        format_percentage(s.total_yield)
    );
    if !s.unpriced_symbols.is_empty() {
        println!("  Price unavailable for: {}", s.unpriced_symbols.join(", "));
    }

    if view.assets.is_empty() {
        println!();
        println!("No transactions recorded.");
        return;
    }

    println!();
    println!(
        "{:<22}  {:>4}  {:>14}  {:>14}  {:>14}  {:>14}  {:>9}",
        "Asset", "Txs", "Quantity", "Invested", "Value", "P&L", "Yield"
    );
    for a in &view.assets {
        let (value, pl) = if a.priced {
            (
                format_currency(a.current_value, currency),
                format_currency(a.profit_loss, currency),
            )
        } else {
            (UNAVAILABLE.to_string(), UNAVAILABLE.to_string())
        };
        println!(
            "{:<22}  {:>4}  {:>14.4}  {:>14}  {:>14}  {:>14}  {:>9}",
            truncate(&a.asset_name, 22),
            a.transaction_count,
            a.quantity,
            format_currency(a.invested, currency),
            value,
            pl,
            format_percentage(if a.priced { a.yield_pct } else { None }),
        );
    }

    println!();
    println!(
        "{:>5}  {:<16}  {:<22}  {:>14}  {:>16}  {:>16}  {:>14}  {:>9}",
        "ID", "Date", "Asset", "Quantity", "Purchase Price", "Current Price", "P&L", "Yield"
    );
    for row in &view.rows {
        let tx = &row.transaction;
        println!(
            "{:>5}  {:<16}  {:<22}  {:>14.4}  {:>16}  {:>16}  {:>14}  {:>9}",
            tx.id,
            format_timestamp(&tx.timestamp),
            truncate(&tx.asset_name, 22),
            tx.quantity,
            format_price(tx.purchase_price, currency),
            opt_price(row.metrics.current_price, currency),
            opt_currency(row.metrics.profit_loss, currency),
            format_percentage(row.metrics.yield_pct),
        );
    }
}

pub fn print_coins(coins: &[CoinListing], total: usize) {
    if coins.is_empty() {
        println!("No matching coins.");
        return;
    }
    println!("{:<32}  {:<10}  {}", "ID", "Symbol", "Name");
    for c in coins {
        println!("{:<32}  {:<10}  {}", c.id, c.symbol.to_uppercase(), c.name);
    }
    if total > coins.len() {
        println!("... {} more", total - coins.len());
    }
}

pub fn print_history(coin: &str, points: &[PricePoint], currency: &str) {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        println!("No price history for {coin}.");
        return;
    };
    for p in points {
        println!(
            "{}  {:>18}",
            p.timestamp.format("%Y-%m-%d %H:%M"),
            format_price(p.price, currency)
        );
    }

    let low = points.iter().map(|p| p.price).fold(f64::INFINITY, f64::min);
    let high = points.iter().map(|p| p.price).fold(f64::NEG_INFINITY, f64::max);
    let change = if first.price > 0.0 {
        Some((last.price - first.price) * 100.0 / first.price)
    } else {
        None
    };
    println!();
    println!(
        "{coin}: low {}  high {}  change {}",
        format_price(low, currency),
        format_price(high, currency),
        format_percentage(change)
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
