pub mod errors;
pub mod models;
pub mod providers;
pub mod services;
pub mod storage;

use chrono::NaiveDateTime;
use models::{
    analytics::{PortfolioView, TransactionRow},
    price::{CoinListing, PricePoint},
    settings::Settings,
    transaction::{NewTransaction, Transaction, TransactionEdit, TransactionInput, TransactionUpdate},
};
use providers::coingecko::CoinGeckoProvider;
use services::{metrics, price_gateway::PriceGateway, rate_limiter::RateLimiter};
use std::collections::HashMap;
use storage::TransactionStore;

use errors::CoreError;

/// Relative tolerance when checking `invested_cash == quantity * purchase_price`
/// for user-supplied values.
const INVESTED_CASH_TOLERANCE: f64 = 1e-9;

/// Main entry point for the crypto portfolio core library.
///
/// Owns the record store and the price gateway. This is the context object
/// a front end keeps between refreshes; there is no global state.
#[must_use]
pub struct PortfolioTracker {
    store: TransactionStore,
    gateway: PriceGateway,
}

impl std::fmt::Debug for PortfolioTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioTracker")
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl PortfolioTracker {
    /// Assemble a tracker from an open store and a configured gateway.
    pub fn new(store: TransactionStore, gateway: PriceGateway) -> Self {
        Self { store, gateway }
    }

    /// Open the configured database and connect to CoinGecko.
    pub fn open(settings: &Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        let store = TransactionStore::open(settings.resolved_database_path())?;
        Ok(Self::new(store, Self::build_gateway(settings)))
    }

    /// Gateway for `settings`, backed by the CoinGecko provider.
    pub fn build_gateway(settings: &Settings) -> PriceGateway {
        let provider =
            CoinGeckoProvider::with_base_url(&settings.api_base_url, settings.request_timeout());
        let limiter = RateLimiter::new(settings.rate_limit_max_calls, settings.rate_limit_window());
        PriceGateway::new(Box::new(provider), limiter, &settings.vs_currency)
            .with_coin_list_ttl(settings.coin_list_ttl())
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    pub fn gateway(&self) -> &PriceGateway {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut PriceGateway {
        &mut self.gateway
    }

    // ── Transaction Management ──────────────────────────────────────

    /// Record a buy. The size is given either as a quantity or as the cash
    /// spent; the other side is derived from `purchase_price`.
    ///
    /// Rejected before any write when the size is not positive, the price is
    /// negative (or zero for an investment input) or the symbol is empty.
    /// The snapshot fields are seeded from the cached price, if any.
    pub fn add_transaction(
        &mut self,
        asset_name: &str,
        asset_symbol: &str,
        input: TransactionInput,
        purchase_price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<i64, CoreError> {
        let symbol = asset_symbol.trim();
        if symbol.is_empty() {
            return Err(CoreError::ValidationError("An asset must be selected".into()));
        }
        validate_price(purchase_price)?;

        let quantity = match input {
            TransactionInput::Quantity(q) => {
                validate_positive("Quantity", q)?;
                q
            }
            TransactionInput::Investment(cash) => {
                validate_positive("Investment", cash)?;
                if purchase_price <= 0.0 {
                    return Err(CoreError::ValidationError(
                        "Purchase price must be positive to derive a quantity from an investment"
                            .into(),
                    ));
                }
                metrics::quantity_from_investment(cash, purchase_price)
            }
        };

        let name = match asset_name.trim() {
            "" => symbol,
            n => n,
        };
        let mut tx = NewTransaction::new(timestamp, name, symbol, quantity, purchase_price);
        if let Some(price) = self.gateway.cached_price(symbol) {
            tx.last_price = Some(price);
            tx.last_profit_loss = Some(metrics::profit_loss(quantity, purchase_price, price));
        }

        let id = self.store.create(&tx)?;
        log::info!("Added transaction {id}: {quantity} {symbol} @ {purchase_price}");
        Ok(id)
    }

    /// Record a buy of a coin picked from the catalog.
    pub fn add_coin_transaction(
        &mut self,
        coin: &CoinListing,
        input: TransactionInput,
        purchase_price: f64,
        timestamp: NaiveDateTime,
    ) -> Result<i64, CoreError> {
        self.add_transaction(&coin.label(), &coin.id, input, purchase_price, timestamp)
    }

    /// Edit timestamp, quantity, price or invested cash of a transaction.
    ///
    /// `invested_cash` is always rewritten as `quantity * purchase_price`.
    /// An invested-cash edit without a quantity derives the quantity; an
    /// invested-cash edit that contradicts an explicit quantity and price is
    /// rejected. Returns `Ok(false)` if the id does not exist.
    pub fn edit_transaction(&mut self, id: i64, edit: &TransactionEdit) -> Result<bool, CoreError> {
        let Some(existing) = self.store.get(id)? else {
            return Ok(false);
        };

        if let Some(q) = edit.quantity {
            validate_positive("Quantity", q)?;
        }
        if let Some(p) = edit.purchase_price {
            validate_price(p)?;
        }
        if let Some(cash) = edit.invested_cash {
            validate_positive("Invested cash", cash)?;
        }

        let price = edit.purchase_price.unwrap_or(existing.purchase_price);
        let quantity = match (edit.quantity, edit.invested_cash) {
            (Some(q), Some(cash)) => {
                let expected = metrics::investment_from_quantity(q, price);
                if (expected - cash).abs() > INVESTED_CASH_TOLERANCE * expected.abs().max(1.0) {
                    return Err(CoreError::ValidationError(format!(
                        "Invested cash {cash} does not match quantity {q} × price {price} = {expected}"
                    )));
                }
                q
            }
            (Some(q), None) => q,
            (None, Some(cash)) => {
                if price <= 0.0 {
                    return Err(CoreError::ValidationError(
                        "Purchase price must be positive to derive a quantity from an investment"
                            .into(),
                    ));
                }
                metrics::quantity_from_investment(cash, price)
            }
            (None, None) => existing.quantity,
        };

        let mut update = TransactionUpdate {
            timestamp: edit.timestamp,
            quantity: Some(quantity),
            purchase_price: Some(price),
            invested_cash: Some(metrics::investment_from_quantity(quantity, price)),
            ..TransactionUpdate::default()
        };
        if let Some(last_price) = existing.last_price {
            update.last_profit_loss = Some(metrics::profit_loss(quantity, price, last_price));
        }

        let updated = self.store.update(id, &update)?;
        if updated {
            log::info!("Edited transaction {id}");
        }
        Ok(updated)
    }

    /// Delete one transaction. Returns `false` if the id does not exist.
    pub fn delete_transaction(&mut self, id: i64) -> Result<bool, CoreError> {
        let deleted = self.store.delete(id)?;
        if deleted {
            log::info!("Deleted transaction {id}");
        } else {
            log::debug!("Delete of unknown transaction {id}");
        }
        Ok(deleted)
    }

    /// Delete every transaction. Returns how many were removed.
    pub fn clear_transactions(&mut self) -> Result<usize, CoreError> {
        self.store.clear_all()
    }

    pub fn transactions(&self) -> Result<Vec<Transaction>, CoreError> {
        self.store.list_all()
    }

    pub fn transaction(&self, id: i64) -> Result<Option<Transaction>, CoreError> {
        self.store.get(id)
    }

    /// Distinct asset symbols in insertion order.
    pub fn symbols(&self) -> Result<Vec<String>, CoreError> {
        let mut seen = std::collections::HashSet::new();
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .filter_map(|tx| {
                if seen.insert(tx.asset_symbol.clone()) {
                    Some(tx.asset_symbol)
                } else {
                    None
                }
            })
            .collect())
    }

    // ── Prices ──────────────────────────────────────────────────────

    /// Ask the gateway for a price per distinct symbol and write the
    /// snapshot fields of every transaction that got one.
    pub async fn refresh_prices(&mut self) -> Result<HashMap<String, Option<f64>>, CoreError> {
        let transactions = self.store.list_all()?;
        let prices = self
            .gateway
            .refresh(transactions.iter().map(|tx| tx.asset_symbol.as_str()))
            .await;

        for tx in &transactions {
            if let Some(Some(price)) = prices.get(&tx.asset_symbol) {
                let pl = metrics::profit_loss(tx.quantity, tx.purchase_price, *price);
                self.store
                    .update(tx.id, &TransactionUpdate::snapshot(*price, pl))?;
            }
        }
        Ok(prices)
    }

    /// Price of one symbol through the gateway (budgeted, cache fallback).
    pub async fn current_price(&mut self, symbol: &str) -> Option<f64> {
        self.gateway.get_price(symbol).await
    }

    /// Coins whose id, symbol or name contains `query`.
    pub async fn search_coins(&mut self, query: &str) -> Result<Vec<CoinListing>, CoreError> {
        let coins = self.gateway.list_coins().await?;
        Ok(coins.into_iter().filter(|c| c.matches(query)).collect())
    }

    pub async fn price_history(
        &mut self,
        symbol: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, CoreError> {
        self.gateway.price_history(symbol, days).await
    }

    // ── View ────────────────────────────────────────────────────────

    /// Compute everything the dashboard shows from the store and the
    /// gateway's cached prices. Makes no network calls.
    ///
    /// Stored snapshot prices are never used here; a symbol without a cached
    /// price is reported as unpriced.
    pub fn compute_view(&self) -> Result<PortfolioView, CoreError> {
        let transactions = self.store.list_all()?;
        let cache = self.gateway.cache();
        let lookup = |symbol: &str| cache.get(symbol);

        let rows = transactions
            .iter()
            .map(|tx| TransactionRow {
                metrics: metrics::transaction_metrics(tx, lookup(tx.asset_symbol.as_str())),
                transaction: tx.clone(),
            })
            .collect();
        let assets = metrics::aggregate_by_asset(&transactions, lookup);
        let summary = metrics::summarize_assets(&assets, transactions.len());

        Ok(PortfolioView {
            rows,
            assets,
            summary,
        })
    }
}

fn validate_positive(field: &str, value: f64) -> Result<(), CoreError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoreError::ValidationError(format!(
            "{field} must be a positive number (got {value})"
        )));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), CoreError> {
    if !price.is_finite() || price < 0.0 {
        return Err(CoreError::ValidationError(format!(
            "Purchase price must be zero or positive (got {price})"
        )));
    }
    Ok(())
}
