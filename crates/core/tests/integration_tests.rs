// ═══════════════════════════════════════════════════════════════════
// Integration Tests — PortfolioTracker facade end to end
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use crypto_portfolio_core::errors::CoreError;
use crypto_portfolio_core::models::price::{CoinListing, PricePoint};
use crypto_portfolio_core::models::settings::Settings;
use crypto_portfolio_core::models::transaction::{parse_timestamp, TransactionEdit, TransactionInput};
use crypto_portfolio_core::providers::traits::PriceProvider;
use crypto_portfolio_core::services::price_gateway::PriceGateway;
use crypto_portfolio_core::services::rate_limiter::RateLimiter;
use crypto_portfolio_core::storage::TransactionStore;
use crypto_portfolio_core::PortfolioTracker;

// ═══════════════════════════════════════════════════════════════════
// Mock Provider
// ═══════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
struct MockPriceProvider {
    prices: Arc<Mutex<HashMap<String, f64>>>,
    failing: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MockPriceProvider {
    fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(symbol.into(), price);
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    fn name(&self) -> &str {
        "MockProvider"
    }

    async fn get_current_price(&self, coin_id: &str, currency: &str) -> Result<f64, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Network("timed out".into()));
        }
        self.prices
            .lock()
            .unwrap()
            .get(coin_id)
            .copied()
            .ok_or(CoreError::PriceNotAvailable {
                symbol: coin_id.into(),
                currency: currency.into(),
            })
    }

    async fn list_coins(&self) -> Result<Vec<CoinListing>, CoreError> {
        Ok(vec![
            CoinListing {
                id: "bitcoin".into(),
                symbol: "btc".into(),
                name: "Bitcoin".into(),
            },
            CoinListing {
                id: "bitcoin-cash".into(),
                symbol: "bch".into(),
                name: "Bitcoin Cash".into(),
            },
            CoinListing {
                id: "ethereum".into(),
                symbol: "eth".into(),
                name: "Ethereum".into(),
            },
        ])
    }

    async fn get_price_history(
        &self,
        _coin_id: &str,
        _currency: &str,
        _days: u32,
    ) -> Result<Vec<PricePoint>, CoreError> {
        Ok(vec![])
    }
}

fn tracker(mock: &MockPriceProvider) -> PortfolioTracker {
    let store = TransactionStore::open_in_memory().unwrap();
    let gateway = PriceGateway::new(
        Box::new(mock.clone()),
        RateLimiter::new(50, Duration::from_secs(60)),
        "usd",
    );
    PortfolioTracker::new(store, gateway)
}

fn ts(raw: &str) -> NaiveDateTime {
    parse_timestamp(raw).unwrap()
}

// ═══════════════════════════════════════════════════════════════════
// Adding transactions
// ═══════════════════════════════════════════════════════════════════

mod add {
    use super::*;

    #[test]
    fn quantity_input_derives_investment() {
        let mut t = tracker(&MockPriceProvider::default());
        let id = t
            .add_transaction("Bitcoin (BTC)", "bitcoin", TransactionInput::Quantity(2.0), 100.0, ts("2024-01-01 10:00"))
            .unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.quantity, 2.0);
        assert_eq!(tx.invested_cash, 200.0);
    }

    #[test]
    fn investment_input_derives_quantity() {
        let mut t = tracker(&MockPriceProvider::default());
        let id = t
            .add_transaction("Ethereum (ETH)", "ethereum", TransactionInput::Investment(500.0), 2500.0, ts("2024-01-01 10:00"))
            .unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert!((tx.quantity - 0.2).abs() < 1e-12);
        assert_eq!(tx.invested_cash, tx.quantity * tx.purchase_price);
    }

    #[test]
    fn rejects_non_positive_quantity_without_writing() {
        let mut t = tracker(&MockPriceProvider::default());
        for q in [0.0, -1.0, f64::NAN] {
            let err = t
                .add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(q), 100.0, ts("2024-01-01"))
                .unwrap_err();
            assert!(matches!(err, CoreError::ValidationError(_)));
        }
        assert!(t.transactions().unwrap().is_empty());
    }

    #[test]
    fn rejects_negative_price() {
        let mut t = tracker(&MockPriceProvider::default());
        let err = t
            .add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(1.0), -5.0, ts("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn investment_at_zero_price_rejected() {
        let mut t = tracker(&MockPriceProvider::default());
        let err = t
            .add_transaction("Airdrop", "airdrop", TransactionInput::Investment(10.0), 0.0, ts("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(t.store().count().unwrap(), 0);
    }

    #[test]
    fn zero_price_quantity_allowed() {
        let mut t = tracker(&MockPriceProvider::default());
        let id = t
            .add_transaction("Airdrop", "airdrop", TransactionInput::Quantity(10.0), 0.0, ts("2024-01-01"))
            .unwrap();
        assert_eq!(t.transaction(id).unwrap().unwrap().invested_cash, 0.0);
    }

    #[test]
    fn missing_selection_rejected() {
        let mut t = tracker(&MockPriceProvider::default());
        let err = t
            .add_transaction("", "  ", TransactionInput::Quantity(1.0), 1.0, ts("2024-01-01"))
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn blank_name_falls_back_to_symbol() {
        let mut t = tracker(&MockPriceProvider::default());
        let id = t
            .add_transaction("", "solana", TransactionInput::Quantity(1.0), 1.0, ts("2024-01-01"))
            .unwrap();
        assert_eq!(t.transaction(id).unwrap().unwrap().asset_name, "solana");
    }

    #[tokio::test]
    async fn snapshot_seeded_from_cached_price() {
        let mock = MockPriceProvider::default();
        mock.set_price("bitcoin", 150.0);
        let mut t = tracker(&mock);
        t.current_price("bitcoin").await;

        let id = t
            .add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(2.0), 100.0, ts("2024-01-01"))
            .unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.last_price, Some(150.0));
        assert_eq!(tx.last_profit_loss, Some(100.0));
    }

    #[tokio::test]
    async fn add_from_catalog_uses_label_and_id() {
        let mut t = tracker(&MockPriceProvider::default());
        let coins = t.search_coins("eth").await.unwrap();
        assert_eq!(coins.len(), 1);

        let id = t
            .add_coin_transaction(&coins[0], TransactionInput::Quantity(1.0), 3000.0, ts("2024-01-01"))
            .unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.asset_name, "Ethereum (ETH)");
        assert_eq!(tx.asset_symbol, "ethereum");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Editing, deleting, clearing
// ═══════════════════════════════════════════════════════════════════

mod edit_delete_clear {
    use super::*;

    fn seeded() -> (PortfolioTracker, i64) {
        let mut t = tracker(&MockPriceProvider::default());
        let id = t
            .add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(2.0), 100.0, ts("2024-01-01 08:00"))
            .unwrap();
        (t, id)
    }

    #[test]
    fn edit_quantity_keeps_invariant() {
        let (mut t, id) = seeded();
        let ok = t
            .edit_transaction(id, &TransactionEdit { quantity: Some(3.0), ..Default::default() })
            .unwrap();
        assert!(ok);
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.quantity, 3.0);
        assert_eq!(tx.invested_cash, 300.0);
    }

    #[test]
    fn edit_price_keeps_invariant() {
        let (mut t, id) = seeded();
        t.edit_transaction(id, &TransactionEdit { purchase_price: Some(120.0), ..Default::default() })
            .unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.quantity, 2.0);
        assert_eq!(tx.invested_cash, 240.0);
    }

    #[test]
    fn edit_investment_derives_quantity() {
        let (mut t, id) = seeded();
        t.edit_transaction(id, &TransactionEdit { invested_cash: Some(500.0), ..Default::default() })
            .unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.quantity, 5.0);
        assert_eq!(tx.invested_cash, 500.0);
    }

    #[test]
    fn contradictory_edit_rejected() {
        let (mut t, id) = seeded();
        let err = t
            .edit_transaction(
                id,
                &TransactionEdit {
                    quantity: Some(2.0),
                    purchase_price: Some(100.0),
                    invested_cash: Some(999.0),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
        assert_eq!(t.transaction(id).unwrap().unwrap().invested_cash, 200.0);
    }

    #[test]
    fn edit_timestamp_only() {
        let (mut t, id) = seeded();
        t.edit_transaction(id, &TransactionEdit { timestamp: Some(ts("2023-06-30 12:15")), ..Default::default() })
            .unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.timestamp, ts("2023-06-30 12:15"));
        assert_eq!(tx.invested_cash, 200.0);
        assert_eq!(tx.asset_symbol, "bitcoin");
    }

    #[test]
    fn edit_missing_id_is_false() {
        let (mut t, _) = seeded();
        assert!(!t
            .edit_transaction(999, &TransactionEdit { quantity: Some(1.0), ..Default::default() })
            .unwrap());
    }

    #[test]
    fn invalid_edit_rejected() {
        let (mut t, id) = seeded();
        let err = t
            .edit_transaction(id, &TransactionEdit { quantity: Some(0.0), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn delete_missing_id_keeps_rows() {
        let (mut t, id) = seeded();
        assert!(!t.delete_transaction(id + 100).unwrap());
        assert_eq!(t.transactions().unwrap().len(), 1);
        assert!(t.delete_transaction(id).unwrap());
        assert!(t.transactions().unwrap().is_empty());
    }

    #[test]
    fn clear_twice() {
        let (mut t, _) = seeded();
        assert_eq!(t.clear_transactions().unwrap(), 1);
        assert_eq!(t.clear_transactions().unwrap(), 0);
        assert!(t.transactions().unwrap().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Refresh & view
// ═══════════════════════════════════════════════════════════════════

mod refresh_and_view {
    use super::*;

    #[tokio::test]
    async fn view_before_refresh_is_unpriced() {
        let mut t = tracker(&MockPriceProvider::default());
        t.add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(1.0), 100.0, ts("2024-01-01"))
            .unwrap();

        let view = t.compute_view().unwrap();
        assert_eq!(view.rows.len(), 1);
        assert!(view.rows[0].metrics.profit_loss.is_none());
        assert_eq!(view.summary.unpriced_symbols, vec!["bitcoin".to_string()]);
        assert_eq!(view.summary.total_invested, 100.0);
        assert_eq!(view.summary.total_profit_loss, 0.0);
    }

    #[tokio::test]
    async fn refresh_then_view() {
        let mock = MockPriceProvider::default();
        mock.set_price("bitcoin", 150.0);
        mock.set_price("ethereum", 2000.0);
        let mut t = tracker(&mock);

        t.add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(2.0), 100.0, ts("2024-01-01"))
            .unwrap();
        t.add_transaction("Ethereum", "ethereum", TransactionInput::Quantity(1.0), 2500.0, ts("2024-01-02"))
            .unwrap();
        t.add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(1.0), 200.0, ts("2024-01-03"))
            .unwrap();

        let prices = t.refresh_prices().await.unwrap();
        assert_eq!(prices.len(), 2);
        assert_eq!(mock.calls.load(Ordering::SeqCst), 2);

        let view = t.compute_view().unwrap();
        assert_eq!(view.rows[0].metrics.profit_loss, Some(100.0));
        assert_eq!(view.rows[0].metrics.yield_pct, Some(50.0));

        assert_eq!(view.assets.len(), 2);
        let btc = &view.assets[0];
        assert_eq!(btc.asset_symbol, "bitcoin");
        assert_eq!(btc.invested, 400.0);
        assert_eq!(btc.profit_loss, 50.0);
        assert_eq!(btc.yield_pct, Some(12.5));

        assert_eq!(view.summary.total_invested, 2900.0);
        assert_eq!(view.summary.total_profit_loss, -450.0);
        assert_eq!(view.summary.current_value, 2450.0);
        assert!(view.summary.unpriced_symbols.is_empty());
    }

    #[tokio::test]
    async fn refresh_writes_snapshots() {
        let mock = MockPriceProvider::default();
        mock.set_price("bitcoin", 150.0);
        let mut t = tracker(&mock);
        let id = t
            .add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(2.0), 100.0, ts("2024-01-01"))
            .unwrap();

        t.refresh_prices().await.unwrap();
        let tx = t.transaction(id).unwrap().unwrap();
        assert_eq!(tx.last_price, Some(150.0));
        assert_eq!(tx.last_profit_loss, Some(100.0));
    }

    #[tokio::test]
    async fn provider_outage_uses_cached_prices() {
        let mock = MockPriceProvider::default();
        mock.set_price("bitcoin", 150.0);
        let mut t = tracker(&mock);
        t.add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(2.0), 100.0, ts("2024-01-01"))
            .unwrap();
        t.refresh_prices().await.unwrap();

        mock.set_failing(true);
        mock.set_price("bitcoin", 1.0);
        let prices = t.refresh_prices().await.unwrap();
        assert_eq!(prices["bitcoin"], Some(150.0));

        let view = t.compute_view().unwrap();
        assert_eq!(view.summary.total_profit_loss, 100.0);
    }

    #[tokio::test]
    async fn stored_snapshot_is_not_used_for_view() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            database_path: Some(dir.path().join("tx.db")),
            ..Settings::default()
        };

        // Write a row with a snapshot through one tracker...
        {
            let mock = MockPriceProvider::default();
            mock.set_price("bitcoin", 150.0);
            let store = TransactionStore::open(settings.resolved_database_path()).unwrap();
            let gateway = PriceGateway::new(Box::new(mock.clone()), RateLimiter::default(), "usd");
            let mut t = PortfolioTracker::new(store, gateway);
            t.add_transaction("Bitcoin", "bitcoin", TransactionInput::Quantity(2.0), 100.0, ts("2024-01-01"))
                .unwrap();
            t.refresh_prices().await.unwrap();
        }

        // ...and reopen with a fresh (empty) price cache.
        let store = TransactionStore::open(settings.resolved_database_path()).unwrap();
        let t = PortfolioTracker::new(store, PriceGateway::new(Box::new(MockPriceProvider::default()), RateLimiter::default(), "usd"));
        let view = t.compute_view().unwrap();
        assert_eq!(view.rows[0].transaction.last_price, Some(150.0));
        assert!(view.rows[0].metrics.current_price.is_none());
        assert_eq!(view.summary.unpriced_symbols, vec!["bitcoin".to_string()]);
    }

    #[tokio::test]
    async fn symbols_are_distinct_in_order() {
        let mut t = tracker(&MockPriceProvider::default());
        for s in ["ethereum", "bitcoin", "ethereum"] {
            t.add_transaction(s, s, TransactionInput::Quantity(1.0), 1.0, ts("2024-01-01"))
                .unwrap();
        }
        assert_eq!(t.symbols().unwrap(), vec!["ethereum", "bitcoin"]);
    }

    #[tokio::test]
    async fn search_coins_filters_catalog() {
        let mut t = tracker(&MockPriceProvider::default());
        let hits = t.search_coins("bitcoin").await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(t.search_coins("").await.unwrap().len(), 3);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Opening from settings
// ═══════════════════════════════════════════════════════════════════

mod open {
    use super::*;

    #[test]
    fn open_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("crypto_transactions.db");
        let settings = Settings {
            database_path: Some(path.clone()),
            ..Settings::default()
        };
        let t = PortfolioTracker::open(&settings).unwrap();
        assert!(path.exists());
        assert_eq!(t.gateway().provider_name(), "CoinGecko");
        assert_eq!(t.gateway().currency(), "usd");
    }

    #[tokio::test]
    async fn open_with_unbounded_budget() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            database_path: Some(dir.path().join("tx.db")),
            rate_limit_max_calls: usize::MAX,
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());

        let mut t = PortfolioTracker::open(&settings).unwrap();
        assert_eq!(t.gateway_mut().remaining_budget(), usize::MAX);
    }

    #[test]
    fn open_rejects_invalid_settings() {
        let settings = Settings {
            refresh_interval_secs: 0,
            ..Settings::default()
        };
        assert!(matches!(
            PortfolioTracker::open(&settings),
            Err(CoreError::Config(_))
        ));
    }
}
