use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::price::{CoinListing, PricePoint};

/// Abstraction over the market-data API.
///
/// The gateway only talks to this trait, so tests substitute scripted
/// providers and a different API only needs a new implementation.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;

    /// Current unit price of `coin_id` quoted in `currency`.
    async fn get_current_price(&self, coin_id: &str, currency: &str) -> Result<f64, CoreError>;

    /// Full catalog of coins the provider knows about.
    async fn list_coins(&self) -> Result<Vec<CoinListing>, CoreError>;

    /// Price series of `coin_id` over the last `days` days, oldest first.
    async fn get_price_history(
        &self,
        coin_id: &str,
        currency: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, CoreError>;
}
