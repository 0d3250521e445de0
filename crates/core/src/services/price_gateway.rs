use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::errors::CoreError;
use crate::models::price::{CoinListing, PriceCache, PricePoint};
use crate::providers::traits::PriceProvider;
use crate::services::rate_limiter::RateLimiter;

/// Longest history the market chart endpoint is asked for.
pub const MAX_HISTORY_DAYS: u32 = 90;

/// Resolves "current price of asset X" under a call budget, falling back to
/// the last observed price.
///
/// Cache strategy:
/// - **Budget available**: fetch, store in the cache, return the fresh price.
/// - **Budget exhausted**: return the cached price without any network call.
/// - **Fetch failed** (bad status, timeout, malformed body): return the
///   cached price. Not retried.
///
/// The three outcomes look the same to the caller; a `None` only means no
/// price was ever observed for that symbol.
pub struct PriceGateway {
    provider: Box<dyn PriceProvider>,
    limiter: RateLimiter,
    cache: PriceCache,
    currency: String,
    coin_list: Option<(Instant, Vec<CoinListing>)>,
    coin_list_ttl: Duration,
}

impl std::fmt::Debug for PriceGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceGateway")
            .field("provider", &self.provider.name())
            .field("currency", &self.currency)
            .field("cached_prices", &self.cache.len())
            .field("limiter", &self.limiter)
            .finish()
    }
}

impl PriceGateway {
    pub fn new(
        provider: Box<dyn PriceProvider>,
        limiter: RateLimiter,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            limiter,
            cache: PriceCache::new(),
            currency: currency.into().to_lowercase(),
            coin_list: None,
            coin_list_ttl: Duration::from_secs(3600),
        }
    }

    /// Change how long the coin catalog is reused.
    pub fn with_coin_list_ttl(mut self, ttl: Duration) -> Self {
        self.coin_list_ttl = ttl;
        self
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Current price of `symbol`, fresh when the budget and the provider
    /// allow it, otherwise the last cached value.
    pub async fn get_price(&mut self, symbol: &str) -> Option<f64> {
        if !self.limiter.try_consume() {
            log::debug!("Rate budget exhausted, using cached price for {symbol}");
            return self.cache.get(symbol);
        }

        match self.provider.get_current_price(symbol, &self.currency).await {
            Ok(price) => {
                log::debug!("Fetched {symbol} = {price} {}", self.currency);
                self.cache.set(symbol, price);
                Some(price)
            }
            Err(e) => {
                log::warn!(
                    "{} price fetch for {symbol} failed, using cached value: {e}",
                    self.provider.name()
                );
                self.cache.get(symbol)
            }
        }
    }

    /// One `get_price` per distinct symbol, in first-seen order.
    pub async fn refresh<'a, I>(&mut self, symbols: I) -> HashMap<String, Option<f64>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut prices = HashMap::new();
        for symbol in symbols {
            if prices.contains_key(symbol) {
                continue;
            }
            let price = self.get_price(symbol).await;
            prices.insert(symbol.to_string(), price);
        }
        prices
    }

    /// Last observed price, without touching the network or the budget.
    pub fn cached_price(&self, symbol: &str) -> Option<f64> {
        self.cache.get(symbol)
    }

    pub fn cache(&self) -> &PriceCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Calls left in the current window.
    pub fn remaining_budget(&mut self) -> usize {
        self.limiter.remaining()
    }

    /// The provider's coin catalog, reused for `coin_list_ttl`.
    ///
    /// A stale catalog is still returned when the budget is exhausted or the
    /// fetch fails; without any catalog the error is surfaced.
    pub async fn list_coins(&mut self) -> Result<Vec<CoinListing>, CoreError> {
        if let Some((fetched_at, coins)) = &self.coin_list {
            if fetched_at.elapsed() < self.coin_list_ttl {
                return Ok(coins.clone());
            }
        }

        if !self.limiter.try_consume() {
            return self.stale_coin_list(CoreError::RateLimited(
                "coin catalog request deferred".into(),
            ));
        }

        match self.provider.list_coins().await {
            Ok(coins) => {
                log::info!("Loaded {} coins from {}", coins.len(), self.provider.name());
                self.coin_list = Some((Instant::now(), coins.clone()));
                Ok(coins)
            }
            Err(e) => {
                log::warn!("Coin catalog fetch failed: {e}");
                self.stale_coin_list(e)
            }
        }
    }

    /// Price series for `symbol` over the last `days` (clamped to 1..=90).
    pub async fn price_history(
        &mut self,
        symbol: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, CoreError> {
        if !self.limiter.try_consume() {
            return Err(CoreError::RateLimited(format!("history of {symbol}")));
        }
        let days = days.clamp(1, MAX_HISTORY_DAYS);
        self.provider
            .get_price_history(symbol, &self.currency, days)
            .await
    }

    fn stale_coin_list(&self, err: CoreError) -> Result<Vec<CoinListing>, CoreError> {
        match &self.coin_list {
            Some((_, coins)) => Ok(coins.clone()),
            None => Err(err),
        }
    }
}
