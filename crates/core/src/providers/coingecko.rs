use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::traits::PriceProvider;
use crate::errors::CoreError;
use crate::models::price::{CoinListing, PricePoint};
use crate::models::settings::DEFAULT_API_BASE_URL;

const PROVIDER: &str = "CoinGecko";

/// CoinGecko public API provider.
///
/// - **Free**: no API key required; the public tier is rate limited, which
///   the gateway's call budget accounts for.
/// - **Endpoints**: `/simple/price`, `/coins/list`, `/coins/{id}/market_chart`
///
/// Coins are addressed by CoinGecko ids ("bitcoin", "ethereum"), which is
/// what transactions store as their asset symbol.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_API_BASE_URL, timeout)
    }

    /// Provider pointed at a different API root (mirror, proxy, test server).
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, url: &str, params: &[(&str, String)]) -> Result<String, CoreError> {
        let resp = self.client.get(url).query(params).send().await?;
        let resp = check_status(resp)?;
        Ok(resp.text().await?)
    }
}

fn check_status(resp: Response) -> Result<Response, CoreError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("HTTP {status}"),
        });
    }
    Ok(resp)
}

// ── CoinGecko API response types ────────────────────────────────────

#[derive(Deserialize)]
struct CoinEntry {
    id: String,
    symbol: String,
    name: String,
}

#[derive(Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

/// Extract `coin_id`'s price from a `/simple/price` body of the form
/// `{"bitcoin": {"usd": 43000.5}}`.
pub fn parse_simple_price(body: &str, coin_id: &str, currency: &str) -> Result<f64, CoreError> {
    let parsed: HashMap<String, HashMap<String, f64>> =
        serde_json::from_str(body).map_err(|e| CoreError::Api {
            provider: PROVIDER.into(),
            message: format!("Failed to parse price for {coin_id}: {e}"),
        })?;

    let price = parsed
        .get(coin_id)
        .and_then(|quotes| quotes.get(&currency.to_lowercase()))
        .copied()
        .ok_or_else(|| CoreError::PriceNotAvailable {
            symbol: coin_id.to_string(),
            currency: currency.to_string(),
        })?;

    if !price.is_finite() || price < 0.0 {
        return Err(CoreError::Api {
            provider: PROVIDER.into(),
            message: format!(
                "Invalid price returned for {coin_id}: {price} (must be finite and non-negative)"
            ),
        });
    }
    Ok(price)
}

/// Parse a `/coins/list` body.
pub fn parse_coin_list(body: &str) -> Result<Vec<CoinListing>, CoreError> {
    let entries: Vec<CoinEntry> = serde_json::from_str(body).map_err(|e| CoreError::Api {
        provider: PROVIDER.into(),
        message: format!("Failed to parse coin list: {e}"),
    })?;
    Ok(entries
        .into_iter()
        .map(|c| CoinListing {
            id: c.id,
            symbol: c.symbol,
            name: c.name,
        })
        .collect())
}

/// Parse a `/coins/{id}/market_chart` body into points sorted by time.
/// Points with an out-of-range timestamp are skipped.
pub fn parse_market_chart(body: &str) -> Result<Vec<PricePoint>, CoreError> {
    let chart: MarketChart = serde_json::from_str(body).map_err(|e| CoreError::Api {
        provider: PROVIDER.into(),
        message: format!("Failed to parse market chart: {e}"),
    })?;

    let mut points: Vec<PricePoint> = chart
        .prices
        .into_iter()
        .filter_map(|(ms, price)| {
            let timestamp = chrono::DateTime::from_timestamp_millis(ms as i64)?;
            Some(PricePoint { timestamp, price })
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn get_current_price(&self, coin_id: &str, currency: &str) -> Result<f64, CoreError> {
        let url = format!("{}/simple/price", self.base_url);
        let body = self
            .get_text(
                &url,
                &[
                    ("ids", coin_id.to_string()),
                    ("vs_currencies", currency.to_lowercase()),
                ],
            )
            .await?;
        parse_simple_price(&body, coin_id, currency)
    }

    async fn list_coins(&self) -> Result<Vec<CoinListing>, CoreError> {
        let url = format!("{}/coins/list", self.base_url);
        let body = self.get_text(&url, &[]).await?;
        parse_coin_list(&body)
    }

    async fn get_price_history(
        &self,
        coin_id: &str,
        currency: &str,
        days: u32,
    ) -> Result<Vec<PricePoint>, CoreError> {
        let url = format!("{}/coins/{coin_id}/market_chart", self.base_url);
        let body = self
            .get_text(
                &url,
                &[
                    ("vs_currency", currency.to_lowercase()),
                    ("days", days.to_string()),
                ],
            )
            .await?;
        parse_market_chart(&body)
    }
}
