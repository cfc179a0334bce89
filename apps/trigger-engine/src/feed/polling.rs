//! REST polling fallback for price data.
//!
//! When the streaming subscription cannot be established, the feed issues a
//! periodic batch price query for the watched instrument set and synthesizes
//! ticks from the response.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::domain::shared::Symbol;

use super::{FeedError, PriceTick};

/// Batch price endpoint path.
const TICKER_PRICE_PATH: &str = "/api/v3/ticker/price";

/// One entry of the batch ticker response.
#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

/// HTTP client for the batch price endpoint.
#[derive(Debug, Clone)]
pub struct PollingClient {
    http: reqwest::Client,
    base_url: String,
}

impl PollingClient {
    /// Create a polling client with a bounded per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Poll`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FeedError::Poll {
                message: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetch current prices for the given instrument set as synthetic ticks.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Poll`] on transport failure and
    /// [`FeedError::Decode`] when the response body cannot be understood.
    pub async fn fetch_ticks(&self, symbols: &[Symbol]) -> Result<Vec<PriceTick>, FeedError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        let symbols_param = serde_json::to_string(&names).map_err(|e| FeedError::Decode {
            message: e.to_string(),
        })?;

        let url = format!("{}{TICKER_PRICE_PATH}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("symbols", symbols_param.as_str())])
            .send()
            .await
            .map_err(|e| FeedError::Poll {
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| FeedError::Poll {
                message: e.to_string(),
            })?;

        let entries: Vec<TickerPrice> =
            response.json().await.map_err(|e| FeedError::Decode {
                message: e.to_string(),
            })?;

        let at = Utc::now();
        let mut ticks = Vec::with_capacity(entries.len());
        for entry in entries {
            let price: Decimal = entry.price.parse().map_err(|_| FeedError::Decode {
                message: format!("unparsable price '{}' for {}", entry.price, entry.symbol),
            })?;
            if price <= Decimal::ZERO {
                continue;
            }
            ticks.push(PriceTick {
                symbol: Symbol::new(entry.symbol),
                price,
                at,
            });
        }

        Ok(ticks)
    }
}
