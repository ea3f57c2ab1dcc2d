//! Historical snapshot REST client

use std::time::Duration;

use tracing::{debug, info};

use super::types::{Candle, FetchError};

/// Client for the historical candle endpoint
#[derive(Clone)]
pub struct SnapshotClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl SnapshotClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the full historical series for a symbol.
    ///
    /// The response is a JSON array of candles. Ascending time order is
    /// assumed but not required; the store re-sorts on load.
    pub async fn get_candles(&self, symbol: &str) -> Result<Vec<Candle>, FetchError> {
        let url = format!("{}/candles/{}", self.base_url, symbol);

        debug!("Fetching candle snapshot from: {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status(status, body));
        }

        let candles: Vec<Candle> = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        info!(
            "Fetched candle snapshot for {}: {} candles",
            symbol,
            candles.len()
        );

        Ok(candles)
    }
}
