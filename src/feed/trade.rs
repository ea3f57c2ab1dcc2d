//! Simulated trade gateway client and trade markers

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::FetchError;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Request body for the trade endpoint
#[derive(Debug, Clone, Serialize)]
pub struct TradeRequest {
    pub symbol: String,
    pub side: TradeSide,
    pub price: f64,
    pub quantity: f64,
}

/// Fill details returned by the trade endpoint
///
/// Only `quantity` is consumed; the gateway may attach further fields.
#[derive(Debug, Clone, Deserialize)]
pub struct TradeFill {
    pub quantity: f64,
}

/// Response shape of the trade endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TradeResponse {
    pub success: bool,
    #[serde(default)]
    pub trade: Option<TradeFill>,
}

/// Marker for a filled trade, rendered against the active symbol's series.
///
/// Append-only per symbol activation; never re-validated against stored
/// candles and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeMarker {
    pub time: i64,
    pub side: TradeSide,
    pub quantity: f64,
    pub price: f64,
}

/// Client for the simulated trade endpoint
#[derive(Clone)]
pub struct TradeClient {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl TradeClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Submit a trade request and return the gateway's fill response.
    pub async fn place(&self, request: &TradeRequest) -> Result<TradeResponse, FetchError> {
        let url = format!("{}/trade", self.base_url);

        debug!(
            "Placing {} {} {} @ {}",
            request.side, request.quantity, request.symbol, request.price
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status(status, body));
        }

        let fill: TradeResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        info!(
            "Trade response for {} {}: success={}",
            request.side, request.symbol, fill.success
        );

        Ok(fill)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_request_serializes_lowercase_side() {
        let request = TradeRequest {
            symbol: "BTCUSDT".to_string(),
            side: TradeSide::Sell,
            price: 50000.0,
            quantity: 0.25,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["side"], "sell");
        assert_eq!(value["symbol"], "BTCUSDT");
        assert_eq!(value["quantity"], 0.25);
    }

    #[test]
    fn trade_response_tolerates_missing_fill() {
        let response: TradeResponse = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(!response.success);
        assert!(response.trade.is_none());
    }

    #[test]
    fn trade_response_ignores_extra_fill_fields() {
        let raw = r#"{"success":true,"trade":{"quantity":0.5,"id":42,"fee":0.001}}"#;
        let response: TradeResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.trade.unwrap().quantity, 0.5);
    }
}
