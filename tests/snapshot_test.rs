//! HTTP endpoint tests for the snapshot and trade clients

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chartfeed::feed::rest::SnapshotClient;
use chartfeed::feed::trade::{TradeClient, TradeRequest, TradeSide};
use chartfeed::feed::types::FetchError;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn fetches_candle_snapshot() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/candles/BTCUSDT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"time": 100, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 3.0},
            {"time": 160, "open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0}
        ])))
        .mount(&server)
        .await;

    let client = SnapshotClient::new(server.uri(), TIMEOUT);
    let candles = client.get_candles("BTCUSDT").await.unwrap();

    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0].time, 100);
    assert_eq!(candles[0].volume, Some(3.0));
    assert_eq!(candles[1].volume, None);
}

#[tokio::test]
async fn snapshot_error_status_is_fetch_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/candles/BTCUSDT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = SnapshotClient::new(server.uri(), TIMEOUT);
    let error = client.get_candles("BTCUSDT").await.unwrap_err();

    match error {
        FetchError::Status(status, body) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn snapshot_bad_body_is_decode_failure() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/candles/BTCUSDT"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = SnapshotClient::new(server.uri(), TIMEOUT);
    let error = client.get_candles("BTCUSDT").await.unwrap_err();

    assert!(matches!(error, FetchError::Decode(_)));
}

#[tokio::test]
async fn trade_round_trip_returns_fill() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/trade"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "trade": {"quantity": 0.25, "id": 7}
        })))
        .mount(&server)
        .await;

    let client = TradeClient::new(server.uri(), TIMEOUT);
    let response = client
        .place(&TradeRequest {
            symbol: "BTCUSDT".to_string(),
            side: TradeSide::Buy,
            price: 50000.0,
            quantity: 0.25,
        })
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.trade.unwrap().quantity, 0.25);
}

#[tokio::test]
async fn rejected_trade_has_no_fill() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/trade"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": false})),
        )
        .mount(&server)
        .await;

    let client = TradeClient::new(server.uri(), TIMEOUT);
    let response = client
        .place(&TradeRequest {
            symbol: "BTCUSDT".to_string(),
            side: TradeSide::Sell,
            price: 50000.0,
            quantity: 1.0,
        })
        .await
        .unwrap();

    assert!(!response.success);
    assert!(response.trade.is_none());
}
