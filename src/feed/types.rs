//! Feed data types and wire-message classification

use serde::{Deserialize, Serialize};

/// Longest prefix of a malformed payload kept for logging.
const MALFORMED_SNIPPET_LEN: usize = 256;

/// One OHLC bar, timestamped in unix seconds aligned to the exchange bucket.
///
/// Field names match the wire shape used by both the snapshot endpoint and
/// the live stream, so a candle deserializes directly from either source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Candle {
    /// Check the OHLC invariant: all prices finite,
    /// `low <= min(open, close) <= max(open, close) <= high`,
    /// and volume (when present) finite and non-negative.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return false;
        }
        if let Some(v) = self.volume {
            if !v.is_finite() || v < 0.0 {
                return false;
            }
        }
        let body_low = self.open.min(self.close);
        let body_high = self.open.max(self.close);
        self.low <= body_low && body_high <= self.high
    }
}

/// Connection state of the live stream channel.
///
/// Published over a watch channel; the UI status text derives from it 1:1.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed(String),
    Reconnecting,
}

/// Typed inbound event produced from a wire message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Full series replacement delivered over the stream.
    Snapshot(Vec<Candle>),
    /// Incremental update for the latest bar.
    Update(Candle),
    /// Payload that failed to parse; carries a truncated copy of the raw
    /// text for logging. Never tears down the channel.
    Malformed(String),
}

/// Classify one inbound text payload into a [`StreamEvent`].
///
/// Accepted shapes:
/// - `{"type": "snapshot", "data": [Candle, ...]}`
/// - `{"type": <other>, "data": Candle}`
/// - a bare `Candle` object
///
/// Anything else (non-JSON, missing fields, wrong field types) classifies as
/// `Malformed`.
pub fn parse_stream_payload(raw: &str) -> StreamEvent {
    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return StreamEvent::Malformed(snippet(raw)),
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("snapshot") => match value.get("data") {
            Some(data) => match serde_json::from_value::<Vec<Candle>>(data.clone()) {
                Ok(candles) => StreamEvent::Snapshot(candles),
                Err(_) => StreamEvent::Malformed(snippet(raw)),
            },
            None => StreamEvent::Malformed(snippet(raw)),
        },
        Some(_) => match value.get("data") {
            Some(data) => match serde_json::from_value::<Candle>(data.clone()) {
                Ok(candle) => StreamEvent::Update(candle),
                Err(_) => StreamEvent::Malformed(snippet(raw)),
            },
            None => StreamEvent::Malformed(snippet(raw)),
        },
        None => match serde_json::from_value::<Candle>(value) {
            Ok(candle) => StreamEvent::Update(candle),
            Err(_) => StreamEvent::Malformed(snippet(raw)),
        },
    }
}

fn snippet(raw: &str) -> String {
    if raw.len() <= MALFORMED_SNIPPET_LEN {
        raw.to_string()
    } else {
        let mut end = MALFORMED_SNIPPET_LEN;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        raw[..end].to_string()
    }
}

/// Error types for snapshot and trade HTTP requests
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Request(String),
    #[error("HTTP status error: {0} - {1}")]
    Status(u16, String),
    #[error("response decode error: {0}")]
    Decode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(time: i64) -> Candle {
        Candle {
            time,
            open: 10.0,
            high: 12.0,
            low: 9.0,
            close: 11.0,
            volume: Some(3.5),
        }
    }

    #[test]
    fn valid_candle_passes_invariant() {
        assert!(candle(100).is_valid());
    }

    #[test]
    fn high_below_body_is_invalid() {
        let mut c = candle(100);
        c.high = 10.5;
        assert!(!c.is_valid());
    }

    #[test]
    fn low_above_body_is_invalid() {
        let mut c = candle(100);
        c.low = 10.5;
        assert!(!c.is_valid());
    }

    #[test]
    fn non_finite_price_is_invalid() {
        let mut c = candle(100);
        c.close = f64::NAN;
        assert!(!c.is_valid());
    }

    #[test]
    fn negative_volume_is_invalid() {
        let mut c = candle(100);
        c.volume = Some(-1.0);
        assert!(!c.is_valid());
    }

    #[test]
    fn missing_volume_is_acceptable() {
        let mut c = candle(100);
        c.volume = None;
        assert!(c.is_valid());
    }

    #[test]
    fn parses_snapshot_message() {
        let raw = r#"{"type":"snapshot","data":[
            {"time":100,"open":1.0,"high":2.0,"low":0.5,"close":1.5},
            {"time":160,"open":1.5,"high":2.5,"low":1.0,"close":2.0,"volume":4.0}
        ]}"#;
        match parse_stream_payload(raw) {
            StreamEvent::Snapshot(candles) => {
                assert_eq!(candles.len(), 2);
                assert_eq!(candles[0].time, 100);
                assert_eq!(candles[1].volume, Some(4.0));
            }
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn parses_enveloped_update() {
        let raw = r#"{"type":"update","data":{"time":100,"open":1.0,"high":2.0,"low":0.5,"close":1.5}}"#;
        match parse_stream_payload(raw) {
            StreamEvent::Update(c) => assert_eq!(c.close, 1.5),
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn parses_bare_candle_update() {
        let raw = r#"{"time":100,"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":2.0}"#;
        match parse_stream_payload(raw) {
            StreamEvent::Update(c) => {
                assert_eq!(c.time, 100);
                assert_eq!(c.volume, Some(2.0));
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn non_json_is_malformed() {
        match parse_stream_payload("not json at all") {
            StreamEvent::Malformed(raw) => assert_eq!(raw, "not json at all"),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn missing_fields_are_malformed() {
        assert!(matches!(
            parse_stream_payload(r#"{"time":100,"open":1.0}"#),
            StreamEvent::Malformed(_)
        ));
        assert!(matches!(
            parse_stream_payload(r#"{"type":"update"}"#),
            StreamEvent::Malformed(_)
        ));
        assert!(matches!(
            parse_stream_payload(r#"{"type":"snapshot","data":{"time":100}}"#),
            StreamEvent::Malformed(_)
        ));
    }

    #[test]
    fn malformed_snippet_is_bounded() {
        let raw = format!("{{{}", "x".repeat(4096));
        match parse_stream_payload(&raw) {
            StreamEvent::Malformed(snippet) => assert!(snippet.len() <= 256),
            other => panic!("expected malformed, got {other:?}"),
        }
    }
}
