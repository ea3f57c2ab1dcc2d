//! Terminal output surface
//!
//! The real rendering surface lives outside this crate; the binary plugs in
//! [`LogSink`], which narrates replaces, upserts, and markers through the
//! tracing pipeline.

use chrono::{TimeZone, Utc};
use tracing::info;

use crate::feed::trade::TradeMarker;
use crate::feed::types::Candle;
use crate::sync::ChartSink;

/// Chart sink that logs every operation instead of drawing it
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        Self
    }
}

fn format_time(time: i64) -> String {
    match Utc.timestamp_opt(time, 0).single() {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => time.to_string(),
    }
}

impl ChartSink for LogSink {
    fn replace_series(&mut self, symbol: &str, candles: &[Candle]) {
        match candles.last() {
            Some(last) => info!(
                "[{}] chart reset: {} candles, latest {} close {}",
                symbol,
                candles.len(),
                format_time(last.time),
                last.close
            ),
            None => info!("[{}] chart reset: empty series", symbol),
        }
    }

    fn upsert_candle(&mut self, symbol: &str, candle: &Candle) {
        info!(
            "[{}] {} o={} h={} l={} c={}",
            symbol,
            format_time(candle.time),
            candle.open,
            candle.high,
            candle.low,
            candle.close
        );
    }

    fn set_markers(&mut self, symbol: &str, markers: &[TradeMarker]) {
        if let Some(marker) = markers.last() {
            info!(
                "[{}] marker {}: {} {} @ {} ({} total)",
                symbol,
                format_time(marker.time),
                marker.side,
                marker.quantity,
                marker.price,
                markers.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_unix_seconds() {
        assert_eq!(format_time(0), "1970-01-01 00:00:00");
    }
}
