//! In-memory candle series with snapshot/update merge semantics
//!
//! [`CandleStore`] is the only mutator of chart data. It guarantees the
//! stored series is always ascending and unique by timestamp, so a rendering
//! surface fed from it never observes a regressed or duplicated bar.

use tracing::debug;

use crate::feed::types::Candle;

/// Outcome of applying one incremental update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    /// The update opened a new bar at the tail of the series.
    Appended,
    /// The update replaced the still-forming latest bar in place.
    Replaced,
    /// The update's timestamp precedes the latest stored bar; dropped.
    Stale,
    /// The update violates the OHLC invariant; dropped.
    Invalid,
}

impl UpsertResult {
    /// True when the series changed and the update should reach the sink.
    pub fn is_applied(&self) -> bool {
        matches!(self, UpsertResult::Appended | UpsertResult::Replaced)
    }
}

/// Counts reported by a snapshot load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub accepted: usize,
    pub dropped_invalid: usize,
    pub deduped: usize,
}

/// Ordered time series of OHLC bars for one symbol
#[derive(Debug, Default)]
pub struct CandleStore {
    candles: Vec<Candle>,
}

impl CandleStore {
    pub fn new() -> Self {
        Self {
            candles: Vec::new(),
        }
    }

    /// Replace the entire series with a snapshot batch.
    ///
    /// The batch is re-sorted ascending by time and de-duplicated with
    /// last-write-wins per timestamp. Candles violating the OHLC invariant
    /// are dropped individually so a partially bad snapshot still renders.
    pub fn load(&mut self, batch: Vec<Candle>) -> LoadReport {
        let mut report = LoadReport::default();

        let mut valid: Vec<Candle> = Vec::with_capacity(batch.len());
        for candle in batch {
            if candle.is_valid() {
                valid.push(candle);
            } else {
                debug!("Dropping invalid candle at time {} from snapshot", candle.time);
                report.dropped_invalid += 1;
            }
        }

        // Stable sort keeps later batch entries after earlier ones for equal
        // timestamps, so last-write-wins falls out of keeping the final entry.
        valid.sort_by_key(|c| c.time);

        self.candles.clear();
        for candle in valid {
            match self.candles.last_mut() {
                Some(last) if last.time == candle.time => {
                    *last = candle;
                    report.deduped += 1;
                }
                _ => self.candles.push(candle),
            }
        }

        report.accepted = self.candles.len();
        report
    }

    /// Apply one incremental update.
    ///
    /// Replace-if-equal, append-if-newer, drop-if-older: the stream may
    /// re-emit the still-open current bar any number of times without
    /// creating duplicate points, and the series stays time-monotonic.
    pub fn apply(&mut self, candle: Candle) -> UpsertResult {
        if !candle.is_valid() {
            debug!("Dropping invalid candle update at time {}", candle.time);
            return UpsertResult::Invalid;
        }

        match self.candles.last_mut() {
            Some(last) if candle.time == last.time => {
                *last = candle;
                UpsertResult::Replaced
            }
            Some(last) if candle.time < last.time => {
                debug!(
                    "Dropping stale candle update: time {} behind latest {}",
                    candle.time, last.time
                );
                UpsertResult::Stale
            }
            _ => {
                self.candles.push(candle);
                UpsertResult::Appended
            }
        }
    }

    /// Read-only peek at the most recent bar.
    pub fn latest(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// The full ascending series.
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Empty the series (symbol switch).
    pub fn clear(&mut self) {
        self.candles.clear();
    }
}
