//! Symbol activation lifecycle and event dispatch
//!
//! [`SyncController`] owns the candle store, the current symbol, the trade
//! markers, and the generation token. Everything external (snapshot fetch,
//! trade fill, stream events, connection-state changes) re-enters through one
//! internal event channel and is handled sequentially, so no locking is
//! needed around the shared state. Work spawned for a symbol activation is
//! tagged with the generation current at spawn time; completions bearing an
//! older generation are dropped on arrival.

use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::feed::rest::SnapshotClient;
use crate::feed::stream::{StreamConfig, StreamConnection, StreamHandle};
use crate::feed::trade::{TradeClient, TradeMarker, TradeRequest, TradeResponse, TradeSide};
use crate::feed::types::{Candle, ConnectionState, FetchError, StreamEvent};
use crate::store::{CandleStore, UpsertResult};

/// Rendering surface capability interface.
///
/// The surface only ever observes one full replace per symbol activation
/// followed by monotonically non-decreasing upserts; it never sees a stale
/// or invalid candle.
pub trait ChartSink: Send {
    /// Replace the surface's entire series for the symbol.
    fn replace_series(&mut self, symbol: &str, candles: &[Candle]);
    /// Insert or update the latest bar.
    fn upsert_candle(&mut self, symbol: &str, candle: &Candle);
    /// Replace the surface's trade marker list for the symbol.
    fn set_markers(&mut self, symbol: &str, markers: &[TradeMarker]);
}

/// Indicator value for the status surface.
///
/// Derived 1:1 from the stream's [`ConnectionState`], plus the distinct
/// terminal value shown when the historical load failed and no baseline has
/// arrived from the stream either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedStatus {
    Connecting,
    Live,
    Disconnected,
    Reconnecting,
    NoData,
}

impl FeedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedStatus::Connecting => "connecting",
            FeedStatus::Live => "live",
            FeedStatus::Disconnected => "disconnected",
            FeedStatus::Reconnecting => "reconnecting",
            FeedStatus::NoData => "no data",
        }
    }
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&ConnectionState> for FeedStatus {
    fn from(state: &ConnectionState) -> Self {
        match state {
            ConnectionState::Connecting => FeedStatus::Connecting,
            ConnectionState::Open => FeedStatus::Live,
            ConnectionState::Closed(_) => FeedStatus::Disconnected,
            ConnectionState::Reconnecting => FeedStatus::Reconnecting,
        }
    }
}

/// Observability counters maintained by the controller
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStats {
    pub malformed: u64,
    pub stale_updates: u64,
    pub invalid_updates: u64,
    pub duplicate_snapshots: u64,
    pub stale_generation_drops: u64,
}

/// Commands accepted by the controller
#[derive(Debug, Clone)]
pub enum SyncCommand {
    SelectSymbol(String),
    PlaceTrade { side: TradeSide, quantity: f64 },
    ReportStatus,
    Shutdown,
}

/// Endpoint configuration for the controller
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST endpoints, e.g. `http://localhost:8000`.
    pub rest_url: String,
    /// Full stream endpoint URL, e.g. `ws://localhost:8000/ws/candles`.
    pub ws_url: String,
    /// Per-request timeout for snapshot and trade HTTP calls.
    pub request_timeout: Duration,
    /// Fixed delay between stream reconnect attempts.
    pub reconnect_delay: Duration,
}

/// Cloneable handle for sending commands and reading status
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::UnboundedSender<SyncCommand>,
    status_rx: watch::Receiver<FeedStatus>,
}

impl SyncHandle {
    pub fn select_symbol(&self, symbol: impl Into<String>) -> Result<()> {
        self.send(SyncCommand::SelectSymbol(symbol.into()))
    }

    pub fn place_trade(&self, side: TradeSide, quantity: f64) -> Result<()> {
        self.send(SyncCommand::PlaceTrade { side, quantity })
    }

    pub fn report_status(&self) -> Result<()> {
        self.send(SyncCommand::ReportStatus)
    }

    pub fn shutdown(&self) -> Result<()> {
        self.send(SyncCommand::Shutdown)
    }

    /// Current status indicator value.
    pub fn status(&self) -> FeedStatus {
        *self.status_rx.borrow()
    }

    /// Watch channel for status changes.
    pub fn status_rx(&self) -> watch::Receiver<FeedStatus> {
        self.status_rx.clone()
    }

    fn send(&self, command: SyncCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|e| anyhow::anyhow!("Failed to send command: {}", e))
    }
}

/// Completions and stream traffic delivered back into the event loop
enum ControllerEvent {
    SnapshotLoaded {
        generation: u64,
        symbol: String,
        result: Result<Vec<Candle>, FetchError>,
    },
    Stream {
        generation: u64,
        event: StreamEvent,
    },
    StreamState {
        generation: u64,
        state: ConnectionState,
    },
    TradeCompleted {
        generation: u64,
        side: TradeSide,
        quantity: f64,
        price: f64,
        time: i64,
        result: Result<TradeResponse, FetchError>,
    },
}

/// Orchestrates snapshot install, stream dispatch, and symbol switches
pub struct SyncController {
    snapshot_client: SnapshotClient,
    trade_client: TradeClient,
    ws_url: String,
    reconnect_delay: Duration,
    sink: Box<dyn ChartSink>,
    store: CandleStore,
    markers: Vec<TradeMarker>,
    symbol: Option<String>,
    generation: u64,
    baseline_loaded: bool,
    fetch_failed: bool,
    stream: Option<StreamHandle>,
    stream_state: ConnectionState,
    stats: SyncStats,
    command_rx: mpsc::UnboundedReceiver<SyncCommand>,
    event_tx: mpsc::UnboundedSender<ControllerEvent>,
    event_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    status_tx: watch::Sender<FeedStatus>,
}

impl SyncController {
    /// Create a controller and its command/status handle.
    pub fn new(config: SyncConfig, sink: Box<dyn ChartSink>) -> (Self, SyncHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(FeedStatus::Connecting);

        let controller = Self {
            snapshot_client: SnapshotClient::new(config.rest_url.clone(), config.request_timeout),
            trade_client: TradeClient::new(config.rest_url, config.request_timeout),
            ws_url: config.ws_url,
            reconnect_delay: config.reconnect_delay,
            sink,
            store: CandleStore::new(),
            markers: Vec::new(),
            symbol: None,
            generation: 0,
            baseline_loaded: false,
            fetch_failed: false,
            stream: None,
            stream_state: ConnectionState::Connecting,
            stats: SyncStats::default(),
            command_rx,
            event_tx,
            event_rx,
            status_tx,
        };

        let handle = SyncHandle {
            command_tx,
            status_rx,
        };

        (controller, handle)
    }

    /// Run the event loop until shutdown.
    pub async fn run(mut self) {
        info!("Sync controller started");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(SyncCommand::SelectSymbol(symbol)) => self.start_activation(symbol),
                    Some(SyncCommand::PlaceTrade { side, quantity }) => {
                        self.start_trade(side, quantity);
                    }
                    Some(SyncCommand::ReportStatus) => self.report_status(),
                    Some(SyncCommand::Shutdown) | None => break,
                },
                Some(event) = self.event_rx.recv() => self.handle_event(event),
            }
        }

        self.teardown_stream();
        info!("Sync controller stopped");
    }

    /// Begin a symbol activation: invalidate in-flight work, tear down the
    /// previous stream, clear per-symbol state, and spawn the snapshot fetch.
    fn start_activation(&mut self, symbol: String) {
        self.generation += 1;
        self.teardown_stream();
        self.store.clear();
        self.markers.clear();
        self.baseline_loaded = false;
        self.fetch_failed = false;
        self.stream_state = ConnectionState::Connecting;
        self.symbol = Some(symbol.clone());

        info!(
            "Activating symbol {} (generation {})",
            symbol, self.generation
        );
        self.publish_status();

        let generation = self.generation;
        let client = self.snapshot_client.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.get_candles(&symbol).await;
            let _ = event_tx.send(ControllerEvent::SnapshotLoaded {
                generation,
                symbol,
                result,
            });
        });
    }

    /// Price a trade off the latest close and spawn the gateway call.
    fn start_trade(&mut self, side: TradeSide, quantity: f64) {
        let Some(symbol) = self.symbol.clone() else {
            warn!("Trade ignored: no active symbol");
            return;
        };
        let Some(latest) = self.store.latest() else {
            warn!("Trade ignored: no price data available yet");
            return;
        };
        if !quantity.is_finite() || quantity <= 0.0 {
            warn!("Trade ignored: bad quantity {}", quantity);
            return;
        }

        let request = TradeRequest {
            symbol,
            side,
            price: latest.close,
            quantity,
        };
        let time = latest.time;
        let generation = self.generation;
        let client = self.trade_client.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = client.place(&request).await;
            let _ = event_tx.send(ControllerEvent::TradeCompleted {
                generation,
                side,
                quantity: request.quantity,
                price: request.price,
                time,
                result,
            });
        });
    }

    fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::SnapshotLoaded {
                generation,
                symbol,
                result,
            } => self.handle_snapshot_loaded(generation, symbol, result),
            ControllerEvent::Stream { generation, event } => {
                self.handle_stream_event(generation, event);
            }
            ControllerEvent::StreamState { generation, state } => {
                self.handle_stream_state(generation, state);
            }
            ControllerEvent::TradeCompleted {
                generation,
                side,
                quantity,
                price,
                time,
                result,
            } => self.handle_trade_completed(generation, side, quantity, price, time, result),
        }
    }

    fn handle_snapshot_loaded(
        &mut self,
        generation: u64,
        symbol: String,
        result: Result<Vec<Candle>, FetchError>,
    ) {
        if self.drop_if_stale(generation, "snapshot response") {
            return;
        }

        match result {
            Ok(candles) => {
                let report = self.store.load(candles);
                if report.dropped_invalid > 0 {
                    warn!(
                        "Snapshot for {} contained {} invalid candles (dropped)",
                        symbol, report.dropped_invalid
                    );
                }
                self.baseline_loaded = true;
                self.sink.replace_series(&symbol, self.store.candles());
                info!(
                    "Installed snapshot for {}: {} candles",
                    symbol, report.accepted
                );
                self.open_stream();
                self.publish_status();
            }
            Err(e) => {
                error!("Snapshot fetch for {} failed: {}", symbol, e);
                self.fetch_failed = true;
                // The stream still opens: a stream-borne snapshot can serve
                // as the fallback baseline. Status stays "no data" until one
                // arrives.
                self.open_stream();
                self.publish_status();
            }
        }
    }

    fn handle_stream_event(&mut self, generation: u64, event: StreamEvent) {
        if self.drop_if_stale(generation, "stream event") {
            return;
        }

        match event {
            StreamEvent::Snapshot(candles) => {
                if self.baseline_loaded {
                    self.stats.duplicate_snapshots += 1;
                    metrics::counter!("chartfeed_duplicate_snapshots_total", 1);
                    debug!("Ignoring stream snapshot; baseline already installed");
                    return;
                }
                let symbol = self.symbol.clone().unwrap_or_default();
                let report = self.store.load(candles);
                self.baseline_loaded = true;
                self.sink.replace_series(&symbol, self.store.candles());
                info!(
                    "Installed stream snapshot for {}: {} candles",
                    symbol, report.accepted
                );
                self.publish_status();
            }
            StreamEvent::Update(candle) => {
                if !self.baseline_loaded {
                    debug!("Dropping update at time {}: no baseline yet", candle.time);
                    return;
                }
                match self.store.apply(candle) {
                    UpsertResult::Appended | UpsertResult::Replaced => {
                        if let (Some(symbol), Some(latest)) =
                            (self.symbol.as_deref(), self.store.latest())
                        {
                            self.sink.upsert_candle(symbol, latest);
                        }
                    }
                    UpsertResult::Stale => {
                        self.stats.stale_updates += 1;
                        metrics::counter!("chartfeed_stale_updates_total", 1);
                    }
                    UpsertResult::Invalid => {
                        self.stats.invalid_updates += 1;
                        metrics::counter!("chartfeed_invalid_updates_total", 1);
                    }
                }
            }
            StreamEvent::Malformed(raw) => {
                self.stats.malformed += 1;
                metrics::counter!("chartfeed_malformed_total", 1);
                debug!("Discarding malformed stream payload: {}", raw);
            }
        }
    }

    fn handle_stream_state(&mut self, generation: u64, state: ConnectionState) {
        if self.drop_if_stale(generation, "stream state change") {
            return;
        }

        match &state {
            ConnectionState::Open => info!("Stream open"),
            ConnectionState::Closed(reason) => warn!("Stream closed: {}", reason),
            ConnectionState::Reconnecting => info!("Stream reconnecting"),
            ConnectionState::Connecting => debug!("Stream connecting"),
        }

        self.stream_state = state;
        self.publish_status();
    }

    fn handle_trade_completed(
        &mut self,
        generation: u64,
        side: TradeSide,
        quantity: f64,
        price: f64,
        time: i64,
        result: Result<TradeResponse, FetchError>,
    ) {
        if self.drop_if_stale(generation, "trade response") {
            return;
        }

        match result {
            Ok(response) if response.success => {
                let filled = response.trade.map(|t| t.quantity).unwrap_or(quantity);
                self.markers.push(TradeMarker {
                    time,
                    side,
                    quantity: filled,
                    price,
                });
                info!("Trade filled: {} {} @ {}", side, filled, price);
                if let Some(symbol) = self.symbol.as_deref() {
                    self.sink.set_markers(symbol, &self.markers);
                }
            }
            Ok(_) => info!("Trade rejected by gateway: {} {} @ {}", side, quantity, price),
            Err(e) => error!("Trade request failed: {}", e),
        }
    }

    /// Drop completions whose generation predates the current activation.
    fn drop_if_stale(&mut self, generation: u64, what: &str) -> bool {
        if generation != self.generation {
            self.stats.stale_generation_drops += 1;
            metrics::counter!("chartfeed_stale_generation_drops_total", 1);
            debug!(
                "Dropping {} from superseded generation {} (current {})",
                what, generation, self.generation
            );
            return true;
        }
        false
    }

    fn open_stream(&mut self) {
        let config = StreamConfig {
            url: self.ws_url.clone(),
            reconnect_delay: self.reconnect_delay,
        };
        let (handle, mut stream_rx, mut state_rx) = StreamConnection::open(config);
        let generation = self.generation;

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = stream_rx.recv().await {
                if event_tx
                    .send(ControllerEvent::Stream { generation, event })
                    .is_err()
                {
                    break;
                }
            }
        });

        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            loop {
                let state = state_rx.borrow_and_update().clone();
                if event_tx
                    .send(ControllerEvent::StreamState { generation, state })
                    .is_err()
                {
                    break;
                }
                if state_rx.changed().await.is_err() {
                    break;
                }
            }
        });

        self.stream = Some(handle);
    }

    fn teardown_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.close();
        }
    }

    fn publish_status(&self) {
        let status = if self.fetch_failed && !self.baseline_loaded {
            FeedStatus::NoData
        } else if !self.baseline_loaded {
            FeedStatus::Connecting
        } else {
            FeedStatus::from(&self.stream_state)
        };

        self.status_tx.send_if_modified(|current| {
            if *current != status {
                *current = status;
                true
            } else {
                false
            }
        });
    }

    fn report_status(&self) {
        let symbol = self.symbol.as_deref().unwrap_or("<none>");
        info!(
            "Status: symbol={} status={} candles={} markers={}",
            symbol,
            self.status_tx.borrow().as_str(),
            self.store.len(),
            self.markers.len()
        );
        info!(
            "Counters: malformed={} stale={} invalid={} duplicate_snapshots={} stale_generation_drops={}",
            self.stats.malformed,
            self.stats.stale_updates,
            self.stats.invalid_updates,
            self.stats.duplicate_snapshots,
            self.stats.stale_generation_drops
        );
    }
}
