//! Live update stream connection
//!
//! Owns a single reconnecting WebSocket channel and translates wire payloads
//! into [`StreamEvent`]s, isolating the caller from transport failures. The
//! whole lifecycle runs in one background task; the caller consumes a plain
//! event sequence and a connection-state watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, info, warn};

use super::types::{ConnectionState, StreamEvent, parse_stream_payload};

/// Delay between a channel closure and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Capacity of the inbound event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Stream endpoint configuration
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Full WebSocket URL, e.g. `ws://localhost:8000/ws/candles`.
    pub url: String,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Handle to an open stream connection
///
/// Dropping the handle does not stop the connection; call [`close`] to
/// terminate the channel and cancel any pending reconnect timer.
///
/// [`close`]: StreamHandle::close
pub struct StreamHandle {
    shutdown_tx: mpsc::Sender<()>,
    closed: Arc<AtomicBool>,
}

impl StreamHandle {
    /// Terminate the channel and cancel the retry loop.
    ///
    /// Idempotent; after the first call the connection task stops emitting
    /// events and no reconnect attempt will fire.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown_tx.try_send(());
            info!("Stream connection close requested");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Reconnecting WebSocket connection to the live update endpoint
pub struct StreamConnection;

impl StreamConnection {
    /// Begin connecting asynchronously and return the consumer's end of the
    /// connection: a close handle, the inbound event sequence, and the
    /// connection-state watch channel.
    ///
    /// The connection retries forever on closure (one attempt per fixed
    /// delay); `StreamHandle::close` is the only way to stop it.
    pub fn open(
        config: StreamConfig,
    ) -> (
        StreamHandle,
        mpsc::Receiver<StreamEvent>,
        watch::Receiver<ConnectionState>,
    ) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let closed = Arc::new(AtomicBool::new(false));

        let handle = StreamHandle {
            shutdown_tx,
            closed: Arc::clone(&closed),
        };

        tokio::spawn(run_connection(config, event_tx, state_tx, shutdown_rx, closed));

        (handle, event_rx, state_rx)
    }
}

async fn run_connection(
    config: StreamConfig,
    event_tx: mpsc::Sender<StreamEvent>,
    state_tx: watch::Sender<ConnectionState>,
    mut shutdown_rx: mpsc::Receiver<()>,
    closed: Arc<AtomicBool>,
) {
    loop {
        if closed.load(Ordering::SeqCst) {
            return;
        }

        let _ = state_tx.send(ConnectionState::Connecting);

        let connect_result = tokio::select! {
            result = connect_async(&config.url) => result,
            _ = shutdown_rx.recv() => {
                let _ = state_tx.send(ConnectionState::Closed("closed by client".to_string()));
                return;
            }
        };

        let reason = match connect_result {
            Ok((mut ws_stream, _)) => {
                let _ = state_tx.send(ConnectionState::Open);
                info!("Stream connected to {}", config.url);

                loop {
                    tokio::select! {
                        message = ws_stream.next() => {
                            match message {
                                Some(Ok(Message::Text(text))) => {
                                    if closed.load(Ordering::SeqCst) {
                                        return;
                                    }
                                    if event_tx.send(parse_stream_payload(&text)).await.is_err() {
                                        // Consumer went away; nothing left to feed.
                                        return;
                                    }
                                }
                                Some(Ok(Message::Binary(bytes))) => {
                                    if closed.load(Ordering::SeqCst) {
                                        return;
                                    }
                                    let event = match std::str::from_utf8(&bytes) {
                                        Ok(text) => parse_stream_payload(text),
                                        Err(_) => StreamEvent::Malformed(
                                            "<non-utf8 binary frame>".to_string(),
                                        ),
                                    };
                                    if event_tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                                // Ping/Pong are answered by the transport.
                                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                                Some(Ok(Message::Close(frame))) => {
                                    let reason = match frame {
                                        Some(frame) => format!("closed by server: {}", frame.reason),
                                        None => "closed by server".to_string(),
                                    };
                                    break reason;
                                }
                                Some(Ok(_)) => {}
                                Some(Err(e)) => break format!("transport error: {e}"),
                                None => break "stream ended".to_string(),
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            let _ = ws_stream.close(None).await;
                            let _ = state_tx.send(ConnectionState::Closed(
                                "closed by client".to_string(),
                            ));
                            return;
                        }
                    }
                }
            }
            Err(e) => format!("connect failed: {e}"),
        };

        warn!("Stream channel closed: {}", reason);
        let _ = state_tx.send(ConnectionState::Closed(reason));

        if closed.load(Ordering::SeqCst) {
            return;
        }

        // Exactly one reconnect attempt per closure, after a fixed delay.
        let _ = state_tx.send(ConnectionState::Reconnecting);
        metrics::counter!("chartfeed_stream_reconnects_total", 1);
        debug!(
            "Scheduling reconnect in {} ms",
            config.reconnect_delay.as_millis()
        );

        tokio::select! {
            _ = tokio::time::sleep(config.reconnect_delay) => {}
            _ = shutdown_rx.recv() => {
                let _ = state_tx.send(ConnectionState::Closed("closed by client".to_string()));
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn wait_for_state(
        rx: &mut watch::Receiver<ConnectionState>,
        predicate: impl Fn(&ConnectionState) -> bool,
    ) {
        timeout(Duration::from_secs(5), async {
            loop {
                if predicate(&rx.borrow()) {
                    return;
                }
                rx.changed().await.expect("state channel closed");
            }
        })
        .await
        .expect("state not reached in time");
    }

    #[tokio::test]
    async fn failed_connect_schedules_reconnect() {
        // Nothing listens on this port, so connecting fails immediately.
        let config = StreamConfig {
            url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay: Duration::from_secs(60),
        };
        let (handle, _event_rx, mut state_rx) = StreamConnection::open(config);

        wait_for_state(&mut state_rx, |s| {
            matches!(s, ConnectionState::Reconnecting)
        })
        .await;

        handle.close();
    }

    #[tokio::test]
    async fn close_cancels_pending_reconnect() {
        let config = StreamConfig {
            url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay: Duration::from_secs(60),
        };
        let (handle, mut event_rx, mut state_rx) = StreamConnection::open(config);

        wait_for_state(&mut state_rx, |s| {
            matches!(s, ConnectionState::Reconnecting)
        })
        .await;

        handle.close();

        // The connection task exits without attempting another connect; the
        // event channel drains to None once the sender is dropped.
        let end = timeout(Duration::from_secs(5), event_rx.recv())
            .await
            .expect("event channel did not close");
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let config = StreamConfig {
            url: "ws://127.0.0.1:9".to_string(),
            reconnect_delay: Duration::from_secs(60),
        };
        let (handle, _event_rx, _state_rx) = StreamConnection::open(config);

        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }
}
