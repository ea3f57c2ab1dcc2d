//! Market data endpoint integration
//!
//! Handles the stream channel, snapshot and trade HTTP calls, and wire
//! message parsing.

pub mod rest;
pub mod stream;
pub mod trade;
pub mod types;

// Re-export commonly used types
pub use rest::SnapshotClient;
pub use stream::{StreamConfig, StreamConnection, StreamHandle};
pub use trade::{TradeClient, TradeMarker, TradeRequest, TradeSide};
pub use types::*;
