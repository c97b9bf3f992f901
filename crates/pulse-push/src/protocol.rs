//! Wire messages between the broadcaster and its clients.
//!
//! Everything is JSON text frames tagged by `type`. Unknown message types are
//! a protocol error on the server side and ignored on the client side.

use chrono::{DateTime, Utc};
use pulse_core::types::Signal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages a client sends to the broadcaster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { strategy_id: String },
    Unsubscribe { strategy_id: String },
    Ping,
}

/// Messages the broadcaster sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    Connected { client_id: Uuid },
    Subscribed { strategy_id: String },
    Unsubscribed { strategy_id: String },
    Pong,
    /// Signals of one strategy whose price or confidence changed since the
    /// previous broadcast.
    PriceUpdate {
        strategy_id: String,
        data: Vec<Signal>,
        timestamp: DateTime<Utc>,
    },
    Error { message: String },
}
