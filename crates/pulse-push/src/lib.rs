//! Realtime signal push over websockets.
//!
//! The broadcaster serves subscribe/unsubscribe plus heartbeat and pushes
//! per-strategy deltas; the client reconnects with capped exponential
//! backoff and replays its subscription set.

pub mod client;
pub mod protocol;
pub mod server;

pub use client::{PushClient, PushClientConfig, PushHandle};
pub use protocol::{ClientMessage, ServerMessage};
pub use server::{Broadcaster, BroadcasterConfig};
