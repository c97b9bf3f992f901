//! Reconnecting websocket client.
//!
//! The client owns its subscription set. On every (re)connect it replays the
//! set before anything else, so a dropped connection never loses
//! subscriptions. Reconnects back off exponentially from the configured base
//! up to the cap, and give up after a bounded number of consecutive failures.

use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use pulse_core::error::{PulseResult, PushError};
use std::collections::HashSet;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::protocol::{ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Client tuning knobs.
#[derive(Debug, Clone)]
pub struct PushClientConfig {
    /// Server url, e.g. `ws://127.0.0.1:8765`
    pub url: String,
    /// First reconnect delay
    pub reconnect_base: Duration,
    /// Upper bound on the doubled delay
    pub reconnect_cap: Duration,
    /// Consecutive failures before giving up
    pub max_reconnect_attempts: u32,
    /// Heartbeat cadence
    pub ping_interval: Duration,
}

impl PushClientConfig {
    /// Defaults for a given server url.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_base: Duration::from_secs(2),
            reconnect_cap: Duration::from_secs(8),
            max_reconnect_attempts: 5,
            ping_interval: Duration::from_secs(15),
        }
    }
}

enum Command {
    Subscribe(String),
    Unsubscribe(String),
    Close,
}

/// Control handle for a running [`PushClient`].
#[derive(Clone)]
pub struct PushHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl PushHandle {
    pub fn subscribe(&self, strategy_id: impl Into<String>) {
        let _ = self.tx.send(Command::Subscribe(strategy_id.into()));
    }

    pub fn unsubscribe(&self, strategy_id: impl Into<String>) {
        let _ = self.tx.send(Command::Unsubscribe(strategy_id.into()));
    }

    pub fn close(&self) {
        let _ = self.tx.send(Command::Close);
    }
}

enum SessionEnd {
    /// Deliberate close, no reconnect.
    Closed,
    /// Connection lost, reconnect.
    Lost(String),
}

/// The reconnecting push client.
pub struct PushClient {
    config: PushClientConfig,
    subscriptions: HashSet<String>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ServerMessage>,
}

impl PushClient {
    /// Build a client with an initial subscription set. Server messages
    /// arrive on the returned receiver; the handle controls subscriptions.
    pub fn new(
        config: PushClientConfig,
        initial: impl IntoIterator<Item = String>,
    ) -> (Self, PushHandle, mpsc::UnboundedReceiver<ServerMessage>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let client = Self {
            config,
            subscriptions: initial.into_iter().collect(),
            commands: cmd_rx,
            events: event_tx,
        };
        (client, PushHandle { tx: cmd_tx }, event_rx)
    }

    /// Connect and process messages until closed or reconnects are exhausted.
    pub async fn run(mut self) -> PulseResult<()> {
        let mut attempt: u32 = 0;
        loop {
            match connect_async(&self.config.url).await {
                Ok((ws, _)) => {
                    attempt = 0;
                    info!(url = %self.config.url, "push client connected");
                    match self.session(ws).await {
                        SessionEnd::Closed => return Ok(()),
                        SessionEnd::Lost(reason) => {
                            warn!(reason = %reason, "connection lost");
                        }
                    }
                }
                Err(e) => debug!(url = %self.config.url, error = %e, "connect failed"),
            }

            attempt += 1;
            if attempt > self.config.max_reconnect_attempts {
                return Err(PushError::ReconnectExhausted {
                    attempts: self.config.max_reconnect_attempts,
                }
                .into());
            }
            let delay = reconnect_delay(&self.config, attempt);
            info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting");
            tokio::time::sleep(delay).await;
        }
    }

    async fn session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();

        // Replay the preserved subscription set first.
        for strategy_id in self.subscriptions.clone() {
            if let Err(end) = send(&mut sink, &ClientMessage::Subscribe { strategy_id }).await {
                return end;
            }
        }

        let mut ping = tokio::time::interval(self.config.ping_interval);
        ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ping.tick().await;

        loop {
            tokio::select! {
                _ = ping.tick() => {
                    if let Err(end) = send(&mut sink, &ClientMessage::Ping).await {
                        return end;
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Subscribe(strategy_id)) => {
                        self.subscriptions.insert(strategy_id.clone());
                        if let Err(end) = send(&mut sink, &ClientMessage::Subscribe { strategy_id }).await {
                            return end;
                        }
                    }
                    Some(Command::Unsubscribe(strategy_id)) => {
                        self.subscriptions.remove(&strategy_id);
                        if let Err(end) = send(&mut sink, &ClientMessage::Unsubscribe { strategy_id }).await {
                            return end;
                        }
                    }
                    Some(Command::Close) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Closed;
                    }
                },
                msg = stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(event) => {
                                let _ = self.events.send(event);
                            }
                            Err(e) => debug!(error = %e, "ignoring unrecognized frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return SessionEnd::Lost("server closed the connection".to_string());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Lost(e.to_string()),
                },
            }
        }
    }
}

async fn send(sink: &mut WsSink, msg: &ClientMessage) -> Result<(), SessionEnd> {
    let text = serde_json::to_string(msg).map_err(|e| SessionEnd::Lost(e.to_string()))?;
    sink.send(Message::Text(text))
        .await
        .map_err(|e| SessionEnd::Lost(e.to_string()))
}

/// Delay before reconnect `attempt` (1-based): base doubled per attempt,
/// capped.
fn reconnect_delay(config: &PushClientConfig, attempt: u32) -> Duration {
    let shift = (attempt - 1).min(16);
    (config.reconnect_base * (1u32 << shift)).min(config.reconnect_cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::{Broadcaster, BroadcasterConfig};
    use chrono::Utc;
    use pulse_core::types::{Category, Signal, SignalAction};
    use pulse_core::PulseError;
    use std::sync::Arc;

    #[test]
    fn test_reconnect_delay_doubles_then_caps() {
        let config = PushClientConfig::new("ws://localhost:1");
        let delays: Vec<u64> = (1..=5)
            .map(|a| reconnect_delay(&config, a).as_secs())
            .collect();
        assert_eq!(delays, vec![2, 4, 8, 8, 8]);
    }

    #[tokio::test]
    async fn test_reconnect_exhausted_on_dead_server() {
        // Grab a free port and release it so nothing is listening there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut config = PushClientConfig::new(format!("ws://127.0.0.1:{port}"));
        config.reconnect_base = Duration::from_millis(1);
        config.reconnect_cap = Duration::from_millis(2);
        config.max_reconnect_attempts = 3;

        let (client, _handle, _events) = PushClient::new(config, vec![]);
        let err = client.run().await.unwrap_err();
        assert!(matches!(
            err,
            PulseError::Push(PushError::ReconnectExhausted { attempts: 3 })
        ));
    }

    #[tokio::test]
    async fn test_initial_subscriptions_replayed_on_connect() {
        let broadcaster = Arc::new(
            Broadcaster::bind("127.0.0.1:0", BroadcasterConfig::default())
                .await
                .unwrap(),
        );
        let addr = broadcaster.local_addr();
        tokio::spawn(Arc::clone(&broadcaster).run());

        let config = PushClientConfig::new(format!("ws://{addr}"));
        let (client, handle, mut events) =
            PushClient::new(config, vec!["volume_surge".to_string()]);
        tokio::spawn(client.run());

        // Connected ack, then the replayed subscription's ack.
        assert!(matches!(
            events.recv().await.unwrap(),
            ServerMessage::Connected { .. }
        ));
        match events.recv().await.unwrap() {
            ServerMessage::Subscribed { strategy_id } => assert_eq!(strategy_id, "volume_surge"),
            other => panic!("expected subscribed ack, got {other:?}"),
        }

        // With the ack round-tripped the broadcast must reach this client.
        broadcaster
            .broadcast(&[Signal {
                instrument_id: "600519.SH".to_string(),
                display_code: "600519".to_string(),
                name: "Kweichow Moutai".to_string(),
                category: Category::Equity,
                strategy_id: "volume_surge".to_string(),
                confidence: 0.8,
                action: SignalAction::Buy,
                volume_ratio: 1.5,
                price: 1500.0,
                change_percent: 2.0,
                computed_at: Utc::now(),
                is_latest: true,
            }])
            .await;

        match events.recv().await.unwrap() {
            ServerMessage::PriceUpdate { strategy_id, data, .. } => {
                assert_eq!(strategy_id, "volume_surge");
                assert_eq!(data.len(), 1);
            }
            other => panic!("expected price_update, got {other:?}"),
        }

        handle.close();
    }
}
