//! Websocket broadcaster.
//!
//! One task per connection. All traffic to a client flows through its
//! unbounded channel so acks and updates stay ordered; a channel send failure
//! marks the connection for cleanup without blocking the rest of a broadcast.

use futures::{SinkExt, StreamExt};
use pulse_core::error::{PulseResult, PushError};
use pulse_core::types::Signal;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServerMessage};

/// Broadcaster tuning knobs.
#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    /// Sweep cadence; clients must ping at least this often
    pub heartbeat_interval: Duration,
    /// A connection is dropped after `timeout_multiplier` missed heartbeats
    pub timeout_multiplier: u32,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            timeout_multiplier: 3,
        }
    }
}

/// One connected client's server-side state.
///
/// The connection lifecycle is encoded structurally rather than as an
/// explicit state enum: a socket is connecting until its handle is inserted
/// into the client map, open while the handle exists and `tx` is live,
/// closing once the channel drops (the writer task flushes and sends the
/// Close frame) and closed when the handle leaves the map, either on socket
/// exit or via the heartbeat sweep.
struct ClientHandle {
    tx: mpsc::UnboundedSender<ServerMessage>,
    subscriptions: HashSet<String>,
    last_seen: Instant,
}

/// The websocket push server.
pub struct Broadcaster {
    config: BroadcasterConfig,
    addr: SocketAddr,
    listener: Mutex<Option<TcpListener>>,
    clients: Arc<RwLock<HashMap<Uuid, ClientHandle>>>,
    // price/confidence per store key at the previous broadcast
    snapshot: Mutex<HashMap<String, (f64, f64)>>,
}

impl Broadcaster {
    /// Bind the listening socket. The accept loop starts in [`run`].
    ///
    /// [`run`]: Broadcaster::run
    pub async fn bind(addr: &str, config: BroadcasterConfig) -> PulseResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| PushError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        let addr = listener.local_addr().map_err(|e| PushError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            config,
            addr,
            listener: Mutex::new(Some(listener)),
            clients: Arc::new(RwLock::new(HashMap::new())),
            snapshot: Mutex::new(HashMap::new()),
        })
    }

    /// Bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of open connections.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Accept loop. Consumes the bound listener; runs until the task is
    /// dropped.
    pub async fn run(self: Arc<Self>) -> PulseResult<()> {
        let listener = self.listener.lock().await.take().ok_or_else(|| {
            PushError::Bind {
                addr: self.addr.to_string(),
                reason: "already running".to_string(),
            }
        })?;
        info!(addr = %self.addr, "broadcaster listening");

        self.spawn_heartbeat_sweep();

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer).await {
                    debug!(%peer, error = %e, "connection ended with error");
                }
            });
        }
    }

    /// Push the current signal set to interested clients.
    ///
    /// Only signals whose price or confidence moved since the previous
    /// broadcast are sent, grouped into one `price_update` per strategy per
    /// subscribed connection. An empty delta sends nothing.
    pub async fn broadcast(&self, signals: &[Signal]) {
        let changed = {
            let mut snapshot = self.snapshot.lock().await;
            changed_by_strategy(&mut snapshot, signals)
        };
        if changed.is_empty() {
            return;
        }

        let timestamp = chrono::Utc::now();
        let mut stale: Vec<Uuid> = Vec::new();
        {
            let clients = self.clients.read().await;
            for (id, handle) in clients.iter() {
                for (strategy_id, data) in &changed {
                    if !handle.subscriptions.contains(strategy_id) {
                        continue;
                    }
                    let update = ServerMessage::PriceUpdate {
                        strategy_id: strategy_id.clone(),
                        data: data.clone(),
                        timestamp,
                    };
                    if handle.tx.send(update).is_err() {
                        stale.push(*id);
                        break;
                    }
                }
            }
        }
        if !stale.is_empty() {
            let mut clients = self.clients.write().await;
            for id in stale {
                clients.remove(&id);
                debug!(client = %id, "dropped dead connection during broadcast");
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> PulseResult<()> {
        let ws = accept_async(stream)
            .await
            .map_err(|e| PushError::Protocol(e.to_string()))?;
        let (mut sink, mut source) = ws.split();

        let client_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
        {
            let mut clients = self.clients.write().await;
            clients.insert(
                client_id,
                ClientHandle {
                    tx: tx.clone(),
                    subscriptions: HashSet::new(),
                    last_seen: Instant::now(),
                },
            );
        }
        info!(client = %client_id, %peer, "client connected");

        // Writer half: everything queued for this client, then a close frame
        // once the channel is dropped (disconnect or heartbeat sweep).
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let text = match serde_json::to_string(&msg) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "unencodable server message");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        let _ = tx.send(ServerMessage::Connected { client_id });

        while let Some(msg) = source.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    self.handle_client_message(client_id, &tx, &text).await;
                }
                Ok(Message::Ping(_)) => {
                    self.touch(client_id).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!(client = %client_id, error = %e, "read failed");
                    break;
                }
            }
        }

        self.clients.write().await.remove(&client_id);
        drop(tx);
        let _ = writer.await;
        info!(client = %client_id, "client disconnected");
        Ok(())
    }

    async fn handle_client_message(
        &self,
        client_id: Uuid,
        tx: &mpsc::UnboundedSender<ServerMessage>,
        text: &str,
    ) {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                let _ = tx.send(ServerMessage::Error {
                    message: format!("unrecognized message: {e}"),
                });
                return;
            }
        };
        match msg {
            ClientMessage::Subscribe { strategy_id } => {
                let mut clients = self.clients.write().await;
                if let Some(handle) = clients.get_mut(&client_id) {
                    handle.subscriptions.insert(strategy_id.clone());
                }
                drop(clients);
                debug!(client = %client_id, strategy = %strategy_id, "subscribed");
                let _ = tx.send(ServerMessage::Subscribed { strategy_id });
            }
            ClientMessage::Unsubscribe { strategy_id } => {
                let mut clients = self.clients.write().await;
                if let Some(handle) = clients.get_mut(&client_id) {
                    handle.subscriptions.remove(&strategy_id);
                }
                drop(clients);
                let _ = tx.send(ServerMessage::Unsubscribed { strategy_id });
            }
            ClientMessage::Ping => {
                self.touch(client_id).await;
                let _ = tx.send(ServerMessage::Pong);
            }
        }
    }

    async fn touch(&self, client_id: Uuid) {
        if let Some(handle) = self.clients.write().await.get_mut(&client_id) {
            handle.last_seen = Instant::now();
        }
    }

    /// Drop connections whose last heartbeat is too old. Removing the handle
    /// closes the client's channel, which ends its writer with a close frame.
    fn spawn_heartbeat_sweep(&self) {
        let clients = Arc::clone(&self.clients);
        let interval = self.config.heartbeat_interval;
        let cutoff = interval * self.config.timeout_multiplier;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let mut clients = clients.write().await;
                clients.retain(|id, handle| {
                    let alive = handle.last_seen.elapsed() <= cutoff;
                    if !alive {
                        info!(client = %id, "heartbeat timeout, dropping connection");
                    }
                    alive
                });
            }
        });
    }
}

/// Rebuild the broadcast snapshot and return the signals whose price or
/// confidence moved, grouped by strategy. New instruments count as moved.
fn changed_by_strategy(
    snapshot: &mut HashMap<String, (f64, f64)>,
    signals: &[Signal],
) -> HashMap<String, Vec<Signal>> {
    let mut changed: HashMap<String, Vec<Signal>> = HashMap::new();
    let mut next = HashMap::with_capacity(signals.len());
    for signal in signals {
        let key = signal.store_key();
        let state = (signal.price, signal.confidence);
        if snapshot.get(&key) != Some(&state) {
            changed
                .entry(signal.strategy_id.clone())
                .or_default()
                .push(signal.clone());
        }
        next.insert(key, state);
    }
    *snapshot = next;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_core::types::{Category, SignalAction};
    use tokio_tungstenite::connect_async;

    fn signal(instrument_id: &str, strategy_id: &str, price: f64, confidence: f64) -> Signal {
        Signal {
            instrument_id: instrument_id.to_string(),
            display_code: instrument_id.split('.').next().unwrap_or("").to_string(),
            name: instrument_id.to_string(),
            category: Category::Equity,
            strategy_id: strategy_id.to_string(),
            confidence,
            action: SignalAction::Buy,
            volume_ratio: 1.5,
            price,
            change_percent: 1.0,
            computed_at: Utc::now(),
            is_latest: true,
        }
    }

    #[test]
    fn test_delta_only_includes_moved_signals() {
        let mut snapshot = HashMap::new();
        let first = vec![
            signal("600519.SH", "volume_surge", 1500.0, 0.8),
            signal("000001.SZ", "volume_surge", 10.0, 0.6),
        ];
        let changed = changed_by_strategy(&mut snapshot, &first);
        assert_eq!(changed["volume_surge"].len(), 2);

        // Identical set: nothing moved.
        let changed = changed_by_strategy(&mut snapshot, &first);
        assert!(changed.is_empty());

        // One price moves, the other stays put.
        let second = vec![
            signal("600519.SH", "volume_surge", 1501.0, 0.8),
            signal("000001.SZ", "volume_surge", 10.0, 0.6),
        ];
        let changed = changed_by_strategy(&mut snapshot, &second);
        assert_eq!(changed["volume_surge"].len(), 1);
        assert_eq!(changed["volume_surge"][0].instrument_id, "600519.SH");
    }

    #[test]
    fn test_confidence_move_counts_as_changed() {
        let mut snapshot = HashMap::new();
        let _ = changed_by_strategy(&mut snapshot, &[signal("600519.SH", "rsi_reversal", 10.0, 0.5)]);
        let changed =
            changed_by_strategy(&mut snapshot, &[signal("600519.SH", "rsi_reversal", 10.0, 0.7)]);
        assert_eq!(changed["rsi_reversal"].len(), 1);
    }

    #[test]
    fn test_delta_groups_by_strategy() {
        let mut snapshot = HashMap::new();
        let signals = vec![
            signal("600519.SH", "volume_surge", 1500.0, 0.8),
            signal("600519.SH", "ma_breakout", 1500.0, 0.4),
        ];
        let changed = changed_by_strategy(&mut snapshot, &signals);
        assert_eq!(changed.len(), 2);
    }

    type ClientStream = futures::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>,
    >;

    async fn recv(stream: &mut ClientStream) -> ServerMessage {
        loop {
            match stream.next().await.expect("stream closed").expect("read error") {
                Message::Text(text) => return serde_json::from_str(&text).expect("bad frame"),
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_subscribe_ping_and_broadcast() {
        let broadcaster = Arc::new(
            Broadcaster::bind("127.0.0.1:0", BroadcasterConfig::default())
                .await
                .unwrap(),
        );
        let addr = broadcaster.local_addr();
        tokio::spawn(Arc::clone(&broadcaster).run());

        let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let (mut sink, mut stream) = ws.split();

        let connected = recv(&mut stream).await;
        assert!(matches!(connected, ServerMessage::Connected { .. }));

        let subscribe = serde_json::to_string(&ClientMessage::Subscribe {
            strategy_id: "volume_surge".to_string(),
        })
        .unwrap();
        sink.send(Message::Text(subscribe)).await.unwrap();
        assert!(matches!(
            recv(&mut stream).await,
            ServerMessage::Subscribed { .. }
        ));

        let ping = serde_json::to_string(&ClientMessage::Ping).unwrap();
        sink.send(Message::Text(ping)).await.unwrap();
        assert!(matches!(recv(&mut stream).await, ServerMessage::Pong));

        // The subscribe ack already round-tripped, so the subscription is
        // registered before this broadcast.
        broadcaster
            .broadcast(&[
                signal("600519.SH", "volume_surge", 1500.0, 0.8),
                signal("510300.SH", "ma_breakout", 4.0, 0.5),
            ])
            .await;

        match recv(&mut stream).await {
            ServerMessage::PriceUpdate { strategy_id, data, .. } => {
                assert_eq!(strategy_id, "volume_surge");
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].instrument_id, "600519.SH");
            }
            other => panic!("expected price_update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unsubscribed_strategy_is_silent() {
        let broadcaster = Arc::new(
            Broadcaster::bind("127.0.0.1:0", BroadcasterConfig::default())
                .await
                .unwrap(),
        );
        let addr = broadcaster.local_addr();
        tokio::spawn(Arc::clone(&broadcaster).run());

        let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let (mut sink, mut stream) = ws.split();
        assert!(matches!(
            recv(&mut stream).await,
            ServerMessage::Connected { .. }
        ));

        broadcaster
            .broadcast(&[signal("600519.SH", "volume_surge", 1500.0, 0.8)])
            .await;

        // A ping/pong round trip after the broadcast proves nothing else was
        // queued for this unsubscribed client.
        let ping = serde_json::to_string(&ClientMessage::Ping).unwrap();
        sink.send(Message::Text(ping)).await.unwrap();
        assert!(matches!(recv(&mut stream).await, ServerMessage::Pong));
    }
}
