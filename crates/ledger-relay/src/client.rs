//! Websocket subscription client.

use crate::{LedgerRequest, LedgerResponse, RelayError, RelayResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Buffered inbound messages per connection.
const EVENT_BUFFER: usize = 256;
/// Buffered outbound frames per connection.
const OUTBOUND_BUFFER: usize = 32;
/// How long `close` waits for the close frame to be written.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Subscription client configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Node websocket URL (e.g., wss://s.altnet.rippletest.net:51233).
    pub url: String,
    /// Accounts named in the subscribe request.
    pub accounts: Vec<String>,
    /// Streams named in the subscribe request.
    pub streams: Vec<String>,
    /// Bound on the TCP/TLS/websocket handshake.
    pub connect_timeout: Duration,
    /// Bound on waiting for the subscribe acknowledgement.
    pub subscribe_timeout: Duration,
    /// Interval between keepalive pings.
    pub keepalive_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "wss://s.altnet.rippletest.net:51233".to_string(),
            accounts: Vec::new(),
            streams: vec!["ledger".to_string()],
            connect_timeout: Duration::from_secs(10),
            subscribe_timeout: Duration::from_secs(10),
            keepalive_interval: Duration::from_secs(15),
        }
    }
}

/// One unparsed inbound message.
#[derive(Debug, Clone)]
pub struct RawEvent {
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl RawEvent {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Opens subscribed connections.
///
/// Every successful `connect` has already issued and confirmed the
/// subscription, so callers never see a bare connection.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> RelayResult<Connection>;
}

/// A live subscription.
///
/// `next_event` yields messages in arrival order and returns `None` once the
/// socket fails or the node closes it. Dropping the connection tears down its
/// background tasks.
pub struct Connection {
    events: mpsc::Receiver<RawEvent>,
    outbound: Option<mpsc::Sender<Message>>,
    writer: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Connection {
    /// A connection fed from an arbitrary channel. Used by alternative
    /// transports and tests.
    pub fn from_receiver(events: mpsc::Receiver<RawEvent>) -> Self {
        Self {
            events,
            outbound: None,
            writer: None,
            tasks: Vec::new(),
        }
    }

    /// Next inbound message, or `None` when the stream has ended.
    pub async fn next_event(&mut self) -> Option<RawEvent> {
        self.events.recv().await
    }

    /// Send a close frame and release the socket.
    pub async fn close(mut self) {
        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(Message::Close(None)).await;
        }
        if let Some(writer) = self.writer.take() {
            if timeout(CLOSE_GRACE, writer).await.is_err() {
                debug!("Close frame not flushed in time");
            }
        }
        self.events.close();
        debug!("Ledger connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Websocket implementation of [`Connector`].
pub struct RelayClient {
    config: RelayConfig,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Wait for the subscribe acknowledgement, keeping anything pushed
    /// before it.
    async fn await_subscribed(
        read: &mut WsRead,
        request_id: &str,
        early: &mut Vec<RawEvent>,
    ) -> RelayResult<()> {
        loop {
            match read.next().await {
                Some(Ok(Message::Text(text))) => {
                    let text = text.to_string();
                    match LedgerResponse::parse(&text) {
                        Some(response) if response.answers(request_id) => {
                            return if response.is_success() {
                                Ok(())
                            } else {
                                Err(RelayError::Subscribe(response.error_text()))
                            };
                        }
                        _ => early.push(RawEvent::new(text)),
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(RelayError::Connection(
                        "closed before subscription was acknowledged".to_string(),
                    ));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

#[async_trait]
impl Connector for RelayClient {
    async fn connect(&self) -> RelayResult<Connection> {
        info!(url = %self.config.url, "Connecting to ledger");

        let (ws_stream, _) = timeout(
            self.config.connect_timeout,
            connect_async(self.config.url.as_str()),
        )
        .await
        .map_err(|_| RelayError::Timeout("connect"))??;
        let (mut write, mut read) = ws_stream.split();

        // Subscribe on every connect.
        let subscribe = LedgerRequest::subscribe(&self.config.accounts, &self.config.streams);
        write.send(Message::Text(subscribe.to_json()?.into())).await?;
        debug!(request_id = %subscribe.id, "Sent subscribe request");

        let mut early = Vec::new();
        timeout(
            self.config.subscribe_timeout,
            Self::await_subscribed(&mut read, &subscribe.id, &mut early),
        )
        .await
        .map_err(|_| RelayError::Timeout("subscribe acknowledgement"))??;
        info!(
            accounts = ?self.config.accounts,
            streams = ?self.config.streams,
            "Subscribed to ledger"
        );

        let (msg_tx, mut msg_rx) = mpsc::channel::<Message>(OUTBOUND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel::<RawEvent>(EVENT_BUFFER);

        let writer = tokio::spawn(async move {
            while let Some(msg) = msg_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if write.send(msg).await.is_err() {
                    break;
                }
                if closing {
                    let _ = write.close().await;
                    break;
                }
            }
        });

        let keepalive_tx = msg_tx.clone();
        let period = self.config.keepalive_interval;
        let keepalive = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Ok(json) = LedgerRequest::ping().to_json() else {
                    continue;
                };
                if keepalive_tx.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        });

        let pong_tx = msg_tx.clone();
        let reader = tokio::spawn(async move {
            for event in early {
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        if event_tx.send(RawEvent::new(text.to_string())).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        info!(frame = ?frame, "Ledger closed the connection");
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = pong_tx.send(Message::Pong(data)).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "Ledger websocket error");
                        break;
                    }
                }
            }
        });

        Ok(Connection {
            events: event_rx,
            outbound: Some(msg_tx),
            writer: Some(writer),
            tasks: vec![keepalive, reader],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    #[test]
    fn test_relay_config_default() {
        let config = RelayConfig::default();
        assert_eq!(config.url, "wss://s.altnet.rippletest.net:51233");
        assert_eq!(config.streams, vec!["ledger".to_string()]);
        assert_eq!(config.keepalive_interval, Duration::from_secs(15));
        assert!(config.accounts.is_empty());
    }

    /// Accepts one websocket client and runs `script` against it.
    async fn serve_once<F, Fut>(script: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = accept_async(stream).await.unwrap();
            script(ws).await;
        });
        format!("ws://{}", addr)
    }

    async fn read_request(ws: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    fn client(url: String) -> RelayClient {
        RelayClient::new(RelayConfig {
            url,
            accounts: vec!["rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe".to_string()],
            connect_timeout: Duration::from_secs(5),
            subscribe_timeout: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(60),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_connect_subscribes_and_streams_until_close() {
        let url = serve_once(|mut ws| async move {
            let request = read_request(&mut ws).await;
            assert_eq!(request["command"], "subscribe");
            assert_eq!(request["accounts"][0], "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe");

            // Pushed before the acknowledgement; must not be lost.
            let early = json!({"type": "ledgerClosed", "ledger_index": 1});
            ws.send(Message::Text(early.to_string().into())).await.unwrap();

            let ack = json!({"id": request["id"], "status": "success", "type": "response", "result": {}});
            ws.send(Message::Text(ack.to_string().into())).await.unwrap();

            let tx = json!({"type": "transaction", "transaction": {"TransactionType": "TrustSet"}});
            ws.send(Message::Text(tx.to_string().into())).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut connection = client(url).connect().await.unwrap();

        let first = connection.next_event().await.unwrap();
        assert!(first.payload.contains("ledgerClosed"));
        let second = connection.next_event().await.unwrap();
        assert!(second.payload.contains("TrustSet"));
        assert!(connection.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_keepalive_ping_and_reply_reach_the_stream() {
        let url = serve_once(|mut ws| async move {
            let request = read_request(&mut ws).await;
            let ack = json!({"id": request["id"], "status": "success", "type": "response", "result": {}});
            ws.send(Message::Text(ack.to_string().into())).await.unwrap();

            let ping = read_request(&mut ws).await;
            assert_eq!(ping["command"], "ping");
            assert!(ping.get("accounts").is_none());
            let pong = json!({"id": ping["id"], "status": "success", "type": "response", "result": {}});
            ws.send(Message::Text(pong.to_string().into())).await.unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
        })
        .await;

        let mut relay = client(url);
        relay.config.keepalive_interval = Duration::from_millis(50);
        let mut connection = relay.connect().await.unwrap();

        let reply = timeout(Duration::from_secs(5), connection.next_event())
            .await
            .unwrap()
            .unwrap();
        let reply: Value = serde_json::from_str(&reply.payload).unwrap();
        assert_eq!(reply["type"], "response");
        assert!(reply["id"].as_str().unwrap().starts_with("ping-"));
        connection.close().await;
    }

    #[tokio::test]
    async fn test_rejected_subscription_is_an_error() {
        let url = serve_once(|mut ws| async move {
            let request = read_request(&mut ws).await;
            let nack = json!({
                "id": request["id"],
                "status": "error",
                "type": "response",
                "error": "actMalformed",
            });
            ws.send(Message::Text(nack.to_string().into())).await.unwrap();
            let _ = ws.next().await;
        })
        .await;

        let err = client(url).connect().await.err().unwrap();
        assert!(matches!(err, RelayError::Subscribe(ref m) if m == "actMalformed"));
    }

    #[tokio::test]
    async fn test_close_before_acknowledgement_is_an_error() {
        let url = serve_once(|mut ws| async move {
            let _ = read_request(&mut ws).await;
            ws.close(None).await.unwrap();
        })
        .await;

        let err = client(url).connect().await.err().unwrap();
        assert!(matches!(err, RelayError::Connection(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let result = client(format!("ws://{}", addr)).connect().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_from_receiver_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut connection = Connection::from_receiver(rx);

        tx.send(RawEvent::new("{}")).await.unwrap();
        drop(tx);

        assert_eq!(connection.next_event().await.unwrap().payload, "{}");
        assert!(connection.next_event().await.is_none());
        connection.close().await;
    }
}
