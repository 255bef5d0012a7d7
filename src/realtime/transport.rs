//! Socket transport abstraction
//!
//! - `WebSocketTransport`: tokio-tungstenite, used in production
//! - `MockTransport`: in-process channels, driven by a `MockServer` in tests

use crate::{Result, SyncError};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Normal closure
pub const CLOSE_NORMAL: u16 = 1000;
/// Connection dropped without a close frame
pub const CLOSE_ABNORMAL: u16 = 1006;

/// What an open connection can yield
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Text(String),
    Closed { code: u16, reason: String },
}

impl TransportEvent {
    fn abnormal(reason: impl Into<String>) -> Self {
        TransportEvent::Closed {
            code: CLOSE_ABNORMAL,
            reason: reason.into(),
        }
    }
}

/// Opens connections to a socket endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>>;
}

/// One open duplex connection
#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Next inbound event. A dropped connection yields a 1006 close.
    async fn next_event(&mut self) -> TransportEvent;

    async fn close(&mut self, code: u16, reason: &str) -> Result<()>;
}

/// tokio-tungstenite transport
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct WebSocketConnection {
    ws: WsStream,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>> {
        let (ws, _) = tokio_tungstenite::connect_async(url).await?;
        Ok(Box::new(WebSocketConnection { ws }))
    }
}

#[async_trait]
impl Connection for WebSocketConnection {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Text(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(frame) => TransportEvent::Closed {
                            code: u16::from(frame.code),
                            reason: frame.reason.as_str().to_owned(),
                        },
                        None => TransportEvent::Closed {
                            code: CLOSE_NORMAL,
                            reason: String::new(),
                        },
                    };
                }
                // tungstenite answers pings itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => return TransportEvent::abnormal(e.to_string()),
                None => return TransportEvent::abnormal("stream ended"),
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_owned().into(),
        };
        match self.ws.close(Some(frame)).await {
            Ok(()) => Ok(()),
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
struct MockControl {
    refuse: AtomicBool,
    hang: AtomicBool,
    opens: AtomicUsize,
    urls: Mutex<Vec<String>>,
    close_codes: Mutex<Vec<u16>>,
}

/// In-process transport; each successful `open` hands a [`MockPeer`] to the server side
#[derive(Debug, Clone)]
pub struct MockTransport {
    control: Arc<MockControl>,
    accepted: mpsc::UnboundedSender<MockPeer>,
}

/// Server side of a [`MockTransport`]
#[derive(Debug)]
pub struct MockServer {
    control: Arc<MockControl>,
    accepted: mpsc::UnboundedReceiver<MockPeer>,
}

/// Server end of one mock connection
#[derive(Debug)]
pub struct MockPeer {
    pub url: String,
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
}

struct MockConnection {
    control: Arc<MockControl>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<String>,
}

impl MockTransport {
    pub fn new() -> (Self, MockServer) {
        let control = Arc::new(MockControl::default());
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                control: control.clone(),
                accepted: tx,
            },
            MockServer {
                control,
                accepted: rx,
            },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>> {
        self.control.opens.fetch_add(1, Ordering::SeqCst);
        self.control
            .urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(url.to_string());

        if self.control.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.control.refuse.load(Ordering::SeqCst) {
            return Err(SyncError::WebSocket("connection refused".into()));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.accepted
            .send(MockPeer {
                url: url.to_string(),
                to_client,
                from_client,
            })
            .map_err(|_| SyncError::WebSocket("mock server dropped".into()))?;

        Ok(Box::new(MockConnection {
            control: self.control.clone(),
            inbound,
            outbound,
        }))
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.outbound
            .send(text)
            .map_err(|_| SyncError::WebSocket("peer gone".into()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        self.inbound
            .recv()
            .await
            .unwrap_or_else(|| TransportEvent::abnormal("peer dropped"))
    }

    async fn close(&mut self, code: u16, _reason: &str) -> Result<()> {
        self.control
            .close_codes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(code);
        self.inbound.close();
        Ok(())
    }
}

impl MockServer {
    /// Wait for the client's next successful open
    pub async fn accept(&mut self) -> Option<MockPeer> {
        self.accepted.recv().await
    }

    /// Fail every open with a connection error
    pub fn set_refusing(&self, refuse: bool) {
        self.control.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Never complete an open
    pub fn set_hanging(&self, hang: bool) {
        self.control.hang.store(hang, Ordering::SeqCst);
    }

    /// Open attempts so far, successful or not
    pub fn open_attempts(&self) -> usize {
        self.control.opens.load(Ordering::SeqCst)
    }

    /// Codes the client closed its connections with, oldest first
    pub fn close_codes(&self) -> Vec<u16> {
        self.control
            .close_codes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.control
            .urls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl MockPeer {
    pub fn push_text(&self, text: impl Into<String>) -> bool {
        self.to_client.send(TransportEvent::Text(text.into())).is_ok()
    }

    pub fn close(&self, code: u16) -> bool {
        self.to_client
            .send(TransportEvent::Closed {
                code,
                reason: String::new(),
            })
            .is_ok()
    }

    /// Next frame the client sent; `None` once the client side is gone
    pub async fn recv_text(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub fn try_recv_text(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_round_trip() {
        let (transport, mut server) = MockTransport::new();
        let mut conn = transport.open("ws://mock/ws").await.unwrap();
        let mut peer = server.accept().await.unwrap();
        assert_eq!(peer.url, "ws://mock/ws");

        conn.send_text("hello".into()).await.unwrap();
        assert_eq!(peer.recv_text().await.as_deref(), Some("hello"));

        peer.push_text("world");
        assert_eq!(conn.next_event().await, TransportEvent::Text("world".into()));

        peer.close(4001);
        assert!(matches!(conn.next_event().await, TransportEvent::Closed { code: 4001, .. }));
    }

    #[tokio::test]
    async fn test_dropped_peer_is_abnormal_close() {
        let (transport, mut server) = MockTransport::new();
        let mut conn = transport.open("ws://mock/ws").await.unwrap();
        drop(server.accept().await.unwrap());

        assert!(matches!(
            conn.next_event().await,
            TransportEvent::Closed { code: CLOSE_ABNORMAL, .. }
        ));
    }

    #[tokio::test]
    async fn test_refused_open() {
        let (transport, server) = MockTransport::new();
        server.set_refusing(true);
        assert!(transport.open("ws://mock/ws").await.is_err());
        assert_eq!(server.open_attempts(), 1);
    }
}
