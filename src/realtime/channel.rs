//! Auto-reconnecting realtime channel
//!
//! `connect` spawns a driver task that owns the socket. The driver runs the
//! heartbeat, forwards outbound frames, dispatches inbound ones and drives the
//! reconnect schedule. The channel handle only talks to it through channels.

use super::backoff::Backoff;
use super::message::{RealtimeMessage, SystemAction};
use super::state::ConnectionState;
use super::subscriptions::{SubscriptionId, Subscribers};
use super::transport::{
    Connection, Transport, TransportEvent, WebSocketTransport, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
use crate::cache::TieredCache;
use crate::config::RealtimeConfig;
use crate::events::{EventBus, SyncEvent};
use crate::http::CredentialStore;
use crate::invalidation::InvalidationRouter;
use crate::{Result, SyncError};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Reconnect and timer settings
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    pub backoff: Backoff,
    pub heartbeat_interval: Duration,
    pub open_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

impl From<&RealtimeConfig> for ChannelOptions {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            auto_reconnect: config.auto_reconnect,
            max_reconnect_attempts: config.max_reconnect_attempts,
            backoff: Backoff::from_config(config),
            heartbeat_interval: config.heartbeat_interval(),
            open_timeout: config.open_timeout(),
        }
    }
}

/// Derive the socket endpoint from an HTTP base URL: `http(s)://host/...` -> `ws(s)://host/ws`
pub fn ws_endpoint(base_url: &str) -> Result<String> {
    let (scheme, rest) = base_url
        .split_once("://")
        .ok_or_else(|| SyncError::Config(format!("Base URL has no scheme: {}", base_url)))?;
    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(SyncError::Config(format!(
                "Unsupported URL scheme '{}' for realtime endpoint",
                other
            )))
        }
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(SyncError::Config(format!("Base URL has no host: {}", base_url)));
    }
    Ok(format!("{}://{}/ws", ws_scheme, host))
}

/// Append identity and token to the endpoint as query parameters
pub fn handshake_url(endpoint: &str, user_id: &str, token: &str) -> String {
    let separator = if endpoint.contains('?') { '&' } else { '?' };
    format!(
        "{}{}token={}&userId={}",
        endpoint,
        separator,
        urlencoding::encode(token),
        urlencoding::encode(user_id)
    )
}

struct Shared {
    options: ChannelOptions,
    transport: Arc<dyn Transport>,
    subscribers: Subscribers,
    state: watch::Sender<ConnectionState>,
    events: EventBus,
    cache: Arc<TieredCache>,
    router: Arc<InvalidationRouter>,
    credentials: Mutex<Option<Arc<CredentialStore>>>,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous == next {
            return;
        }
        if !previous.can_transition_to(next) {
            tracing::warn!(from = %previous, to = %next, "Unexpected connection state transition");
        }
        tracing::debug!(from = %previous, to = %next, "Connection state changed");
        self.events.emit(SyncEvent::StateChanged(next));
    }

    /// Invalidate first, then notify subscribers
    fn handle_text(&self, text: &str) -> Flow {
        let message = match RealtimeMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed realtime frame");
                return Flow::Continue;
            }
        };

        let flow = match message.system_action() {
            Some(action) => self.handle_system_action(action),
            None => Flow::Continue,
        };

        self.router.route_event(&self.cache, &message.kind);
        let report = self.subscribers.dispatch(&message);
        tracing::trace!(
            message_type = %message.kind,
            delivered = report.delivered,
            panicked = report.panicked,
            "Realtime message dispatched"
        );
        flow
    }

    fn handle_system_action(&self, action: SystemAction) -> Flow {
        match action {
            SystemAction::ReloadPage => {
                tracing::info!("Server requested reload");
                self.events.emit(SyncEvent::ReloadRequested);
            }
            SystemAction::ForceLogout => {
                tracing::warn!("Server forced logout");
                let credentials = self
                    .credentials
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone();
                if let Some(credentials) = credentials {
                    credentials.clear();
                }
                self.events.emit(SyncEvent::ForcedLogout);
                return Flow::Stop;
            }
            SystemAction::MaintenanceMode { message } => {
                tracing::warn!(?message, "Server entered maintenance mode");
                self.events.emit(SyncEvent::Maintenance { message });
            }
            SystemAction::Ping | SystemAction::Pong => {}
            SystemAction::Unknown(action) => {
                tracing::debug!(%action, "Ignoring unknown system action");
            }
        }
        Flow::Continue
    }

    async fn open(&self, url: &str) -> Result<Box<dyn Connection>> {
        match tokio::time::timeout(self.options.open_timeout, self.transport.open(url)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::WebSocket(format!(
                "Socket did not open within {:?}",
                self.options.open_timeout
            ))),
        }
    }
}

enum Flow {
    Continue,
    Stop,
}

/// Why a connected session ended
enum Exit {
    Shutdown,
    Closed { code: u16, reason: String },
}

struct Driver {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// Duplex message channel with typed subscriptions
pub struct RealtimeChannel {
    shared: Arc<Shared>,
    endpoint: String,
    driver: Mutex<Option<Driver>>,
}

impl RealtimeChannel {
    /// Channel over tokio-tungstenite
    pub fn new(
        endpoint: impl Into<String>,
        options: ChannelOptions,
        cache: Arc<TieredCache>,
        router: Arc<InvalidationRouter>,
        events: EventBus,
    ) -> Self {
        Self::with_transport(
            endpoint,
            options,
            Arc::new(WebSocketTransport::new()),
            cache,
            router,
            events,
        )
    }

    pub fn with_transport(
        endpoint: impl Into<String>,
        options: ChannelOptions,
        transport: Arc<dyn Transport>,
        cache: Arc<TieredCache>,
        router: Arc<InvalidationRouter>,
        events: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                options,
                transport,
                subscribers: Subscribers::new(),
                state,
                events,
                cache,
                router,
                credentials: Mutex::new(None),
            }),
            endpoint: endpoint.into(),
            driver: Mutex::new(None),
        }
    }

    /// Credentials cleared on a server `force_logout`
    pub fn with_credentials(self, credentials: Arc<CredentialStore>) -> Self {
        *self
            .shared
            .credentials
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(credentials);
        self
    }

    fn driver(&self) -> MutexGuard<'_, Option<Driver>> {
        self.driver.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Observe state changes; intermediate states may be coalesced
    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the socket as `user_id`.
    ///
    /// Resolves once the socket is open, or fails when it does not open within
    /// the open timeout. Afterwards the driver reconnects on its own.
    pub async fn connect(&self, user_id: &str, token: &str) -> Result<()> {
        let ready = {
            let mut driver = self.driver();
            match self.state() {
                ConnectionState::Closed => {
                    return Err(SyncError::WebSocket("Channel has been closed".into()));
                }
                ConnectionState::Disconnected => {}
                state => {
                    tracing::debug!(%state, "Connect ignored, channel already active");
                    return Ok(());
                }
            }

            let url = handshake_url(&self.endpoint, user_id, token);
            let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            let (ready_tx, ready_rx) = oneshot::channel();

            self.shared.set_state(ConnectionState::Connecting);
            let task = tokio::spawn(drive(
                self.shared.clone(),
                url,
                outbound_rx,
                shutdown_rx,
                ready_tx,
            ));

            if let Some(old) = driver.replace(Driver {
                outbound: outbound_tx,
                shutdown: Some(shutdown_tx),
                task,
            }) {
                old.task.abort();
            }
            ready_rx
        };

        ready_result(ready.await)
    }

    /// Send a frame. Returns `false`, and drops the frame, unless connected.
    pub fn send(&self, message_type: &str, payload: Value) -> bool {
        if !self.is_connected() {
            tracing::warn!(message_type, state = %self.state(), "Not connected, dropping outbound message");
            return false;
        }

        let text = match RealtimeMessage::new(message_type, payload).to_json() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(message_type, error = %e, "Failed to encode outbound message");
                return false;
            }
        };

        match self.driver().as_ref() {
            Some(driver) => driver.outbound.send(text).is_ok(),
            None => false,
        }
    }

    /// Close cleanly and stop reconnecting. The channel is unusable afterwards.
    pub async fn disconnect(&self) {
        let driver = self.driver().take();
        if let Some(mut driver) = driver {
            if let Some(shutdown) = driver.shutdown.take() {
                let _ = shutdown.send(());
            }
            if let Err(e) = driver.task.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Realtime driver task failed");
                }
            }
        }
        self.shared.set_state(ConnectionState::Closed);
    }

    pub fn subscribe<F>(&self, message_type: impl Into<String>, callback: F) -> SubscriptionId
    where
        F: Fn(&RealtimeMessage) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(message_type, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.subscribers.unsubscribe(id)
    }

    pub fn subscriber_count(&self, message_type: &str) -> usize {
        self.shared.subscribers.count(message_type)
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        if let Some(driver) = self.driver().take() {
            driver.task.abort();
        }
    }
}

impl std::fmt::Debug for RealtimeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .field("subscribers", &self.shared.subscribers)
            .finish()
    }
}

fn ready_result(result: std::result::Result<Result<()>, oneshot::error::RecvError>) -> Result<()> {
    result.unwrap_or_else(|_| Err(SyncError::WebSocket("Realtime driver stopped".into())))
}

/// Driver task: initial open, then connected sessions separated by reconnects
async fn drive(
    shared: Arc<Shared>,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut shutdown: oneshot::Receiver<()>,
    ready: oneshot::Sender<Result<()>>,
) {
    let first = tokio::select! {
        result = shared.open(&url) => result,
        _ = &mut shutdown => {
            let _ = ready.send(Err(SyncError::WebSocket("Disconnected while connecting".into())));
            return;
        }
    };

    let mut conn = match first {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(error = %e, "Realtime connect failed");
            shared.set_state(ConnectionState::Disconnected);
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut ready = Some(ready);
    loop {
        shared.set_state(ConnectionState::Connected);
        tracing::info!("Realtime channel connected");
        if let Some(ready) = ready.take() {
            let _ = ready.send(Ok(()));
        }

        let exit = session(&shared, conn.as_mut(), &mut outbound, &mut shutdown).await;
        discard_outbound(&mut outbound);

        match exit {
            Exit::Shutdown => {
                if let Err(e) = conn.close(CLOSE_NORMAL, "client disconnect").await {
                    tracing::debug!(error = %e, "Close handshake failed");
                }
                shared.set_state(ConnectionState::Closed);
                return;
            }
            Exit::Closed { code, reason } if code == CLOSE_NORMAL => {
                tracing::info!(%reason, "Server closed the channel");
                shared.set_state(ConnectionState::Disconnected);
                return;
            }
            Exit::Closed { code, reason } => {
                tracing::warn!(code, %reason, "Realtime connection lost");
            }
        }

        conn = match reconnect(&shared, &url, &mut shutdown).await {
            Some(conn) => conn,
            None => return,
        };
    }
}

/// One connected session; returns when the socket closes or shutdown is requested
async fn session(
    shared: &Shared,
    conn: &mut dyn Connection,
    outbound: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &mut oneshot::Receiver<()>,
) -> Exit {
    let period = shared.options.heartbeat_interval.max(Duration::from_millis(1));
    let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut *shutdown => return Exit::Shutdown,
            event = conn.next_event() => match event {
                TransportEvent::Text(text) => {
                    if let Flow::Stop = shared.handle_text(&text) {
                        return Exit::Shutdown;
                    }
                }
                TransportEvent::Closed { code, reason } => return Exit::Closed { code, reason },
            },
            _ = heartbeat.tick() => {
                let ping = match RealtimeMessage::heartbeat().to_json() {
                    Ok(ping) => ping,
                    Err(_) => continue,
                };
                tracing::trace!("Sending heartbeat");
                if let Err(e) = conn.send_text(ping).await {
                    return Exit::Closed { code: CLOSE_ABNORMAL, reason: e.to_string() };
                }
            }
            Some(text) = outbound.recv() => {
                if let Err(e) = conn.send_text(text).await {
                    return Exit::Closed { code: CLOSE_ABNORMAL, reason: e.to_string() };
                }
            }
        }
    }
}

/// Backoff loop after an unclean close. `None` means give up or shut down.
async fn reconnect(
    shared: &Shared,
    url: &str,
    shutdown: &mut oneshot::Receiver<()>,
) -> Option<Box<dyn Connection>> {
    let options = &shared.options;
    let mut attempts = 0u32;

    loop {
        if !options.auto_reconnect || attempts >= options.max_reconnect_attempts {
            tracing::error!(attempts, "Giving up on realtime connection");
            shared.set_state(ConnectionState::Disconnected);
            shared.events.emit(SyncEvent::ConnectionLost { attempts });
            return None;
        }

        attempts += 1;
        shared.set_state(ConnectionState::Reconnecting);
        let delay = options.backoff.delay(attempts);
        tracing::info!(attempt = attempts, ?delay, "Scheduling reconnect");

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = &mut *shutdown => {
                shared.set_state(ConnectionState::Closed);
                return None;
            }
        }

        shared.set_state(ConnectionState::Connecting);
        let opened = tokio::select! {
            result = shared.open(url) => result,
            _ = &mut *shutdown => {
                shared.set_state(ConnectionState::Closed);
                return None;
            }
        };

        match opened {
            Ok(conn) => return Some(conn),
            Err(e) => {
                tracing::warn!(attempt = attempts, error = %e, "Reconnect failed");
                shared.set_state(ConnectionState::Reconnecting);
            }
        }
    }
}

fn discard_outbound(outbound: &mut mpsc::UnboundedReceiver<String>) {
    let mut dropped = 0usize;
    while outbound.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        tracing::warn!(dropped, "Discarded outbound messages after connection ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_endpoint() {
        assert_eq!(
            ws_endpoint("http://localhost:3000/api").unwrap(),
            "ws://localhost:3000/ws"
        );
        assert_eq!(
            ws_endpoint("https://courts.example.com").unwrap(),
            "wss://courts.example.com/ws"
        );
        assert!(ws_endpoint("ftp://x").is_err());
        assert!(ws_endpoint("localhost").is_err());
    }

    #[test]
    fn test_handshake_url_encodes_values() {
        assert_eq!(
            handshake_url("wss://h/ws", "user 1", "a+b/c"),
            "wss://h/ws?token=a%2Bb%2Fc&userId=user%201"
        );
        assert_eq!(
            handshake_url("wss://h/ws?v=2", "u", "t"),
            "wss://h/ws?v=2&token=t&userId=u"
        );
    }

    #[test]
    fn test_options_from_config() {
        let options = ChannelOptions::default();
        assert!(options.auto_reconnect);
        assert_eq!(options.max_reconnect_attempts, 5);
        assert_eq!(options.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(options.open_timeout, Duration::from_secs(10));
        assert_eq!(options.backoff.delay(2), Duration::from_millis(1500));
    }
}
