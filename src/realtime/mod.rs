//! Realtime push channel
//!
//! A heartbeat-sustained socket that reconnects with exponential backoff,
//! dispatches typed messages to subscribers and feeds pushed event types into
//! cache invalidation.

mod backoff;
mod channel;
mod message;
mod state;
mod subscriptions;
mod transport;

pub use backoff::Backoff;
pub use channel::{handshake_url, ws_endpoint, ChannelOptions, RealtimeChannel};
pub use message::{RealtimeMessage, SystemAction, SYSTEM_MESSAGE};
pub use state::ConnectionState;
pub use subscriptions::{DispatchReport, SubscriptionId, Subscribers};
pub use transport::{
    Connection, MockPeer, MockServer, MockTransport, Transport, TransportEvent,
    WebSocketTransport, CLOSE_ABNORMAL, CLOSE_NORMAL,
};
