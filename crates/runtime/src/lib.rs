//! Push channel plumbing for Last Mile clients.
//!
//! A [`Connector`] opens a text-frame duplex connection and hands back
//! [`TransportParts`]. [`PushChannel`] wraps a connector with the reconnect
//! policy every long-lived channel in the client shares: resolve the endpoint
//! fresh on each attempt, reconnect after a fixed delay on unexpected close,
//! and never reconnect once the owner has asked it to stop.
//!
//! [`fake`] provides an in-memory connector for tests.

pub mod channel;
mod error;
pub mod fake;
pub mod transport;
pub mod websocket;

pub use channel::{ChannelConfig, ChannelEvent, ChannelStatus, EndpointResolver, PushChannel};
pub use error::{Error, Result};
pub use transport::{BoxFuture, Connector, Transport, TransportParts};
pub use websocket::WebSocketConnector;
