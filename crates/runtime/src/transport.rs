//! Transport seam between the channel supervisor and the wire.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outbound half of an open connection.
pub trait Transport: Send {
	/// Send one text frame.
	fn send(&mut self, text: String) -> BoxFuture<'_, Result<()>>;

	/// Close the connection from the client side.
	fn close(&mut self) -> BoxFuture<'_, Result<()>>;
}

/// An open connection split into its outbound half and an inbound frame stream.
///
/// `message_rx` yields text frames in arrival order and returns `None` once the
/// remote end has closed.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub message_rx: mpsc::UnboundedReceiver<String>,
}

/// Opens connections to a channel endpoint.
pub trait Connector: Send + Sync {
	fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportParts>>;
}
