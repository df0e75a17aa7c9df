//! In-memory [`Connector`] for exercising channel logic without sockets.
//!
//! ```ignore
//! let (connector, mut controller) = FakeConnector::new();
//! let (channel, mut events) = PushChannel::<Notification>::new(Arc::new(connector), endpoint, config);
//! channel.start();
//!
//! let link = controller.next_link().await;
//! link.push(r#"{"type": "sessions"}"#);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::transport::{BoxFuture, Connector, Transport, TransportParts};
use crate::{Error, Result};

/// Connector half handed to the code under test.
#[derive(Clone)]
pub struct FakeConnector {
	inner: Arc<Inner>,
}

/// Test-side handle for observing connects and driving links.
pub struct FakeController {
	inner: Arc<Inner>,
	link_rx: mpsc::UnboundedReceiver<FakeLink>,
}

struct Inner {
	state: Mutex<State>,
	link_tx: mpsc::UnboundedSender<FakeLink>,
}

#[derive(Default)]
struct State {
	attempts: Vec<String>,
	refuse_next: usize,
}

impl FakeConnector {
	pub fn new() -> (Self, FakeController) {
		let (link_tx, link_rx) = mpsc::unbounded_channel();
		let inner = Arc::new(Inner {
			state: Mutex::new(State::default()),
			link_tx,
		});
		(
			Self { inner: Arc::clone(&inner) },
			FakeController { inner, link_rx },
		)
	}
}

impl Connector for FakeConnector {
	fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportParts>> {
		Box::pin(async move {
			{
				let mut state = self.inner.state.lock();
				state.attempts.push(url.to_string());
				if state.refuse_next > 0 {
					state.refuse_next -= 1;
					return Err(Error::ConnectFailed(url.to_string()));
				}
			}

			let (inbound_tx, message_rx) = mpsc::unbounded_channel();
			let sent = Arc::new(Mutex::new(Vec::new()));
			let closed = Arc::new(AtomicBool::new(false));

			let link = FakeLink {
				url: url.to_string(),
				inbound_tx: Some(inbound_tx),
				sent: Arc::clone(&sent),
				closed: Arc::clone(&closed),
			};
			// A dropped controller behaves like a server that accepted and vanished.
			let _ = self.inner.link_tx.send(link);

			Ok(TransportParts {
				sender: Box::new(FakeSender { sent, closed }),
				message_rx,
			})
		})
	}
}

impl FakeController {
	/// Wait for the next successful connect.
	pub async fn next_link(&mut self) -> FakeLink {
		match self.link_rx.recv().await {
			Some(link) => link,
			None => unreachable!("connector is owned by the controller"),
		}
	}

	/// Returns a link if one has already been established.
	pub fn try_next_link(&mut self) -> Option<FakeLink> {
		self.link_rx.try_recv().ok()
	}

	/// Every URL a connect was attempted against, in order.
	pub fn attempts(&self) -> Vec<String> {
		self.inner.state.lock().attempts.clone()
	}

	/// Make the next `count` connects fail.
	pub fn refuse_next(&self, count: usize) {
		self.inner.state.lock().refuse_next = count;
	}
}

/// Server side of one fake connection.
///
/// Dropping the link closes the connection from the server side.
pub struct FakeLink {
	pub url: String,
	inbound_tx: Option<mpsc::UnboundedSender<String>>,
	sent: Arc<Mutex<Vec<String>>>,
	closed: Arc<AtomicBool>,
}

impl FakeLink {
	/// Deliver a raw text frame to the client.
	pub fn push(&self, text: impl Into<String>) {
		if let Some(tx) = &self.inbound_tx {
			let _ = tx.send(text.into());
		}
	}

	pub fn push_json<T: Serialize>(&self, value: &T) {
		if let Ok(text) = serde_json::to_string(value) {
			self.push(text);
		}
	}

	/// Close the connection from the server side.
	pub fn disconnect(&mut self) {
		self.inbound_tx = None;
	}

	/// Frames the client has sent so far.
	pub fn sent(&self) -> Vec<String> {
		self.sent.lock().clone()
	}

	pub fn take_sent(&self) -> Vec<String> {
		std::mem::take(&mut *self.sent.lock())
	}

	/// Returns `true` once the client has closed its side.
	pub fn closed_by_client(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

struct FakeSender {
	sent: Arc<Mutex<Vec<String>>>,
	closed: Arc<AtomicBool>,
}

impl Transport for FakeSender {
	fn send(&mut self, text: String) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			if self.closed.load(Ordering::SeqCst) {
				return Err(Error::ConnectionClosed);
			}
			self.sent.lock().push(text);
			Ok(())
		})
	}

	fn close(&mut self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			self.closed.store(true, Ordering::SeqCst);
			Ok(())
		})
	}
}
