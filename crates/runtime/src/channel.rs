//! Reconnecting push channel.
//!
//! Each [`PushChannel`] owns at most one supervisor task. The task resolves the
//! endpoint, connects, pumps frames until the connection drops, then waits the
//! configured delay before trying again. [`PushChannel::stop`] cancels the task
//! and waits for it, so no connect or reconnect can happen after it returns.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transport::{Connector, TransportParts};
use crate::{Error, Result};

/// Produces the URL for the next connect attempt, or `None` when the
/// credential it needs is no longer available.
pub type EndpointResolver = Arc<dyn Fn() -> Option<String> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct ChannelConfig {
	/// Label used in log output. Never includes the endpoint, which may carry a token.
	pub name: String,
	pub reconnect_delay: Duration,
}

impl ChannelConfig {
	pub fn new(name: impl Into<String>, reconnect_delay: Duration) -> Self {
		Self {
			name: name.into(),
			reconnect_delay,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
	/// Not started, or gave up because no credential was available.
	Idle,
	Connecting,
	Open,
	ReconnectScheduled,
	Stopped,
}

/// Delivered to the channel owner in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent<M> {
	Opened,
	Message(M),
	/// The connection dropped without the owner asking; a reconnect follows.
	Closed,
}

pub struct PushChannel<M> {
	inner: Arc<Inner<M>>,
}

impl<M> Clone for PushChannel<M> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<M> fmt::Debug for PushChannel<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PushChannel")
			.field("name", &self.inner.config.name)
			.field("status", &self.inner.state.lock().status)
			.finish()
	}
}

struct Inner<M> {
	config: ChannelConfig,
	connector: Arc<dyn Connector>,
	endpoint: EndpointResolver,
	events: mpsc::UnboundedSender<ChannelEvent<M>>,
	state: Mutex<State>,
	attempts: AtomicU64,
	_message: PhantomData<fn() -> M>,
}

struct State {
	status: ChannelStatus,
	outbound: Option<mpsc::UnboundedSender<String>>,
	run: Option<Run>,
}

struct Run {
	cancel: CancellationToken,
	task: JoinHandle<()>,
}

impl<M> PushChannel<M>
where
	M: DeserializeOwned + Send + 'static,
{
	/// Create an idle channel and the receiver its events are delivered on.
	pub fn new(connector: Arc<dyn Connector>, endpoint: EndpointResolver, config: ChannelConfig) -> (Self, mpsc::UnboundedReceiver<ChannelEvent<M>>) {
		let (events, events_rx) = mpsc::unbounded_channel();
		let inner = Arc::new(Inner {
			config,
			connector,
			endpoint,
			events,
			state: Mutex::new(State {
				status: ChannelStatus::Idle,
				outbound: None,
				run: None,
			}),
			attempts: AtomicU64::new(0),
			_message: PhantomData,
		});
		(Self { inner }, events_rx)
	}

	/// Start supervising. Returns `false` without side effects when a
	/// supervisor is already running for this handle.
	pub fn start(&self) -> bool {
		let mut state = self.inner.state.lock();
		if state.run.as_ref().is_some_and(|run| !run.task.is_finished()) {
			return false;
		}

		let cancel = CancellationToken::new();
		state.status = ChannelStatus::Connecting;
		let task = tokio::spawn(supervise(Arc::clone(&self.inner), cancel.clone()));
		state.run = Some(Run { cancel, task });
		true
	}

	/// Stop supervising and close any open connection.
	///
	/// Idempotent. Once this returns no further connect attempt will be made
	/// until [`start`](Self::start) is called again.
	pub async fn stop(&self) {
		let run = {
			let mut state = self.inner.state.lock();
			state.outbound = None;
			state.status = ChannelStatus::Stopped;
			state.run.take()
		};

		if let Some(run) = run {
			run.cancel.cancel();
			match run.task.await {
				Err(err) if err.is_panic() => {
					warn!(target = "lastmile.channel", channel = %self.inner.config.name, "supervisor panicked");
				}
				_ => {}
			}
			info!(target = "lastmile.channel", channel = %self.inner.config.name, "channel stopped");
		}

		let mut state = self.inner.state.lock();
		state.outbound = None;
		state.status = ChannelStatus::Stopped;
	}

	/// Queue a text frame on the open connection.
	pub fn send_text(&self, text: String) -> Result<()> {
		let state = self.inner.state.lock();
		match (&state.outbound, state.status) {
			(Some(tx), ChannelStatus::Open) => tx.send(text).map_err(|_| Error::NotOpen),
			_ => Err(Error::NotOpen),
		}
	}

	pub fn send<T: Serialize>(&self, value: &T) -> Result<()> {
		self.send_text(serde_json::to_string(value)?)
	}

	pub fn status(&self) -> ChannelStatus {
		self.inner.state.lock().status
	}

	pub fn is_open(&self) -> bool {
		self.status() == ChannelStatus::Open
	}

	/// Number of connect attempts made over the life of this handle.
	pub fn connect_attempts(&self) -> u64 {
		self.inner.attempts.load(Ordering::SeqCst)
	}
}

impl<M: DeserializeOwned> Inner<M> {
	fn set_status(&self, status: ChannelStatus) {
		self.state.lock().status = status;
	}

	fn deliver(&self, text: &str) {
		match serde_json::from_str::<M>(text) {
			Ok(message) => {
				let _ = self.events.send(ChannelEvent::Message(message));
			}
			Err(err) => {
				warn!(target = "lastmile.channel", channel = %self.config.name, error = %err, "dropping malformed frame");
			}
		}
	}
}

async fn supervise<M: DeserializeOwned>(inner: Arc<Inner<M>>, cancel: CancellationToken) {
	let name = inner.config.name.clone();
	loop {
		let Some(url) = (inner.endpoint)() else {
			debug!(target = "lastmile.channel", channel = %name, "no credential available; not connecting");
			inner.set_status(ChannelStatus::Idle);
			return;
		};

		inner.set_status(ChannelStatus::Connecting);
		let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
		debug!(target = "lastmile.channel", channel = %name, attempt, "connecting");

		let connected = tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			result = inner.connector.connect(&url) => result,
		};

		match connected {
			Ok(parts) => {
				info!(target = "lastmile.channel", channel = %name, attempt, "channel open");
				pump(&inner, parts, &cancel).await;
				if cancel.is_cancelled() {
					return;
				}
				let _ = inner.events.send(ChannelEvent::Closed);
				info!(
					target = "lastmile.channel",
					channel = %name,
					delay_ms = inner.config.reconnect_delay.as_millis() as u64,
					"channel closed; reconnect scheduled"
				);
			}
			Err(err) => {
				warn!(
					target = "lastmile.channel",
					channel = %name,
					error = %err,
					delay_ms = inner.config.reconnect_delay.as_millis() as u64,
					"connect failed; reconnect scheduled"
				);
			}
		}

		inner.set_status(ChannelStatus::ReconnectScheduled);
		tokio::select! {
			biased;
			_ = cancel.cancelled() => return,
			_ = tokio::time::sleep(inner.config.reconnect_delay) => {}
		}
	}
}

async fn pump<M: DeserializeOwned>(inner: &Inner<M>, parts: TransportParts, cancel: &CancellationToken) {
	let TransportParts { mut sender, mut message_rx } = parts;
	let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
	let cancelled = {
		let mut state = inner.state.lock();
		if cancel.is_cancelled() {
			true
		} else {
			state.outbound = Some(outbound_tx);
			state.status = ChannelStatus::Open;
			false
		}
	};
	if cancelled {
		let _ = sender.close().await;
		return;
	}
	let _ = inner.events.send(ChannelEvent::Opened);

	loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => {
				if let Err(err) = sender.close().await {
					debug!(target = "lastmile.channel", channel = %inner.config.name, error = %err, "close failed");
				}
				break;
			}
			Some(text) = outbound_rx.recv() => {
				if let Err(err) = sender.send(text).await {
					warn!(target = "lastmile.channel", channel = %inner.config.name, error = %err, "send failed");
					break;
				}
			}
			incoming = message_rx.recv() => match incoming {
				Some(text) => inner.deliver(&text),
				None => break,
			},
		}
	}

	inner.state.lock().outbound = None;
}
