//! Process-wide client wiring.
//!
//! [`ClientContext`] owns the notification channel and routes its events:
//! `sessions` refreshes the coordinator, `intents` refreshes the intent list.
//! It also watches the credential and tears everything down when it is
//! revoked, whoever revoked it.

use std::sync::Arc;

use lastmile_protocol::Notification;
use lastmile_runtime::{ChannelConfig, ChannelEvent, Connector, EndpointResolver, PushChannel, WebSocketConnector};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::api::{HttpClient, IntentService, SessionService};
use crate::config::ClientConfig;
use crate::console::IntentMatchConsole;
use crate::credentials::Credentials;
use crate::geolocation::{FileGeolocator, FixedGeolocator, Geolocator, NoGeolocator};
use crate::session::SessionCoordinator;
use crate::tracker::LocationTracker;
use crate::view::ViewSink;
use crate::{Error, Result};

/// Collaborators for a [`ClientContext`].
pub struct ContextParts {
	pub config: Arc<ClientConfig>,
	pub credentials: Credentials,
	pub sessions: Arc<dyn SessionService>,
	pub intents: Arc<dyn IntentService>,
	pub connector: Arc<dyn Connector>,
	pub geolocator: Arc<dyn Geolocator>,
	pub sink: Arc<dyn ViewSink>,
}

impl ContextParts {
	/// Production wiring: HTTP services, websocket channels, and the
	/// configured position source.
	pub fn from_config(config: ClientConfig, sink: Arc<dyn ViewSink>) -> Result<Self> {
		let credentials = Credentials::new(config.token.clone());
		let http = Arc::new(HttpClient::new(&config, credentials.clone())?);
		let geolocator: Arc<dyn Geolocator> = match (&config.position_file, config.position) {
			(Some(path), _) => Arc::new(FileGeolocator::new(path)),
			(None, Some(point)) => Arc::new(FixedGeolocator::from(point)),
			(None, None) => Arc::new(NoGeolocator),
		};
		Ok(Self {
			config: Arc::new(config),
			credentials,
			sessions: http.clone(),
			intents: http,
			connector: Arc::new(WebSocketConnector),
			geolocator,
			sink,
		})
	}
}

pub struct ClientContext {
	credentials: Credentials,
	coordinator: Arc<SessionCoordinator>,
	console: Arc<IntentMatchConsole>,
	notifications: PushChannel<Notification>,
	sink: Arc<dyn ViewSink>,
	events: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent<Notification>>>>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
	shutdown: CancellationToken,
}

impl ClientContext {
	pub fn new(parts: ContextParts) -> Self {
		let ContextParts {
			config,
			credentials,
			sessions,
			intents,
			connector,
			geolocator,
			sink,
		} = parts;

		let tracker = LocationTracker::new(
			Arc::clone(&sessions),
			Arc::clone(&connector),
			geolocator,
			Arc::clone(&sink),
			credentials.clone(),
			Arc::clone(&config),
		);
		let coordinator = Arc::new(SessionCoordinator::new(sessions, credentials.clone(), tracker, Arc::clone(&sink)));
		let console = Arc::new(IntentMatchConsole::new(
			intents,
			Arc::clone(&coordinator),
			credentials.clone(),
			Arc::clone(&sink),
			config.stop_separation_meters,
		));

		let endpoint: EndpointResolver = {
			let credentials = credentials.clone();
			let config = Arc::clone(&config);
			Arc::new(move || credentials.current().and_then(|token| config.notification_url(&token).ok()))
		};
		let (notifications, events) = PushChannel::new(connector, endpoint, ChannelConfig::new("updates", config.notification_reconnect()));

		Self {
			credentials,
			coordinator,
			console,
			notifications,
			sink,
			events: Mutex::new(Some(events)),
			tasks: Mutex::new(Vec::new()),
			shutdown: CancellationToken::new(),
		}
	}

	pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
		&self.coordinator
	}

	pub fn console(&self) -> &Arc<IntentMatchConsole> {
		&self.console
	}

	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	pub fn notifications(&self) -> &PushChannel<Notification> {
		&self.notifications
	}

	/// Initial load, then live updates until [`shutdown`](Self::shutdown).
	///
	/// Without a credential nothing is started and the user is treated as
	/// logged out. A failed initial load has already been reported as a
	/// notice and leaves the client running; only a rejected credential is
	/// returned as an error.
	pub async fn start(&self) -> Result<()> {
		if !self.credentials.is_present() {
			self.sink.logged_out();
			return Ok(());
		}

		self.spawn_background();
		self.notifications.start();
		if let Err(err) = self.coordinator.refresh().await {
			initial_load_failed("sessions", err)?;
		}
		if let Err(err) = self.console.refresh_intents().await {
			initial_load_failed("intents", err)?;
		}
		info!(target = "lastmile.session", "client started");
		Ok(())
	}

	/// Store a new credential and start live updates.
	pub async fn login(&self, token: impl Into<String>) -> Result<()> {
		self.credentials.set(token);
		self.start().await
	}

	/// Revoke the credential. Teardown follows through the credential watcher.
	pub fn logout(&self) {
		self.credentials.clear();
	}

	/// Stop every background task and connection. The context cannot be restarted.
	pub async fn shutdown(&self) {
		self.shutdown.cancel();
		self.notifications.stop().await;
		self.coordinator.reset().await;
		let tasks = std::mem::take(&mut *self.tasks.lock());
		for task in tasks {
			let _ = task.await;
		}
		info!(target = "lastmile.session", "client shut down");
	}

	fn spawn_background(&self) {
		let Some(events) = self.events.lock().take() else {
			return;
		};

		let dispatcher = tokio::spawn(dispatch_notifications(
			events,
			Arc::clone(&self.coordinator),
			Arc::clone(&self.console),
			self.shutdown.clone(),
		));
		let mut credential = self.credentials.subscribe();
		let connected_with = credential.borrow_and_update().clone();
		let watcher = tokio::spawn(watch_credential(
			credential,
			connected_with,
			self.notifications.clone(),
			Arc::clone(&self.coordinator),
			Arc::clone(&self.sink),
			self.shutdown.clone(),
		));
		self.tasks.lock().extend([dispatcher, watcher]);
	}
}

fn initial_load_failed(what: &str, err: Error) -> Result<()> {
	if err.is_unauthorized() {
		return Err(err);
	}
	debug!(target = "lastmile.session", what, error = %err, "initial load failed; waiting for updates");
	Ok(())
}

async fn dispatch_notifications(
	mut events: mpsc::UnboundedReceiver<ChannelEvent<Notification>>,
	coordinator: Arc<SessionCoordinator>,
	console: Arc<IntentMatchConsole>,
	shutdown: CancellationToken,
) {
	loop {
		let event = tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			event = events.recv() => event,
		};
		match event {
			Some(ChannelEvent::Message(Notification::Sessions)) => {
				if let Err(err) = coordinator.refresh().await {
					debug!(target = "lastmile.session", error = %err, "session refresh failed");
				}
			}
			Some(ChannelEvent::Message(Notification::Intents)) => {
				if let Err(err) = console.refresh_intents().await {
					debug!(target = "lastmile.session", error = %err, "intent refresh failed");
				}
			}
			Some(ChannelEvent::Opened | ChannelEvent::Closed) => {}
			None => break,
		}
	}
}

async fn watch_credential(
	mut rx: watch::Receiver<Option<String>>,
	mut connected_with: Option<String>,
	notifications: PushChannel<Notification>,
	coordinator: Arc<SessionCoordinator>,
	sink: Arc<dyn ViewSink>,
	shutdown: CancellationToken,
) {
	loop {
		tokio::select! {
			biased;
			_ = shutdown.cancelled() => break,
			changed = rx.changed() => {
				if changed.is_err() {
					break;
				}
			}
		}
		let token = rx.borrow_and_update().clone();
		if token == connected_with {
			continue;
		}
		match (&connected_with, &token) {
			(_, None) => {
				info!(target = "lastmile.session", "credential revoked; logging out");
				notifications.stop().await;
				coordinator.reset().await;
				sink.logged_out();
			}
			(Some(_), Some(_)) => {
				info!(target = "lastmile.session", "credential replaced; reconnecting updates");
				notifications.stop().await;
				notifications.start();
			}
			(None, Some(_)) => {
				notifications.start();
			}
		}
		connected_with = token;
	}
}
