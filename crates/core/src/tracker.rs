//! Live location pipeline for the one tracked session.
//!
//! While attached, three tasks run against a per-session [`PushChannel`]:
//!
//! - publish: samples the device position on attach, whenever the channel
//!   (re)opens, and on a fixed interval, sending it only while open
//! - inbound: applies `{side, lat, lng}` frames from the channel
//! - poll: fetches both positions over REST on a fixed interval
//!
//! Every attachment gets a fresh generation number. Results from an older
//! generation are discarded, so nothing from a previous session can land on
//! the current one. Polled values overwrite pushed ones unconditionally; the
//! poll is the authoritative source.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lastmile_protocol::{LocationSnapshot, Side, SideLocation};
use lastmile_runtime::{ChannelConfig, ChannelEvent, Connector, EndpointResolver, PushChannel};
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::api::SessionService;
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::geolocation::Geolocator;
use crate::view::{LiveLocation, LivePair, LocationSource, ViewSink};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
	pub publish_interval: Duration,
	pub poll_interval: Duration,
	pub reconnect_delay: Duration,
}

impl From<&ClientConfig> for TrackerSettings {
	fn from(config: &ClientConfig) -> Self {
		Self {
			publish_interval: config.location_publish(),
			poll_interval: config.location_poll(),
			reconnect_delay: config.location_reconnect(),
		}
	}
}

pub struct LocationTracker {
	api: Arc<dyn SessionService>,
	connector: Arc<dyn Connector>,
	geolocator: Arc<dyn Geolocator>,
	sink: Arc<dyn ViewSink>,
	credentials: Credentials,
	config: Arc<ClientConfig>,
	settings: TrackerSettings,
	shared: Arc<Shared>,
	lifecycle: tokio::sync::Mutex<()>,
}

struct Shared {
	generation: AtomicU64,
	state: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
	current: Option<Attachment>,
	pair: LivePair,
	fitted: bool,
}

struct Attachment {
	session_id: i64,
	generation: u64,
	cancel: CancellationToken,
	channel: PushChannel<SideLocation>,
	tasks: Vec<JoinHandle<()>>,
}

impl TrackerState {
	fn is_current(&self, generation: u64) -> bool {
		self.current.as_ref().is_some_and(|a| a.generation == generation)
	}
}

impl LocationTracker {
	pub fn new(
		api: Arc<dyn SessionService>,
		connector: Arc<dyn Connector>,
		geolocator: Arc<dyn Geolocator>,
		sink: Arc<dyn ViewSink>,
		credentials: Credentials,
		config: Arc<ClientConfig>,
	) -> Self {
		let settings = TrackerSettings::from(config.as_ref());
		Self {
			api,
			connector,
			geolocator,
			sink,
			credentials,
			config,
			settings,
			shared: Arc::new(Shared {
				generation: AtomicU64::new(0),
				state: Mutex::new(TrackerState::default()),
			}),
			lifecycle: tokio::sync::Mutex::new(()),
		}
	}

	/// Session currently tracked, if any.
	pub fn tracked_session(&self) -> Option<i64> {
		self.shared.state.lock().current.as_ref().map(|a| a.session_id)
	}

	pub fn live_pair(&self) -> LivePair {
		self.shared.state.lock().pair.clone()
	}

	/// Generation of the most recent attachment.
	pub fn generation(&self) -> u64 {
		self.shared.generation.load(Ordering::SeqCst)
	}

	/// Start tracking `session_id`, replacing any other tracked session.
	///
	/// Returns `Ok(false)` when that session is already tracked.
	pub async fn attach(&self, session_id: i64, token: &str, my_side: Side) -> Result<bool> {
		let _lifecycle = self.lifecycle.lock().await;
		if self.tracked_session() == Some(session_id) {
			return Ok(false);
		}
		self.detach_locked().await;

		let url = self.config.session_channel_url(session_id, token)?;
		let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
		let endpoint: EndpointResolver = Arc::new(move || Some(url.clone()));
		let (channel, events) = PushChannel::new(
			Arc::clone(&self.connector),
			endpoint,
			ChannelConfig::new(format!("session-{session_id}"), self.settings.reconnect_delay),
		);

		let cancel = CancellationToken::new();
		let opened = Arc::new(Notify::new());
		let tasks = vec![
			tokio::spawn(publish_loop(
				Arc::clone(&self.geolocator),
				channel.clone(),
				self.settings.publish_interval,
				Arc::clone(&opened),
				cancel.clone(),
			)),
			tokio::spawn(inbound_loop(
				Arc::clone(&self.shared),
				Arc::clone(&self.sink),
				generation,
				events,
				opened,
				cancel.clone(),
			)),
			tokio::spawn(poll_loop(PollTask {
				api: Arc::clone(&self.api),
				credentials: self.credentials.clone(),
				shared: Arc::clone(&self.shared),
				sink: Arc::clone(&self.sink),
				session_id,
				generation,
				every: self.settings.poll_interval,
				cancel: cancel.clone(),
			})),
		];

		{
			let mut state = self.shared.state.lock();
			state.pair = LivePair::for_side(my_side);
			state.fitted = false;
			state.current = Some(Attachment {
				session_id,
				generation,
				cancel,
				channel: channel.clone(),
				tasks,
			});
		}
		channel.start();
		info!(target = "lastmile.tracker", session_id, generation, side = %my_side, "tracker attached");
		Ok(true)
	}

	/// Stop tracking and clear both markers. Returns `false` when nothing was tracked.
	pub async fn detach(&self) -> bool {
		let _lifecycle = self.lifecycle.lock().await;
		self.detach_locked().await
	}

	async fn detach_locked(&self) -> bool {
		let attachment = {
			let mut state = self.shared.state.lock();
			let attachment = state.current.take();
			if attachment.is_some() {
				state.pair = LivePair::default();
				state.fitted = false;
			}
			attachment
		};
		let Some(attachment) = attachment else {
			return false;
		};

		attachment.cancel.cancel();
		attachment.channel.stop().await;
		for task in attachment.tasks {
			if let Err(err) = task.await {
				if err.is_panic() {
					warn!(target = "lastmile.tracker", session_id = attachment.session_id, "tracker task panicked");
				}
			}
		}
		self.sink.live_locations_changed(&LivePair::default());
		info!(target = "lastmile.tracker", session_id = attachment.session_id, "tracker detached");
		true
	}
}

impl Shared {
	fn apply_push(&self, generation: u64, message: SideLocation, sink: &dyn ViewSink) -> bool {
		let mut state = self.state.lock();
		if !state.is_current(generation) {
			trace!(target = "lastmile.tracker", generation, "discarding stale push");
			return false;
		}
		state.pair.set(LiveLocation {
			side: message.side,
			lat: message.lat,
			lng: message.lng,
			observed_at: Instant::now(),
			source: LocationSource::Push,
		});
		publish(&mut state, sink);
		true
	}

	fn apply_poll(&self, generation: u64, snapshot: LocationSnapshot, issued_at: Instant, sink: &dyn ViewSink) -> bool {
		let mut state = self.state.lock();
		if !state.is_current(generation) {
			trace!(target = "lastmile.tracker", generation, "discarding stale poll");
			return false;
		}
		let mut changed = false;
		for side in Side::BOTH {
			if let Some(point) = snapshot.get(side) {
				state.pair.set(LiveLocation {
					side,
					lat: point.lat,
					lng: point.lng,
					observed_at: issued_at,
					source: LocationSource::Poll,
				});
				changed = true;
			}
		}
		if changed {
			publish(&mut state, sink);
		}
		changed
	}
}

fn publish(state: &mut TrackerState, sink: &dyn ViewSink) {
	sink.live_locations_changed(&state.pair);
	if !state.fitted && state.pair.known() == 2 {
		state.fitted = true;
		sink.fit_to_parties(&state.pair);
	}
}

async fn publish_loop(geolocator: Arc<dyn Geolocator>, channel: PushChannel<SideLocation>, every: Duration, opened: Arc<Notify>, cancel: CancellationToken) {
	let mut ticker = tokio::time::interval(every);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			_ = opened.notified() => {}
			_ = ticker.tick() => {}
		}

		let fix = tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			fix = geolocator.current_position() => fix,
		};
		match fix {
			Ok(fix) if channel.is_open() => {
				if let Err(err) = channel.send(&fix) {
					debug!(target = "lastmile.tracker", error = %err, "position not sent");
				}
			}
			Ok(_) => trace!(target = "lastmile.tracker", "channel not open; position skipped"),
			Err(err) => debug!(target = "lastmile.tracker", error = %err, "geolocation failed; sample skipped"),
		}
	}
}

async fn inbound_loop(
	shared: Arc<Shared>,
	sink: Arc<dyn ViewSink>,
	generation: u64,
	mut events: mpsc::UnboundedReceiver<ChannelEvent<SideLocation>>,
	opened: Arc<Notify>,
	cancel: CancellationToken,
) {
	loop {
		let event = tokio::select! {
			biased;
			_ = cancel.cancelled() => break,
			event = events.recv() => event,
		};
		match event {
			Some(ChannelEvent::Opened) => opened.notify_one(),
			Some(ChannelEvent::Message(message)) => {
				shared.apply_push(generation, message, sink.as_ref());
			}
			Some(ChannelEvent::Closed) => debug!(target = "lastmile.tracker", generation, "location channel dropped"),
			None => break,
		}
	}
}

struct PollTask {
	api: Arc<dyn SessionService>,
	credentials: Credentials,
	shared: Arc<Shared>,
	sink: Arc<dyn ViewSink>,
	session_id: i64,
	generation: u64,
	every: Duration,
	cancel: CancellationToken,
}

async fn poll_loop(task: PollTask) {
	let mut ticker = tokio::time::interval_at(Instant::now() + task.every, task.every);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

	loop {
		tokio::select! {
			biased;
			_ = task.cancel.cancelled() => break,
			_ = ticker.tick() => {}
		}

		let issued_at = Instant::now();
		let result = tokio::select! {
			biased;
			_ = task.cancel.cancelled() => break,
			result = task.api.locations(task.session_id) => result,
		};
		match result {
			Ok(snapshot) => {
				task.shared.apply_poll(task.generation, snapshot, issued_at, task.sink.as_ref());
			}
			Err(err) if err.is_unauthorized() => {
				warn!(target = "lastmile.tracker", session_id = task.session_id, "location poll rejected; logging out");
				task.credentials.clear();
				break;
			}
			Err(err) => debug!(target = "lastmile.tracker", session_id = task.session_id, error = %err, "location poll failed"),
		}
	}
}
