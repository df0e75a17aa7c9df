//! In-memory service fakes and a recording view sink.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lastmile_protocol::{
	Intent, IntentCreate, LocationFix, LocationSnapshot, MatchCard, RoutePoint, RoutePoints, Session, SessionCreate, SessionState, Side, StopCandidate,
};
use parking_lot::Mutex;

use crate::api::{IntentService, SessionService};
use crate::geolocation::Geolocator;
use crate::session::{SessionAction, next_state};
use crate::view::{LivePair, SessionBoard, ViewSink};
use crate::{Error, Result};

pub fn session(id: i64, state: SessionState, my_side: Side) -> Session {
	Session {
		id,
		state,
		intent_a_id: Some(id * 10),
		intent_b_id: Some(id * 10 + 1),
		my_side: Some(my_side),
		my_token: Some(format!("tok-{id}")),
		sos_at: None,
		started_at: None,
		ends_at: None,
		max_duration_minutes: Some(60),
		created_at: None,
		route_a: None,
		route_b: None,
	}
}

pub fn routes(lat: f64) -> RoutePoints {
	RoutePoints {
		origin: RoutePoint { lat, lng: -84.29 },
		destination: RoutePoint { lat: lat + 0.01, lng: -84.28 },
	}
}

pub fn stop(id: &str, lat: f64, lng: f64) -> StopCandidate {
	StopCandidate {
		id: id.to_string(),
		name: id.to_string(),
		lat,
		lng,
	}
}

#[derive(Default)]
pub struct RecordingSink {
	pub boards: Mutex<Vec<SessionBoard>>,
	pub intents: Mutex<Vec<Vec<Intent>>>,
	pub stops: Mutex<Vec<Vec<StopCandidate>>>,
	pub pairs: Mutex<Vec<LivePair>>,
	pub fits: Mutex<Vec<LivePair>>,
	pub notices: Mutex<Vec<String>>,
	pub logouts: AtomicUsize,
}

impl RecordingSink {
	pub fn last_board(&self) -> Option<SessionBoard> {
		self.boards.lock().last().cloned()
	}

	pub fn last_pair(&self) -> Option<LivePair> {
		self.pairs.lock().last().cloned()
	}

	pub fn notices(&self) -> Vec<String> {
		self.notices.lock().clone()
	}

	pub fn fit_count(&self) -> usize {
		self.fits.lock().len()
	}
}

impl ViewSink for RecordingSink {
	fn sessions_changed(&self, board: &SessionBoard) {
		self.boards.lock().push(board.clone());
	}

	fn intents_changed(&self, intents: &[Intent]) {
		self.intents.lock().push(intents.to_vec());
	}

	fn stops_changed(&self, stops: &[StopCandidate]) {
		self.stops.lock().push(stops.to_vec());
	}

	fn live_locations_changed(&self, pair: &LivePair) {
		self.pairs.lock().push(pair.clone());
	}

	fn fit_to_parties(&self, pair: &LivePair) {
		self.fits.lock().push(pair.clone());
	}

	fn notice(&self, message: &str) {
		self.notices.lock().push(message.to_string());
	}

	fn logged_out(&self) {
		self.logouts.fetch_add(1, Ordering::SeqCst);
	}
}

/// Session service backed by a map, applying the server's transition table.
#[derive(Default)]
pub struct FakeSessionService {
	pub sessions: Mutex<Vec<Session>>,
	pub locations: Mutex<HashMap<i64, LocationSnapshot>>,
	pub location_delay: Mutex<Duration>,
	pub unauthorized: Mutex<bool>,
	pub fail_next: Mutex<Option<Error>>,
	pub list_calls: AtomicUsize,
	pub transition_calls: AtomicUsize,
	pub location_calls: Mutex<Vec<i64>>,
	next_id: AtomicUsize,
}

impl FakeSessionService {
	pub fn with_sessions(sessions: Vec<Session>) -> Arc<Self> {
		let service = Self::default();
		*service.sessions.lock() = sessions;
		Arc::new(service)
	}

	pub fn set_locations(&self, id: i64, snapshot: LocationSnapshot) {
		self.locations.lock().insert(id, snapshot);
	}

	fn check(&self) -> Result<()> {
		if *self.unauthorized.lock() {
			return Err(Error::Unauthorized);
		}
		match self.fail_next.lock().take() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl SessionService for FakeSessionService {
	async fn list_sessions(&self) -> Result<Vec<Session>> {
		self.list_calls.fetch_add(1, Ordering::SeqCst);
		self.check()?;
		Ok(self.sessions.lock().iter().filter(|s| !s.state.is_terminal()).cloned().collect())
	}

	async fn create_session(&self, request: SessionCreate) -> Result<Session> {
		self.check()?;
		let id = 100 + self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
		let mut created = session(id, SessionState::Requested, Side::A);
		created.intent_a_id = Some(request.intent_a_id);
		created.intent_b_id = Some(request.intent_b_id);
		self.sessions.lock().push(created.clone());
		Ok(created)
	}

	async fn transition(&self, session_id: i64, action: SessionAction) -> Result<Session> {
		self.transition_calls.fetch_add(1, Ordering::SeqCst);
		self.check()?;
		let mut sessions = self.sessions.lock();
		let session = sessions.iter_mut().find(|s| s.id == session_id).ok_or(Error::Request {
			status: 404,
			detail: "Session not found".into(),
		})?;
		let state = next_state(session.state, action, session.my_side).map_err(|e| Error::Request {
			status: 400,
			detail: e.to_string(),
		})?;
		session.state = state;
		if action == SessionAction::Sos {
			session.sos_at = Some("2026-01-01T10:05:00Z".into());
		}
		// Transition responses carry no route endpoints.
		let mut ack = session.clone();
		ack.route_a = None;
		ack.route_b = None;
		Ok(ack)
	}

	async fn locations(&self, session_id: i64) -> Result<LocationSnapshot> {
		self.location_calls.lock().push(session_id);
		let delay = *self.location_delay.lock();
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		self.check()?;
		Ok(self.locations.lock().get(&session_id).copied().unwrap_or_default())
	}
}

#[derive(Default)]
pub struct FakeIntentService {
	pub intents: Mutex<Vec<Intent>>,
	pub matches: Mutex<HashMap<i64, Vec<MatchCard>>>,
	pub stops: Mutex<Vec<StopCandidate>>,
	pub fail_next: Mutex<Option<Error>>,
	next_id: AtomicUsize,
}

impl FakeIntentService {
	fn check(&self) -> Result<()> {
		match self.fail_next.lock().take() {
			Some(err) => Err(err),
			None => Ok(()),
		}
	}
}

#[async_trait]
impl IntentService for FakeIntentService {
	async fn list_intents(&self) -> Result<Vec<Intent>> {
		self.check()?;
		Ok(self.intents.lock().clone())
	}

	async fn create_intent(&self, request: &IntentCreate) -> Result<Intent> {
		self.check()?;
		let intent = Intent {
			id: 1 + self.next_id.fetch_add(1, Ordering::SeqCst) as i64,
			user_id: Some(1),
			origin_lat: request.origin_lat,
			origin_lng: request.origin_lng,
			dest_lat: request.dest_lat,
			dest_lng: request.dest_lng,
			expires_at: None,
			created_at: None,
		};
		self.intents.lock().push(intent.clone());
		Ok(intent)
	}

	async fn delete_intent(&self, intent_id: i64) -> Result<()> {
		self.check()?;
		let mut intents = self.intents.lock();
		let before = intents.len();
		intents.retain(|i| i.id != intent_id);
		if intents.len() == before {
			return Err(Error::Request {
				status: 404,
				detail: "Intent not found".into(),
			});
		}
		Ok(())
	}

	async fn matches(&self, intent_id: i64) -> Result<Vec<MatchCard>> {
		self.check()?;
		Ok(self.matches.lock().get(&intent_id).cloned().unwrap_or_default())
	}

	async fn stops(&self) -> Result<Vec<StopCandidate>> {
		self.check()?;
		Ok(self.stops.lock().clone())
	}
}

/// Returns queued fixes, then the last one forever; errors while empty.
#[derive(Default)]
pub struct ScriptedGeolocator {
	pub fixes: Mutex<Vec<LocationFix>>,
	pub calls: AtomicUsize,
}

impl ScriptedGeolocator {
	pub fn at(lat: f64, lng: f64) -> Arc<Self> {
		let geolocator = Self::default();
		geolocator.fixes.lock().push(LocationFix { lat, lng });
		Arc::new(geolocator)
	}

	pub fn unavailable() -> Arc<Self> {
		Arc::new(Self::default())
	}
}

#[async_trait]
impl Geolocator for ScriptedGeolocator {
	async fn current_position(&self) -> Result<LocationFix> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let mut fixes = self.fixes.lock();
		match fixes.len() {
			0 => Err(Error::Geolocation("permission denied".into())),
			1 => Ok(fixes[0]),
			_ => Ok(fixes.remove(0)),
		}
	}
}
