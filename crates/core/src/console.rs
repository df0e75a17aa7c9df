use std::sync::Arc;

use lastmile_protocol::{Intent, IntentCreate, MatchCard, RoutePoint, Session, StopCandidate};
use tracing::info;

use crate::api::IntentService;
use crate::credentials::Credentials;
use crate::error::report;
use crate::geo;
use crate::session::SessionCoordinator;
use crate::view::ViewSink;
use crate::{Error, Result};

pub const DEFAULT_EXPIRES_IN_MINUTES: u32 = 60;

/// Trip intents, companion matches, and nearby stops.
pub struct IntentMatchConsole {
	api: Arc<dyn IntentService>,
	coordinator: Arc<SessionCoordinator>,
	credentials: Credentials,
	sink: Arc<dyn ViewSink>,
	stop_separation_m: f64,
}

impl IntentMatchConsole {
	pub fn new(
		api: Arc<dyn IntentService>,
		coordinator: Arc<SessionCoordinator>,
		credentials: Credentials,
		sink: Arc<dyn ViewSink>,
		stop_separation_m: f64,
	) -> Self {
		Self {
			api,
			coordinator,
			credentials,
			sink,
			stop_separation_m,
		}
	}

	pub async fn refresh_intents(&self) -> Result<Vec<Intent>> {
		let intents = self.api.list_intents().await.map_err(|err| self.fail(err))?;
		self.sink.intents_changed(&intents);
		Ok(intents)
	}

	pub async fn create_intent(&self, origin: RoutePoint, destination: RoutePoint, expires_in_minutes: u32) -> Result<Intent> {
		let request = IntentCreate {
			origin_lat: origin.lat,
			origin_lng: origin.lng,
			dest_lat: destination.lat,
			dest_lng: destination.lng,
			expires_in_minutes,
		};
		let intent = self.api.create_intent(&request).await.map_err(|err| self.fail(err))?;
		info!(target = "lastmile.session", intent_id = intent.id, "intent created");
		self.refresh_intents().await?;
		Ok(intent)
	}

	/// Delete an intent. Sessions built on it go away server-side, so sessions
	/// are refreshed too.
	pub async fn delete_intent(&self, intent_id: i64) -> Result<()> {
		self.api.delete_intent(intent_id).await.map_err(|err| self.fail(err))?;
		info!(target = "lastmile.session", intent_id, "intent deleted");
		self.refresh_intents().await?;
		self.coordinator.refresh().await?;
		Ok(())
	}

	pub async fn matches(&self, intent_id: i64) -> Result<Vec<MatchCard>> {
		self.api.matches(intent_id).await.map_err(|err| self.fail(err))
	}

	/// Request a session pairing one of my intents with a matched one.
	pub async fn request_session(&self, my_intent_id: i64, their_intent_id: i64) -> Result<Session> {
		self.coordinator.create_session(my_intent_id, their_intent_id).await
	}

	/// Stops from the service, thinned to the configured marker spacing.
	pub async fn stops(&self) -> Result<Vec<StopCandidate>> {
		let candidates = self.api.stops().await.map_err(|err| self.fail(err))?;
		let stops = self.dedup_stops(&candidates);
		self.sink.stops_changed(&stops);
		Ok(stops)
	}

	pub fn dedup_stops(&self, candidates: &[StopCandidate]) -> Vec<StopCandidate> {
		geo::reduce(candidates, self.stop_separation_m)
	}

	fn fail(&self, err: Error) -> Error {
		report(err, &self.credentials, self.sink.as_ref())
	}
}

#[cfg(test)]
mod tests {
	use lastmile_protocol::{SessionState, Side};
	use lastmile_runtime::fake::FakeConnector;

	use super::*;
	use crate::config::ClientConfig;
	use crate::testing::{FakeIntentService, FakeSessionService, RecordingSink, ScriptedGeolocator, session, stop};
	use crate::tracker::LocationTracker;

	struct Harness {
		console: IntentMatchConsole,
		intents: Arc<FakeIntentService>,
		sessions: Arc<FakeSessionService>,
		sink: Arc<RecordingSink>,
	}

	fn harness() -> Harness {
		let sessions = FakeSessionService::with_sessions(Vec::new());
		let intents = Arc::new(FakeIntentService::default());
		let sink = Arc::new(RecordingSink::default());
		let credentials = Credentials::new(Some("user".into()));
		let (connector, _controller) = FakeConnector::new();
		let tracker = LocationTracker::new(
			sessions.clone(),
			Arc::new(connector),
			ScriptedGeolocator::unavailable(),
			sink.clone(),
			credentials.clone(),
			Arc::new(ClientConfig::default()),
		);
		let coordinator = Arc::new(SessionCoordinator::new(sessions.clone(), credentials.clone(), tracker, sink.clone()));
		let console = IntentMatchConsole::new(intents.clone(), coordinator, credentials, sink.clone(), geo::MIN_STOP_MARKER_DISTANCE_M);
		Harness {
			console,
			intents,
			sessions,
			sink,
		}
	}

	fn point(lat: f64, lng: f64) -> RoutePoint {
		RoutePoint { lat, lng }
	}

	#[tokio::test]
	async fn create_then_delete_refreshes_views() {
		let h = harness();
		let intent = h.console.create_intent(point(30.44, -84.29), point(30.45, -84.28), DEFAULT_EXPIRES_IN_MINUTES).await.unwrap();
		assert_eq!(h.sink.intents.lock().last().map(Vec::len), Some(1));

		h.sessions.sessions.lock().push(session(1, SessionState::Requested, Side::A));
		h.console.delete_intent(intent.id).await.unwrap();
		assert_eq!(h.sink.intents.lock().last().map(Vec::len), Some(0));
		assert!(h.sink.last_board().is_some());
	}

	#[tokio::test]
	async fn failures_become_notices() {
		let h = harness();
		let err = h.console.delete_intent(99).await.unwrap_err();
		assert_eq!(err.status(), Some(404));
		assert_eq!(h.sink.notices(), vec!["Intent not found".to_string()]);
		assert!(h.sink.boards.lock().is_empty());
	}

	#[tokio::test]
	async fn stops_are_deduplicated() {
		let h = harness();
		*h.intents.stops.lock() = vec![stop("a", 0.0, 0.0), stop("b", 0.0, 0.0005), stop("c", 0.0, 0.01)];

		let stops = h.console.stops().await.unwrap();
		let ids: Vec<_> = stops.iter().map(|s| s.id.as_str()).collect();
		assert_eq!(ids, vec!["a", "c"]);
		assert_eq!(h.sink.stops.lock().len(), 1);
	}

	#[tokio::test]
	async fn request_session_goes_through_coordinator() {
		let h = harness();
		let created = h.console.request_session(1, 2).await.unwrap();
		assert_eq!(created.my_side, Some(Side::A));
		assert_eq!(h.sink.last_board().map(|b| b.sessions.len()), Some(1));
	}
}
