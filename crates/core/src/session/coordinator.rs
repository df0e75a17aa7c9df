use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use lastmile_protocol::{Session, SessionCreate, SessionState, Side};
use parking_lot::Mutex;
use tracing::{debug, info};

use super::machine::{self, SessionCommand};
use crate::api::SessionService;
use crate::credentials::Credentials;
use crate::error::report;
use crate::tracker::LocationTracker;
use crate::view::{SessionBoard, SessionEntry, SharedRoutes, ViewSink};
use crate::{Error, Result};

/// Owns the session cache and the location tracker.
///
/// Refreshes and actions are serialized: a second refresh waits for the first
/// to finish reconciling before it fetches.
pub struct SessionCoordinator {
	api: Arc<dyn SessionService>,
	credentials: Credentials,
	tracker: LocationTracker,
	sink: Arc<dyn ViewSink>,
	sessions: Mutex<Vec<Session>>,
	gate: tokio::sync::Mutex<()>,
	live_tracking: AtomicBool,
}

impl SessionCoordinator {
	pub fn new(api: Arc<dyn SessionService>, credentials: Credentials, tracker: LocationTracker, sink: Arc<dyn ViewSink>) -> Self {
		Self {
			api,
			credentials,
			tracker,
			sink,
			sessions: Mutex::new(Vec::new()),
			gate: tokio::sync::Mutex::new(()),
			live_tracking: AtomicBool::new(true),
		}
	}

	pub fn sessions(&self) -> Vec<Session> {
		self.sessions.lock().clone()
	}

	pub fn session(&self, session_id: i64) -> Option<Session> {
		self.sessions.lock().iter().find(|s| s.id == session_id).cloned()
	}

	pub fn tracker(&self) -> &LocationTracker {
		&self.tracker
	}

	/// Whether reconciling may attach the tracker to an active session.
	///
	/// Short-lived callers that only send commands turn this off so no
	/// location channel is opened on their behalf.
	pub fn set_live_tracking(&self, enabled: bool) {
		self.live_tracking.store(enabled, Ordering::SeqCst);
	}

	/// Re-fetch the user's sessions and reconcile the board and tracker.
	pub async fn refresh(&self) -> Result<SessionBoard> {
		let _gate = self.gate.lock().await;
		let sessions = self.api.list_sessions().await.map_err(|err| self.fail(err))?;
		self.reconcile(sessions).await
	}

	/// Validate `command` locally, send it, and merge the acknowledgement.
	pub async fn dispatch(&self, command: SessionCommand) -> Result<Session> {
		let _gate = self.gate.lock().await;
		let SessionCommand { session_id, action } = command;

		let cached = match self.session(session_id) {
			Some(session) => session,
			None => {
				let sessions = self.api.list_sessions().await.map_err(|err| self.fail(err))?;
				self.reconcile(sessions).await?;
				self.session(session_id).ok_or_else(|| self.fail(Error::UnknownSession(session_id)))?
			}
		};

		machine::next_state(cached.state, action, cached.my_side).map_err(|err| self.fail(err.into()))?;

		let ack = self.api.transition(session_id, action).await.map_err(|err| self.fail(err))?;
		info!(target = "lastmile.session", session_id, %action, from = %cached.state, to = %ack.state, "session transition");

		let merged = merge_ack(cached, ack);
		let mut sessions = self.sessions();
		if let Some(slot) = sessions.iter_mut().find(|s| s.id == session_id) {
			*slot = merged.clone();
		}
		self.reconcile(sessions).await?;
		Ok(merged)
	}

	/// Ask the service to pair two intents; the initiator becomes side `a`.
	pub async fn create_session(&self, my_intent_id: i64, their_intent_id: i64) -> Result<Session> {
		let request = SessionCreate {
			intent_a_id: my_intent_id,
			intent_b_id: their_intent_id,
		};
		let created = self.api.create_session(request).await.map_err(|err| self.fail(err))?;
		info!(target = "lastmile.session", session_id = created.id, "session requested");
		self.refresh().await?;
		Ok(created)
	}

	/// Drop all session state, stopping the tracker.
	pub async fn reset(&self) {
		let _gate = self.gate.lock().await;
		self.tracker.detach().await;
		self.sessions.lock().clear();
		self.sink.sessions_changed(&SessionBoard::default());
	}

	async fn reconcile(&self, sessions: Vec<Session>) -> Result<SessionBoard> {
		let mut board = build_board(&sessions);
		*self.sessions.lock() = sessions;

		match self.trackable() {
			Some((session_id, token, side)) => {
				self.tracker.attach(session_id, &token, side).await.map_err(|err| self.fail(err))?;
			}
			None => {
				if self.tracker.detach().await {
					debug!(target = "lastmile.session", "no active session; tracker stopped");
				}
			}
		}

		board.tracked_session = self.tracker.tracked_session();
		self.sink.sessions_changed(&board);
		Ok(board)
	}

	/// The active session to track, preferring the one already tracked.
	fn trackable(&self) -> Option<(i64, String, Side)> {
		if !self.live_tracking.load(Ordering::SeqCst) {
			return None;
		}
		let tracked = self.tracker.tracked_session();
		let sessions = self.sessions.lock();
		let mut candidates = sessions.iter().filter_map(|s| match (s.state, &s.my_token, s.my_side) {
			(SessionState::Active, Some(token), Some(side)) => Some((s.id, token.clone(), side)),
			_ => None,
		});
		let first = candidates.next()?;
		if tracked == Some(first.0) {
			return Some(first);
		}
		Some(candidates.find(|c| tracked == Some(c.0)).unwrap_or(first))
	}

	fn fail(&self, err: Error) -> Error {
		report(err, &self.credentials, self.sink.as_ref())
	}
}

/// Transition responses omit route endpoints; keep the cached ones.
fn merge_ack(cached: Session, ack: Session) -> Session {
	Session {
		route_a: ack.route_a.or(cached.route_a),
		route_b: ack.route_b.or(cached.route_b),
		my_token: ack.my_token.or(cached.my_token),
		my_side: ack.my_side.or(cached.my_side),
		..ack
	}
}

/// Derive the session panel from a session list.
pub fn build_board(sessions: &[Session]) -> SessionBoard {
	let entries = sessions
		.iter()
		.map(|s| SessionEntry {
			actions: machine::available_actions(s.state, s.my_side),
			waiting_for_peer: s.state == SessionState::Requested && s.my_side == Some(Side::A),
			session: s.clone(),
		})
		.collect();

	let shared_routes = sessions.iter().find(|s| s.has_both_routes()).and_then(|s| {
		Some(SharedRoutes {
			session_id: s.id,
			my_side: s.my_side,
			route_a: s.route_a?,
			route_b: s.route_b?,
		})
	});

	SessionBoard {
		sessions: entries,
		map_locked: sessions.iter().any(|s| s.state == SessionState::Active),
		sos_active: sessions.iter().any(|s| s.sos_at.is_some()),
		shared_routes,
		tracked_session: None,
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::Ordering;
	use std::time::Duration;

	use lastmile_runtime::fake::{FakeConnector, FakeController};

	use super::*;
	use crate::config::ClientConfig;
	use crate::session::{SessionAction, TransitionError};
	use crate::testing::{FakeSessionService, RecordingSink, ScriptedGeolocator, routes, session};

	struct Harness {
		coordinator: Arc<SessionCoordinator>,
		api: Arc<FakeSessionService>,
		sink: Arc<RecordingSink>,
		controller: FakeController,
		credentials: Credentials,
	}

	fn harness(sessions: Vec<Session>) -> Harness {
		let api = FakeSessionService::with_sessions(sessions);
		let sink = Arc::new(RecordingSink::default());
		let (connector, controller) = FakeConnector::new();
		let credentials = Credentials::new(Some("user".into()));
		let tracker = LocationTracker::new(
			api.clone(),
			Arc::new(connector),
			ScriptedGeolocator::unavailable(),
			sink.clone(),
			credentials.clone(),
			Arc::new(ClientConfig::default()),
		);
		let coordinator = Arc::new(SessionCoordinator::new(api.clone(), credentials.clone(), tracker, sink.clone()));
		Harness {
			coordinator,
			api,
			sink,
			controller,
			credentials,
		}
	}

	#[test]
	fn board_derivation() {
		let mut requested = session(1, SessionState::Requested, Side::A);
		requested.route_a = Some(routes(30.0));
		let mut accepted = session(2, SessionState::Accepted, Side::B);
		accepted.route_a = Some(routes(31.0));
		accepted.route_b = Some(routes(32.0));
		let mut active = session(3, SessionState::Active, Side::A);
		active.sos_at = Some("2026-01-01T10:00:00Z".into());
		active.route_a = Some(routes(33.0));
		active.route_b = Some(routes(34.0));

		let board = build_board(&[requested, accepted, active]);
		assert!(board.map_locked);
		assert!(board.sos_active);
		assert_eq!(board.shared_routes.as_ref().map(|r| r.session_id), Some(2));
		assert!(board.sessions[0].waiting_for_peer);
		assert_eq!(board.sessions[0].actions, vec![SessionAction::Abort]);
		assert_eq!(board.sessions[2].actions, vec![SessionAction::Complete, SessionAction::Abort, SessionAction::Sos]);

		let calm = build_board(&[session(4, SessionState::Accepted, Side::A)]);
		assert!(!calm.map_locked);
		assert!(!calm.sos_active);
		assert!(calm.shared_routes.is_none());
	}

	#[tokio::test(start_paused = true)]
	async fn refresh_attaches_tracker_for_active_session() {
		let mut h = harness(vec![
			session(1, SessionState::Requested, Side::B),
			session(2, SessionState::Active, Side::B),
		]);
		let board = h.coordinator.refresh().await.unwrap();
		assert_eq!(board.tracked_session, Some(2));
		assert!(board.map_locked);
		assert_eq!(board.sessions[0].actions, vec![SessionAction::Accept, SessionAction::Abort]);

		let link = h.controller.next_link().await;
		assert_eq!(link.url, "ws://127.0.0.1:8000/ws/sessions/2?token=tok-2");
		assert_eq!(h.sink.last_board(), Some(board));

		h.coordinator.reset().await;
	}

	#[tokio::test(start_paused = true)]
	async fn completion_detaches_tracker_and_clears_markers() {
		let mut h = harness(vec![session(5, SessionState::Active, Side::A)]);
		h.coordinator.refresh().await.unwrap();
		let link = h.controller.next_link().await;
		link.push(r#"{"side": "b", "lat": 1.0, "lng": 1.0}"#);
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(h.coordinator.tracker().live_pair().known(), 1);

		let done = h.coordinator.dispatch(SessionCommand::new(5, SessionAction::Complete)).await.unwrap();
		assert_eq!(done.state, SessionState::Completed);
		assert_eq!(h.coordinator.tracker().tracked_session(), None);
		assert!(h.coordinator.tracker().live_pair().is_empty());
		assert!(link.closed_by_client());

		let board = h.sink.last_board().unwrap();
		assert!(board.sessions[0].actions.is_empty());
		assert!(!board.map_locked);
	}

	#[tokio::test(start_paused = true)]
	async fn activation_starts_tracking() {
		let mut h = harness(vec![session(6, SessionState::Accepted, Side::A)]);
		h.coordinator.refresh().await.unwrap();
		assert_eq!(h.coordinator.tracker().tracked_session(), None);

		h.coordinator.dispatch(SessionCommand::new(6, SessionAction::Activate)).await.unwrap();
		assert_eq!(h.coordinator.tracker().tracked_session(), Some(6));
		let _link = h.controller.next_link().await;

		h.coordinator.reset().await;
	}

	#[tokio::test]
	async fn initiator_cannot_accept_and_request_is_not_sent() {
		let h = harness(vec![session(1, SessionState::Requested, Side::A)]);
		h.coordinator.refresh().await.unwrap();

		let err = h.coordinator.dispatch(SessionCommand::new(1, SessionAction::Accept)).await.unwrap_err();
		assert!(matches!(err, Error::Transition(TransitionError::InitiatorCannotAccept)));
		assert_eq!(h.api.transition_calls.load(Ordering::SeqCst), 0);
		assert_eq!(h.sink.notices().len(), 1);
	}

	#[tokio::test]
	async fn server_rejection_surfaces_one_notice() {
		let h = harness(vec![session(1, SessionState::Requested, Side::B)]);
		h.coordinator.refresh().await.unwrap();
		*h.api.fail_next.lock() = Some(Error::Request {
			status: 400,
			detail: "Invalid transition".into(),
		});

		let err = h.coordinator.dispatch(SessionCommand::new(1, SessionAction::Accept)).await.unwrap_err();
		assert_eq!(err.status(), Some(400));
		assert_eq!(h.sink.notices(), vec!["Invalid transition".to_string()]);
		assert_eq!(h.coordinator.session(1).map(|s| s.state), Some(SessionState::Requested));
	}

	#[tokio::test]
	async fn sos_sets_banner_and_keeps_routes() {
		let mut active = session(3, SessionState::Active, Side::A);
		active.route_a = Some(routes(30.0));
		active.route_b = Some(routes(31.0));
		let h = harness(vec![active]);
		h.coordinator.refresh().await.unwrap();

		let ack = h.coordinator.dispatch(SessionCommand::new(3, SessionAction::Sos)).await.unwrap();
		assert_eq!(ack.state, SessionState::Active);
		assert!(ack.route_a.is_some() && ack.route_b.is_some());

		let board = h.sink.last_board().unwrap();
		assert!(board.sos_active);
		assert_eq!(board.shared_routes.map(|r| r.session_id), Some(3));
		h.coordinator.reset().await;
	}

	#[tokio::test]
	async fn dispatch_fetches_unknown_session_first() {
		let h = harness(vec![session(9, SessionState::Requested, Side::B)]);
		let ack = h.coordinator.dispatch(SessionCommand::new(9, SessionAction::Accept)).await.unwrap();
		assert_eq!(ack.state, SessionState::Accepted);
		assert_eq!(h.api.list_calls.load(Ordering::SeqCst), 1);

		let err = h.coordinator.dispatch(SessionCommand::new(404, SessionAction::Abort)).await.unwrap_err();
		assert!(matches!(err, Error::UnknownSession(404)));
	}

	#[tokio::test]
	async fn unauthorized_refresh_revokes_credential() {
		let h = harness(vec![session(1, SessionState::Requested, Side::A)]);
		*h.api.unauthorized.lock() = true;

		assert!(h.coordinator.refresh().await.unwrap_err().is_unauthorized());
		assert!(!h.credentials.is_present());
		assert!(h.sink.notices().is_empty());
	}

	#[tokio::test]
	async fn create_session_refreshes_board() {
		let h = harness(Vec::new());
		let created = h.coordinator.create_session(11, 22).await.unwrap();
		assert_eq!(created.state, SessionState::Requested);
		assert_eq!(created.intent_a_id, Some(11));

		let board = h.sink.last_board().unwrap();
		assert_eq!(board.sessions.len(), 1);
		assert!(board.sessions[0].waiting_for_peer);
	}

	#[tokio::test(start_paused = true)]
	async fn concurrent_refreshes_are_serialized() {
		let mut h = harness(vec![session(2, SessionState::Active, Side::A)]);
		let (a, b) = tokio::join!(h.coordinator.refresh(), h.coordinator.refresh());
		assert_eq!(a.unwrap().tracked_session, Some(2));
		assert_eq!(b.unwrap().tracked_session, Some(2));

		let _link = h.controller.next_link().await;
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(h.controller.attempts().len(), 1);
		assert_eq!(h.sink.boards.lock().len(), 2);

		h.coordinator.reset().await;
	}

	#[tokio::test(start_paused = true)]
	async fn commands_without_live_tracking_open_no_channel() {
		let mut h = harness(vec![session(4, SessionState::Active, Side::A)]);
		h.coordinator.set_live_tracking(false);

		let ack = h.coordinator.dispatch(SessionCommand::new(4, SessionAction::Sos)).await.unwrap();
		assert!(ack.sos_at.is_some());
		let board = h.sink.last_board().unwrap();
		assert!(board.map_locked);
		assert_eq!(board.tracked_session, None);

		tokio::time::sleep(Duration::from_secs(10)).await;
		assert!(h.controller.attempts().is_empty());
		assert!(h.controller.try_next_link().is_none());
		assert_eq!(h.coordinator.tracker().tracked_session(), None);
	}
}
