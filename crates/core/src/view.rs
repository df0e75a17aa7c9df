//! Presentation-facing state and the sink it is pushed to.

use lastmile_protocol::{Intent, RoutePoints, Session, Side, StopCandidate};
use serde::Serialize;
use tokio::time::Instant;

use crate::session::SessionAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
	Push,
	Poll,
}

/// Last known position of one participant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiveLocation {
	pub side: Side,
	pub lat: f64,
	pub lng: f64,
	/// When this value was observed; for polled values, when the poll was issued.
	#[serde(skip)]
	pub observed_at: Instant,
	pub source: LocationSource,
}

/// Both participants' markers for the tracked session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LivePair {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub my_side: Option<Side>,
	pub a: Option<LiveLocation>,
	pub b: Option<LiveLocation>,
}

impl LivePair {
	pub fn for_side(my_side: Side) -> Self {
		Self {
			my_side: Some(my_side),
			a: None,
			b: None,
		}
	}

	pub fn get(&self, side: Side) -> Option<&LiveLocation> {
		match side {
			Side::A => self.a.as_ref(),
			Side::B => self.b.as_ref(),
		}
	}

	/// Overwrite the marker for `location.side`.
	pub fn set(&mut self, location: LiveLocation) {
		match location.side {
			Side::A => self.a = Some(location),
			Side::B => self.b = Some(location),
		}
	}

	pub fn mine(&self) -> Option<&LiveLocation> {
		self.my_side.and_then(|side| self.get(side))
	}

	pub fn peer(&self) -> Option<&LiveLocation> {
		self.my_side.and_then(|side| self.get(side.other()))
	}

	pub fn known(&self) -> usize {
		usize::from(self.a.is_some()) + usize::from(self.b.is_some())
	}

	pub fn is_empty(&self) -> bool {
		self.known() == 0
	}
}

/// Route endpoints of the first session that carries both participants' routes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedRoutes {
	pub session_id: i64,
	pub my_side: Option<Side>,
	pub route_a: RoutePoints,
	pub route_b: RoutePoints,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionEntry {
	pub session: Session,
	/// Actions this user may take now, in display order.
	pub actions: Vec<SessionAction>,
	/// The initiator is waiting for the other side to accept.
	pub waiting_for_peer: bool,
}

/// Everything the session panel renders after a refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionBoard {
	pub sessions: Vec<SessionEntry>,
	/// Map adjustments are disabled while any session is active.
	pub map_locked: bool,
	pub sos_active: bool,
	pub shared_routes: Option<SharedRoutes>,
	pub tracked_session: Option<i64>,
}

/// Receives state changes for display.
///
/// Called from background tasks, sometimes while internal locks are held;
/// implementations must not call back into the client.
pub trait ViewSink: Send + Sync {
	fn sessions_changed(&self, board: &SessionBoard);

	fn intents_changed(&self, _intents: &[Intent]) {}

	fn stops_changed(&self, _stops: &[StopCandidate]) {}

	fn live_locations_changed(&self, pair: &LivePair);

	/// Fit the viewport to both markers. Sent once per tracked session.
	fn fit_to_parties(&self, _pair: &LivePair) {}

	/// A user-visible error message.
	fn notice(&self, message: &str);

	fn logged_out(&self) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ViewSink for NullSink {
	fn sessions_changed(&self, _board: &SessionBoard) {}

	fn live_locations_changed(&self, _pair: &LivePair) {}

	fn notice(&self, _message: &str) {}
}
