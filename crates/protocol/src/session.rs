use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a session as reported by the session service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
	Requested,
	Accepted,
	Active,
	Completed,
	Aborted,
}

impl SessionState {
	/// Returns `true` for `COMPLETED` and `ABORTED`.
	pub fn is_terminal(self) -> bool {
		matches!(self, SessionState::Completed | SessionState::Aborted)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			SessionState::Requested => "REQUESTED",
			SessionState::Accepted => "ACCEPTED",
			SessionState::Active => "ACTIVE",
			SessionState::Completed => "COMPLETED",
			SessionState::Aborted => "ABORTED",
		}
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Which of the two session participants a datum belongs to.
///
/// The session creator is always side `a`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
	A,
	B,
}

impl Side {
	pub const BOTH: [Side; 2] = [Side::A, Side::B];

	/// The opposite participant.
	pub fn other(self) -> Side {
		match self {
			Side::A => Side::B,
			Side::B => Side::A,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Side::A => "a",
			Side::B => "b",
		}
	}
}

impl fmt::Display for Side {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
	pub lat: f64,
	pub lng: f64,
}

/// Origin and destination of one participant's intent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoints {
	pub origin: RoutePoint,
	pub destination: RoutePoint,
}

/// Session as returned by `GET /sessions/me` and the transition endpoints.
///
/// `my_side` and `my_token` are scoped to the requesting user; the token
/// authorizes the per-session location channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
	pub id: i64,
	pub state: SessionState,
	#[serde(default)]
	pub intent_a_id: Option<i64>,
	#[serde(default)]
	pub intent_b_id: Option<i64>,
	#[serde(default)]
	pub my_side: Option<Side>,
	#[serde(default)]
	pub my_token: Option<String>,
	#[serde(default)]
	pub sos_at: Option<String>,
	#[serde(default)]
	pub started_at: Option<String>,
	#[serde(default)]
	pub ends_at: Option<String>,
	#[serde(default)]
	pub max_duration_minutes: Option<u32>,
	#[serde(default)]
	pub created_at: Option<String>,
	#[serde(default)]
	pub route_a: Option<RoutePoints>,
	#[serde(default)]
	pub route_b: Option<RoutePoints>,
}

impl Session {
	/// Returns `true` when both participants' route endpoints are present.
	pub fn has_both_routes(&self) -> bool {
		self.route_a.is_some() && self.route_b.is_some()
	}
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreate {
	pub intent_a_id: i64,
	pub intent_b_id: i64,
}
