use serde::{Deserialize, Serialize};

use crate::session::{RoutePoint, Side};

/// Outbound frame on the session location channel: the device's current position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
	pub lat: f64,
	pub lng: f64,
}

/// Inbound frame on the session location channel, tagged with the sender's side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideLocation {
	pub side: Side,
	pub lat: f64,
	pub lng: f64,
}

/// Response of `GET /sessions/{id}/locations`.
///
/// Either side may be missing when that participant has not reported yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationSnapshot {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub a: Option<RoutePoint>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub b: Option<RoutePoint>,
}

impl LocationSnapshot {
	pub fn get(&self, side: Side) -> Option<RoutePoint> {
		match side {
			Side::A => self.a,
			Side::B => self.b,
		}
	}
}
