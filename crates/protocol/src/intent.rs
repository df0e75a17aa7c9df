use serde::{Deserialize, Serialize};

/// A user's declared trip, as listed by `GET /intents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
	pub id: i64,
	#[serde(default)]
	pub user_id: Option<i64>,
	pub origin_lat: f64,
	pub origin_lng: f64,
	pub dest_lat: f64,
	pub dest_lng: f64,
	#[serde(default)]
	pub expires_at: Option<String>,
	#[serde(default)]
	pub created_at: Option<String>,
}

/// Body of `POST /intents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCreate {
	pub origin_lat: f64,
	pub origin_lng: f64,
	pub dest_lat: f64,
	pub dest_lng: f64,
	pub expires_in_minutes: u32,
}

/// A ranked companion candidate from `GET /intents/matches`.
///
/// Scores are produced by the matcher and are displayed as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCard {
	pub intent_id: i64,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub has_vehicle: bool,
	#[serde(default)]
	pub same_bus_stop: bool,
	#[serde(default)]
	pub buddy_score: f64,
	#[serde(default)]
	pub route_overlap_score: f64,
	#[serde(default)]
	pub past_rating_avg: Option<f64>,
	pub origin_lat: f64,
	pub origin_lng: f64,
	pub dest_lat: f64,
	pub dest_lng: f64,
}

impl MatchCard {
	/// Name shown for the candidate, falling back to a generic label.
	pub fn display_name(&self) -> &str {
		match self.name.as_deref().map(str::trim) {
			Some(name) if !name.is_empty() => name,
			_ => "Buddy",
		}
	}
}

/// Error body returned by the services on non-success responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
	pub detail: serde_json::Value,
}

impl ErrorBody {
	/// String detail when the server sent one, `None` for structured validation errors.
	pub fn message(&self) -> Option<&str> {
		self.detail.as_str()
	}
}
