use serde::{Deserialize, Serialize};

/// Transit stop from `GET /stops`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopCandidate {
	pub id: String,
	#[serde(default)]
	pub name: String,
	pub lat: f64,
	pub lng: f64,
}
