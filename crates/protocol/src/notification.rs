use serde::{Deserialize, Serialize};

/// Event pushed on the process-wide `/ws/updates` channel.
///
/// The server only tells the client *what* changed; the client re-fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notification {
	Sessions,
	Intents,
}
