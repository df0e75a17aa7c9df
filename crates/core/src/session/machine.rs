use std::fmt;
use std::str::FromStr;

use lastmile_protocol::{SessionState, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user-initiated lifecycle action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
	Accept,
	Activate,
	Complete,
	Abort,
	Sos,
}

impl SessionAction {
	/// Display order for action buttons.
	pub const ALL: [SessionAction; 5] = [
		SessionAction::Accept,
		SessionAction::Activate,
		SessionAction::Complete,
		SessionAction::Abort,
		SessionAction::Sos,
	];

	/// Path segment of the transition endpoint.
	pub fn as_str(self) -> &'static str {
		match self {
			SessionAction::Accept => "accept",
			SessionAction::Activate => "activate",
			SessionAction::Complete => "complete",
			SessionAction::Abort => "abort",
			SessionAction::Sos => "sos",
		}
	}
}

impl fmt::Display for SessionAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for SessionAction {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|action| action.as_str().eq_ignore_ascii_case(s))
			.ok_or_else(|| format!("unknown session action `{s}`"))
	}
}

/// A requested action against one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCommand {
	pub session_id: i64,
	pub action: SessionAction,
}

impl SessionCommand {
	pub fn new(session_id: i64, action: SessionAction) -> Self {
		Self { session_id, action }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
	#[error("Session already ended ({state})")]
	Ended { state: SessionState },

	#[error("Cannot {action} a session that is {state}")]
	NotAllowed { action: SessionAction, state: SessionState },

	#[error("Only the invited companion can accept")]
	InitiatorCannotAccept,

	#[error("You are not a participant in this session")]
	NotAParticipant,
}

/// State reached by applying `action` as participant `side`.
///
/// ```text
/// REQUESTED --accept (side b)--> ACCEPTED --activate--> ACTIVE --complete--> COMPLETED
///     |                             |                     | \--sos--> ACTIVE
///     +--abort--> ABORTED <---------+----abort------------+
/// ```
pub fn next_state(state: SessionState, action: SessionAction, side: Option<Side>) -> Result<SessionState, TransitionError> {
	use SessionAction as A;
	use SessionState as S;

	if state.is_terminal() {
		return Err(TransitionError::Ended { state });
	}
	let Some(side) = side else {
		return Err(TransitionError::NotAParticipant);
	};

	match (state, action) {
		(S::Requested, A::Accept) if side == Side::B => Ok(S::Accepted),
		(S::Requested, A::Accept) => Err(TransitionError::InitiatorCannotAccept),
		(S::Accepted, A::Activate) => Ok(S::Active),
		(S::Active, A::Complete) => Ok(S::Completed),
		(S::Active, A::Sos) => Ok(S::Active),
		(S::Requested | S::Accepted | S::Active, A::Abort) => Ok(S::Aborted),
		(state, action) => Err(TransitionError::NotAllowed { action, state }),
	}
}

/// Actions `side` may take from `state`, in display order.
pub fn available_actions(state: SessionState, side: Option<Side>) -> Vec<SessionAction> {
	SessionAction::ALL
		.into_iter()
		.filter(|action| next_state(state, *action, side).is_ok())
		.collect()
}
