use thiserror::Error;
use tracing::warn;

use crate::credentials::Credentials;
use crate::session::TransitionError;
use crate::view::ViewSink;

/// Errors surfaced by the client core.
#[derive(Debug, Error)]
pub enum Error {
	/// The service answered with a non-success status.
	#[error("{detail}")]
	Request { status: u16, detail: String },

	/// The credential was rejected. The session is torn down when this is seen.
	#[error("Not authorized; please log in again")]
	Unauthorized,

	#[error("HTTP error: {0}")]
	Http(#[from] reqwest::Error),

	#[error(transparent)]
	Transition(#[from] TransitionError),

	#[error("Unknown session {0}")]
	UnknownSession(i64),

	#[error("Geolocation unavailable: {0}")]
	Geolocation(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Invalid URL: {0}")]
	Url(#[from] url::ParseError),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Channel(#[from] lastmile_runtime::Error),
}

impl Error {
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Error::Unauthorized)
	}

	/// HTTP status for service-side failures.
	pub fn status(&self) -> Option<u16> {
		match self {
			Error::Request { status, .. } => Some(*status),
			Error::Unauthorized => Some(401),
			_ => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;

/// Route a failed operation to the user.
///
/// Authorization failures revoke the credential, which triggers logout;
/// everything else becomes a single notice.
pub(crate) fn report(err: Error, credentials: &Credentials, sink: &dyn ViewSink) -> Error {
	if err.is_unauthorized() {
		warn!(target = "lastmile.session", "credential rejected; logging out");
		credentials.clear();
	} else {
		sink.notice(&err.to_string());
	}
	err
}
