//! Terminal rendering for `watch`.

use std::io::{self, Write};

use lastmile::protocol::{Intent, StopCandidate};
use lastmile::{LivePair, SessionBoard, ViewSink};
use serde::Serialize;
use serde_json::json;

use crate::output::OutputFormat;

/// Writes each view update to stdout as it happens.
///
/// JSON format emits one object per line with an `event` tag.
pub struct TerminalSink {
	format: OutputFormat,
}

impl TerminalSink {
	pub fn new(format: OutputFormat) -> Self {
		Self { format }
	}

	fn emit<T: Serialize>(&self, event: &str, payload: &T, text: impl FnOnce() -> String) {
		let line = match self.format {
			OutputFormat::Json => json!({ "event": event, "data": payload }).to_string(),
			OutputFormat::Text => text(),
		};
		let mut stdout = io::stdout().lock();
		let _ = writeln!(stdout, "{line}");
		let _ = stdout.flush();
	}
}

impl ViewSink for TerminalSink {
	fn sessions_changed(&self, board: &SessionBoard) {
		self.emit("sessions", board, || render_board(board));
	}

	fn intents_changed(&self, intents: &[Intent]) {
		self.emit("intents", &intents, || format!("intents: {} active", intents.len()));
	}

	fn stops_changed(&self, stops: &[StopCandidate]) {
		self.emit("stops", &stops, || format!("stops: {}", stops.len()));
	}

	fn live_locations_changed(&self, pair: &LivePair) {
		self.emit("locations", pair, || render_pair(pair));
	}

	fn fit_to_parties(&self, pair: &LivePair) {
		self.emit("fit", pair, || "map: fit to both companions".to_string());
	}

	fn notice(&self, message: &str) {
		self.emit("notice", &message, || format!("! {message}"));
	}

	fn logged_out(&self) {
		self.emit("logout", &(), || "logged out; run `lastmile auth set-token`".to_string());
	}
}

fn render_board(board: &SessionBoard) -> String {
	let mut out = String::new();
	if board.sos_active {
		out.push_str("SOS ACTIVE\n");
	}
	if board.sessions.is_empty() {
		out.push_str("sessions: none");
		return out;
	}
	out.push_str("sessions:");
	for entry in &board.sessions {
		let session = &entry.session;
		let side = session.my_side.map_or("-", |s| s.as_str());
		let actions: Vec<&str> = entry.actions.iter().map(|a| a.as_str()).collect();
		out.push_str(&format!("\n  #{} {} (side {side})", session.id, session.state));
		if entry.waiting_for_peer {
			out.push_str(" waiting for companion");
		}
		if !actions.is_empty() {
			out.push_str(&format!(" [{}]", actions.join(", ")));
		}
		if board.tracked_session == Some(session.id) {
			out.push_str(" sharing location");
		}
	}
	out
}

fn render_pair(pair: &LivePair) -> String {
	if pair.is_empty() {
		return "locations: cleared".to_string();
	}
	let fmt = |label: &str, loc: Option<&lastmile::LiveLocation>| match loc {
		Some(l) => format!("{label} {:.5},{:.5} ({:?})", l.lat, l.lng, l.source).to_lowercase(),
		None => format!("{label} unknown"),
	};
	format!("locations: {} | {}", fmt("me", pair.mine()), fmt("companion", pair.peer()))
}
