use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lastmile::protocol::RoutePoint;

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "lastmile")]
#[command(about = "Last Mile Connect - find a companion for the last stretch home")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	/// Configuration file (defaults to the user config directory)
	#[arg(long, global = true, value_name = "PATH")]
	pub config: Option<PathBuf>,

	/// API base URL, e.g. http://127.0.0.1:8000/api
	#[arg(long, global = true, value_name = "URL")]
	pub api_url: Option<String>,

	/// Bearer token for this invocation only
	#[arg(long, global = true, value_name = "TOKEN")]
	pub token: Option<String>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Manage the stored credential
	Auth {
		#[command(subcommand)]
		action: AuthAction,
	},

	/// Inspect configuration
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},

	/// Trip intents
	Intents {
		#[command(subcommand)]
		action: IntentAction,
	},

	/// Ranked companion candidates for one of your intents
	Matches { intent_id: i64 },

	/// Nearby transit stops, thinned so markers do not overlap
	Stops {
		/// Read candidates from a local JSON file instead of the service
		#[arg(long, value_name = "PATH")]
		file: Option<PathBuf>,

		/// Minimum spacing between kept stops, in meters
		#[arg(long, value_name = "METERS")]
		min_separation: Option<f64>,
	},

	/// Companion sessions
	Sessions {
		#[command(subcommand)]
		action: SessionCommand,
	},

	/// Stay connected: live session updates and location sharing until Ctrl-C
	Watch {
		/// Fixed device position
		#[arg(long, value_name = "LAT,LNG", value_parser = parse_point, conflicts_with = "position_file")]
		position: Option<RoutePoint>,

		/// JSON {lat, lng} file re-read on every sample
		#[arg(long, value_name = "PATH")]
		position_file: Option<PathBuf>,
	},
}

#[derive(Subcommand, Debug)]
pub enum AuthAction {
	/// Store a bearer token in the config file
	SetToken { token: String },
	/// Remove the stored token
	Clear,
	/// Show whether a token is configured
	Show,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
	/// Effective configuration after env and flag overrides
	Show,
}

#[derive(Subcommand, Debug)]
pub enum IntentAction {
	/// Your active intents
	List,
	/// Declare a trip
	Create {
		#[arg(long, value_name = "LAT,LNG", value_parser = parse_point)]
		origin: RoutePoint,
		#[arg(long, value_name = "LAT,LNG", value_parser = parse_point)]
		dest: RoutePoint,
		/// Minutes until the intent expires
		#[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u32).range(1..=1440))]
		expires_in: u32,
	},
	/// Withdraw an intent; sessions built on it go away too
	Delete { intent_id: i64 },
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
	/// Your open sessions with the actions available on each
	List,
	/// Request a session pairing your intent with a matched one
	Create { my_intent_id: i64, their_intent_id: i64 },
	/// Accept a request (invited side only)
	Accept { session_id: i64 },
	/// Start the trip
	Activate { session_id: i64 },
	/// Finish the trip
	Complete { session_id: i64 },
	/// Cancel the session
	Abort { session_id: i64 },
	/// Raise an SOS on an active session
	Sos { session_id: i64 },
}

impl Commands {
	/// Name echoed in the result envelope.
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Auth { action } => match action {
				AuthAction::SetToken { .. } => "auth set-token",
				AuthAction::Clear => "auth clear",
				AuthAction::Show => "auth show",
			},
			Commands::Config { .. } => "config show",
			Commands::Intents { action } => match action {
				IntentAction::List => "intents list",
				IntentAction::Create { .. } => "intents create",
				IntentAction::Delete { .. } => "intents delete",
			},
			Commands::Matches { .. } => "matches",
			Commands::Stops { .. } => "stops",
			Commands::Sessions { action } => match action {
				SessionCommand::List => "sessions list",
				SessionCommand::Create { .. } => "sessions create",
				SessionCommand::Accept { .. } => "sessions accept",
				SessionCommand::Activate { .. } => "sessions activate",
				SessionCommand::Complete { .. } => "sessions complete",
				SessionCommand::Abort { .. } => "sessions abort",
				SessionCommand::Sos { .. } => "sessions sos",
			},
			Commands::Watch { .. } => "watch",
		}
	}
}

/// Parse `LAT,LNG` into a point, rejecting out-of-range values.
pub fn parse_point(raw: &str) -> Result<RoutePoint, String> {
	let (lat, lng) = raw.split_once(',').ok_or_else(|| format!("expected LAT,LNG, got `{raw}`"))?;
	let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude `{}`", lat.trim()))?;
	let lng: f64 = lng.trim().parse().map_err(|_| format!("invalid longitude `{}`", lng.trim()))?;
	if !(-90.0..=90.0).contains(&lat) {
		return Err(format!("latitude {lat} out of range"));
	}
	if !(-180.0..=180.0).contains(&lng) {
		return Err(format!("longitude {lng} out of range"));
	}
	Ok(RoutePoint { lat, lng })
}
