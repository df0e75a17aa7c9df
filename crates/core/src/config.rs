//! Persistent client configuration.
//!
//! Stored as camelCase JSON, by default at `<config dir>/lastmile/config.json`.
//! A missing or unreadable file yields defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lastmile_protocol::RoutePoint;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::geo::MIN_STOP_MARKER_DISTANCE_M;
use crate::{Error, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
pub const ENV_API_URL: &str = "LASTMILE_API_URL";
pub const ENV_TOKEN: &str = "LASTMILE_TOKEN";

fn default_api_url() -> String {
	DEFAULT_API_URL.to_string()
}

fn default_reconnect_ms() -> u64 {
	3000
}

fn default_publish_ms() -> u64 {
	5000
}

fn default_poll_ms() -> u64 {
	3000
}

fn default_stop_separation() -> f64 {
	MIN_STOP_MARKER_DISTANCE_M
}

fn default_request_timeout_ms() -> u64 {
	10_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	#[serde(default = "default_api_url")]
	pub api_url: String,
	/// Push channel base. Derived from `api_url` when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub ws_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub token: Option<String>,
	#[serde(default = "default_reconnect_ms")]
	pub notification_reconnect_ms: u64,
	#[serde(default = "default_reconnect_ms")]
	pub location_reconnect_ms: u64,
	#[serde(default = "default_publish_ms")]
	pub location_publish_ms: u64,
	#[serde(default = "default_poll_ms")]
	pub location_poll_ms: u64,
	#[serde(default = "default_stop_separation")]
	pub stop_separation_meters: f64,
	#[serde(default = "default_request_timeout_ms")]
	pub request_timeout_ms: u64,
	/// Fixed device position used when no position file is configured.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub position: Option<RoutePoint>,
	/// JSON `{lat, lng}` file re-read on every sample.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub position_file: Option<PathBuf>,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_url: default_api_url(),
			ws_url: None,
			token: None,
			notification_reconnect_ms: default_reconnect_ms(),
			location_reconnect_ms: default_reconnect_ms(),
			location_publish_ms: default_publish_ms(),
			location_poll_ms: default_poll_ms(),
			stop_separation_meters: default_stop_separation(),
			request_timeout_ms: default_request_timeout_ms(),
			position: None,
			position_file: None,
		}
	}
}

impl ClientConfig {
	pub fn default_path() -> Option<PathBuf> {
		dirs::config_dir().map(|dir| dir.join("lastmile").join("config.json"))
	}

	pub fn load(path: &Path) -> Self {
		let content = match fs::read_to_string(path) {
			Ok(content) => content,
			Err(_) => return Self::default(),
		};
		match serde_json::from_str(&content) {
			Ok(config) => config,
			Err(err) => {
				warn!(target = "lastmile.session", path = %path.display(), error = %err, "ignoring unreadable config");
				Self::default()
			}
		}
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(self)?;
		fs::write(path, json)?;
		Ok(())
	}

	/// Apply overrides from the process environment.
	pub fn apply_env(&mut self) {
		self.apply_env_from(|key| std::env::var(key).ok());
	}

	pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
		if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
			self.api_url = url;
		}
		if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
			self.token = Some(token);
		}
	}

	/// Base URL for push channels.
	pub fn ws_base(&self) -> Result<Url> {
		if let Some(ws) = &self.ws_url {
			return Ok(Url::parse(ws)?);
		}
		let mut url = Url::parse(&self.api_url)?;
		let scheme = match url.scheme() {
			"http" | "ws" => "ws",
			"https" | "wss" => "wss",
			other => return Err(Error::Config(format!("unsupported API scheme `{other}`"))),
		};
		url.set_scheme(scheme)
			.map_err(|()| Error::Config(format!("cannot derive websocket URL from {}", self.api_url)))?;
		url.set_path("");
		url.set_query(None);
		url.set_fragment(None);
		Ok(url)
	}

	/// `/ws/updates` endpoint for the given credential.
	pub fn notification_url(&self, token: &str) -> Result<String> {
		self.channel_url("ws/updates", token)
	}

	/// `/ws/sessions/{id}` endpoint for the given session token.
	pub fn session_channel_url(&self, session_id: i64, token: &str) -> Result<String> {
		self.channel_url(&format!("ws/sessions/{session_id}"), token)
	}

	fn channel_url(&self, path: &str, token: &str) -> Result<String> {
		let base = self.ws_base()?;
		let mut url = Url::parse(&format!("{}/{path}", base.as_str().trim_end_matches('/')))?;
		url.query_pairs_mut().append_pair("token", token);
		Ok(url.into())
	}

	pub fn notification_reconnect(&self) -> Duration {
		Duration::from_millis(self.notification_reconnect_ms)
	}

	pub fn location_reconnect(&self) -> Duration {
		Duration::from_millis(self.location_reconnect_ms)
	}

	pub fn location_publish(&self) -> Duration {
		Duration::from_millis(self.location_publish_ms)
	}

	pub fn location_poll(&self) -> Duration {
		Duration::from_millis(self.location_poll_ms)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}
}
