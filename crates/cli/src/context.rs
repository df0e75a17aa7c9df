use std::path::PathBuf;
use std::sync::Arc;

use lastmile::{ClientConfig, ClientContext, ContextParts, NullSink, ViewSink};
use tracing::warn;

use crate::cli::Cli;
use crate::error::{CliError, Result};

/// Resolved configuration for one invocation.
///
/// `stored` is exactly what is on disk; `effective` layers environment and
/// flag overrides on top and is what commands run with.
#[derive(Debug)]
pub struct CommandContext {
	pub config_path: PathBuf,
	pub stored: ClientConfig,
	pub effective: ClientConfig,
}

impl CommandContext {
	pub fn from_cli(cli: &Cli) -> Result<Self> {
		let config_path = match &cli.config {
			Some(path) => path.clone(),
			None => ClientConfig::default_path().ok_or(CliError::NoConfigPath)?,
		};
		let stored = ClientConfig::load(&config_path);

		let mut effective = stored.clone();
		effective.apply_env();
		if let Some(url) = &cli.api_url {
			effective.api_url = url.clone();
		}
		if let Some(token) = &cli.token {
			effective.token = Some(token.clone());
		}

		Ok(Self {
			config_path,
			stored,
			effective,
		})
	}

	/// Drop the stored token after the service rejected it.
	///
	/// Only the token this invocation actually used is forgotten; a token
	/// supplied by flag or environment leaves the stored one alone.
	pub fn forget_rejected_token(&self) -> Result<bool> {
		if self.stored.token.is_none() || self.stored.token != self.effective.token {
			return Ok(false);
		}
		let mut config = self.stored.clone();
		config.token = None;
		self.save(&config)?;
		warn!(target = "lastmile", path = %self.config_path.display(), "stored token was rejected; removed it");
		Ok(true)
	}

	/// Persist `config` as the stored configuration.
	pub fn save(&self, config: &ClientConfig) -> Result<()> {
		config.save(&self.config_path)?;
		Ok(())
	}

	/// A client for one-shot commands, with no live view.
	pub fn client(&self) -> Result<ClientContext> {
		self.one_shot(self.effective.clone())
	}

	/// Like [`client`](Self::client) with an adjusted configuration.
	///
	/// One-shot clients never attach the location tracker, so sending a
	/// command for an active session opens no location channel.
	pub fn one_shot(&self, config: ClientConfig) -> Result<ClientContext> {
		let client = self.client_with(config, Arc::new(NullSink))?;
		client.coordinator().set_live_tracking(false);
		Ok(client)
	}

	pub fn client_with(&self, config: ClientConfig, sink: Arc<dyn ViewSink>) -> Result<ClientContext> {
		Ok(ClientContext::new(ContextParts::from_config(config, sink)?))
	}
}
