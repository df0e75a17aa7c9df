use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use lastmile::protocol::RoutePoint;
use serde_json::{Value, json};
use tracing::info;

use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::OutputFormat;
use crate::sink::TerminalSink;

pub async fn run(position: Option<RoutePoint>, position_file: Option<PathBuf>, ctx: &CommandContext, format: OutputFormat) -> Result<Value> {
	let mut config = ctx.effective.clone();
	if config.token.is_none() {
		return Err(CliError::InvalidInput("no token configured; run `lastmile auth set-token` or pass --token".into()));
	}
	if position.is_some() || position_file.is_some() {
		config.position = position;
		config.position_file = position_file;
	}

	let client = ctx.client_with(config, Arc::new(TerminalSink::new(format)))?;
	if let Err(err) = client.start().await {
		client.shutdown().await;
		return Err(err.into());
	}
	info!(target = "lastmile", "watching; press Ctrl-C to stop");

	let mut credential = client.credentials().subscribe();
	let outcome = tokio::select! {
		signal = tokio::signal::ctrl_c() => signal.context("failed to listen for Ctrl-C").map(|()| false),
		_ = credential.wait_for(Option::is_none) => Ok(true),
	};
	client.shutdown().await;
	let logged_out = outcome?;
	if logged_out {
		ctx.forget_rejected_token()?;
	}

	Ok(json!({ "stopped": true, "loggedOut": logged_out }))
}
