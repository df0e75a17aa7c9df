//! Command handlers. Each returns its payload; [`dispatch`] wraps it in the
//! result envelope and prints it.

mod auth;
mod config;
mod intents;
mod sessions;
mod stops;
mod watch;

use std::time::Instant;

use serde_json::Value;
use tracing::warn;

use crate::cli::{Cli, Commands};
use crate::context::CommandContext;
use crate::error::{CliError, Result};
use crate::output::{OutputFormat, ResultBuilder, print_result};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let started = Instant::now();
	let format = cli.format;
	let name = cli.command.name();

	let outcome = match CommandContext::from_cli(&cli) {
		Ok(ctx) => {
			let outcome = run(cli.command, &ctx, format).await;
			if let Err(CliError::Client(lastmile::Error::Unauthorized)) = &outcome {
				if let Err(err) = ctx.forget_rejected_token() {
					warn!(target = "lastmile", error = %err, "failed to remove rejected token");
				}
			}
			outcome
		}
		Err(err) => Err(err),
	};

	match outcome {
		Ok(data) => {
			print_result(&ResultBuilder::new(name).started_at(started).data(data).build(), format);
			Ok(())
		}
		Err(err) => {
			let status = match &err {
				CliError::Client(client) => client.status(),
				_ => None,
			};
			let result = ResultBuilder::<Value>::new(name).started_at(started).error(err.code(), err.to_string(), status).build();
			print_result(&result, format);
			Err(err)
		}
	}
}

async fn run(command: Commands, ctx: &CommandContext, format: OutputFormat) -> Result<Value> {
	match command {
		Commands::Auth { action } => auth::run(action, ctx),
		Commands::Config { .. } => config::show(ctx),
		Commands::Intents { action } => intents::run(action, ctx).await,
		Commands::Matches { intent_id } => intents::matches(intent_id, ctx).await,
		Commands::Stops { file, min_separation } => stops::run(file, min_separation, ctx).await,
		Commands::Sessions { action } => sessions::run(action, ctx).await,
		Commands::Watch { position, position_file } => watch::run(position, position_file, ctx, format).await,
	}
}
