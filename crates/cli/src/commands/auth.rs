use lastmile::config::ENV_TOKEN;
use serde_json::{Value, json};
use tracing::info;

use crate::cli::AuthAction;
use crate::context::CommandContext;
use crate::error::{CliError, Result};

pub fn run(action: AuthAction, ctx: &CommandContext) -> Result<Value> {
	match action {
		AuthAction::SetToken { token } => {
			let token = token.trim();
			if token.is_empty() {
				return Err(CliError::InvalidInput("token must not be empty".into()));
			}
			let mut stored = ctx.stored.clone();
			stored.token = Some(token.to_string());
			ctx.save(&stored)?;
			info!(target = "lastmile", path = %ctx.config_path.display(), "token stored");
			Ok(json!({ "stored": true, "path": ctx.config_path }))
		}
		AuthAction::Clear => {
			let had_token = ctx.stored.token.is_some();
			if had_token {
				let mut stored = ctx.stored.clone();
				stored.token = None;
				ctx.save(&stored)?;
			}
			Ok(json!({ "cleared": had_token, "path": ctx.config_path }))
		}
		AuthAction::Show => Ok(json!({
			"present": ctx.effective.token.is_some(),
			"source": token_source(ctx),
		})),
	}
}

/// Where the effective token came from. Never the token itself.
fn token_source(ctx: &CommandContext) -> Option<&'static str> {
	let effective = ctx.effective.token.as_ref()?;
	if ctx.stored.token.as_ref() == Some(effective) {
		Some("config")
	} else if std::env::var(ENV_TOKEN).ok().as_ref() == Some(effective) {
		Some("env")
	} else {
		Some("flag")
	}
}
