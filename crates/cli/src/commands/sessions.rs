use lastmile::session::build_board;
use lastmile::{ClientContext, Credentials, HttpClient, SessionAction, SessionCommand as Command, SessionService};
use serde_json::Value;

use crate::cli::SessionCommand;
use crate::context::CommandContext;
use crate::error::Result;

pub async fn run(action: SessionCommand, ctx: &CommandContext) -> Result<Value> {
	let (session_id, action) = match action {
		SessionCommand::List => return list(ctx).await,
		SessionCommand::Create { my_intent_id, their_intent_id } => return create(ctx, my_intent_id, their_intent_id).await,
		SessionCommand::Accept { session_id } => (session_id, SessionAction::Accept),
		SessionCommand::Activate { session_id } => (session_id, SessionAction::Activate),
		SessionCommand::Complete { session_id } => (session_id, SessionAction::Complete),
		SessionCommand::Abort { session_id } => (session_id, SessionAction::Abort),
		SessionCommand::Sos { session_id } => (session_id, SessionAction::Sos),
	};

	let client = ctx.client()?;
	let outcome = transition(&client, Command::new(session_id, action)).await;
	client.shutdown().await;
	outcome
}

/// Listing goes straight to the service; no tracker is attached.
async fn list(ctx: &CommandContext) -> Result<Value> {
	let http = HttpClient::new(&ctx.effective, Credentials::new(ctx.effective.token.clone()))?;
	let sessions = http.list_sessions().await?;
	Ok(serde_json::to_value(build_board(&sessions))?)
}

async fn create(ctx: &CommandContext, my_intent_id: i64, their_intent_id: i64) -> Result<Value> {
	let client = ctx.client()?;
	let outcome = client.console().request_session(my_intent_id, their_intent_id).await;
	client.shutdown().await;
	Ok(serde_json::to_value(outcome?)?)
}

async fn transition(client: &ClientContext, command: Command) -> Result<Value> {
	let session = client.coordinator().dispatch(command).await?;
	Ok(serde_json::to_value(session)?)
}
