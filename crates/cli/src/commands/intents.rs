use lastmile::ClientContext;
use serde_json::{Value, json};

use crate::cli::IntentAction;
use crate::context::CommandContext;
use crate::error::Result;

pub async fn run(action: IntentAction, ctx: &CommandContext) -> Result<Value> {
	let client = ctx.client()?;
	let outcome = apply(action, &client).await;
	client.shutdown().await;
	outcome
}

async fn apply(action: IntentAction, client: &ClientContext) -> Result<Value> {
	let console = client.console();
	match action {
		IntentAction::List => Ok(serde_json::to_value(console.refresh_intents().await?)?),
		IntentAction::Create { origin, dest, expires_in } => {
			let intent = console.create_intent(origin, dest, expires_in).await?;
			Ok(serde_json::to_value(intent)?)
		}
		IntentAction::Delete { intent_id } => {
			console.delete_intent(intent_id).await?;
			Ok(json!({ "deleted": intent_id }))
		}
	}
}

pub async fn matches(intent_id: i64, ctx: &CommandContext) -> Result<Value> {
	let client = ctx.client()?;
	let outcome = client.console().matches(intent_id).await;
	client.shutdown().await;
	Ok(serde_json::to_value(outcome?)?)
}
