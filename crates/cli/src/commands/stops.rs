use std::path::PathBuf;

use lastmile::geo;
use lastmile::protocol::StopCandidate;
use serde_json::{Value, json};
use tracing::debug;

use crate::context::CommandContext;
use crate::error::{CliError, Result};

pub async fn run(file: Option<PathBuf>, min_separation: Option<f64>, ctx: &CommandContext) -> Result<Value> {
	let separation = min_separation.unwrap_or(ctx.effective.stop_separation_meters);
	if !separation.is_finite() || separation < 0.0 {
		return Err(CliError::InvalidInput(format!("min separation must be a non-negative distance, got {separation}")));
	}

	match file {
		Some(path) => {
			let content = std::fs::read_to_string(&path)?;
			let candidates: Vec<StopCandidate> = serde_json::from_str(&content)?;
			let kept = geo::reduce(&candidates, separation);
			debug!(target = "lastmile", candidates = candidates.len(), kept = kept.len(), "stops thinned");
			Ok(json!({ "candidates": candidates.len(), "stops": kept }))
		}
		None => {
			let mut config = ctx.effective.clone();
			config.stop_separation_meters = separation;
			let client = ctx.one_shot(config)?;
			let outcome = client.console().stops().await;
			client.shutdown().await;
			Ok(json!({ "stops": outcome? }))
		}
	}
}
