use serde_json::{Value, json};

use crate::context::CommandContext;
use crate::error::Result;

pub fn show(ctx: &CommandContext) -> Result<Value> {
	let mut config = ctx.effective.clone();
	let has_token = config.token.take().is_some();
	let ws_base = config.ws_base()?;

	let mut value = serde_json::to_value(&config)?;
	if let Value::Object(map) = &mut value {
		map.insert("token".into(), if has_token { json!("<redacted>") } else { Value::Null });
		map.insert("resolvedWsUrl".into(), json!(ws_base.as_str()));
		map.insert("path".into(), json!(ctx.config_path));
	}
	Ok(value)
}
