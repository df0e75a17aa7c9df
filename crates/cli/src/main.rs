use std::process::ExitCode;

use clap::Parser;
use lastmile_cli::{cli::Cli, commands, logging};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	match commands::dispatch(cli).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			error!(target = "lastmile", error = %err, "command failed");
			ExitCode::FAILURE
		}
	}
}
