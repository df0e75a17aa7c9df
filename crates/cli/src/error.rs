use thiserror::Error;

use crate::output::ErrorCode;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Client(#[from] lastmile::Error),

	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("No configuration directory available; pass --config")]
	NoConfigPath,

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl CliError {
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::Client(err) => match err {
				lastmile::Error::Unauthorized => ErrorCode::AuthError,
				lastmile::Error::Request { .. } => ErrorCode::RequestFailed,
				lastmile::Error::Transition(_) | lastmile::Error::UnknownSession(_) => ErrorCode::TransitionRejected,
				lastmile::Error::Http(_) | lastmile::Error::Channel(_) => ErrorCode::NetworkError,
				lastmile::Error::Config(_) | lastmile::Error::Url(_) => ErrorCode::ConfigError,
				lastmile::Error::Io(_) => ErrorCode::IoError,
				_ => ErrorCode::InternalError,
			},
			CliError::InvalidInput(_) => ErrorCode::InvalidInput,
			CliError::NoConfigPath => ErrorCode::ConfigError,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) | CliError::Anyhow(_) => ErrorCode::InternalError,
		}
	}
}

pub type Result<T> = std::result::Result<T, CliError>;
