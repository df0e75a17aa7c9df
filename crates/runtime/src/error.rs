use thiserror::Error;

/// Errors raised by push channel transports.
#[derive(Debug, Error)]
pub enum Error {
	#[error("WebSocket error: {0}")]
	WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

	#[error("Failed to serialize frame: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Connection refused: {0}")]
	ConnectFailed(String),

	#[error("Channel is not open")]
	NotOpen,

	#[error("Connection closed")]
	ConnectionClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::WebSocket(Box::new(err))
	}
}

pub type Result<T> = std::result::Result<T, Error>;
