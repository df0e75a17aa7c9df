use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::transport::{BoxFuture, Connector, Transport, TransportParts};
use crate::{Error, Result};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// [`Connector`] for `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
	fn connect<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportParts>> {
		Box::pin(async move {
			let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
			let (sink, mut source) = stream.split();
			let (message_tx, message_rx) = mpsc::unbounded_channel();

			let reader = tokio::spawn(async move {
				while let Some(frame) = source.next().await {
					match frame {
						Ok(Message::Text(text)) => {
							if message_tx.send(text.to_string()).is_err() {
								break;
							}
						}
						Ok(Message::Close(frame)) => {
							debug!(target = "lastmile.channel", ?frame, "remote closed websocket");
							break;
						}
						Ok(other) => trace!(target = "lastmile.channel", kind = ?other, "ignoring non-text frame"),
						Err(err) => {
							debug!(target = "lastmile.channel", error = %err, "websocket read failed");
							break;
						}
					}
				}
			});

			Ok(TransportParts {
				sender: Box::new(WebSocketSender { sink, reader }),
				message_rx,
			})
		})
	}
}

struct WebSocketSender {
	sink: WsSink,
	reader: JoinHandle<()>,
}

impl Transport for WebSocketSender {
	fn send(&mut self, text: String) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { self.sink.send(Message::text(text)).await.map_err(Error::from) })
	}

	fn close(&mut self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			match self.sink.close().await {
				Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
				Err(err) => Err(err.into()),
			}
		})
	}
}

impl Drop for WebSocketSender {
	fn drop(&mut self) {
		self.reader.abort();
	}
}
