//! DevTools websocket to the selected tab.
//!
//! A [`CdpConnection`] wraps the write half of the socket. The read half is
//! drained by a background task that only logs replies; when it sees the
//! socket close it marks the connection dead, and the next
//! [`send`](Connection::send) reports the loss. Nothing in here retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use ytctl_protocol::{CdpMessage, EvaluateRequest};

use crate::discovery::TabDescriptor;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ConnectError {
	#[error("websocket connect timed out after {}s", .0.as_secs_f32())]
	Timeout(Duration),

	#[error("websocket connect failed: {reason}")]
	Refused { reason: String },
}

#[derive(Debug, Error)]
pub enum SendError {
	#[error("connection closed by the browser")]
	Closed,

	#[error("websocket write failed: {0}")]
	Io(String),

	#[error("failed to serialize evaluate request: {0}")]
	Encode(#[from] serde_json::Error),
}

/// A live duplex channel to the tab.
#[async_trait]
pub trait Connection: Send {
	/// Sends one `Runtime.evaluate` request. Does not wait for the reply.
	async fn send(&mut self, expression: &str) -> Result<(), SendError>;

	async fn close(self);
}

/// Opens [`Connection`]s.
#[async_trait]
pub trait Connector: Send + Sync {
	type Handle: Connection + 'static;

	async fn connect(&self, tab: &TabDescriptor) -> Result<Self::Handle, ConnectError>;
}

#[derive(Debug, Clone)]
pub struct CdpConnector {
	connect_timeout: Duration,
}

impl CdpConnector {
	pub fn new(connect_timeout: Duration) -> Self {
		Self { connect_timeout }
	}
}

#[async_trait]
impl Connector for CdpConnector {
	type Handle = CdpConnection;

	async fn connect(&self, tab: &TabDescriptor) -> Result<CdpConnection, ConnectError> {
		let endpoint = tab.debug_endpoint.as_str();
		let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(endpoint))
			.await
			.map_err(|_| ConnectError::Timeout(self.connect_timeout))?
			.map_err(|e| ConnectError::Refused { reason: e.to_string() })?;

		debug!(target = "ytctl.cdp", endpoint, "websocket open");
		Ok(CdpConnection::new(stream, endpoint.to_string()))
	}
}

pub struct CdpConnection {
	sink: SplitSink<WsStream, Message>,
	alive: Arc<AtomicBool>,
	reader: JoinHandle<()>,
	endpoint: String,
}

impl CdpConnection {
	fn new(stream: WsStream, endpoint: String) -> Self {
		let (sink, stream) = stream.split();
		let alive = Arc::new(AtomicBool::new(true));
		let reader = tokio::spawn(drain_replies(stream, Arc::clone(&alive), endpoint.clone()));
		Self {
			sink,
			alive,
			reader,
			endpoint,
		}
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	pub fn is_alive(&self) -> bool {
		self.alive.load(Ordering::Acquire)
	}
}

#[async_trait]
impl Connection for CdpConnection {
	async fn send(&mut self, expression: &str) -> Result<(), SendError> {
		if !self.is_alive() {
			return Err(SendError::Closed);
		}

		let payload = serde_json::to_string(&EvaluateRequest::new(expression))?;
		if let Err(err) = self.sink.send(Message::Text(payload)).await {
			self.alive.store(false, Ordering::Release);
			return Err(SendError::Io(err.to_string()));
		}
		Ok(())
	}

	async fn close(mut self) {
		self.alive.store(false, Ordering::Release);
		if let Err(err) = self.sink.close().await {
			debug!(target = "ytctl.cdp", endpoint = %self.endpoint, error = %err, "close handshake failed");
		}
	}
}

impl Drop for CdpConnection {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

/// Reads replies until the socket goes away. Replies only feed telemetry.
async fn drain_replies(mut stream: SplitStream<WsStream>, alive: Arc<AtomicBool>, endpoint: String) {
	while let Some(frame) = stream.next().await {
		match frame {
			Ok(Message::Text(text)) => log_reply(&text),
			Ok(Message::Close(frame)) => {
				debug!(target = "ytctl.cdp", endpoint = %endpoint, ?frame, "browser closed the websocket");
				break;
			}
			Ok(_) => {}
			Err(err) => {
				warn!(target = "ytctl.cdp", endpoint = %endpoint, error = %err, "websocket read failed");
				break;
			}
		}
	}
	alive.store(false, Ordering::Release);
}

fn log_reply(text: &str) {
	match serde_json::from_str::<CdpMessage>(text) {
		Ok(CdpMessage::Reply(reply)) => {
			if let Some(error) = reply.error {
				warn!(target = "ytctl.cdp", code = error.code, message = %error.message, "evaluate rejected");
			} else if let Some(details) = reply.result.as_ref().and_then(|r| r.exception_details.as_ref()) {
				warn!(
					target = "ytctl.cdp",
					line = details.line_number,
					column = details.column_number,
					exception = %details.message(),
					"command script threw"
				);
			} else {
				let kind = reply
					.result
					.as_ref()
					.and_then(|r| r.result.as_ref())
					.map(|o| o.kind.as_str())
					.unwrap_or("none");
				debug!(target = "ytctl.cdp", id = reply.id, result = kind, "evaluate reply");
			}
		}
		Ok(CdpMessage::Event(event)) => {
			debug!(target = "ytctl.cdp", method = %event.method, "event");
		}
		Ok(CdpMessage::Unknown(_)) | Err(_) => {
			debug!(target = "ytctl.cdp", len = text.len(), "unrecognized frame");
		}
	}
}
