//! Multiplexed Chrome DevTools Protocol connection.
//!
//! One WebSocket carries commands for the browser target and for every
//! attached page session (flattened mode). Commands are correlated with their
//! replies by id; everything without an id is an event and is fanned out on a
//! broadcast channel together with the session it belongs to.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::{Result, RuntimeError};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const EVENT_CAPACITY: usize = 512;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

/// Event pushed by the browser, tagged with the page session it came from.
#[derive(Debug, Clone)]
pub struct CdpEvent {
	pub method: String,
	pub params: Value,
	pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyError {
	code: i64,
	message: String,
}

type Reply = std::result::Result<Value, ReplyError>;

pub struct CdpConnection {
	next_id: AtomicU64,
	pending: Pending,
	writer: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
	events: broadcast::Sender<CdpEvent>,
	closed: Arc<AtomicBool>,
	reader: JoinHandle<()>,
}

impl CdpConnection {
	/// Opens the browser-level WebSocket at `ws_url`.
	pub async fn connect(ws_url: &str) -> Result<Self> {
		let (stream, _) = tokio_tungstenite::connect_async(ws_url).await.map_err(|e| RuntimeError::Connect {
			url: ws_url.to_string(),
			reason: e.to_string(),
		})?;
		let (writer, reader) = stream.split();

		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let closed = Arc::new(AtomicBool::new(false));
		let (events, _) = broadcast::channel(EVENT_CAPACITY);

		let reader = tokio::spawn(read_loop(reader, Arc::clone(&pending), events.clone(), Arc::clone(&closed)));
		info!(target = "chairside.cdp", url = ws_url, "devtools connection established");

		Ok(Self {
			next_id: AtomicU64::new(1),
			pending,
			writer: tokio::sync::Mutex::new(writer),
			events,
			closed,
			reader,
		})
	}

	/// Sends a browser-level command with the default timeout.
	pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
		self.call_in(None, method, params, DEFAULT_COMMAND_TIMEOUT).await
	}

	/// Sends a command, optionally routed to an attached page session.
	pub async fn call_in(&self, session_id: Option<&str>, method: &str, params: Value, timeout: Duration) -> Result<Value> {
		if self.is_closed() {
			return Err(RuntimeError::Closed);
		}

		let id = self.next_id.fetch_add(1, Ordering::SeqCst);
		let mut message = json!({ "id": id, "method": method, "params": params });
		if let Some(session_id) = session_id {
			message["sessionId"] = Value::String(session_id.to_string());
		}
		let text = serde_json::to_string(&message).map_err(|e| RuntimeError::Protocol(e.to_string()))?;

		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		debug!(target = "chairside.cdp", id, method, session = session_id.unwrap_or("browser"), "send");
		let sent = self.writer.lock().await.send(Message::Text(text.into())).await;
		if let Err(e) = sent {
			self.pending.lock().remove(&id);
			return Err(RuntimeError::Protocol(format!("failed to send {method}: {e}")));
		}

		match tokio::time::timeout(timeout, rx).await {
			Err(_) => {
				self.pending.lock().remove(&id);
				Err(RuntimeError::Timeout {
					method: method.to_string(),
					duration: timeout,
				})
			}
			Ok(Err(_)) => Err(RuntimeError::Closed),
			Ok(Ok(Err(err))) => Err(RuntimeError::Cdp {
				code: err.code,
				message: err.message,
			}),
			Ok(Ok(Ok(value))) => Ok(value),
		}
	}

	/// Subscribes to every event received after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<CdpEvent> {
		self.events.subscribe()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

impl Drop for CdpConnection {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

async fn read_loop(mut reader: SplitStream<WsStream>, pending: Pending, events: broadcast::Sender<CdpEvent>, closed: Arc<AtomicBool>) {
	while let Some(message) = reader.next().await {
		let text = match message {
			Ok(Message::Text(text)) => text.to_string(),
			Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
				Ok(text) => text,
				Err(_) => continue,
			},
			Ok(Message::Close(_)) => {
				info!(target = "chairside.cdp", "devtools connection closed by browser");
				break;
			}
			Ok(_) => continue,
			Err(e) => {
				warn!(target = "chairside.cdp", error = %e, "devtools read failed");
				break;
			}
		};

		let value: Value = match serde_json::from_str(&text) {
			Ok(value) => value,
			Err(e) => {
				warn!(target = "chairside.cdp", error = %e, "unparseable devtools message");
				continue;
			}
		};

		if let Some(id) = value.get("id").and_then(Value::as_u64) {
			let Some(tx) = pending.lock().remove(&id) else {
				debug!(target = "chairside.cdp", id, "reply for unknown command");
				continue;
			};
			let reply = match value.get("error") {
				Some(error) => Err(serde_json::from_value(error.clone()).unwrap_or(ReplyError {
					code: -1,
					message: error.to_string(),
				})),
				None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
			};
			let _ = tx.send(reply);
		} else if let Some(method) = value.get("method").and_then(Value::as_str) {
			let _ = events.send(CdpEvent {
				method: method.to_string(),
				params: value.get("params").cloned().unwrap_or(Value::Null),
				session_id: value.get("sessionId").and_then(Value::as_str).map(str::to_string),
			});
		}
	}

	closed.store(true, Ordering::SeqCst);
	// Dropping the senders wakes every waiter with `Closed`.
	pending.lock().clear();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn reply_error_deserializes_without_data() {
		let err: ReplyError = serde_json::from_str(r#"{"code": -32601, "message": "Method not found"}"#).unwrap();
		assert_eq!(err.code, -32601);
		assert_eq!(err.message, "Method not found");
	}
}
