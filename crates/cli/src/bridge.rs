use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::{Map, Value};
use tabwire_protocol::{BridgeMessage, ToolName};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::error::DispatchError;
use crate::router::ToolDispatcher;

/// Reference deadline for a bridged tool call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

type PendingSender = oneshot::Sender<Result<Value, DispatchError>>;

struct Extension {
	conn_id: u64,
	tx: mpsc::UnboundedSender<Message>,
}

struct BridgeState {
	/// The authoritative extension connection, if any.
	extension: Option<Extension>,
	/// In-flight calls keyed by correlation id. Each entry settles exactly
	/// once: matching reply, timeout, or shutdown, whichever comes first.
	pending: HashMap<String, PendingSender>,
	next_conn_id: u64,
	closed: bool,
}

/// Owns the single WebSocket to the browser extension and correlates
/// outbound `tool_call` frames with inbound `tool_result` frames.
///
/// At most one connection is current at a time; a newly upgraded socket
/// replaces the previous one without closing it. Calls issued against a
/// superseded connection are left to their timeout rather than failed
/// eagerly, since a late result may still arrive on the old socket.
#[derive(Clone)]
pub struct ExtensionBridge {
	state: Arc<Mutex<BridgeState>>,
	call_timeout: Duration,
}

impl ExtensionBridge {
	pub fn new(call_timeout: Duration) -> Self {
		Self {
			state: Arc::new(Mutex::new(BridgeState {
				extension: None,
				pending: HashMap::new(),
				next_conn_id: 0,
				closed: false,
			})),
			call_timeout,
		}
	}

	pub async fn is_connected(&self) -> bool {
		self.state.lock().await.extension.is_some()
	}

	/// Number of in-flight calls. Timeouts bound its growth.
	pub async fn pending_calls(&self) -> usize {
		self.state.lock().await.pending.len()
	}

	/// Drives one upgraded extension socket until it closes.
	///
	/// The newest socket always becomes current. On close, the current slot
	/// is only cleared if this socket still holds it.
	pub async fn handle_socket(&self, socket: WebSocket) {
		let (tx, rx) = mpsc::unbounded_channel();
		let conn_id = {
			let mut st = self.state.lock().await;
			if st.closed {
				return;
			}
			st.next_conn_id += 1;
			if st.extension.is_some() {
				warn!(target = "tabwire", "replacing existing extension connection");
			}
			st.extension = Some(Extension { conn_id: st.next_conn_id, tx });
			st.next_conn_id
		};
		info!(target = "tabwire", conn = conn_id, "extension connected");

		let mut rx_stream = UnboundedReceiverStream::new(rx);
		let (mut ws_tx, mut ws_rx) = socket.split();

		let send_task = tokio::spawn(async move {
			while let Some(msg) = rx_stream.next().await {
				if ws_tx.send(msg).await.is_err() {
					break;
				}
			}
		});

		while let Some(msg) = ws_rx.next().await {
			match msg {
				Ok(Message::Text(text)) => self.handle_frame(text.as_str()).await,
				Ok(Message::Close(_)) => break,
				Ok(_) => {}
				Err(err) => {
					warn!(target = "tabwire", conn = conn_id, error = %err, "extension websocket error");
					break;
				}
			}
		}

		{
			let mut st = self.state.lock().await;
			if st
				.extension
				.as_ref()
				.is_some_and(|ext| ext.conn_id == conn_id)
			{
				st.extension = None;
			}
			// Pending calls are left to time out rather than failed here: the
			// extension may be reconnecting, and their replies can still land.
		}

		send_task.abort();
		info!(target = "tabwire", conn = conn_id, "extension disconnected");
	}

	/// Decodes one inbound frame defensively. Anything that is not a
	/// `tool_result` matching a pending call is dropped without escalation;
	/// late and duplicate replies are expected under timeout races.
	async fn handle_frame(&self, raw: &str) {
		let message = match serde_json::from_str::<BridgeMessage>(raw) {
			Ok(message) => message,
			Err(err) => {
				debug!(target = "tabwire", error = %err, "discarding unparseable bridge frame");
				return;
			}
		};

		let BridgeMessage::ToolResult { id, ok, result, error } = message else {
			return;
		};

		let sender = self.state.lock().await.pending.remove(&id);
		let Some(sender) = sender else {
			debug!(target = "tabwire", id = %id, "discarding reply with no pending call");
			return;
		};

		let outcome = if ok {
			Ok(result.unwrap_or(Value::Null))
		} else {
			Err(DispatchError::Tool(
				error.unwrap_or_else(|| "Tool call failed".to_string()),
			))
		};

		// The caller may have already timed out and dropped its receiver.
		let _ = sender.send(outcome);
	}

	/// Forwards one tool call and waits for its correlated reply.
	///
	/// Fails immediately when no extension is connected; calls are never
	/// queued across reconnects, because a reconnect means the remote
	/// execution context changed under the caller.
	pub async fn dispatch(
		&self,
		name: ToolName,
		args: Map<String, Value>,
	) -> Result<Value, DispatchError> {
		let id = correlation_id();
		let (resp_tx, resp_rx) = oneshot::channel();

		let tx = {
			let mut st = self.state.lock().await;
			if st.closed {
				return Err(DispatchError::ShuttingDown);
			}
			let tx = st
				.extension
				.as_ref()
				.map(|ext| ext.tx.clone())
				.ok_or(DispatchError::NotConnected)?;
			let previous = st.pending.insert(id.clone(), resp_tx);
			assert!(previous.is_none(), "correlation id collision: {id}");
			tx
		};

		let frame = BridgeMessage::ToolCall { id: id.clone(), name, args };
		let payload = match serde_json::to_string(&frame) {
			Ok(payload) => payload,
			Err(err) => {
				self.state.lock().await.pending.remove(&id);
				warn!(target = "tabwire", error = %err, "failed to serialize tool call");
				return Err(DispatchError::SendFailed);
			}
		};

		if tx.send(Message::Text(payload.into())).is_err() {
			self.state.lock().await.pending.remove(&id);
			return Err(DispatchError::SendFailed);
		}

		match tokio::time::timeout(self.call_timeout, resp_rx).await {
			Ok(Ok(outcome)) => outcome,
			// Sender dropped without a reply (bridge state torn down).
			Ok(Err(_)) => Err(DispatchError::Closed),
			Err(_) => {
				self.state.lock().await.pending.remove(&id);
				debug!(target = "tabwire", id = %id, tool = %name, "bridged call timed out");
				Err(DispatchError::Timeout)
			}
		}
	}

	/// Rejects every in-flight call and stops accepting new sockets.
	///
	/// Safe to run concurrently with calls resolving: an entry whose caller
	/// already completed is a no-op here.
	pub async fn close(&self) {
		let drained: Vec<PendingSender> = {
			let mut st = self.state.lock().await;
			st.closed = true;
			st.extension = None;
			st.pending.drain().map(|(_, sender)| sender).collect()
		};
		for sender in drained {
			let _ = sender.send(Err(DispatchError::ShuttingDown));
		}
	}
}

impl Default for ExtensionBridge {
	fn default() -> Self {
		Self::new(DEFAULT_CALL_TIMEOUT)
	}
}

#[async_trait]
impl ToolDispatcher for ExtensionBridge {
	async fn dispatch(
		&self,
		name: ToolName,
		args: Map<String, Value>,
	) -> Result<Value, DispatchError> {
		ExtensionBridge::dispatch(self, name, args).await
	}
}

/// Unique for the process lifetime: unix millis plus a random suffix.
fn correlation_id() -> String {
	let millis = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_millis();
	let suffix: String = rand::thread_rng()
		.sample_iter(&Alphanumeric)
		.take(10)
		.map(char::from)
		.collect();
	format!("{millis}_{suffix}")
}
