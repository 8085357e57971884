#[cfg(test)]
mod tests;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tabwire_protocol::{
	InitializeResult, JsonRpcRequest, JsonRpcResponse, PROTOCOL_VERSION, RequestId, SessionRef,
	ToolName, ToolsListResult, error_codes, tool_descriptors,
};
use tracing::debug;

use crate::error::DispatchError;
use crate::sessions::SessionRegistry;

pub const SERVER_NAME: &str = "tabwire";

/// Forwarding capability the router delegates bridged tools to.
///
/// The extension bridge is the production implementation; tests substitute
/// their own.
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
	async fn dispatch(
		&self,
		name: ToolName,
		args: Map<String, Value>,
	) -> Result<Value, DispatchError>;
}

pub struct RouterState {
	pub sessions: SessionRegistry,
	pub dispatcher: Arc<dyn ToolDispatcher>,
}

impl RouterState {
	pub fn new(dispatcher: Arc<dyn ToolDispatcher>) -> Self {
		Self {
			sessions: SessionRegistry::new(),
			dispatcher,
		}
	}
}

/// Validates the JSON-RPC envelope. `None` means the caller must answer
/// with an invalid-request error carrying a null id.
pub fn decode_envelope(payload: Value) -> Option<JsonRpcRequest> {
	let request: JsonRpcRequest = serde_json::from_value(payload).ok()?;
	(request.jsonrpc == "2.0").then_some(request)
}

/// Handles one validated request. Every path produces exactly one response
/// with the request's id; nothing here terminates the server.
pub async fn handle_rpc(request: JsonRpcRequest, state: &RouterState) -> JsonRpcResponse {
	let JsonRpcRequest { id, method, params, .. } = request;

	match method.as_str() {
		"initialize" => JsonRpcResponse::success(id, json!(initialize_result())),
		"tools/list" => JsonRpcResponse::success(
			id,
			json!(ToolsListResult { tools: tool_descriptors() }),
		),
		"tools/call" => handle_tools_call(id, params, state).await,
		other => {
			debug!(target = "tabwire", method = other, "method not found");
			JsonRpcResponse::error(id, error_codes::METHOD_NOT_FOUND, "Method not found")
		}
	}
}

fn initialize_result() -> InitializeResult {
	InitializeResult {
		name: SERVER_NAME.to_string(),
		version: env!("CARGO_PKG_VERSION").to_string(),
		protocol_version: PROTOCOL_VERSION.to_string(),
	}
}

async fn handle_tools_call(
	id: RequestId,
	params: Option<Value>,
	state: &RouterState,
) -> JsonRpcResponse {
	let Some(params) = params.as_ref().and_then(Value::as_object) else {
		return invalid_params(id);
	};

	// Unknown tool names are rejected here, never forwarded.
	let Some(name) = params
		.get("name")
		.and_then(Value::as_str)
		.and_then(|raw| raw.parse::<ToolName>().ok())
	else {
		return invalid_params(id);
	};

	let Some(mut args) = params.get("arguments").and_then(Value::as_object).cloned() else {
		return invalid_params(id);
	};

	match name {
		ToolName::SessionAttach => {
			let Some(session) = parse_attach_arguments(&args) else {
				return invalid_params(id);
			};
			let session_id = state.sessions.attach(session.tab_id, session.frame_id);
			JsonRpcResponse::success(
				id,
				json!({
					"sessionId": session_id,
					"tabId": session.tab_id,
					"frameId": session.frame_id,
				}),
			)
		}
		ToolName::SessionDetach => {
			let Some(session_id) = read_session_argument(&args) else {
				return invalid_params(id);
			};
			let ok = state.sessions.detach(session_id);
			JsonRpcResponse::success(id, json!({ "ok": ok }))
		}
		name => {
			if name.needs_session() {
				let Some(session_id) = read_session_argument(&args) else {
					return JsonRpcResponse::error(
						id,
						error_codes::INVALID_PARAMS,
						"sessionId is required",
					);
				};
				let Some(session) = state.sessions.resolve(session_id) else {
					return JsonRpcResponse::error(
						id,
						error_codes::SESSION_NOT_FOUND,
						"Session not found",
					);
				};
				// Overwrite the low-level addresses; callers never supply
				// them directly.
				args.insert("tabId".to_string(), json!(session.tab_id));
				args.insert("frameId".to_string(), json!(session.frame_id));
			}

			match state.dispatcher.dispatch(name, args).await {
				Ok(result) => JsonRpcResponse::success(id, result),
				Err(err) => JsonRpcResponse::error(
					id,
					error_codes::DISPATCH_FAILED,
					err.to_string(),
				),
			}
		}
	}
}

fn invalid_params(id: RequestId) -> JsonRpcResponse {
	JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, "Invalid params")
}

fn read_session_argument(args: &Map<String, Value>) -> Option<&str> {
	args.get("sessionId")
		.and_then(Value::as_str)
		.filter(|session_id| !session_id.is_empty())
}

/// tabId must be an integer; frameId defaults to 0 when missing or null.
fn parse_attach_arguments(args: &Map<String, Value>) -> Option<SessionRef> {
	let tab_id = args.get("tabId").and_then(Value::as_i64)?;
	let frame_id = match args.get("frameId") {
		None | Some(Value::Null) => 0,
		Some(value) => value.as_i64()?,
	};
	Some(SessionRef { tab_id, frame_id })
}
