//! Wire types shared by the tabwire control plane and the extension bridge.
//!
//! Two surfaces live here: the JSON-RPC envelopes exchanged with control
//! clients over HTTP, and the correlated `tool_call`/`tool_result` frames
//! exchanged with the browser extension over the bridge WebSocket.


use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// JSON-RPC error codes used by the server. Stable across versions.
pub mod error_codes {
	pub const PARSE_ERROR: i64 = -32700;
	pub const INVALID_REQUEST: i64 = -32600;
	pub const METHOD_NOT_FOUND: i64 = -32601;
	pub const INVALID_PARAMS: i64 = -32602;
	/// A sessionId did not resolve to an attached tab/frame.
	pub const SESSION_NOT_FOUND: i64 = -32001;
	/// The bridged tool call failed (not connected, timed out, or the
	/// extension reported an error).
	pub const DISPATCH_FAILED: i64 = -32005;
}

/// Enumerated catalog of remote tools the extension executes.
///
/// Wire names are dotted (`page.query`). Unknown names fail to
/// deserialize; the router reports those as invalid params rather than
/// forwarding arbitrary strings to the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
	#[serde(rename = "tabs.list")]
	TabsList,
	#[serde(rename = "session.attach")]
	SessionAttach,
	#[serde(rename = "session.detach")]
	SessionDetach,
	#[serde(rename = "page.snapshot_dom")]
	PageSnapshotDom,
	#[serde(rename = "page.query")]
	PageQuery,
	#[serde(rename = "element.click")]
	ElementClick,
	#[serde(rename = "element.type")]
	ElementType,
	#[serde(rename = "element.keypress")]
	ElementKeypress,
	#[serde(rename = "page.scroll")]
	PageScroll,
	#[serde(rename = "page.screenshot")]
	PageScreenshot,
	#[serde(rename = "page.get_html")]
	PageGetHtml,
	#[serde(rename = "page.wait_for")]
	PageWaitFor,
}

impl ToolName {
	pub const ALL: [ToolName; 12] = [
		ToolName::TabsList,
		ToolName::SessionAttach,
		ToolName::SessionDetach,
		ToolName::PageSnapshotDom,
		ToolName::PageQuery,
		ToolName::ElementClick,
		ToolName::ElementType,
		ToolName::ElementKeypress,
		ToolName::PageScroll,
		ToolName::PageScreenshot,
		ToolName::PageGetHtml,
		ToolName::PageWaitFor,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			ToolName::TabsList => "tabs.list",
			ToolName::SessionAttach => "session.attach",
			ToolName::SessionDetach => "session.detach",
			ToolName::PageSnapshotDom => "page.snapshot_dom",
			ToolName::PageQuery => "page.query",
			ToolName::ElementClick => "element.click",
			ToolName::ElementType => "element.type",
			ToolName::ElementKeypress => "element.keypress",
			ToolName::PageScroll => "page.scroll",
			ToolName::PageScreenshot => "page.screenshot",
			ToolName::PageGetHtml => "page.get_html",
			ToolName::PageWaitFor => "page.wait_for",
		}
	}

	/// Whether `tools/call` must resolve a sessionId into tab/frame
	/// addresses before forwarding. The session lifecycle tools are handled
	/// locally and `tabs.list` is a global listing, not scoped to a page.
	pub fn needs_session(&self) -> bool {
		!matches!(
			self,
			ToolName::TabsList | ToolName::SessionAttach | ToolName::SessionDetach
		)
	}

	pub fn description(&self) -> &'static str {
		match self {
			ToolName::TabsList => "List open browser tabs",
			ToolName::SessionAttach => "Attach to a tab/frame and return a session id",
			ToolName::SessionDetach => "Detach a previously attached session",
			ToolName::PageSnapshotDom => "Capture a structured snapshot of the page DOM",
			ToolName::PageQuery => "Query elements on the page by CSS selector",
			ToolName::ElementClick => "Click the element matching a selector",
			ToolName::ElementType => "Type text into the element matching a selector",
			ToolName::ElementKeypress => "Send a key press to the element matching a selector",
			ToolName::PageScroll => "Scroll the page or an element into view",
			ToolName::PageScreenshot => "Capture a screenshot of the visible tab",
			ToolName::PageGetHtml => "Return the page's outer HTML",
			ToolName::PageWaitFor => "Wait for a selector to appear on the page",
		}
	}
}

impl fmt::Display for ToolName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ToolName {
	type Err = UnknownTool;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		ToolName::ALL
			.iter()
			.copied()
			.find(|name| name.as_str() == s)
			.ok_or_else(|| UnknownTool(s.to_string()))
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTool(pub String);

impl fmt::Display for UnknownTool {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "unknown tool: {}", self.0)
	}
}

impl std::error::Error for UnknownTool {}

/// Catalog entry returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
	pub name: ToolName,
	pub description: String,
}

pub fn tool_descriptors() -> Vec<ToolDescriptor> {
	ToolName::ALL
		.iter()
		.map(|name| ToolDescriptor {
			name: *name,
			description: name.description().to_string(),
		})
		.collect()
}

/// JSON-RPC request id: string, number, or explicit null.
///
/// A request with no `id` key at all is an invalid envelope; `Null` only
/// represents a literal `"id": null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
	Number(i64),
	String(String),
	Null,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
	pub jsonrpc: String,
	pub id: RequestId,
	pub method: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub params: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

/// Exactly one success or error envelope per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse {
	Success {
		jsonrpc: String,
		id: RequestId,
		result: Value,
	},
	Error {
		jsonrpc: String,
		id: RequestId,
		error: RpcError,
	},
}

impl JsonRpcResponse {
	pub fn success(id: RequestId, result: Value) -> Self {
		JsonRpcResponse::Success {
			jsonrpc: "2.0".to_string(),
			id,
			result,
		}
	}

	pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
		JsonRpcResponse::Error {
			jsonrpc: "2.0".to_string(),
			id,
			error: RpcError {
				code,
				message: message.into(),
				data: None,
			},
		}
	}

	pub fn is_error(&self) -> bool {
		matches!(self, JsonRpcResponse::Error { .. })
	}
}

/// Tab/frame addressing pair a session resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
	pub tab_id: i64,
	pub frame_id: i64,
}

/// Correlated frames on the extension bridge WebSocket.
///
/// `tool_call` flows server → extension, `tool_result` flows back. The
/// bridge drops anything that does not decode into this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
	ToolCall {
		id: String,
		name: ToolName,
		args: Map<String, Value>,
	},
	ToolResult {
		id: String,
		ok: bool,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		result: Option<Value>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		error: Option<String>,
	},
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
	pub name: String,
	pub version: String,
	pub protocol_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
	pub tools: Vec<ToolDescriptor>,
}
