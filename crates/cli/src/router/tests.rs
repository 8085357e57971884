use std::sync::Mutex;

use serde_json::json;

use super::*;

/// Records every forwarded call and echoes the received arguments back as
/// the result, which makes argument injection directly observable.
#[derive(Default)]
struct MockDispatcher {
	calls: Mutex<Vec<(ToolName, Map<String, Value>)>>,
	fail_with: Option<String>,
}

#[async_trait]
impl ToolDispatcher for MockDispatcher {
	async fn dispatch(
		&self,
		name: ToolName,
		args: Map<String, Value>,
	) -> Result<Value, DispatchError> {
		self.calls
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
			.push((name, args.clone()));
		match &self.fail_with {
			Some(message) => Err(DispatchError::Tool(message.clone())),
			None => Ok(Value::Object(args)),
		}
	}
}

fn state_with(dispatcher: MockDispatcher) -> (RouterState, Arc<MockDispatcher>) {
	let dispatcher = Arc::new(dispatcher);
	(RouterState::new(dispatcher.clone()), dispatcher)
}

fn echo_state() -> (RouterState, Arc<MockDispatcher>) {
	state_with(MockDispatcher::default())
}

async fn call(state: &RouterState, payload: Value) -> JsonRpcResponse {
	let request = decode_envelope(payload).expect("test envelope must be valid");
	handle_rpc(request, state).await
}

fn tools_call(id: &str, name: &str, arguments: Value) -> Value {
	json!({
		"jsonrpc": "2.0",
		"id": id,
		"method": "tools/call",
		"params": { "name": name, "arguments": arguments },
	})
}

fn error_code(response: &JsonRpcResponse) -> i64 {
	match response {
		JsonRpcResponse::Error { error, .. } => error.code,
		JsonRpcResponse::Success { .. } => panic!("expected error response"),
	}
}

fn result(response: &JsonRpcResponse) -> &Value {
	match response {
		JsonRpcResponse::Success { result, .. } => result,
		JsonRpcResponse::Error { error, .. } => panic!("expected success, got {error:?}"),
	}
}

#[test]
fn envelope_requires_protocol_tag_id_and_method() {
	assert!(decode_envelope(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})).is_some());
	assert!(decode_envelope(json!({"jsonrpc": "2.0", "id": null, "method": "x"})).is_some());

	// Wrong tag, missing id, missing method, non-string method, bad id type.
	assert!(decode_envelope(json!({"jsonrpc": "1.0", "id": 1, "method": "x"})).is_none());
	assert!(decode_envelope(json!({"jsonrpc": "2.0", "method": "x"})).is_none());
	assert!(decode_envelope(json!({"jsonrpc": "2.0", "id": 1})).is_none());
	assert!(decode_envelope(json!({"jsonrpc": "2.0", "id": 1, "method": 5})).is_none());
	assert!(decode_envelope(json!({"jsonrpc": "2.0", "id": true, "method": "x"})).is_none());
	assert!(decode_envelope(json!([1, 2, 3])).is_none());
}

#[tokio::test]
async fn initialize_reports_server_identity() {
	let (state, _) = echo_state();
	let response = call(
		&state,
		json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
	)
	.await;

	let result = result(&response);
	assert_eq!(result["name"], json!(SERVER_NAME));
	assert_eq!(result["protocolVersion"], json!(PROTOCOL_VERSION));
	assert_eq!(result["version"], json!(env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn tools_list_enumerates_the_catalog() {
	let (state, _) = echo_state();
	let response = call(
		&state,
		json!({"jsonrpc": "2.0", "id": "l", "method": "tools/list"}),
	)
	.await;

	let tools = result(&response)["tools"].as_array().unwrap().clone();
	assert_eq!(tools.len(), ToolName::ALL.len());
	assert!(tools.iter().any(|tool| tool["name"] == json!("element.click")));
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
	let (state, _) = echo_state();
	let response = call(
		&state,
		json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}),
	)
	.await;
	assert_eq!(error_code(&response), error_codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn unknown_tool_is_invalid_params_not_a_dispatch() {
	let (state, dispatcher) = echo_state();
	let response = call(&state, tools_call("t", "browser.launch", json!({}))).await;

	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);
	assert!(dispatcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_or_malformed_arguments_are_invalid_params() {
	let (state, _) = echo_state();

	let response = call(
		&state,
		json!({
			"jsonrpc": "2.0",
			"id": "a",
			"method": "tools/call",
			"params": { "name": "page.query" },
		}),
	)
	.await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);

	let response = call(&state, tools_call("b", "page.query", json!("nope"))).await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);

	let response = call(
		&state,
		json!({"jsonrpc": "2.0", "id": "c", "method": "tools/call", "params": null}),
	)
	.await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn attach_requires_an_integer_tab_id() {
	let (state, _) = echo_state();

	let response = call(&state, tools_call("a1", "session.attach", json!({}))).await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);

	let response =
		call(&state, tools_call("a2", "session.attach", json!({"tabId": "7"}))).await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);

	let response =
		call(&state, tools_call("a3", "session.attach", json!({"tabId": 7.5}))).await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);

	let response = call(
		&state,
		tools_call("a4", "session.attach", json!({"tabId": 7, "frameId": "x"})),
	)
	.await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn attach_defaults_frame_to_zero_and_returns_the_mapping() {
	let (state, _) = echo_state();
	let response = call(&state, tools_call("a", "session.attach", json!({"tabId": 7}))).await;

	let result = result(&response);
	assert_eq!(result["tabId"], json!(7));
	assert_eq!(result["frameId"], json!(0));

	let session_id = result["sessionId"].as_str().unwrap();
	assert_eq!(
		state.sessions.resolve(session_id),
		Some(SessionRef { tab_id: 7, frame_id: 0 })
	);
}

#[tokio::test]
async fn detach_reports_whether_the_session_existed() {
	let (state, _) = echo_state();
	let session_id = state.sessions.attach(4, 1);

	let response = call(
		&state,
		tools_call("d1", "session.detach", json!({"sessionId": session_id})),
	)
	.await;
	assert_eq!(result(&response), &json!({"ok": true}));

	let response = call(
		&state,
		tools_call("d2", "session.detach", json!({"sessionId": session_id})),
	)
	.await;
	assert_eq!(result(&response), &json!({"ok": false}));

	let response = call(&state, tools_call("d3", "session.detach", json!({}))).await;
	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn tab_scoped_tools_require_a_session_id() {
	let (state, dispatcher) = echo_state();
	let response = call(
		&state,
		tools_call("q", "page.query", json!({"selector": "button"})),
	)
	.await;

	assert_eq!(error_code(&response), error_codes::INVALID_PARAMS);
	match &response {
		JsonRpcResponse::Error { error, .. } => {
			assert_eq!(error.message, "sessionId is required");
		}
		_ => unreachable!(),
	}
	assert!(dispatcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unresolved_session_is_a_distinct_error() {
	let (state, dispatcher) = echo_state();
	let response = call(
		&state,
		tools_call("q", "page.query", json!({"sessionId": "s_missing", "selector": "a"})),
	)
	.await;

	assert_eq!(error_code(&response), error_codes::SESSION_NOT_FOUND);
	assert!(dispatcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn session_addresses_are_injected_into_forwarded_arguments() {
	let (state, dispatcher) = echo_state();
	let session_id = state.sessions.attach(7, 0);

	let response = call(
		&state,
		tools_call(
			"q",
			"element.click",
			json!({"sessionId": session_id, "selector": "button"}),
		),
	)
	.await;

	let forwarded = result(&response);
	assert_eq!(forwarded["selector"], json!("button"));
	assert_eq!(forwarded["tabId"], json!(7));
	assert_eq!(forwarded["frameId"], json!(0));

	let calls = dispatcher.calls.lock().unwrap();
	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].0, ToolName::ElementClick);
}

#[tokio::test]
async fn injected_addresses_overwrite_caller_supplied_ones() {
	let (state, _) = echo_state();
	let session_id = state.sessions.attach(7, 2);

	let response = call(
		&state,
		tools_call(
			"q",
			"page.get_html",
			json!({"sessionId": session_id, "tabId": 999, "frameId": 999}),
		),
	)
	.await;

	let forwarded = result(&response);
	assert_eq!(forwarded["tabId"], json!(7));
	assert_eq!(forwarded["frameId"], json!(2));
}

#[tokio::test]
async fn tabs_list_is_exempt_from_session_resolution() {
	let (state, dispatcher) = echo_state();
	let response = call(&state, tools_call("t", "tabs.list", json!({}))).await;

	assert!(!response.is_error());
	let calls = dispatcher.calls.lock().unwrap();
	assert_eq!(calls.len(), 1);
	assert_eq!(calls[0].0, ToolName::TabsList);
}

#[tokio::test]
async fn dispatcher_failures_surface_as_dispatch_errors() {
	let (state, _) = state_with(MockDispatcher {
		fail_with: Some("element not interactable".to_string()),
		..Default::default()
	});
	let session_id = state.sessions.attach(1, 0);

	let response = call(
		&state,
		tools_call("f", "element.type", json!({"sessionId": session_id, "text": "hi"})),
	)
	.await;

	assert_eq!(error_code(&response), error_codes::DISPATCH_FAILED);
	match &response {
		JsonRpcResponse::Error { error, .. } => {
			assert_eq!(error.message, "element not interactable");
		}
		_ => unreachable!(),
	}
}
