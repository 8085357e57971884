use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tabwire_protocol::{JsonRpcResponse, RequestId, error_codes};
use tokio::net::TcpListener;
use tracing::info;

use crate::bridge::ExtensionBridge;
use crate::router::{self, RouterState};

/// Shared handles behind the axum routes: the session/dispatch state the
/// router consults and the bridge that owns the extension socket.
#[derive(Clone)]
pub struct AppState {
	pub router: Arc<RouterState>,
	pub bridge: ExtensionBridge,
}

impl AppState {
	/// Wires the bridge in as the router's dispatcher.
	pub fn new(bridge: ExtensionBridge) -> Self {
		Self {
			router: Arc::new(RouterState::new(Arc::new(bridge.clone()))),
			bridge,
		}
	}
}

/// Control surface: liveness probe, JSON-RPC endpoint, and the extension
/// bridge WebSocket, all on one listener.
pub fn build_app(state: AppState) -> axum::Router {
	axum::Router::new()
		.route("/", get(|| async { "OK" }))
		.route("/mcp", post(handle_rpc))
		.route(
			"/bridge",
			get(
				|ws: WebSocketUpgrade, State(state): State<AppState>| async move {
					ws.on_upgrade(move |socket| async move {
						state.bridge.handle_socket(socket).await
					})
				},
			),
		)
		.fallback(not_found)
		.with_state(state)
}

pub async fn run_server(host: &str, port: u16, state: AppState) -> Result<()> {
	let addr: SocketAddr = format!("{host}:{port}")
		.parse()
		.with_context(|| format!("Invalid host/port combination: {host}:{port}"))?;

	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("Failed to bind companion server to {addr}"))?;

	info!(target = "tabwire", host, port, "starting companion server");

	let bridge = state.bridge.clone();
	axum::serve(listener, build_app(state).into_make_service())
		.with_graceful_shutdown(shutdown_signal())
		.await
		.context("Companion server error")?;

	// Settles every still-pending bridged call with a shutdown error.
	bridge.close().await;
	Ok(())
}

async fn handle_rpc(
	State(state): State<AppState>,
	body: Bytes,
) -> (StatusCode, Json<JsonRpcResponse>) {
	let payload: Value = match serde_json::from_slice(&body) {
		Ok(payload) => payload,
		Err(_) => {
			return (
				StatusCode::BAD_REQUEST,
				Json(JsonRpcResponse::error(
					RequestId::Null,
					error_codes::PARSE_ERROR,
					"Parse error",
				)),
			);
		}
	};

	let Some(request) = router::decode_envelope(payload) else {
		return (
			StatusCode::BAD_REQUEST,
			Json(JsonRpcResponse::error(
				RequestId::Null,
				error_codes::INVALID_REQUEST,
				"Invalid Request",
			)),
		);
	};

	let response = router::handle_rpc(request, &state.router).await;
	(StatusCode::OK, Json(response))
}

async fn not_found() -> impl IntoResponse {
	(StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})))
}

async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{SignalKind, signal};

		let mut sigterm = match signal(SignalKind::terminate()) {
			Ok(sigterm) => sigterm,
			Err(_) => {
				let _ = tokio::signal::ctrl_c().await;
				return;
			}
		};

		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!(target = "tabwire", "received SIGINT, shutting down");
			}
			_ = sigterm.recv() => {
				info!(target = "tabwire", "received SIGTERM, shutting down");
			}
		}
	}

	#[cfg(not(unix))]
	{
		let _ = tokio::signal::ctrl_c().await;
		info!(target = "tabwire", "received Ctrl+C, shutting down");
	}
}
