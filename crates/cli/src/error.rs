use thiserror::Error;

/// Failures surfaced by the extension bridge when forwarding a tool call.
///
/// Every variant renders to the human-readable cause text carried by the
/// dispatch-failure RPC error; none of these crash the server.
#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("extension is not connected")]
	NotConnected,

	#[error("failed to send to extension")]
	SendFailed,

	#[error("extension request timed out")]
	Timeout,

	#[error("extension connection closed")]
	Closed,

	#[error("extension bridge shutting down")]
	ShuttingDown,

	/// The extension executed the tool and reported a failure.
	#[error("{0}")]
	Tool(String),
}
