use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tabwire_protocol::SessionRef;
use uuid::Uuid;

/// Maps opaque session ids to the (tab, frame) pair they were attached to.
///
/// Sessions are created by `session.attach` and live until `session.detach`;
/// there is no TTL. Ids are never reused, so a detached id stays invalid for
/// the lifetime of the process. Attach performs no liveness validation of
/// the tab/frame; the extension rejects dead addresses when a tool actually
/// runs against them.
#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: Mutex<HashMap<String, SessionRef>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Stores the mapping under a fresh id and returns it. Always succeeds.
	pub fn attach(&self, tab_id: i64, frame_id: i64) -> String {
		let session_id = format!("s_{}", Uuid::new_v4());
		self.lock()
			.insert(session_id.clone(), SessionRef { tab_id, frame_id });
		session_id
	}

	/// Removes the mapping, reporting whether it existed. Idempotent.
	pub fn detach(&self, session_id: &str) -> bool {
		self.lock().remove(session_id).is_some()
	}

	pub fn resolve(&self, session_id: &str) -> Option<SessionRef> {
		self.lock().get(session_id).copied()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, SessionRef>> {
		self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
