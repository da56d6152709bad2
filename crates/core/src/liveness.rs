//! Current handle and its death watch.

use std::sync::{Arc, Weak};

use tether_runtime::{DeathRecipient, HandleId, RemoteHandle};
use tracing::{debug, warn};

use crate::session::SessionInner;

/// The current handle, if any, together with the death watch linked to it.
///
/// Guarded by the session's link mutex; identity checks and swaps happen
/// under that one lock.
pub(crate) struct Link {
	current: Option<(Arc<dyn RemoteHandle>, Arc<dyn DeathRecipient>)>,
}

impl Link {
	pub(crate) fn new() -> Self {
		Self { current: None }
	}

	pub(crate) fn handle(&self) -> Option<&Arc<dyn RemoteHandle>> {
		self.current.as_ref().map(|(handle, _)| handle)
	}

	pub(crate) fn handle_id(&self) -> Option<HandleId> {
		self.handle().map(HandleId::of)
	}

	/// Identity comparison; two absent handles are the same.
	pub(crate) fn is_current(&self, candidate: Option<&Arc<dyn RemoteHandle>>) -> bool {
		self.handle_id() == candidate.map(HandleId::of)
	}

	/// Makes `handle` current and links `watch` to it. A refused link is
	/// logged; the handle stays current until replaced or reported dead.
	pub(crate) fn install(&mut self, handle: Arc<dyn RemoteHandle>, watch: Arc<dyn DeathRecipient>) {
		self.detach();
		if let Err(err) = handle.link_to_death(Arc::clone(&watch)) {
			warn!(target: "tether.session", error = %err, "failed to link death watch");
		}
		self.current = Some((handle, watch));
	}

	/// Unlinks the watch and drops the current handle.
	pub(crate) fn detach(&mut self) -> Option<Arc<dyn RemoteHandle>> {
		let (handle, watch) = self.current.take()?;
		if !handle.unlink_to_death(&watch) {
			debug!(target: "tether.session", "death watch was not linked");
		}
		Some(handle)
	}
}

/// Death recipient linked to one specific handle.
pub(crate) struct DeathWatch {
	session: Weak<SessionInner>,
	handle: HandleId,
}

impl DeathWatch {
	pub(crate) fn new(session: Weak<SessionInner>, handle: HandleId) -> Self {
		Self { session, handle }
	}
}

impl DeathRecipient for DeathWatch {
	fn handle_died(&self) {
		if let Some(session) = self.session.upgrade() {
			session.on_handle_died(self.handle);
		}
	}
}
