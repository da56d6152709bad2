//! Session facts derived from the attach handshake or lazy remote queries.
//!
//! Every derived field is unknown until resolved, then cached until the
//! handle is torn down. Each teardown or new attach bumps a generation
//! counter; writes tagged with an older generation are discarded, so a slow
//! lazy fill can never resurrect facts of a dead handle.

use tether_protocol::Bundle;
use tether_protocol::keys::{
	ATTACH_REPLY_PERMISSION_GRANTED, ATTACH_REPLY_SERVER_PATCH_VERSION, ATTACH_REPLY_SERVER_SECONTEXT, ATTACH_REPLY_SERVER_UID, ATTACH_REPLY_SERVER_VERSION,
	ATTACH_REPLY_SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE,
};

/// Connection state as seen by the liveness monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
	/// No handle.
	Disconnected,
	/// Handle present, waiting for the attach reply.
	Attaching,
	/// Attach completed; `legacy` servers skipped the handshake.
	Connected { legacy: bool },
	/// Handle present but the handshake failed. Direct remote calls may still work.
	AttachFailed,
}

impl LinkState {
	pub fn is_connected(self) -> bool {
		matches!(self, Self::Connected { .. })
	}
}

/// Identity of the server process. `None` means not yet known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerIdentity {
	pub uid: Option<i32>,
	pub api_version: Option<i32>,
	pub patch_version: Option<i32>,
	pub security_context: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionState {
	pub granted: bool,
	pub should_show_rationale: bool,
}

/// Parses the attach reply bundle. Negative ids and versions count as unknown.
pub(crate) fn parse_attach_reply(data: &Bundle) -> (ServerIdentity, PermissionState) {
	let known = |value: i32| (value >= 0).then_some(value);
	let identity = ServerIdentity {
		uid: known(data.get_int(ATTACH_REPLY_SERVER_UID, -1)),
		api_version: known(data.get_int(ATTACH_REPLY_SERVER_VERSION, -1)),
		patch_version: known(data.get_int(ATTACH_REPLY_SERVER_PATCH_VERSION, -1)),
		security_context: data.get_string(ATTACH_REPLY_SERVER_SECONTEXT).map(str::to_string),
	};
	let permission = PermissionState {
		granted: data.get_bool(ATTACH_REPLY_PERMISSION_GRANTED, false),
		should_show_rationale: data.get_bool(ATTACH_REPLY_SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE, false),
	};
	(identity, permission)
}

#[derive(Debug)]
pub(crate) struct SessionState {
	pub(crate) link: LinkState,
	pub(crate) legacy: bool,
	pub(crate) identity: ServerIdentity,
	pub(crate) permission: PermissionState,
	generation: u64,
	awaiting_bind: Option<u64>,
}

impl SessionState {
	pub(crate) fn new() -> Self {
		Self {
			link: LinkState::Disconnected,
			legacy: false,
			identity: ServerIdentity::default(),
			permission: PermissionState::default(),
			generation: 0,
			awaiting_bind: None,
		}
	}

	pub(crate) fn generation(&self) -> u64 {
		self.generation
	}

	/// Forgets every derived fact. The legacy flag belongs to the last attach
	/// attempt and survives until the next one.
	pub(crate) fn reset(&mut self) {
		self.generation += 1;
		self.link = LinkState::Disconnected;
		self.identity = ServerIdentity::default();
		self.permission = PermissionState::default();
		self.awaiting_bind = None;
	}

	/// Starts a new attach cycle and returns its generation.
	pub(crate) fn begin_attach(&mut self) -> u64 {
		self.generation += 1;
		self.link = LinkState::Attaching;
		self.legacy = false;
		self.awaiting_bind = Some(self.generation);
		self.generation
	}

	/// Applies the attach reply for `generation`. Returns `false` when that
	/// attach is not waiting for one, e.g. a duplicate reply or one for a
	/// superseded handle.
	pub(crate) fn complete_bind(&mut self, generation: u64, identity: ServerIdentity, permission: PermissionState) -> bool {
		if self.awaiting_bind != Some(generation) {
			return false;
		}
		self.awaiting_bind = None;
		self.identity = identity;
		self.permission = permission;
		self.link = LinkState::Connected { legacy: false };
		true
	}

	/// Marks the attach of `generation` as done without a reply.
	pub(crate) fn complete_legacy(&mut self, generation: u64) -> bool {
		if self.awaiting_bind != Some(generation) {
			return false;
		}
		self.awaiting_bind = None;
		self.legacy = true;
		self.link = LinkState::Connected { legacy: true };
		true
	}

	pub(crate) fn fail_attach(&mut self, generation: u64) -> bool {
		if self.awaiting_bind != Some(generation) {
			return false;
		}
		self.awaiting_bind = None;
		self.link = LinkState::AttachFailed;
		true
	}

	/// Runs `apply` only if no teardown or new attach happened since `generation`.
	pub(crate) fn fill(&mut self, generation: u64, apply: impl FnOnce(&mut Self)) {
		if self.generation == generation {
			apply(self);
		}
	}
}
