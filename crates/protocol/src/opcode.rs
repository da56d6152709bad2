//! Fixed operation codes and interface descriptors.
//!
//! Each remote interface has its own code space; a code is only meaningful
//! together with the descriptor carried in the request envelope.

/// The privileged service reached through the primary handle.
pub mod service {
	pub const DESCRIPTOR: &str = "tether.server.IPrivilegedService";

	/// Raw pass-through transaction forwarded by the server.
	pub const TRANSACT: u32 = 1;
	pub const GET_VERSION: u32 = 2;
	pub const GET_UID: u32 = 3;
	pub const CHECK_PERMISSION: u32 = 4;
	pub const NEW_PROCESS: u32 = 7;
	pub const GET_SELINUX_CONTEXT: u32 = 8;
	pub const ADD_USER_SERVICE: u32 = 11;
	pub const REMOVE_USER_SERVICE: u32 = 12;
	/// Legacy servers reject this code at the transport level.
	pub const ATTACH_APPLICATION: u32 = 14;
	pub const REQUEST_PERMISSION: u32 = 15;
	pub const CHECK_SELF_PERMISSION: u32 = 16;
	pub const SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE: u32 = 17;
	pub const EXIT: u32 = 100;
	pub const ATTACH_USER_SERVICE: u32 = 101;
	pub const DISPATCH_PERMISSION_CONFIRMATION_RESULT: u32 = 104;
	pub const GET_FLAGS_FOR_UID: u32 = 105;
	pub const UPDATE_FLAGS_FOR_UID: u32 = 106;
}

/// Callbacks the server invokes on the application stub.
pub mod application {
	pub const DESCRIPTOR: &str = "tether.server.IApplication";

	pub const BIND_APPLICATION: u32 = 1;
	pub const DISPATCH_REQUEST_PERMISSION_RESULT: u32 = 2;
	pub const SHOW_PERMISSION_CONFIRMATION: u32 = 3;
}

/// Callbacks the server invokes on a user service connection stub.
pub mod connection {
	pub const DESCRIPTOR: &str = "tether.server.IUserServiceConnection";

	pub const CONNECTED: u32 = 1;
	pub const DIED: u32 = 2;
}

/// A process started on the server side.
pub mod process {
	pub const DESCRIPTOR: &str = "tether.server.IRemoteProcess";

	pub const WAIT_FOR: u32 = 4;
	pub const EXIT_VALUE: u32 = 5;
	pub const DESTROY: u32 = 6;
	pub const ALIVE: u32 = 7;
}
