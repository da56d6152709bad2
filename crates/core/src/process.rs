//! Processes started on the server.

use std::sync::Arc;

use tether_protocol::WaitFor;
use tether_protocol::opcode::process;
use tether_runtime::RemoteHandle;

use crate::error::Result;
use crate::gateway::invoke;

/// A process running on the server side, controlled through its own handle.
///
/// Since server version 11 the process is killed when the calling process
/// dies.
#[derive(Clone)]
pub struct RemoteProcess {
	handle: Arc<dyn RemoteHandle>,
}

impl RemoteProcess {
	pub(crate) fn new(handle: Arc<dyn RemoteHandle>) -> Self {
		Self { handle }
	}

	pub fn handle(&self) -> &Arc<dyn RemoteHandle> {
		&self.handle
	}

	fn call<Req: serde::Serialize, Rep: serde::de::DeserializeOwned>(&self, code: u32, body: &Req) -> Result<Rep> {
		invoke(self.handle.as_ref(), process::DESCRIPTOR, code, body, Vec::new()).map(|(body, _)| body)
	}

	/// Blocks until the process exits and returns its exit code.
	pub fn wait_for(&self) -> Result<i32> {
		self.call(process::WAIT_FOR, &WaitFor { timeout_ms: None })
	}

	/// Returns the exit code; fails remotely while the process is still running.
	pub fn exit_value(&self) -> Result<i32> {
		self.call(process::EXIT_VALUE, &())
	}

	pub fn alive(&self) -> Result<bool> {
		self.call(process::ALIVE, &())
	}

	pub fn destroy(&self) -> Result<()> {
		self.call(process::DESTROY, &())
	}
}
