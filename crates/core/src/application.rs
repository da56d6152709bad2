//! Application callback exported to the server with the attach call.
//!
//! The server invokes it on a transport thread it owns. Handlers only
//! update session state and schedule dispatch; listener code never runs on
//! the calling thread unless that thread is the dispatch thread.

use std::sync::Weak;

use tether_protocol::keys::REQUEST_PERMISSION_REPLY_ALLOWED;
use tether_protocol::opcode::application;
use tether_protocol::{BindApplication, DispatchRequestPermissionResult, ShowPermissionConfirmation};
use tether_runtime::{LocalStub, Parcel, Transaction};
use tracing::debug;

use crate::inbound;
use crate::session::SessionInner;

/// One stub per attach; replies reaching a stub of a superseded attach are dropped.
pub(crate) struct ApplicationStub {
	session: Weak<SessionInner>,
	generation: u64,
}

impl ApplicationStub {
	pub(crate) fn new(session: Weak<SessionInner>, generation: u64) -> Self {
		Self { session, generation }
	}
}

impl LocalStub for ApplicationStub {
	fn on_transact(&self, code: u32, data: &Parcel, _flags: u32) -> Transaction {
		let Some(session) = self.session.upgrade() else {
			debug!(target: "tether.session", code, "application callback after session drop");
			return inbound::empty_reply();
		};
		match code {
			application::BIND_APPLICATION => {
				let request: BindApplication = match inbound::decode(application::DESCRIPTOR, code, data) {
					Ok(request) => request,
					Err(reply) => return reply,
				};
				session.on_bind_application(self.generation, &request.data);
			}
			application::DISPATCH_REQUEST_PERMISSION_RESULT => {
				let request: DispatchRequestPermissionResult = match inbound::decode(application::DESCRIPTOR, code, data) {
					Ok(request) => request,
					Err(reply) => return reply,
				};
				let allowed = request.data.get_bool(REQUEST_PERMISSION_REPLY_ALLOWED, false);
				session.on_permission_result(request.request_code, allowed);
			}
			// Confirmation UI belongs to the host.
			application::SHOW_PERMISSION_CONFIRMATION => {
				if let Ok(request) = inbound::decode::<ShowPermissionConfirmation>(application::DESCRIPTOR, code, data) {
					debug!(
						target: "tether.session",
						uid = request.request_uid,
						package = %request.request_package_name,
						"permission confirmation requested"
					);
				}
			}
			_ => return Transaction::NotHandled,
		}
		inbound::empty_reply()
	}
}
