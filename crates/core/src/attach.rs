//! Attach handshake.
//!
//! The attach call carries the application stub and the caller's package
//! name. A modern server accepts it and later calls `bindApplication` on the
//! stub; a legacy server does not know the opcode and the transact itself
//! reports it as not handled.

use std::sync::Arc;

use tether_protocol::opcode::service;
use tether_protocol::{AttachApplication, ObjectSlot, decode_reply, encode_request};
use tether_runtime::{LocalStub, Parcel, ParcelObject, RemoteHandle, Transaction};

use crate::error::{Error, Result};

/// How the server answered the attach call.
#[derive(Debug)]
pub(crate) enum AttachOutcome {
	/// The server took the call; its reply arrives through `bindApplication`.
	Accepted,
	/// The server predates the attach opcode.
	Legacy,
	Failed(Error),
}

pub(crate) fn attach_application(handle: &dyn RemoteHandle, application: Arc<dyn LocalStub>, package_name: &str) -> AttachOutcome {
	match send_attach(handle, application, package_name) {
		Ok(Transaction::NotHandled) => AttachOutcome::Legacy,
		Ok(Transaction::Reply(reply)) => match decode_reply::<()>(&reply.data) {
			Ok(Ok(())) => AttachOutcome::Accepted,
			Ok(Err(exception)) => AttachOutcome::Failed(exception.into()),
			Err(err) => AttachOutcome::Failed(err.into()),
		},
		Err(err) => AttachOutcome::Failed(err),
	}
}

fn send_attach(handle: &dyn RemoteHandle, application: Arc<dyn LocalStub>, package_name: &str) -> Result<Transaction> {
	let request = AttachApplication {
		application: ObjectSlot::FIRST,
		package_name: package_name.to_string(),
	};
	let data = Parcel::with_objects(encode_request(service::DESCRIPTOR, &request)?, vec![ParcelObject::Stub(application)]);
	Ok(handle.transact(service::ATTACH_APPLICATION, &data, 0)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use parking_lot::Mutex;
	use tether_protocol::{ExceptionKind, RemoteException, decode_request, encode_exception, encode_reply};
	use tether_runtime::fake::FakeHandle;

	enum Mode {
		Modern,
		Legacy,
		Refuse,
	}

	struct Server {
		mode: Mode,
		package: Mutex<Option<String>>,
	}

	impl Server {
		fn new(mode: Mode) -> Arc<Self> {
			Arc::new(Self {
				mode,
				package: Mutex::new(None),
			})
		}
	}

	impl LocalStub for Server {
		fn on_transact(&self, code: u32, data: &Parcel, _flags: u32) -> Transaction {
			assert_eq!(code, service::ATTACH_APPLICATION);
			assert!(data.stub(0).is_some(), "attach must carry the application stub");
			let request: AttachApplication = decode_request(service::DESCRIPTOR, &data.data).unwrap();
			*self.package.lock() = Some(request.package_name);
			match self.mode {
				Mode::Modern => Transaction::Reply(Parcel::new(encode_reply(&()).unwrap())),
				Mode::Legacy => Transaction::NotHandled,
				Mode::Refuse => Transaction::Reply(Parcel::new(
					encode_exception(&RemoteException::new(ExceptionKind::IllegalState, "no package")).unwrap(),
				)),
			}
		}
	}

	struct App;

	impl LocalStub for App {
		fn on_transact(&self, _code: u32, _data: &Parcel, _flags: u32) -> Transaction {
			Transaction::NotHandled
		}
	}

	#[test]
	fn modern_server_accepts() {
		let server = Server::new(Mode::Modern);
		let handle = FakeHandle::new(server.clone());
		let outcome = attach_application(handle.as_ref(), Arc::new(App), "com.example");

		assert!(matches!(outcome, AttachOutcome::Accepted));
		assert_eq!(server.package.lock().as_deref(), Some("com.example"));
	}

	#[test]
	fn unknown_opcode_means_legacy() {
		let handle = FakeHandle::new(Server::new(Mode::Legacy));
		let outcome = attach_application(handle.as_ref(), Arc::new(App), "com.example");
		assert!(matches!(outcome, AttachOutcome::Legacy));
	}

	#[test]
	fn remote_exception_fails_attach() {
		let handle = FakeHandle::new(Server::new(Mode::Refuse));
		let outcome = attach_application(handle.as_ref(), Arc::new(App), "com.example");
		assert!(matches!(outcome, AttachOutcome::Failed(Error::Remote { kind: ExceptionKind::IllegalState, .. })));
	}

	#[test]
	fn dead_handle_fails_attach() {
		let handle = FakeHandle::new(Server::new(Mode::Modern));
		handle.kill();
		let outcome = attach_application(handle.as_ref(), Arc::new(App), "com.example");
		assert!(matches!(outcome, AttachOutcome::Failed(ref err) if err.is_transport()));
	}
}
