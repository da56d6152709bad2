//! Remote call gateway.
//!
//! Every typed operation is a fixed operation code over one generic
//! primitive: encode the request envelope, transact, decode the reply
//! envelope. Transport failures, remote exceptions and security refusals
//! surface as distinct [`Error`] variants.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tether_protocol::opcode::service;
use tether_protocol::{
	AddUserService, AttachUserService, Bundle, CheckPermission, CodecError, DispatchPermissionConfirmationResult, GetFlagsForUid, NewProcess, ObjectSlot,
	PermissionResult, RemoveUserService, RequestPermission, UpdateFlagsForUid, decode_reply, encode_request,
};
use tether_runtime::{LocalStub, Parcel, ParcelObject, RemoteHandle, Transaction};

use crate::error::Result;

/// Invokes `code` on `handle` and decodes the typed reply body.
///
/// Returns the reply parcel alongside the body so callers can pick object
/// references out of it.
pub(crate) fn invoke<Req, Rep>(handle: &dyn RemoteHandle, interface: &str, code: u32, body: &Req, objects: Vec<ParcelObject>) -> Result<(Rep, Parcel)>
where
	Req: Serialize,
	Rep: DeserializeOwned,
{
	let request = Parcel::with_objects(encode_request(interface, body)?, objects);
	let reply = handle.transact(code, &request, 0)?.into_reply(code)?;
	let body = decode_reply::<Rep>(&reply.data)??;
	Ok((body, reply))
}

/// Resolves a handle referenced by `slot` in a reply parcel.
pub(crate) fn handle_at(parcel: &Parcel, slot: ObjectSlot) -> Result<Arc<dyn RemoteHandle>> {
	match parcel.objects.get(slot.index()) {
		Some(ParcelObject::Handle(handle)) => Ok(Arc::clone(handle)),
		Some(ParcelObject::Stub(_)) => Err(CodecError::WrongObjectKind(slot.0).into()),
		None => Err(CodecError::MissingObject(slot.0).into()),
	}
}

/// Typed client for the privileged service behind the primary handle.
#[derive(Clone)]
pub struct RemoteService {
	handle: Arc<dyn RemoteHandle>,
}

impl RemoteService {
	pub fn new(handle: Arc<dyn RemoteHandle>) -> Self {
		Self { handle }
	}

	pub fn handle(&self) -> &Arc<dyn RemoteHandle> {
		&self.handle
	}

	fn call<Req: Serialize, Rep: DeserializeOwned>(&self, code: u32, body: &Req) -> Result<Rep> {
		invoke(self.handle.as_ref(), service::DESCRIPTOR, code, body, Vec::new()).map(|(body, _)| body)
	}

	pub fn get_uid(&self) -> Result<i32> {
		self.call(service::GET_UID, &())
	}

	pub fn get_version(&self) -> Result<i32> {
		self.call(service::GET_VERSION, &())
	}

	pub fn get_selinux_context(&self) -> Result<String> {
		self.call(service::GET_SELINUX_CONTEXT, &())
	}

	pub fn check_permission(&self, permission: &str) -> Result<PermissionResult> {
		let code: i32 = self.call(
			service::CHECK_PERMISSION,
			&CheckPermission {
				permission: permission.to_string(),
			},
		)?;
		Ok(PermissionResult::from_code(code))
	}

	pub fn request_permission(&self, request_code: i32) -> Result<()> {
		self.call(service::REQUEST_PERMISSION, &RequestPermission { request_code })
	}

	pub fn check_self_permission(&self) -> Result<bool> {
		self.call(service::CHECK_SELF_PERMISSION, &())
	}

	pub fn should_show_request_permission_rationale(&self) -> Result<bool> {
		self.call(service::SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE, &())
	}

	/// Starts a process on the server and returns the handle controlling it.
	pub fn new_process(&self, request: &NewProcess) -> Result<Arc<dyn RemoteHandle>> {
		let (slot, reply) = invoke::<_, ObjectSlot>(self.handle.as_ref(), service::DESCRIPTOR, service::NEW_PROCESS, request, Vec::new())?;
		handle_at(&reply, slot)
	}

	/// Registers `connection` for the user service described by `options`.
	pub fn add_user_service(&self, connection: Arc<dyn LocalStub>, options: Bundle) -> Result<i32> {
		let request = AddUserService {
			connection: ObjectSlot::FIRST,
			options,
		};
		invoke(
			self.handle.as_ref(),
			service::DESCRIPTOR,
			service::ADD_USER_SERVICE,
			&request,
			vec![ParcelObject::Stub(connection)],
		)
		.map(|(status, _)| status)
	}

	pub fn remove_user_service(&self, options: Bundle) -> Result<i32> {
		self.call(service::REMOVE_USER_SERVICE, &RemoveUserService { options })
	}

	pub fn exit(&self) -> Result<()> {
		self.call(service::EXIT, &())
	}

	pub fn attach_user_service(&self, binder: Arc<dyn LocalStub>, options: Bundle) -> Result<()> {
		let request = AttachUserService {
			binder: ObjectSlot::FIRST,
			options,
		};
		invoke(
			self.handle.as_ref(),
			service::DESCRIPTOR,
			service::ATTACH_USER_SERVICE,
			&request,
			vec![ParcelObject::Stub(binder)],
		)
		.map(|(body, _)| body)
	}

	pub fn dispatch_permission_confirmation_result(&self, request: &DispatchPermissionConfirmationResult) -> Result<()> {
		self.call(service::DISPATCH_PERMISSION_CONFIRMATION_RESULT, request)
	}

	pub fn get_flags_for_uid(&self, uid: i32, mask: i32) -> Result<i32> {
		self.call(service::GET_FLAGS_FOR_UID, &GetFlagsForUid { uid, mask })
	}

	pub fn update_flags_for_uid(&self, uid: i32, mask: i32, value: i32) -> Result<()> {
		self.call(service::UPDATE_FLAGS_FOR_UID, &UpdateFlagsForUid { uid, mask, value })
	}

	/// Raw pass-through transaction; the payload is not enveloped.
	pub fn transact(&self, data: &Parcel, flags: u32) -> Result<Transaction> {
		Ok(self.handle.transact(service::TRANSACT, data, flags)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::Error;
	use tether_protocol::{ExceptionKind, RemoteException, decode_request, encode_exception, encode_reply};
	use tether_runtime::TransportError;
	use tether_runtime::fake::FakeHandle;

	struct Server;

	impl LocalStub for Server {
		fn on_transact(&self, code: u32, data: &Parcel, _flags: u32) -> Transaction {
			let bytes = match code {
				service::GET_UID => encode_exception(&RemoteException::new(ExceptionKind::Security, "not granted")),
				service::GET_VERSION => encode_reply(&13),
				service::CHECK_PERMISSION => {
					let request: CheckPermission = decode_request(service::DESCRIPTOR, &data.data).unwrap();
					encode_reply(&if request.permission == "android.permission.DUMP" { 0 } else { -1 })
				}
				service::NEW_PROCESS => {
					let process = FakeHandle::new_dyn(Arc::new(Server));
					return Transaction::Reply(Parcel::with_objects(encode_reply(&ObjectSlot::FIRST).unwrap(), vec![ParcelObject::Handle(process)]));
				}
				service::EXIT => encode_reply(&7),
				_ => return Transaction::NotHandled,
			};
			Transaction::Reply(Parcel::new(bytes.unwrap()))
		}
	}

	fn service() -> (Arc<FakeHandle>, RemoteService) {
		let handle = FakeHandle::new(Arc::new(Server));
		(handle.clone(), RemoteService::new(handle))
	}

	#[test]
	fn typed_reply_is_decoded() {
		let (_, service) = service();
		assert_eq!(service.get_version().unwrap(), 13);
	}

	#[test]
	fn security_exception_surfaces_as_security_failure() {
		let (_, service) = service();
		let err = service.get_uid().unwrap_err();
		assert!(err.is_security(), "unexpected error: {err}");
	}

	#[test]
	fn permission_code_maps_to_result() {
		let (_, service) = service();
		assert_eq!(service.check_permission("android.permission.DUMP").unwrap(), PermissionResult::Granted);
		assert_eq!(service.check_permission("android.permission.REBOOT").unwrap(), PermissionResult::Denied);
	}

	#[test]
	fn unknown_code_is_transport_failure() {
		let (_, service) = service();
		let err = service.get_selinux_context().unwrap_err();
		assert!(matches!(err, Error::Transport(TransportError::NotHandled { code: service::GET_SELINUX_CONTEXT })));
	}

	#[test]
	fn dead_handle_is_transport_failure() {
		let (handle, service) = service();
		handle.kill();
		assert!(service.get_version().unwrap_err().is_transport());
	}

	#[test]
	fn reply_with_wrong_body_type_is_protocol_error() {
		let (_, service) = service();
		assert!(matches!(service.exit().unwrap_err(), Error::Protocol(_)));
	}

	#[test]
	fn new_process_returns_handle_from_reply_objects() {
		let (_, service) = service();
		let process = service
			.new_process(&NewProcess {
				cmd: vec!["id".to_string()],
				env: None,
				dir: None,
			})
			.unwrap();
		assert!(process.ping());
	}
}
