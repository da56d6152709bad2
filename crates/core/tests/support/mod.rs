//! Scripted in-memory server shared by the integration tests.
//!
//! [`ScriptedServer`] plays the privileged service behind a
//! [`FakeHandle`]. It answers the typed operations with fixed values, keeps
//! the stubs the client hands over, and lets a test drive the callbacks a
//! real server would send (attach reply, permission result, user service
//! connect and death).

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tether::{ComponentName, ServiceConnection, Session, SessionConfig};
use tether_protocol::keys::{
	ATTACH_REPLY_PERMISSION_GRANTED, ATTACH_REPLY_SERVER_PATCH_VERSION, ATTACH_REPLY_SERVER_SECONTEXT, ATTACH_REPLY_SERVER_UID, ATTACH_REPLY_SERVER_VERSION,
	ATTACH_REPLY_SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE, REQUEST_PERMISSION_REPLY_ALLOWED,
};
use tether_protocol::opcode::{application, connection, process, service};
use tether_protocol::{
	AddUserService, AttachApplication, BindApplication, Bundle, DispatchRequestPermissionResult, ExceptionKind, GetFlagsForUid, ObjectSlot, RemoteException,
	ServiceConnected, UpdateFlagsForUid, decode_request, encode_exception, encode_reply, encode_request,
};
use tether_runtime::fake::FakeHandle;
use tether_runtime::{LocalStub, Parcel, ParcelObject, RemoteHandle, Transaction};

pub const PACKAGE: &str = "com.example.app";
pub const SHELL_UID: i32 = 2000;
pub const SHELL_CONTEXT: &str = "u:r:shell:s0";
pub const API_VERSION: i32 = 13;

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("tether=debug").try_init();
}

pub fn session() -> Session {
	init_tracing();
	Session::new(SessionConfig::default()).expect("session should start")
}

/// Blocks until every listener round scheduled so far has run.
pub fn settle(session: &Session) {
	session.dispatcher().flush();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
	/// Accepts the attach call and answers through `bindApplication`.
	Modern,
	/// Predates the attach call.
	Legacy,
	/// Rejects the attach call with a remote exception.
	Refusing,
}

pub struct ScriptedServer {
	protocol: Protocol,
	/// Send `bindApplication` from inside the attach call.
	bind_inline: bool,
	deny_queries: AtomicBool,
	granted: AtomicBool,
	uid: AtomicI32,
	flags: AtomicI32,
	application: Mutex<Option<Arc<dyn LocalStub>>>,
	connections: Mutex<Vec<Arc<dyn LocalStub>>>,
	/// Keeps connected user service handles alive, as the server would.
	services: Mutex<Vec<Arc<FakeHandle>>>,
}

impl ScriptedServer {
	pub fn modern() -> Arc<Self> {
		Self::build(Protocol::Modern, true)
	}

	/// Modern server whose attach reply is sent later through [`ScriptedServer::bind_application`].
	pub fn modern_deferred() -> Arc<Self> {
		Self::build(Protocol::Modern, false)
	}

	pub fn legacy() -> Arc<Self> {
		Self::build(Protocol::Legacy, false)
	}

	pub fn refusing() -> Arc<Self> {
		Self::build(Protocol::Refusing, false)
	}

	fn build(protocol: Protocol, bind_inline: bool) -> Arc<Self> {
		Arc::new(Self {
			protocol,
			bind_inline,
			deny_queries: AtomicBool::new(false),
			granted: AtomicBool::new(true),
			uid: AtomicI32::new(SHELL_UID),
			flags: AtomicI32::new(0),
			application: Mutex::new(None),
			connections: Mutex::new(Vec::new()),
			services: Mutex::new(Vec::new()),
		})
	}

	pub fn handle(self: &Arc<Self>) -> Arc<FakeHandle> {
		FakeHandle::new(self.clone())
	}

	/// Answer identity queries with a security exception.
	pub fn deny_queries(&self) {
		self.deny_queries.store(true, Ordering::SeqCst);
	}

	pub fn set_granted(&self, granted: bool) {
		self.granted.store(granted, Ordering::SeqCst);
	}

	pub fn set_uid(&self, uid: i32) {
		self.uid.store(uid, Ordering::SeqCst);
	}

	pub fn attach_reply(&self) -> Bundle {
		Bundle::new()
			.with_int(ATTACH_REPLY_SERVER_UID, self.uid.load(Ordering::SeqCst))
			.with_int(ATTACH_REPLY_SERVER_VERSION, API_VERSION)
			.with_int(ATTACH_REPLY_SERVER_PATCH_VERSION, 0)
			.with_string(ATTACH_REPLY_SERVER_SECONTEXT, SHELL_CONTEXT)
			.with_bool(ATTACH_REPLY_PERMISSION_GRANTED, self.granted.load(Ordering::SeqCst))
			.with_bool(ATTACH_REPLY_SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE, false)
	}

	/// Sends `bindApplication` to the application stub of the last attach.
	pub fn bind_application(&self) {
		let data = self.attach_reply();
		self.call_application(application::BIND_APPLICATION, &BindApplication { data });
	}

	pub fn dispatch_permission_result(&self, request_code: i32, allowed: bool) {
		let data = Bundle::new().with_bool(REQUEST_PERMISSION_REPLY_ALLOWED, allowed);
		self.call_application(application::DISPATCH_REQUEST_PERMISSION_RESULT, &DispatchRequestPermissionResult { request_code, data });
	}

	fn call_application<T: Serialize>(&self, code: u32, body: &T) {
		let stub = self.application.lock().clone().expect("no attach received yet");
		let data = Parcel::new(encode_request(application::DESCRIPTOR, body).expect("encode"));
		stub.on_transact(code, &data, 0);
	}

	/// Number of connection stubs registered through the add call.
	pub fn connection_count(&self) -> usize {
		self.connections.lock().len()
	}

	/// Reports the user service registered by the `index`-th add call as running.
	pub fn connect_service(&self, index: usize) -> Arc<FakeHandle> {
		let service = FakeHandle::new(Arc::new(Echo));
		self.services.lock().push(Arc::clone(&service));
		let service_dyn: Arc<dyn RemoteHandle> = service.clone();
		let body = ServiceConnected { service: ObjectSlot::FIRST };
		let data = Parcel::with_objects(
			encode_request(connection::DESCRIPTOR, &body).expect("encode"),
			vec![ParcelObject::Handle(service_dyn)],
		);
		self.connection(index).on_transact(connection::CONNECTED, &data, 0);
		service
	}

	/// Reports the user service registered by the `index`-th add call as dead.
	pub fn kill_service(&self, index: usize) {
		let data = Parcel::new(encode_request(connection::DESCRIPTOR, &()).expect("encode"));
		self.connection(index).on_transact(connection::DIED, &data, 0);
	}

	fn connection(&self, index: usize) -> Arc<dyn LocalStub> {
		self.connections.lock().get(index).cloned().expect("no such connection")
	}

	fn attach(&self, data: &Parcel) -> Transaction {
		let request: AttachApplication = decode_request(service::DESCRIPTOR, &data.data).expect("attach request");
		assert_eq!(request.package_name, PACKAGE);
		match self.protocol {
			Protocol::Legacy => Transaction::NotHandled,
			Protocol::Refusing => exception(ExceptionKind::IllegalState, "attach refused"),
			Protocol::Modern => {
				let stub = data.stub(request.application.index()).cloned().expect("application stub");
				*self.application.lock() = Some(stub);
				if self.bind_inline {
					self.bind_application();
				}
				reply(&())
			}
		}
	}

	fn query<T: Serialize>(&self, value: T) -> Transaction {
		if self.deny_queries.load(Ordering::SeqCst) {
			return exception(ExceptionKind::Security, "permission denied");
		}
		reply(&value)
	}
}

impl LocalStub for ScriptedServer {
	fn on_transact(&self, code: u32, data: &Parcel, _flags: u32) -> Transaction {
		match code {
			service::ATTACH_APPLICATION if self.protocol != Protocol::Legacy => self.attach(data),
			service::ATTACH_APPLICATION => Transaction::NotHandled,
			service::GET_UID => self.query(self.uid.load(Ordering::SeqCst)),
			service::GET_VERSION => self.query(API_VERSION),
			service::GET_SELINUX_CONTEXT => self.query(SHELL_CONTEXT),
			service::CHECK_PERMISSION => reply(&0),
			service::CHECK_SELF_PERMISSION => reply(&self.granted.load(Ordering::SeqCst)),
			service::SHOULD_SHOW_REQUEST_PERMISSION_RATIONALE => reply(&true),
			service::REQUEST_PERMISSION => reply(&()),
			service::NEW_PROCESS => {
				let process = FakeHandle::new_dyn(Arc::new(Process::default()));
				Transaction::Reply(Parcel::with_objects(
					encode_reply(&ObjectSlot::FIRST).expect("encode"),
					vec![ParcelObject::Handle(process)],
				))
			}
			service::ADD_USER_SERVICE => {
				let request: AddUserService = decode_request(service::DESCRIPTOR, &data.data).expect("add request");
				let stub = data.stub(request.connection.index()).cloned().expect("connection stub");
				self.connections.lock().push(stub);
				reply(&0)
			}
			service::REMOVE_USER_SERVICE => reply(&0),
			service::GET_FLAGS_FOR_UID => {
				let request: GetFlagsForUid = decode_request(service::DESCRIPTOR, &data.data).expect("flags request");
				reply(&(self.flags.load(Ordering::SeqCst) & request.mask))
			}
			service::UPDATE_FLAGS_FOR_UID => {
				let request: UpdateFlagsForUid = decode_request(service::DESCRIPTOR, &data.data).expect("flags request");
				let current = self.flags.load(Ordering::SeqCst);
				self.flags.store((current & !request.mask) | (request.value & request.mask), Ordering::SeqCst);
				reply(&())
			}
			service::EXIT => reply(&()),
			service::TRANSACT => Transaction::Reply(data.clone()),
			_ => Transaction::NotHandled,
		}
	}
}

/// Remote process that exits with status 0 once destroyed or waited for.
#[derive(Default)]
struct Process {
	destroyed: AtomicBool,
}

impl LocalStub for Process {
	fn on_transact(&self, code: u32, _data: &Parcel, _flags: u32) -> Transaction {
		match code {
			process::WAIT_FOR | process::EXIT_VALUE => reply(&0),
			process::ALIVE => reply(&!self.destroyed.load(Ordering::SeqCst)),
			process::DESTROY => {
				self.destroyed.store(true, Ordering::SeqCst);
				reply(&())
			}
			_ => Transaction::NotHandled,
		}
	}
}

struct Echo;

impl LocalStub for Echo {
	fn on_transact(&self, _code: u32, data: &Parcel, _flags: u32) -> Transaction {
		Transaction::Reply(data.clone())
	}
}

fn reply<T: Serialize>(body: &T) -> Transaction {
	Transaction::Reply(Parcel::new(encode_reply(body).expect("encode")))
}

fn exception(kind: ExceptionKind, message: &str) -> Transaction {
	Transaction::Reply(Parcel::new(encode_exception(&RemoteException::new(kind, message)).expect("encode")))
}

/// Counts listener invocations.
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
	pub fn get(&self) -> usize {
		self.0.load(Ordering::SeqCst)
	}

	pub fn listener(&self) -> impl Fn() + Send + Sync + 'static {
		let count = Arc::clone(&self.0);
		move || {
			count.fetch_add(1, Ordering::SeqCst);
		}
	}
}

/// Service connection that records the events it receives.
#[derive(Default)]
pub struct RecordingConnection {
	events: Mutex<Vec<String>>,
}

impl RecordingConnection {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn events(&self) -> Vec<String> {
		self.events.lock().clone()
	}
}

impl ServiceConnection for RecordingConnection {
	fn on_service_connected(&self, component: &ComponentName, _service: Arc<dyn RemoteHandle>) {
		self.events.lock().push(format!("connected {component}"));
	}

	fn on_service_disconnected(&self, component: &ComponentName) {
		self.events.lock().push(format!("disconnected {component}"));
	}
}
