//! The session: a single, thread-safe view of the current remote handle.
//!
//! A handle may be supplied, replaced or reported dead from any thread. Each
//! new handle is attached once; its facts are cached until the next
//! teardown. Listeners run on the dispatch thread.
//!
//! Locks are always taken in the order link, state, listener set. Remote
//! calls are made with no lock held, so the server may call back into the
//! application stub while an attach or a query is in flight.

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tether_protocol::{Bundle, DispatchPermissionConfirmationResult, NewProcess, PermissionResult, SERVER_VERSION};
use tether_runtime::{DeathRecipient, Dispatcher, HandleId, LocalStub, Parcel, RemoteHandle, Transaction};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::application::ApplicationStub;
use crate::attach::{AttachOutcome, attach_application};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::gateway::RemoteService;
use crate::listeners::{HandleDeadListener, HandleReceivedListener, ListenerId, ListenerSet, PermissionResultListener, SessionEvent, Snapshot};
use crate::liveness::{DeathWatch, Link};
use crate::process::RemoteProcess;
use crate::registry::UserServiceRegistry;
use crate::state::{LinkState, PermissionState, ServerIdentity, SessionState, parse_attach_reply};
use crate::user_service::{ServiceConnection, UserServiceArgs, UserServiceKey};

type Job = Box<dyn FnOnce() + Send>;

/// Client session for the privileged service. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
	inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
	me: Weak<SessionInner>,
	link: Mutex<Link>,
	state: RwLock<SessionState>,
	received: ListenerSet<HandleReceivedListener>,
	dead: ListenerSet<HandleDeadListener>,
	permission: ListenerSet<PermissionResultListener>,
	registry: UserServiceRegistry,
	dispatcher: Dispatcher,
	events: broadcast::Sender<SessionEvent>,
}

impl Session {
	/// Creates a session with its own dispatch thread.
	pub fn new(config: SessionConfig) -> Result<Self> {
		config.validate()?;
		let dispatcher = Dispatcher::spawn(config.dispatch_thread_name.clone())?;
		Ok(Self::with_dispatcher(&config, dispatcher))
	}

	/// Creates a session delivering listener calls through `dispatcher`.
	pub fn with_dispatcher(config: &SessionConfig, dispatcher: Dispatcher) -> Self {
		let (events, _) = broadcast::channel(config.event_capacity.max(1));
		let inner = Arc::new_cyclic(|me| SessionInner {
			me: me.clone(),
			link: Mutex::new(Link::new()),
			state: RwLock::new(SessionState::new()),
			received: ListenerSet::new(),
			dead: ListenerSet::new(),
			permission: ListenerSet::new(),
			registry: UserServiceRegistry::new(dispatcher.clone()),
			dispatcher,
			events,
		});
		Self { inner }
	}

	/// Highest server API version this client knows.
	pub fn latest_service_version() -> i32 {
		SERVER_VERSION
	}

	pub fn dispatcher(&self) -> &Dispatcher {
		&self.inner.dispatcher
	}

	/// Supplies the handle reported by the connection tracker, or `None` when
	/// the server went away.
	///
	/// Re-supplying the current handle does nothing. A different handle tears
	/// the current one down first, then is attached. Attach failures are
	/// logged, never returned; see [`Session::link_state`].
	pub fn supply_handle(&self, handle: Option<Arc<dyn RemoteHandle>>, package_name: &str) {
		self.inner.supply_handle(handle, package_name);
	}

	pub fn handle(&self) -> Option<Arc<dyn RemoteHandle>> {
		self.inner.link.lock().handle().cloned()
	}

	/// `true` if a handle is current and answers a ping.
	pub fn ping(&self) -> bool {
		self.handle().is_some_and(|handle| handle.ping())
	}

	pub fn link_state(&self) -> LinkState {
		self.inner.state.read().link
	}

	/// `true` if the last attach found a server without the attach call.
	pub fn is_legacy(&self) -> bool {
		self.inner.state.read().legacy
	}

	/// Server facts known so far, without any remote call.
	pub fn identity(&self) -> ServerIdentity {
		self.inner.state.read().identity.clone()
	}

	pub fn permission_state(&self) -> PermissionState {
		self.inner.state.read().permission
	}

	/// Patch version from the attach reply. Legacy servers never report one.
	pub fn patch_version(&self) -> Option<i32> {
		self.inner.state.read().identity.patch_version
	}

	/// Uid of the server process: 0 for root, 2000 for shell.
	pub fn uid(&self) -> Result<i32> {
		self.inner.read_through(|state| state.identity.uid, RemoteService::get_uid, |state, uid| state.identity.uid = Some(uid))
	}

	/// API version of the server.
	pub fn version(&self) -> Result<i32> {
		self.inner.read_through(
			|state| state.identity.api_version,
			RemoteService::get_version,
			|state, version| state.identity.api_version = Some(version),
		)
	}

	/// Security context of the server process.
	pub fn selinux_context(&self) -> Result<String> {
		self.inner.read_through(
			|state| state.identity.security_context.clone(),
			RemoteService::get_selinux_context,
			|state, context| state.identity.security_context = Some(context),
		)
	}

	/// Checks `permission` for the server process. A root server holds every permission.
	pub fn check_remote_permission(&self, permission: &str) -> Result<PermissionResult> {
		if self.inner.state.read().identity.uid == Some(0) {
			return Ok(PermissionResult::Granted);
		}
		self.inner.service()?.0.check_permission(permission)
	}

	/// Whether this application may use the server.
	pub fn check_self_permission(&self) -> Result<bool> {
		if self.inner.state.read().permission.granted {
			return Ok(true);
		}
		let (service, generation) = self.inner.service()?;
		let granted = service.check_self_permission()?;
		if granted {
			self.inner.state.write().fill(generation, |state| state.permission.granted = true);
		}
		Ok(granted)
	}

	pub fn should_show_request_permission_rationale(&self) -> Result<bool> {
		let permission = self.inner.state.read().permission;
		if permission.granted {
			return Ok(false);
		}
		if permission.should_show_rationale {
			return Ok(true);
		}
		let (service, generation) = self.inner.service()?;
		let show = service.should_show_request_permission_rationale()?;
		self.inner.state.write().fill(generation, |state| state.permission.should_show_rationale = show);
		Ok(show)
	}

	/// Asks the server to prompt for permission. The outcome arrives through
	/// the permission result listeners with the same `request_code`.
	pub fn request_permission(&self, request_code: i32) -> Result<()> {
		self.inner.service()?.0.request_permission(request_code)
	}

	/// Starts `cmd` on the server.
	pub fn new_process(&self, cmd: Vec<String>, env: Option<Vec<String>>, dir: Option<String>) -> Result<RemoteProcess> {
		let (service, _) = self.inner.service()?;
		let handle = service.new_process(&NewProcess { cmd, env, dir })?;
		Ok(RemoteProcess::new(handle))
	}

	/// Raw transaction on the generic transact opcode.
	pub fn transact_remote(&self, data: &Parcel, flags: u32) -> Result<Transaction> {
		self.inner.service()?.0.transact(data, flags)
	}

	/// Asks the server to exit.
	pub fn exit(&self) -> Result<()> {
		self.inner.service()?.0.exit()
	}

	pub fn attach_user_service(&self, binder: Arc<dyn LocalStub>, options: Bundle) -> Result<()> {
		self.inner.service()?.0.attach_user_service(binder, options)
	}

	pub fn dispatch_permission_confirmation_result(&self, request_uid: i32, request_pid: i32, request_code: i32, data: Bundle) -> Result<()> {
		let request = DispatchPermissionConfirmationResult {
			request_uid,
			request_pid,
			request_code,
			data,
		};
		self.inner.service()?.0.dispatch_permission_confirmation_result(&request)
	}

	pub fn get_flags_for_uid(&self, uid: i32, mask: i32) -> Result<i32> {
		self.inner.service()?.0.get_flags_for_uid(uid, mask)
	}

	pub fn update_flags_for_uid(&self, uid: i32, mask: i32, value: i32) -> Result<()> {
		self.inner.service()?.0.update_flags_for_uid(uid, mask, value)
	}

	/// Binds `connection` to the user service described by `args`, starting
	/// the service on the server if needed.
	pub fn bind_user_service(&self, args: &UserServiceArgs, connection: Arc<dyn ServiceConnection>) -> Result<()> {
		let (service, _) = self.inner.service()?;
		self.inner.registry.bind(args, connection, &service)
	}

	/// Drops `connection` from the service's subscribers. With `remove`, the
	/// server is also asked to stop the service, whoever else is subscribed.
	pub fn unbind_user_service(&self, args: &UserServiceArgs, connection: Option<&Arc<dyn ServiceConnection>>, remove: bool) -> Result<()> {
		if let Some(connection) = connection {
			self.inner.registry.unsubscribe(&args.key(), connection);
		}
		if remove {
			let (service, _) = self.inner.service()?;
			self.inner.registry.remove(args, &service)?;
		}
		Ok(())
	}

	pub fn bound_user_services(&self) -> Vec<UserServiceKey> {
		self.inner.registry.keys()
	}

	pub fn add_handle_received_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
		self.inner.received.add(Arc::new(listener))
	}

	/// Like [`Session::add_handle_received_listener`], and also calls
	/// `listener` once right away if the session is already connected.
	pub fn add_handle_received_listener_sticky(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
		let listener: Arc<HandleReceivedListener> = Arc::new(listener);
		let mut deferred = Vec::new();
		// Holding the state lock orders the add and the immediate call against
		// a transition's snapshot and its round.
		let id = {
			let state = self.inner.state.read();
			let id = self.inner.received.add(Arc::clone(&listener));
			if state.link.is_connected() {
				self.inner.emit(&mut deferred, Box::new(move || listener()));
			}
			id
		};
		self.inner.run_deferred(deferred);
		id
	}

	pub fn remove_handle_received_listener(&self, id: ListenerId) -> bool {
		self.inner.received.remove(id)
	}

	pub fn add_handle_dead_listener(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerId {
		self.inner.dead.add(Arc::new(listener))
	}

	pub fn remove_handle_dead_listener(&self, id: ListenerId) -> bool {
		self.inner.dead.remove(id)
	}

	pub fn add_permission_result_listener(&self, listener: impl Fn(i32, PermissionResult) + Send + Sync + 'static) -> ListenerId {
		self.inner.permission.add(Arc::new(listener))
	}

	pub fn remove_permission_result_listener(&self, id: ListenerId) -> bool {
		self.inner.permission.remove(id)
	}

	/// Stream of every dispatched event, sent after that event's listeners ran.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.inner.events.subscribe()
	}
}

impl SessionInner {
	fn supply_handle(&self, handle: Option<Arc<dyn RemoteHandle>>, package_name: &str) {
		let mut deferred = Vec::new();
		let attach = {
			let mut link = self.link.lock();
			if link.is_current(handle.as_ref()) {
				debug!(target: "tether.session", "current handle supplied again; ignored");
				return;
			}
			if link.handle().is_some() {
				self.teardown(&mut link, &mut deferred);
			}
			handle.map(|handle| {
				let watch: Arc<dyn DeathRecipient> = Arc::new(DeathWatch::new(self.me.clone(), HandleId::of(&handle)));
				link.install(Arc::clone(&handle), watch);
				let generation = self.state.write().begin_attach();
				info!(target: "tether.session", generation, "handle received");
				(handle, generation)
			})
		};
		self.run_deferred(deferred);

		if let Some((handle, generation)) = attach {
			self.negotiate(&handle, generation, package_name);
		}
	}

	fn negotiate(&self, handle: &Arc<dyn RemoteHandle>, generation: u64, package_name: &str) {
		let application: Arc<dyn LocalStub> = Arc::new(ApplicationStub::new(self.me.clone(), generation));
		match attach_application(handle.as_ref(), application, package_name) {
			AttachOutcome::Accepted => {
				debug!(target: "tether.attach", generation, "attach accepted");
			}
			AttachOutcome::Legacy => {
				info!(target: "tether.attach", generation, "server does not know the attach call; using legacy protocol");
				let mut deferred = Vec::new();
				{
					let mut state = self.state.write();
					if state.complete_legacy(generation) {
						let job = self.received_job();
						self.emit(&mut deferred, job);
					}
				}
				self.run_deferred(deferred);
			}
			AttachOutcome::Failed(err) => {
				warn!(target: "tether.attach", generation, error = %err, "attach failed");
				self.state.write().fail_attach(generation);
			}
		}
	}

	pub(crate) fn on_bind_application(&self, generation: u64, data: &Bundle) {
		let (identity, permission) = parse_attach_reply(data);
		let mut deferred = Vec::new();
		{
			let mut state = self.state.write();
			if !state.complete_bind(generation, identity, permission) {
				debug!(target: "tether.attach", generation, "bindApplication for no pending attach; ignored");
				return;
			}
			info!(
				target: "tether.attach",
				generation,
				uid = ?state.identity.uid,
				version = ?state.identity.api_version,
				granted = state.permission.granted,
				"attached"
			);
			let job = self.received_job();
			self.emit(&mut deferred, job);
		}
		self.run_deferred(deferred);
	}

	pub(crate) fn on_permission_result(&self, request_code: i32, allowed: bool) {
		let result = PermissionResult::from_allowed(allowed);
		debug!(target: "tether.session", request_code, ?result, "permission result");
		let job = broadcast_job(
			self.permission.snapshot(),
			self.events.clone(),
			SessionEvent::PermissionResult { request_code, result },
			move |listener| listener(request_code, result),
		);
		self.dispatcher.schedule(job);
	}

	pub(crate) fn on_handle_died(&self, handle: HandleId) {
		let mut deferred = Vec::new();
		{
			let mut link = self.link.lock();
			if link.handle_id() != Some(handle) {
				debug!(target: "tether.session", "death of a replaced handle; ignored");
				return;
			}
			warn!(target: "tether.session", "remote handle died");
			self.teardown(&mut link, &mut deferred);
		}
		self.run_deferred(deferred);
	}

	/// Drops the current handle, forgets every derived fact and schedules one
	/// handle-dead round. Called with the link lock held.
	fn teardown(&self, link: &mut Link, deferred: &mut Vec<Job>) {
		link.detach();
		self.state.write().reset();
		self.registry.forget_registrations();
		let job = broadcast_job(self.dead.snapshot(), self.events.clone(), SessionEvent::HandleDead, |listener| listener());
		self.emit(deferred, job);
		info!(target: "tether.session", "handle torn down");
	}

	fn received_job(&self) -> Job {
		broadcast_job(self.received.snapshot(), self.events.clone(), SessionEvent::HandleReceived, |listener| listener())
	}

	/// Posts `job` right away when off the dispatch thread, so rounds keep the
	/// order of their transitions. On the dispatch thread the job is deferred
	/// until the caller has released its locks.
	fn emit(&self, deferred: &mut Vec<Job>, job: Job) {
		if self.dispatcher.is_dispatch_thread() {
			deferred.push(job);
		} else {
			self.dispatcher.post(job);
		}
	}

	fn run_deferred(&self, deferred: Vec<Job>) {
		for job in deferred {
			self.dispatcher.schedule(job);
		}
	}

	/// Gateway for the current handle and the generation it belongs to.
	fn service(&self) -> Result<(RemoteService, u64)> {
		let link = self.link.lock();
		let handle = link.handle().cloned().ok_or_else(Error::not_connected)?;
		let generation = self.state.read().generation();
		Ok((RemoteService::new(handle), generation))
	}

	/// Returns the cached value, or fetches and caches it.
	fn read_through<T: Clone>(
		&self,
		cached: impl FnOnce(&SessionState) -> Option<T>,
		fetch: impl FnOnce(&RemoteService) -> Result<T>,
		store: impl FnOnce(&mut SessionState, T),
	) -> Result<T> {
		let known = cached(&self.state.read());
		if let Some(value) = known {
			return Ok(value);
		}
		let (service, generation) = self.service()?;
		let value = fetch(&service)?;
		self.state.write().fill(generation, |state| store(state, value.clone()));
		Ok(value)
	}
}

impl Drop for SessionInner {
	fn drop(&mut self) {
		self.link.get_mut().detach();
	}
}

/// Builds one dispatch round over `listeners`, publishing `event` afterwards.
fn broadcast_job<L>(listeners: Snapshot<L>, events: broadcast::Sender<SessionEvent>, event: SessionEvent, call: impl Fn(&L) + Send + 'static) -> Job
where
	L: ?Sized + Send + Sync + 'static,
{
	Box::new(move || {
		for listener in listeners.iter() {
			call(listener.as_ref());
		}
		// No receivers is fine.
		let _ = events.send(event);
	})
}
