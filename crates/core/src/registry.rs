//! Sub-connection registry.
//!
//! One record per [`UserServiceKey`], shared by every local subscriber bound
//! to that key. A record is registered with the server once per primary
//! handle; connect and disconnect events from the server fan out to the
//! record's subscribers in registration order on the dispatch thread.
//!
//! Records are only evicted by an explicit removal. A remote death of the
//! user service keeps the record, since the server may bring it back.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tether_protocol::opcode::connection;
use tether_protocol::{ComponentName, ServiceConnected};
use tether_runtime::{Dispatcher, HandleId, LocalStub, Parcel, RemoteHandle, Transaction};
use tracing::{debug, info};

use crate::error::Result;
use crate::gateway::RemoteService;
use crate::inbound;
use crate::listeners::ListenerSet;
use crate::user_service::{ServiceConnection, UserServiceArgs, UserServiceKey};

pub(crate) struct UserServiceRegistry {
	records: Mutex<HashMap<UserServiceKey, Arc<SubConnection>>>,
	dispatcher: Dispatcher,
}

impl UserServiceRegistry {
	pub(crate) fn new(dispatcher: Dispatcher) -> Self {
		Self {
			records: Mutex::new(HashMap::new()),
			dispatcher,
		}
	}

	/// Subscribes `subscriber` to the service described by `args`, registering
	/// the record with the server if it is not yet registered with this handle.
	pub(crate) fn bind(&self, args: &UserServiceArgs, subscriber: Arc<dyn ServiceConnection>, service: &RemoteService) -> Result<()> {
		let key = args.key();
		let record = {
			let mut records = self.records.lock();
			let record = records
				.entry(key.clone())
				.or_insert_with(|| SubConnection::new(args.component().clone(), self.dispatcher.clone()));
			Arc::clone(record)
		};

		let added = record.subscribers.insert_unique(Arc::clone(&subscriber));
		let handle_id = HandleId::of(service.handle());
		if record.claim_registration(handle_id) {
			let stub: Arc<dyn LocalStub> = Arc::clone(&record.stub) as Arc<dyn LocalStub>;
			match service.add_user_service(stub, args.add_options()) {
				Ok(status) => {
					info!(target: "tether.registry", component = %key.component, tag = ?key.tag, status, "user service registered");
				}
				Err(err) => {
					record.release_registration(handle_id);
					if added {
						record.subscribers.remove_object(&subscriber);
					}
					return Err(err);
				}
			}
		} else if added {
			if let Some(live) = record.live_service() {
				debug!(target: "tether.registry", component = %key.component, "replaying connect to late subscriber");
				let component = record.component.clone();
				self.dispatcher.schedule(move || subscriber.on_service_connected(&component, live));
			}
		}
		Ok(())
	}

	/// Removes `subscriber` from the record for `key`. No-op when either is absent.
	pub(crate) fn unsubscribe(&self, key: &UserServiceKey, subscriber: &Arc<dyn ServiceConnection>) -> bool {
		let record = self.records.lock().get(key).cloned();
		record.is_some_and(|record| record.subscribers.remove_object(subscriber))
	}

	/// Asks the server to remove the service and evicts the local record,
	/// whatever the number of remaining subscribers.
	pub(crate) fn remove(&self, args: &UserServiceArgs, service: &RemoteService) -> Result<()> {
		let status = service.remove_user_service(args.remove_options())?;
		let key = args.key();
		info!(target: "tether.registry", component = %key.component, tag = ?key.tag, status, "user service removed");

		let evicted = self.records.lock().remove(&key);
		if let Some(record) = evicted {
			if record.take_service().is_some() {
				record.fan_out_disconnected();
			}
		}
		Ok(())
	}

	/// Forgets which handle each record was registered with, so the next bind
	/// after a new handle registers again. Subscribers are kept.
	pub(crate) fn forget_registrations(&self) {
		for record in self.records.lock().values() {
			*record.registered_with.lock() = None;
		}
	}

	pub(crate) fn keys(&self) -> Vec<UserServiceKey> {
		self.records.lock().keys().cloned().collect()
	}
}

/// Local state for one user service key.
struct SubConnection {
	component: ComponentName,
	subscribers: ListenerSet<dyn ServiceConnection>,
	/// Owned by the server side; only observed here.
	service: Mutex<Option<Weak<dyn RemoteHandle>>>,
	registered_with: Mutex<Option<HandleId>>,
	stub: Arc<ConnectionStub>,
	dispatcher: Dispatcher,
}

impl SubConnection {
	fn new(component: ComponentName, dispatcher: Dispatcher) -> Arc<Self> {
		Arc::new_cyclic(|record| Self {
			component,
			subscribers: ListenerSet::new(),
			service: Mutex::new(None),
			registered_with: Mutex::new(None),
			stub: Arc::new(ConnectionStub { record: record.clone() }),
			dispatcher,
		})
	}

	/// Returns `true` if the caller must issue the remote add for `handle`.
	fn claim_registration(&self, handle: HandleId) -> bool {
		let mut registered = self.registered_with.lock();
		if *registered == Some(handle) {
			return false;
		}
		*registered = Some(handle);
		true
	}

	fn release_registration(&self, handle: HandleId) {
		let mut registered = self.registered_with.lock();
		if *registered == Some(handle) {
			*registered = None;
		}
	}

	fn live_service(&self) -> Option<Arc<dyn RemoteHandle>> {
		self.service.lock().as_ref().and_then(Weak::upgrade)
	}

	fn take_service(&self) -> Option<Weak<dyn RemoteHandle>> {
		self.service.lock().take()
	}

	fn on_connected(&self, service: Arc<dyn RemoteHandle>) {
		*self.service.lock() = Some(Arc::downgrade(&service));
		let subscribers = self.subscribers.snapshot();
		let component = self.component.clone();
		debug!(target: "tether.registry", component = %component, subscribers = self.subscribers.len(), "user service connected");
		self.dispatcher.schedule(move || {
			for subscriber in subscribers.iter() {
				subscriber.on_service_connected(&component, Arc::clone(&service));
			}
		});
	}

	fn on_died(&self) {
		self.take_service();
		debug!(target: "tether.registry", component = %self.component, "user service died");
		self.fan_out_disconnected();
	}

	fn fan_out_disconnected(&self) {
		let subscribers = self.subscribers.snapshot();
		let component = self.component.clone();
		self.dispatcher.schedule(move || {
			for subscriber in subscribers.iter() {
				subscriber.on_service_disconnected(&component);
			}
		});
	}
}

/// Stub handed to the server with the add call; receives that service's events.
struct ConnectionStub {
	record: Weak<SubConnection>,
}

impl LocalStub for ConnectionStub {
	fn on_transact(&self, code: u32, data: &Parcel, _flags: u32) -> Transaction {
		let Some(record) = self.record.upgrade() else {
			debug!(target: "tether.registry", code, "event for evicted user service ignored");
			return inbound::empty_reply();
		};
		match code {
			connection::CONNECTED => {
				let request: ServiceConnected = match inbound::decode(connection::DESCRIPTOR, code, data) {
					Ok(request) => request,
					Err(reply) => return reply,
				};
				match data.handle(request.service.index()) {
					Some(service) => record.on_connected(Arc::clone(service)),
					None => debug!(target: "tether.registry", component = %record.component, "connect event without a service handle"),
				}
				inbound::empty_reply()
			}
			connection::DIED => {
				record.on_died();
				inbound::empty_reply()
			}
			_ => Transaction::NotHandled,
		}
	}
}
