//! In-memory transport for unit testing the session layer.
//!
//! A [`FakeHandle`] wraps a [`LocalStub`] standing in for the remote object:
//! transactions are delivered straight to the stub on the caller's thread.
//! The handle records every transaction code and can be killed to exercise
//! death notification.
//!
//! # Example
//!
//! ```ignore
//! let handle = FakeHandle::new(Arc::new(ScriptedServer::modern()));
//! session.supply_handle(Some(handle.clone()), "com.example");
//! assert_eq!(handle.count(service::ATTACH_APPLICATION), 1);
//! handle.kill();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::handle::{DeathRecipient, HandleId, LocalStub, RemoteHandle, Transaction};
use crate::parcel::Parcel;

/// Handle whose remote side is an in-process stub.
pub struct FakeHandle {
	stub: Arc<dyn LocalStub>,
	alive: AtomicBool,
	refuse_death_links: AtomicBool,
	recipients: Mutex<Vec<Arc<dyn DeathRecipient>>>,
	calls: Mutex<Vec<u32>>,
}

impl FakeHandle {
	pub fn new(stub: Arc<dyn LocalStub>) -> Arc<Self> {
		Arc::new(Self {
			stub,
			alive: AtomicBool::new(true),
			refuse_death_links: AtomicBool::new(false),
			recipients: Mutex::new(Vec::new()),
			calls: Mutex::new(Vec::new()),
		})
	}

	/// Same as [`FakeHandle::new`], typed as a trait object.
	pub fn new_dyn(stub: Arc<dyn LocalStub>) -> Arc<dyn RemoteHandle> {
		Self::new(stub)
	}

	/// Marks the handle dead and notifies every linked recipient on the
	/// calling thread.
	pub fn kill(&self) {
		if !self.alive.swap(false, Ordering::SeqCst) {
			return;
		}
		let recipients = std::mem::take(&mut *self.recipients.lock());
		for recipient in recipients {
			recipient.handle_died();
		}
	}

	/// Makes subsequent `link_to_death` calls fail.
	pub fn refuse_death_links(&self) {
		self.refuse_death_links.store(true, Ordering::SeqCst);
	}

	/// Transaction codes received so far, in order.
	pub fn calls(&self) -> Vec<u32> {
		self.calls.lock().clone()
	}

	/// Number of transactions received with `code`.
	pub fn count(&self, code: u32) -> usize {
		self.calls.lock().iter().filter(|c| **c == code).count()
	}

	pub fn linked_recipients(&self) -> usize {
		self.recipients.lock().len()
	}
}

impl RemoteHandle for FakeHandle {
	fn transact(&self, code: u32, data: &Parcel, flags: u32) -> Result<Transaction, TransportError> {
		if !self.alive.load(Ordering::SeqCst) {
			return Err(TransportError::DeadObject);
		}
		self.calls.lock().push(code);
		Ok(self.stub.on_transact(code, data, flags))
	}

	fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> Result<(), TransportError> {
		if !self.alive.load(Ordering::SeqCst) {
			return Err(TransportError::DeadObject);
		}
		if self.refuse_death_links.load(Ordering::SeqCst) {
			return Err(TransportError::Failed("death links refused".to_string()));
		}
		self.recipients.lock().push(recipient);
		Ok(())
	}

	fn unlink_to_death(&self, recipient: &Arc<dyn DeathRecipient>) -> bool {
		let target = HandleId::of(recipient);
		let mut recipients = self.recipients.lock();
		let before = recipients.len();
		recipients.retain(|r| HandleId::of(r) != target);
		recipients.len() != before
	}

	fn ping(&self) -> bool {
		self.alive.load(Ordering::SeqCst)
	}
}
