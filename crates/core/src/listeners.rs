//! Listener sets and session events.
//!
//! Sets are copy-on-write: dispatch iterates an immutable snapshot, so
//! listeners may be added or removed from any thread, including from inside a
//! listener, without disturbing a round already in flight. A listener added
//! after the snapshot is not part of that round; one removed before the round
//! reaches it is skipped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tether_protocol::PermissionResult;
use tether_runtime::HandleId;

/// Called on the dispatch thread once a handle is attached and ready.
pub type HandleReceivedListener = dyn Fn() + Send + Sync;

/// Called on the dispatch thread when the current handle is gone.
pub type HandleDeadListener = dyn Fn() + Send + Sync;

/// Called on the dispatch thread with the request code and outcome of a
/// permission request.
pub type PermissionResultListener = dyn Fn(i32, PermissionResult) + Send + Sync;

/// Token returned on registration, used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Events delivered to listeners, also published on [`Session::subscribe`](crate::Session::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
	HandleReceived,
	HandleDead,
	PermissionResult { request_code: i32, result: PermissionResult },
}

type Entries<L> = Arc<Vec<(ListenerId, Arc<L>)>>;

/// Ordered, mutation-safe set of listeners.
pub(crate) struct ListenerSet<L: ?Sized> {
	next_id: AtomicU64,
	entries: Arc<Mutex<Entries<L>>>,
}

impl<L: ?Sized> ListenerSet<L> {
	pub(crate) fn new() -> Self {
		Self {
			next_id: AtomicU64::new(0),
			entries: Arc::new(Mutex::new(Arc::new(Vec::new()))),
		}
	}

	pub(crate) fn add(&self, listener: Arc<L>) -> ListenerId {
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		Arc::make_mut(&mut self.entries.lock()).push((id, listener));
		id
	}

	/// Adds `listener` unless the same object is already present.
	pub(crate) fn insert_unique(&self, listener: Arc<L>) -> bool {
		let target = HandleId::of(&listener);
		let mut entries = self.entries.lock();
		if entries.iter().any(|(_, l)| HandleId::of(l) == target) {
			return false;
		}
		let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
		Arc::make_mut(&mut entries).push((id, listener));
		true
	}

	pub(crate) fn remove(&self, id: ListenerId) -> bool {
		self.retain(|entry_id, _| *entry_id != id)
	}

	/// Removes the entry holding exactly this object.
	pub(crate) fn remove_object(&self, listener: &Arc<L>) -> bool {
		let target = HandleId::of(listener);
		self.retain(|_, l| HandleId::of(l) != target)
	}

	fn retain(&self, keep: impl Fn(&ListenerId, &Arc<L>) -> bool) -> bool {
		let mut entries = self.entries.lock();
		if entries.iter().all(|(id, l)| keep(id, l)) {
			return false;
		}
		Arc::make_mut(&mut entries).retain(|(id, l)| keep(id, l));
		true
	}

	pub(crate) fn snapshot(&self) -> Snapshot<L> {
		Snapshot {
			taken: Arc::clone(&self.entries.lock()),
			live: Arc::clone(&self.entries),
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.entries.lock().len()
	}
}

/// Listeners registered at the moment the snapshot was taken, in registration order.
pub(crate) struct Snapshot<L: ?Sized> {
	taken: Entries<L>,
	live: Arc<Mutex<Entries<L>>>,
}

impl<L: ?Sized> Snapshot<L> {
	/// Walks the snapshot, skipping entries no longer registered when reached.
	/// The set's lock is released before each listener is yielded.
	pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<L>> {
		self.taken.iter().filter(|(id, _)| self.is_registered(*id)).map(|(_, listener)| listener)
	}

	fn is_registered(&self, id: ListenerId) -> bool {
		self.live.lock().iter().any(|(entry_id, _)| *entry_id == id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	type Probe = dyn Fn() -> u32 + Send + Sync;

	fn probe(value: u32) -> Arc<Probe> {
		Arc::new(move || value)
	}

	#[test]
	fn snapshot_preserves_registration_order() {
		let set = ListenerSet::<Probe>::new();
		set.add(probe(1));
		set.add(probe(2));
		set.add(probe(3));

		let values: Vec<u32> = set.snapshot().iter().map(|l| l()).collect();
		assert_eq!(values, vec![1, 2, 3]);
	}

	#[test]
	fn mutation_does_not_disturb_snapshot_in_flight() {
		let set = ListenerSet::<Probe>::new();
		let first = set.add(probe(1));
		set.add(probe(2));

		let snapshot = set.snapshot();
		let mut seen = Vec::new();
		for listener in snapshot.iter() {
			seen.push(listener());
			set.remove(first);
			set.add(probe(9));
		}

		assert_eq!(seen, vec![1, 2]);
		let after: Vec<u32> = set.snapshot().iter().map(|l| l()).collect();
		assert_eq!(after, vec![2, 9, 9]);
	}

	#[test]
	fn listener_removed_after_snapshot_is_skipped() {
		let set = ListenerSet::<Probe>::new();
		let first = set.add(probe(1));
		let second = set.add(probe(2));
		set.add(probe(3));

		let snapshot = set.snapshot();
		set.remove(first);
		set.add(probe(4));

		let mut seen = Vec::new();
		for listener in snapshot.iter() {
			seen.push(listener());
			set.remove(second);
		}
		assert_eq!(seen, vec![2, 3]);
	}

	#[test]
	fn remove_reports_presence() {
		let set = ListenerSet::<Probe>::new();
		let id = set.add(probe(1));
		assert!(set.remove(id));
		assert!(!set.remove(id));
		assert_eq!(set.len(), 0);
	}

	#[test]
	fn insert_unique_is_identity_based() {
		let set = ListenerSet::<Probe>::new();
		let a = probe(1);
		let b = probe(1);

		assert!(set.insert_unique(Arc::clone(&a)));
		assert!(!set.insert_unique(Arc::clone(&a)));
		assert!(set.insert_unique(Arc::clone(&b)));
		assert!(set.remove_object(&a));
		assert!(!set.remove_object(&a));
		assert_eq!(set.len(), 1);
	}
}
