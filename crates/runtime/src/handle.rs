//! Capability handle traits.
//!
//! A [`RemoteHandle`] is the local proxy for an object living in another
//! process. It can die at any time; interested parties learn about it through
//! a [`DeathRecipient`]. A [`LocalStub`] is the reverse direction: an object
//! owned by this process that the peer calls into, on threads owned by the
//! transport.

use std::sync::Arc;

use crate::error::TransportError;
use crate::parcel::Parcel;

/// Result of a transaction that reached the peer.
#[derive(Debug, Clone)]
pub enum Transaction {
	/// The peer handled the code and produced a reply.
	Reply(Parcel),
	/// The peer does not know this code. Older servers answer unknown codes
	/// this way instead of with a decoded reply.
	NotHandled,
}

impl Transaction {
	pub fn into_reply(self, code: u32) -> Result<Parcel, TransportError> {
		match self {
			Self::Reply(parcel) => Ok(parcel),
			Self::NotHandled => Err(TransportError::NotHandled { code }),
		}
	}
}

/// Proxy to an object living on the peer.
pub trait RemoteHandle: Send + Sync {
	/// Performs a blocking round trip.
	///
	/// Fails with [`TransportError`] when the handle is dead or the transport
	/// itself broke; service-level failures travel inside the reply.
	fn transact(&self, code: u32, data: &Parcel, flags: u32) -> Result<Transaction, TransportError>;

	/// Registers `recipient` to be told once when the handle dies.
	///
	/// Implementations must deliver the notification from a thread that does
	/// not hold any caller locks, never from inside this call.
	fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> Result<(), TransportError>;

	/// Removes a recipient registered with [`RemoteHandle::link_to_death`].
	/// Returns `false` if it was not registered.
	fn unlink_to_death(&self, recipient: &Arc<dyn DeathRecipient>) -> bool;

	/// Cheap liveness probe.
	fn ping(&self) -> bool;
}

/// Notified when a linked handle dies.
pub trait DeathRecipient: Send + Sync {
	fn handle_died(&self);
}

/// Object owned by this process and callable by the peer.
pub trait LocalStub: Send + Sync {
	fn on_transact(&self, code: u32, data: &Parcel, flags: u32) -> Transaction;
}

/// Identity of a shared object, independent of its vtable.
///
/// Two `Arc`s have the same id exactly when they point at the same
/// allocation, which is the notion of "same handle" the session relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(usize);

impl HandleId {
	pub fn of<T: ?Sized>(object: &Arc<T>) -> Self {
		Self((Arc::as_ptr(object) as *const ()).addr())
	}
}
