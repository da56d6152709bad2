//! Transaction payloads.

use std::fmt;
use std::sync::Arc;

use crate::handle::{LocalStub, RemoteHandle};

/// An object reference travelling alongside a parcel's bytes.
#[derive(Clone)]
pub enum ParcelObject {
	/// A locally owned stub exported to the peer.
	Stub(Arc<dyn LocalStub>),
	/// A handle to an object living on the peer.
	Handle(Arc<dyn RemoteHandle>),
}

impl fmt::Debug for ParcelObject {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Stub(_) => f.write_str("ParcelObject::Stub"),
			Self::Handle(_) => f.write_str("ParcelObject::Handle"),
		}
	}
}

/// Byte payload plus an ordered object table.
///
/// The payload refers to objects by their index in [`Parcel::objects`].
#[derive(Debug, Clone, Default)]
pub struct Parcel {
	pub data: Vec<u8>,
	pub objects: Vec<ParcelObject>,
}

impl Parcel {
	pub fn new(data: Vec<u8>) -> Self {
		Self { data, objects: Vec::new() }
	}

	pub fn with_objects(data: Vec<u8>, objects: Vec<ParcelObject>) -> Self {
		Self { data, objects }
	}

	pub fn stub(&self, index: usize) -> Option<&Arc<dyn LocalStub>> {
		match self.objects.get(index) {
			Some(ParcelObject::Stub(stub)) => Some(stub),
			_ => None,
		}
	}

	pub fn handle(&self, index: usize) -> Option<&Arc<dyn RemoteHandle>> {
		match self.objects.get(index) {
			Some(ParcelObject::Handle(handle)) => Some(handle),
			_ => None,
		}
	}
}
