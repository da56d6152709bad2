//! Transport-facing runtime for the tether session core.
//!
//! The privileged server is reached through an opaque [`RemoteHandle`]; the
//! server calls back into locally owned [`LocalStub`]s. Both exchange
//! [`Parcel`]s: a byte payload plus a table of object references. Listener
//! delivery is marshalled onto one designated thread by the [`Dispatcher`].

pub mod dispatch;
pub mod error;
pub mod fake;
pub mod handle;
pub mod parcel;

pub use dispatch::{DispatchLoop, Dispatcher};
pub use error::TransportError;
pub use handle::{DeathRecipient, HandleId, LocalStub, RemoteHandle, Transaction};
pub use parcel::{Parcel, ParcelObject};
