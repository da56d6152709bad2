//! What travels between a client session and the privileged server.
//!
//! Every call is one transact on a remote handle: an operation code plus a
//! payload holding a versioned request envelope that names the target
//! interface (see [`envelope`]). The reply carries either a typed body or a
//! [`RemoteException`]. Handles and stubs never appear in the bytes; bodies
//! point at them with an [`ObjectSlot`] into the payload's object table.
//!
//! Codes are only meaningful per interface, so [`opcode`] groups them by
//! descriptor. Loosely typed payloads such as the attach reply and the
//! user-service options use [`Bundle`], read through the names in [`keys`].

pub mod bundle;
pub mod envelope;
pub mod keys;
pub mod messages;
pub mod opcode;
pub mod types;

pub use bundle::*;
pub use envelope::*;
pub use messages::*;
pub use types::*;

/// Latest server API version this protocol revision was written against.
pub const SERVER_VERSION: i32 = 13;
