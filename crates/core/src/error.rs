//! Error taxonomy of the session core.

use tether_protocol::{CodecError, ExceptionKind, RemoteException};
use tether_runtime::TransportError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// No handle is current, so no remote call can be made.
	#[error("illegal state: {0}")]
	IllegalState(&'static str),

	/// The handle is absent or the transact mechanism failed.
	#[error("transport failure: {0}")]
	Transport(#[from] TransportError),

	/// The remote service signalled a service-level exception.
	#[error("remote failure ({kind}): {message}")]
	Remote { kind: ExceptionKind, message: String },

	/// The remote side refused the call under its own access control.
	#[error("security failure: {0}")]
	Security(String),

	/// The peer produced a payload this client cannot decode.
	#[error("protocol error: {0}")]
	Protocol(#[from] CodecError),

	#[error("invalid user service arguments: {0}")]
	InvalidArgs(String),

	#[error("invalid config: {0}")]
	Config(String),

	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
}

impl Error {
	pub(crate) fn not_connected() -> Self {
		Self::IllegalState("remote handle has not been received")
	}

	pub fn is_security(&self) -> bool {
		matches!(self, Self::Security(_))
	}

	pub fn is_transport(&self) -> bool {
		matches!(self, Self::Transport(_))
	}

	pub fn is_illegal_state(&self) -> bool {
		matches!(self, Self::IllegalState(_))
	}
}

impl From<RemoteException> for Error {
	fn from(exception: RemoteException) -> Self {
		match exception.kind {
			ExceptionKind::Security => Self::Security(exception.message),
			kind => Self::Remote {
				kind,
				message: exception.message,
			},
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn security_exceptions_get_their_own_variant() {
		let err = Error::from(RemoteException::new(ExceptionKind::Security, "uid 10123 not allowed"));
		assert!(err.is_security());

		let err = Error::from(RemoteException::new(ExceptionKind::IllegalState, "not ready"));
		assert!(matches!(err, Error::Remote { kind: ExceptionKind::IllegalState, .. }));
		assert!(!err.is_security());
	}
}
