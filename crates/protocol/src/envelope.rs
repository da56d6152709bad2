//! Versioned request/reply envelope codec.
//!
//! Every transaction payload is a JSON document wrapped in an envelope that
//! names the target interface and the envelope revision:
//!
//! ```json
//! { "interface": "tether.server.IPrivilegedService", "version": 1, "body": { "requestCode": 7 } }
//! ```
//!
//! Replies either carry a body or a service-level exception:
//!
//! ```json
//! { "status": "ok", "body": 2000 }
//! { "status": "exception", "kind": "security", "message": "uid 10123 is not allowed" }
//! ```

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope revision written by this crate.
pub const ENVELOPE_VERSION: u32 = 1;

/// Errors raised while encoding or decoding envelopes.
#[derive(Debug, Error)]
pub enum CodecError {
	#[error("malformed envelope: {0}")]
	Json(#[from] serde_json::Error),

	#[error("interface mismatch: expected {expected}, found {found}")]
	InterfaceMismatch { expected: String, found: String },

	#[error("unsupported envelope version {0}")]
	UnsupportedVersion(u32),

	#[error("object slot {0} missing from parcel")]
	MissingObject(u32),

	#[error("object slot {0} has the wrong kind")]
	WrongObjectKind(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct RequestEnvelope<T> {
	interface: String,
	version: u32,
	body: T,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ReplyEnvelope<T> {
	Ok { body: T },
	Exception { kind: ExceptionKind, message: String },
}

/// Category of a service-level exception signalled in a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
	Security,
	IllegalState,
	IllegalArgument,
	Unsupported,
	#[serde(other)]
	Remote,
}

impl fmt::Display for ExceptionKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Security => "security",
			Self::IllegalState => "illegal_state",
			Self::IllegalArgument => "illegal_argument",
			Self::Unsupported => "unsupported",
			Self::Remote => "remote",
		};
		f.write_str(name)
	}
}

/// Exception carried in a reply envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteException {
	pub kind: ExceptionKind,
	pub message: String,
}

impl RemoteException {
	pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
		}
	}
}

pub fn encode_request<T: Serialize>(interface: &str, body: &T) -> Result<Vec<u8>, CodecError> {
	let envelope = RequestEnvelope {
		interface: interface.to_string(),
		version: ENVELOPE_VERSION,
		body,
	};
	Ok(serde_json::to_vec(&envelope)?)
}

/// Decodes a request, rejecting payloads addressed to another interface.
pub fn decode_request<T: DeserializeOwned>(interface: &str, bytes: &[u8]) -> Result<T, CodecError> {
	let envelope: RequestEnvelope<T> = serde_json::from_slice(bytes)?;
	if envelope.interface != interface {
		return Err(CodecError::InterfaceMismatch {
			expected: interface.to_string(),
			found: envelope.interface,
		});
	}
	if envelope.version > ENVELOPE_VERSION {
		return Err(CodecError::UnsupportedVersion(envelope.version));
	}
	Ok(envelope.body)
}

pub fn encode_reply<T: Serialize>(body: &T) -> Result<Vec<u8>, CodecError> {
	Ok(serde_json::to_vec(&ReplyEnvelope::Ok { body })?)
}

pub fn encode_exception(exception: &RemoteException) -> Result<Vec<u8>, CodecError> {
	let envelope: ReplyEnvelope<()> = ReplyEnvelope::Exception {
		kind: exception.kind,
		message: exception.message.clone(),
	};
	Ok(serde_json::to_vec(&envelope)?)
}

/// Decodes a reply into either its body or the exception the remote signalled.
pub fn decode_reply<T: DeserializeOwned>(bytes: &[u8]) -> Result<Result<T, RemoteException>, CodecError> {
	match serde_json::from_slice::<ReplyEnvelope<T>>(bytes)? {
		ReplyEnvelope::Ok { body } => Ok(Ok(body)),
		ReplyEnvelope::Exception { kind, message } => Ok(Err(RemoteException { kind, message })),
	}
}
