//! Helpers shared by the stubs the server calls back into.

use serde::de::DeserializeOwned;
use tether_protocol::{ExceptionKind, RemoteException, decode_request, encode_exception, encode_reply};
use tether_runtime::{Parcel, Transaction};
use tracing::warn;

/// Decodes an inbound request, answering malformed payloads with an exception reply.
pub(crate) fn decode<T: DeserializeOwned>(interface: &str, code: u32, data: &Parcel) -> Result<T, Transaction> {
	decode_request(interface, &data.data).map_err(|err| {
		warn!(target: "tether.session", interface, code, error = %err, "malformed inbound call");
		exception(ExceptionKind::IllegalArgument, &err.to_string())
	})
}

pub(crate) fn empty_reply() -> Transaction {
	match encode_reply(&()) {
		Ok(bytes) => Transaction::Reply(Parcel::new(bytes)),
		Err(err) => {
			warn!(target: "tether.session", error = %err, "failed to encode reply");
			Transaction::Reply(Parcel::default())
		}
	}
}

fn exception(kind: ExceptionKind, message: &str) -> Transaction {
	match encode_exception(&RemoteException::new(kind, message)) {
		Ok(bytes) => Transaction::Reply(Parcel::new(bytes)),
		Err(_) => Transaction::Reply(Parcel::default()),
	}
}
