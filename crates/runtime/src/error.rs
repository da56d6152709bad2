use thiserror::Error;

/// Failures of the transact mechanism itself, as opposed to exceptions the
/// remote service signals inside a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	#[error("remote handle is dead")]
	DeadObject,

	#[error("transaction code {code} not handled by remote")]
	NotHandled { code: u32 },

	#[error("transaction failed: {0}")]
	Failed(String),
}
