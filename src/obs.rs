//! Hooks that report what a connection does with its talking tokens and calls.
//!
//! A connection performs two kinds of work: fetching a talking token from the authorizator and
//! calling the called service. Both report through this module, and both hooks vanish when their
//! feature is off.
//!
//! With `tracing`, each fetch and call runs inside a `service_connection.operation` span whose
//! `stage` names the token fetch or the HTTP verb. A renewal after a rejection is logged at debug
//! level with the rejected token's fingerprint.
//!
//! With `metrics`, the `service_connection_operation_total` counter is labeled by `operation` and
//! `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Kind of work a connection reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Talking token fetch from the authorizator.
	Fetch,
	/// Call to the called service, including its possible retry.
	Call,
}
impl Operation {
	/// Label used in span fields and metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Fetch => "fetch",
			Operation::Call => "call",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Where an operation ended up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationOutcome {
	/// The operation started.
	Attempt,
	/// A token was stored or the called service accepted the call.
	Success,
	/// A rejected talking token was dropped and the call retried.
	Renewal,
	/// The caller received an error.
	Failure,
}
impl OperationOutcome {
	/// Label used in span fields and metric labels.
	pub const fn as_str(self) -> &'static str {
		match self {
			OperationOutcome::Attempt => "attempt",
			OperationOutcome::Success => "success",
			OperationOutcome::Renewal => "renewal",
			OperationOutcome::Failure => "failure",
		}
	}
}
impl Display for OperationOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
