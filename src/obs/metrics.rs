// self
use crate::obs::{Operation, OperationOutcome};

/// Bumps `service_connection_operation_total` for `operation` and `outcome`.
///
/// Does nothing without the `metrics` feature or an installed recorder.
pub fn record_operation_outcome(operation: Operation, outcome: OperationOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"service_connection_operation_total",
			"operation" => operation.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (operation, outcome);
	}
}
