// self
use crate::{_prelude::*, obs::Operation};

/// Future wrapped in the operation span.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// The future itself; nothing wraps it without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// Span covering one token fetch or one call, including its retry.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Opens the span for `operation`; `stage` is the HTTP verb or the fetch name.
	pub fn new(operation: Operation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"service_connection.operation",
				operation = operation.as_str(),
				stage
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, stage);

			Self {}
		}
	}

	/// Runs `fut` inside the span.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when a rejected talking token is about to be renewed.
///
/// Only the token fingerprint is logged, never the token itself.
pub fn record_renewal(code: &str, rejected_fingerprint: &str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(code, rejected_fingerprint, "called service rejected talking token");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (code, rejected_fingerprint);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_output_through() {
		let span = OperationSpan::new(Operation::Call, "instrument_passes_output_through");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}

	#[test]
	fn record_renewal_accepts_fingerprints() {
		record_renewal("invalid_token", "fingerprint");
	}
}
