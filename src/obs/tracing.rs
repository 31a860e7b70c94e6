// self
use crate::{_prelude::*, obs::CallLabels};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedCall<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedCall<F> = F;

/// Span wrapping one endpoint execution.
#[derive(Clone, Debug)]
pub struct CallSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl CallSpan {
	/// Creates a `rest_broker.call` span tagged with the call labels.
	pub fn new(labels: &CallLabels) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::debug_span!(
				"rest_broker.call",
				domain = %labels.domain,
				method = %labels.method,
				path = %labels.path
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = labels;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedCall<Fut>
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
