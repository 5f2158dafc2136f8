// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by refreshes, dispatches, and enumerations.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("ee_session.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
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

pub(crate) fn trace_retry(kind: FlowKind, attempt: u32, max_attempts: u32, wait: StdDuration) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			flow = kind.as_str(),
			attempt,
			max_attempts,
			wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
			"scheduling retry"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, attempt, max_attempts, wait);
	}
}

/// Emits a debug event for data the crate deliberately ignored (malformed pages or entries).
pub(crate) fn note_skipped(kind: FlowKind, what: &'static str, reason: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(flow = kind.as_str(), what, %reason, "skipping entry");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, what, reason);
	}
}
