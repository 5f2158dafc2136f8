//! Optional observability helpers for refreshes, dispatches, and enumerations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `ee_session.flow` with the `flow` and
//!   `stage` (call site) fields, plus debug events for retries and skipped tree entries.
//! - Enable `metrics` to increment the `ee_session_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and `ee_session_retry_total`
//!   for every scheduled retry.
//!
//! Secrets never reach either sink; only labels, counters, and durations do.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Token refresh against the broker or token endpoint.
	Refresh,
	/// One REST dispatch, including rate-limit retries.
	Dispatch,
	/// Asset tree enumeration.
	Enumerate,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Refresh => "refresh",
			FlowKind::Dispatch => "dispatch",
			FlowKind::Enumerate => "enumerate",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// A retry was scheduled after a retryable failure.
	Retry,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
			FlowOutcome::Retry => "retry",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records a scheduled retry: a debug event when tracing is enabled and a counter bump when
/// metrics are enabled.
pub fn record_retry(kind: FlowKind, attempt: u32, max_attempts: u32, wait: StdDuration) {
	trace_retry(kind, attempt, max_attempts, wait);
	count_retry(kind);
	record_flow_outcome(kind, FlowOutcome::Retry);
}

/// Completes a flow: records success or failure for `result` and hands it back.
pub(crate) fn finish<T, E>(kind: FlowKind, result: Result<T, E>) -> Result<T, E> {
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	record_flow_outcome(kind, outcome);

	result
}
