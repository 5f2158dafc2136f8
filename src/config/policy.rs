//! Timeout and retry knobs for the transport, the refresher, and the dispatcher.

// self
use crate::_prelude::*;

/// Per-call transport timeouts.
///
/// Compute operations can run for minutes, so the read bound is much larger than the rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
	/// Connection establishment bound.
	pub connect: StdDuration,
	/// Bound on waiting for response bytes.
	pub read: StdDuration,
	/// Bound on sending the request body.
	pub write: StdDuration,
	/// How long idle pooled connections are kept.
	pub pool: StdDuration,
}
impl Timeouts {
	/// Upper bound for one whole call: connect, write, then read.
	pub fn total(&self) -> StdDuration {
		self.connect.saturating_add(self.write).saturating_add(self.read)
	}
}
impl Default for Timeouts {
	fn default() -> Self {
		Self {
			connect: StdDuration::from_secs(60),
			read: StdDuration::from_secs(300),
			write: StdDuration::from_secs(60),
			pool: StdDuration::from_secs(60),
		}
	}
}

/// Rate-limit retry schedule used by the REST dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total HTTP calls allowed for one request while the API keeps answering 429.
	pub max_attempts: u32,
	/// Base wait, doubled per attempt.
	pub initial_wait: StdDuration,
	/// Ceiling for a single wait.
	pub max_wait: StdDuration,
}
impl RetryPolicy {
	/// Creates a policy with explicit bounds.
	pub fn new(max_attempts: u32, initial_wait: StdDuration, max_wait: StdDuration) -> Self {
		Self { max_attempts, initial_wait, max_wait }
	}

	/// Wait before the retry that follows the `attempt`-th rate-limited call:
	/// `min(initial_wait * 2^attempt, max_wait)`.
	pub fn backoff(&self, attempt: u32) -> StdDuration {
		exponential(self.initial_wait, attempt).min(self.max_wait)
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(5, StdDuration::from_secs(1), StdDuration::from_secs(60))
	}
}

/// Bounded retry schedule and staleness window for token refreshes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
	/// Total credential fetches per refresh.
	pub max_attempts: u32,
	/// Unit multiplied by `2^attempt` between failed fetches.
	pub backoff_unit: StdDuration,
	/// A bundle with less than this much life left is refreshed.
	pub skew: Duration,
}
impl RefreshPolicy {
	/// Wait after the `attempt`-th failed fetch.
	pub fn backoff(&self, attempt: u32) -> StdDuration {
		exponential(self.backoff_unit, attempt)
	}

	/// Overrides the attempt budget.
	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = max_attempts;

		self
	}

	/// Overrides the backoff unit.
	pub fn with_backoff_unit(mut self, unit: StdDuration) -> Self {
		self.backoff_unit = unit;

		self
	}

	/// Overrides the staleness window; negative values clamp to zero.
	pub fn with_skew(mut self, skew: Duration) -> Self {
		self.skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}
}
impl Default for RefreshPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			backoff_unit: StdDuration::from_secs(1),
			skew: Duration::seconds(60),
		}
	}
}

fn exponential(unit: StdDuration, attempt: u32) -> StdDuration {
	if unit.is_zero() {
		return StdDuration::ZERO;
	}

	2_u32
		.checked_pow(attempt)
		.and_then(|factor| unit.checked_mul(factor))
		.unwrap_or(StdDuration::MAX)
}
