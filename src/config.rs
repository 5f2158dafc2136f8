//! Session configuration: endpoints, transport timeouts, and retry schedules.
//!
//! `endpoint` validates the compute API base and the identity broker credential URL
//! (HTTPS-only unless a descriptor is built through its insecure constructor).
//! `policy` carries the timeouts and the two independent retry schedules: the refresher's
//! `2^attempt` backoff and the dispatcher's capped rate-limit backoff. The schedules are
//! not coordinated, so one dispatch can trigger up to
//! `refresh.max_attempts * retry.max_attempts` outbound calls in the worst case.

pub mod endpoint;
pub mod policy;

pub use endpoint::*;
pub use policy::*;

/// Everything a session needs besides credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
	/// Compute API base URL.
	pub api: ApiDescriptor,
	/// Identity broker, required for handshake-based sessions.
	pub broker: Option<BrokerDescriptor>,
	/// Transport timeouts.
	pub timeouts: Timeouts,
	/// Rate-limit retry schedule.
	pub retry: RetryPolicy,
	/// Token refresh schedule.
	pub refresh: RefreshPolicy,
}
impl SessionConfig {
	/// Creates a configuration with default timeouts and retry schedules.
	pub fn new(api: ApiDescriptor) -> Self {
		Self {
			api,
			broker: None,
			timeouts: Timeouts::default(),
			retry: RetryPolicy::default(),
			refresh: RefreshPolicy::default(),
		}
	}

	/// Sets the identity broker.
	pub fn with_broker(mut self, broker: BrokerDescriptor) -> Self {
		self.broker = Some(broker);

		self
	}

	/// Overrides transport timeouts.
	pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
		self.timeouts = timeouts;

		self
	}

	/// Overrides the rate-limit retry schedule.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Overrides the refresh schedule.
	pub fn with_refresh_policy(mut self, refresh: RefreshPolicy) -> Self {
		self.refresh = refresh;

		self
	}
}
