//! Token refresher: the only component that talks to a credential source.
//!
//! [`TokenRefresher::refresh`] performs up to `RefreshPolicy::max_attempts` fetches against
//! its [`CredentialSource`], waiting `backoff_unit * 2^attempt` between failures and never
//! after the last one. Exhaustion surfaces as an [`AuthBrokerError`] carrying the last
//! observed status. A token whose lifetime cannot be used ends the refresh at once with
//! [`RefreshError::Rejected`]. The refresher never touches shared state; the session decides
//! what to do with the bundle it returns.

pub mod broker;

mod metrics;

pub use broker::BrokerAuth;
pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TenantId, TokenBundle},
	config::{BrokerDescriptor, RefreshPolicy},
	error::{AuthBrokerError, RefreshError, TokenResponseError},
	http::HttpTransport,
	oauth::OAuthCredentials,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Where fresh bundles come from.
#[derive(Clone, Debug)]
pub enum CredentialSource {
	/// Identity broker credential document.
	Broker {
		/// Broker endpoint.
		descriptor: BrokerDescriptor,
		/// How the broker authenticates the user.
		auth: BrokerAuth,
	},
	/// OAuth refresh-token exchange.
	OAuth {
		/// Long-lived credentials.
		credentials: OAuthCredentials,
		/// Tenant the minted tokens are billed to.
		tenant: TenantId,
	},
}
impl CredentialSource {
	async fn fetch<C>(
		&self,
		transport: &C,
		subject: &SubjectId,
	) -> Result<TokenBundle, FetchError>
	where
		C: ?Sized + HttpTransport,
	{
		match self {
			Self::Broker { descriptor, auth } =>
				Ok(broker::fetch(transport, descriptor, auth, subject).await?),
			Self::OAuth { credentials, tenant } =>
				credentials.exchange(transport, tenant, subject).await,
		}
	}
}

/// One failed fetch.
#[derive(Clone, Debug)]
pub(crate) struct AttemptFailure {
	pub(crate) status: Option<u16>,
	pub(crate) message: String,
}
impl AttemptFailure {
	pub(crate) fn new(status: Option<u16>, message: impl Into<String>) -> Self {
		Self { status, message: message.into() }
	}
}

/// Why a single fetch produced no bundle.
#[derive(Clone, Debug)]
pub(crate) enum FetchError {
	/// Worth another attempt.
	Retryable(AttemptFailure),
	/// Retrying would get the same answer.
	Fatal(TokenResponseError),
}
impl From<AttemptFailure> for FetchError {
	fn from(failure: AttemptFailure) -> Self {
		Self::Retryable(failure)
	}
}

/// Bounded-retry fetcher of fresh token bundles.
pub struct TokenRefresher<C>
where
	C: ?Sized + HttpTransport,
{
	transport: Arc<C>,
	source: CredentialSource,
	subject: SubjectId,
	policy: RefreshPolicy,
	metrics: Arc<RefreshMetrics>,
}
impl<C> TokenRefresher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a refresher for `subject` backed by `source`.
	pub fn new(
		transport: impl Into<Arc<C>>,
		source: CredentialSource,
		subject: SubjectId,
		policy: RefreshPolicy,
	) -> Self {
		Self {
			transport: transport.into(),
			source,
			subject,
			policy,
			metrics: Arc::new(RefreshMetrics::default()),
		}
	}

	/// Transport shared with the session and dispatcher.
	pub fn transport(&self) -> &Arc<C> {
		&self.transport
	}

	/// Retry schedule and staleness window.
	pub fn policy(&self) -> &RefreshPolicy {
		&self.policy
	}

	/// Subject the minted tokens belong to.
	pub fn subject(&self) -> &SubjectId {
		&self.subject
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Fetches a fresh bundle, retrying failed fetches with exponential backoff.
	pub async fn refresh(&self) -> Result<TokenBundle, RefreshError> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let result = span.instrument(self.fetch_with_retries()).await;

		match &result {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		obs::finish(KIND, result)
	}

	async fn fetch_with_retries(&self) -> Result<TokenBundle, RefreshError> {
		let max_attempts = self.policy.max_attempts.max(1);
		let mut last_status = None;
		let mut attempt = 0;

		loop {
			attempt += 1;
			self.metrics.record_fetch();

			let failure = match self.source.fetch(self.transport.as_ref(), &self.subject).await {
				Ok(bundle) => return Ok(bundle),
				Err(FetchError::Fatal(err)) => return Err(err.into()),
				Err(FetchError::Retryable(failure)) => failure,
			};

			last_status = failure.status.or(last_status);

			if attempt >= max_attempts {
				return Err(AuthBrokerError {
					status: last_status,
					attempts: attempt,
					message: failure.message,
				}
				.into());
			}

			let wait = self.policy.backoff(attempt);

			obs::record_retry(FlowKind::Refresh, attempt, max_attempts, wait);
			tokio::time::sleep(wait).await;
		}
	}
}
impl<C> Debug for TokenRefresher<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenRefresher")
			.field("source", &self.source)
			.field("subject", &self.subject)
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}
