//! Rate-limit aware REST dispatch against the compute API.
//!
//! Every attempt resolves the request's URL template, fetches headers from the session
//! (refreshing the bundle when needed), and sends the request through the session's
//! transport. Only remote errors with code 429 are retried, waiting
//! `min(initial_wait * 2^attempt, max_wait)` between attempts. Every other failure
//! (refresh errors included) reaches the caller unchanged.

pub mod operations;
pub mod outcome;
pub mod request;

pub use operations::{MapId, MapOptions};
pub use outcome::*;
pub use request::*;

// crates.io
use oauth2::http::{
	Request,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	config::{ApiDescriptor, RetryPolicy, SessionConfig},
	error::{ConfigError, RemoteError},
	http::{self, HttpTransport, ResponseMetadataSlot},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::Session,
};

/// Sends [`RestRequest`]s on behalf of a [`Session`].
pub struct RestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	session: Arc<Session<C>>,
	api: ApiDescriptor,
	policy: RetryPolicy,
}
impl<C> RestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a dispatcher with the default retry policy.
	pub fn new(session: Arc<Session<C>>, api: ApiDescriptor) -> Self {
		Self { session, api, policy: RetryPolicy::default() }
	}

	/// Creates a dispatcher using the API base and retry policy from `config`.
	pub fn from_config(session: Arc<Session<C>>, config: &SessionConfig) -> Self {
		Self { session, api: config.api.clone(), policy: config.retry }
	}

	/// Overrides the default retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Session the dispatcher authenticates with.
	pub fn session(&self) -> &Arc<Session<C>> {
		&self.session
	}

	/// Compute API base.
	pub fn api(&self) -> &ApiDescriptor {
		&self.api
	}

	/// Default retry policy.
	pub fn policy(&self) -> &RetryPolicy {
		&self.policy
	}

	/// Sends `request` with the dispatcher's retry policy.
	pub async fn call(&self, request: &RestRequest) -> Result<Value> {
		self.call_with(request, &self.policy).await
	}

	/// Sends `request` with an explicit retry policy.
	pub async fn call_with(&self, request: &RestRequest, policy: &RetryPolicy) -> Result<Value> {
		const KIND: FlowKind = FlowKind::Dispatch;

		let span = FlowSpan::new(KIND, "call");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.dispatch(request, policy)).await;

		obs::finish(KIND, result)
	}

	async fn dispatch(&self, request: &RestRequest, policy: &RetryPolicy) -> Result<Value> {
		let max_attempts = policy.max_attempts.max(1);
		let mut attempt = 0;

		loop {
			let remote = match self.send_once(request).await? {
				RestOutcome::Payload(value) => return Ok(value),
				RestOutcome::Remote(remote) => remote,
			};

			if !remote.is_rate_limited() {
				return Err(remote.into());
			}

			attempt += 1;

			if attempt >= max_attempts {
				return Err(Error::RateLimitExhausted {
					code: RemoteError::RATE_LIMITED,
					attempts: attempt,
				});
			}

			let wait = policy.backoff(attempt);

			obs::record_retry(FlowKind::Dispatch, attempt, max_attempts, wait);
			tokio::time::sleep(wait).await;
		}
	}

	async fn send_once(&self, request: &RestRequest) -> Result<RestOutcome> {
		let tenant = self.session.tenant()?;
		let url = request.resolve(self.api.base_str(), &tenant)?;
		let headers = self.session.headers().await?.to_header_map()?;
		let mut builder = Request::builder()
			.method(request.method.as_http())
			.uri(url.as_str())
			.header(ACCEPT, "application/json");
		let body = match &request.body {
			Some(body) => {
				builder = builder.header(CONTENT_TYPE, "application/json");

				serde_json::to_vec(body).map_err(ConfigError::InvalidBody)?
			},
			None => Vec::new(),
		};
		let mut http_request = builder.body(body).map_err(ConfigError::from)?;

		http_request.headers_mut().extend(headers);

		let response = http::execute(
			self.session.transport().as_ref(),
			"compute API",
			ResponseMetadataSlot::default(),
			http_request,
		)
		.await?;

		Ok(RestOutcome::from_response(&response)?)
	}
}
impl<C> Clone for RestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { session: Arc::clone(&self.session), api: self.api.clone(), policy: self.policy }
	}
}
impl<C> Debug for RestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RestDispatcher")
			.field("api", &self.api)
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}
