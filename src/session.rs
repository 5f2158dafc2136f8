//! Authenticated session: current bundle, request headers, and single-flight refresh.
//!
//! [`Session::headers`] is the hot path. While the bundle has more than the policy's skew
//! left it only takes a read lock. Once the bundle turns stale, the first caller acquires the
//! refresh guard and runs [`TokenRefresher::refresh`]; every caller that observed the same
//! stale bundle queues behind the guard and then takes the recorded outcome of that refresh
//! (the new bundle, or the identical [`RefreshError`]) instead of starting another one.
//! A failed refresh leaves the old bundle in place so the next call tries again.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use oauth2::http::{HeaderMap, HeaderName, HeaderValue, header::AUTHORIZATION};
// self
use crate::{
	_prelude::*,
	auth::{HandshakePayload, SubjectId, TenantId, TokenBundle, TokenSecret},
	config::SessionConfig,
	error::{ConfigError, RefreshError},
	http::HttpTransport,
	oauth::OAuthCredentials,
	refresh::{BrokerAuth, CredentialSource, RefreshMetrics, TokenRefresher},
	store::TokenStore,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport.
pub type ReqwestSession = Session<ReqwestHttpClient>;

/// Headers attached to every compute API call.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeaders {
	/// Tenant billed for the call (`x-goog-user-project`).
	pub user_project: TenantId,
	/// `Bearer <token>` value (`Authorization`).
	pub authorization: TokenSecret,
	/// Subject the token belongs to (`Username`).
	pub username: SubjectId,
}
impl AuthHeaders {
	/// Header naming the billed project.
	pub const USER_PROJECT: &'static str = "x-goog-user-project";
	/// Header naming the subject.
	pub const USERNAME: &'static str = "username";

	/// Derives headers from a bundle.
	pub fn from_bundle(bundle: &TokenBundle) -> Self {
		Self {
			user_project: bundle.tenant_id.clone(),
			authorization: TokenSecret::new(format!("Bearer {}", bundle.access_token.expose())),
			username: bundle.subject.clone(),
		}
	}

	/// Builds an [`HeaderMap`] with the authorization value marked sensitive.
	pub fn to_header_map(&self) -> Result<HeaderMap, ConfigError> {
		let mut headers = HeaderMap::with_capacity(3);
		let mut authorization = HeaderValue::from_str(self.authorization.expose())
			.map_err(|_| ConfigError::InvalidHeader { name: "authorization" })?;

		authorization.set_sensitive(true);
		headers.insert(
			HeaderName::from_static(Self::USER_PROJECT),
			HeaderValue::from_str(&self.user_project)
				.map_err(|_| ConfigError::InvalidHeader { name: Self::USER_PROJECT })?,
		);
		headers.insert(AUTHORIZATION, authorization);
		headers.insert(
			HeaderName::from_static(Self::USERNAME),
			HeaderValue::from_str(&self.username)
				.map_err(|_| ConfigError::InvalidHeader { name: Self::USERNAME })?,
		);

		Ok(headers)
	}
}
impl Debug for AuthHeaders {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthHeaders")
			.field("user_project", &self.user_project)
			.field("authorization", &"Bearer <redacted>")
			.field("username", &self.username)
			.finish()
	}
}

struct RefreshOutcome {
	generation: u64,
	result: Result<TokenBundle, RefreshError>,
}

/// Token session shared (behind `Arc`) by dispatchers and enumerators.
pub struct Session<C>
where
	C: ?Sized + HttpTransport,
{
	store: TokenStore,
	refresher: TokenRefresher<C>,
	generation: AtomicU64,
	flight: AsyncMutex<Option<RefreshOutcome>>,
}
impl<C> Session<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a session from an initial bundle and the refresher that renews it.
	pub fn from_bundle(bundle: TokenBundle, refresher: TokenRefresher<C>) -> Self {
		Self {
			store: TokenStore::new(bundle),
			refresher,
			generation: AtomicU64::new(0),
			flight: AsyncMutex::new(None),
		}
	}

	/// Creates a session from the broker handshake headers.
	///
	/// Later refreshes fetch the broker credential document with the handshake's session
	/// cookie, so `config.broker` must be set.
	pub fn from_handshake(
		transport: impl Into<Arc<C>>,
		payload: &HandshakePayload,
		config: &SessionConfig,
	) -> Result<Self> {
		let handshake = payload.parse()?;
		let descriptor = config.broker.clone().ok_or(ConfigError::MissingBroker)?;
		let source = CredentialSource::Broker {
			descriptor,
			auth: BrokerAuth::SessionCookie(handshake.session_cookie),
		};
		let refresher = TokenRefresher::new(
			transport,
			source,
			handshake.bundle.subject.clone(),
			config.refresh,
		);

		Ok(Self::from_bundle(handshake.bundle, refresher))
	}

	/// Creates a session from long-lived OAuth credentials.
	///
	/// The tenant falls back to the project recorded in the credentials. The initial bundle
	/// comes from one refresh-token exchange; later refreshes repeat the same exchange.
	pub async fn from_oauth_credentials(
		transport: impl Into<Arc<C>>,
		credentials: OAuthCredentials,
		tenant: Option<TenantId>,
		subject: SubjectId,
		config: &SessionConfig,
	) -> Result<Self> {
		let tenant = match tenant {
			Some(tenant) => tenant,
			None => credentials.tenant()?.ok_or(ConfigError::MissingTenant)?,
		};
		let refresher = TokenRefresher::new(
			transport,
			CredentialSource::OAuth { credentials, tenant },
			subject,
			config.refresh,
		);
		let bundle = refresher.refresh().await?;

		Ok(Self::from_bundle(bundle, refresher))
	}

	/// Returns headers for the next call, refreshing first when the bundle is stale.
	pub async fn headers(&self) -> Result<AuthHeaders> {
		let observed = self.generation.load(Ordering::Acquire);
		let bundle = self.store.current()?;

		if !bundle.is_stale_at(OffsetDateTime::now_utc(), self.refresher.policy().skew) {
			return Ok(AuthHeaders::from_bundle(&bundle));
		}

		let bundle = self.refresh_after(observed, false).await?;

		Ok(AuthHeaders::from_bundle(&bundle))
	}

	/// Returns headers for the current bundle without checking staleness.
	pub fn current_headers(&self) -> Result<AuthHeaders> {
		Ok(AuthHeaders::from_bundle(&self.store.current()?))
	}

	/// Refreshes regardless of staleness; concurrent callers still share one refresh.
	pub async fn force_refresh(&self) -> Result<TokenBundle> {
		let observed = self.generation.load(Ordering::Acquire);

		self.refresh_after(observed, true).await
	}

	/// Clone of the current bundle.
	pub fn bundle(&self) -> Result<TokenBundle> {
		Ok(self.store.current()?)
	}

	/// Tenant the current bundle is billed to.
	pub fn tenant(&self) -> Result<TenantId> {
		Ok(self.store.current()?.tenant_id)
	}

	/// Transport shared with the refresher.
	pub fn transport(&self) -> &Arc<C> {
		self.refresher.transport()
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		self.refresher.metrics()
	}

	async fn refresh_after(&self, observed: u64, force: bool) -> Result<TokenBundle> {
		let mut flight = self.flight.lock().await;

		if let Some(outcome) = flight.as_ref().filter(|outcome| outcome.generation > observed) {
			return outcome.result.clone().map_err(Error::from);
		}
		if !force {
			let current = self.store.current()?;

			if !current.is_stale_at(OffsetDateTime::now_utc(), self.refresher.policy().skew) {
				return Ok(current);
			}
		}

		let result = self.refresher.refresh().await;

		if let Ok(bundle) = &result {
			self.store.replace(bundle.clone());
		}

		let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;

		*flight = Some(RefreshOutcome { generation, result: result.clone() });

		result.map_err(Error::from)
	}
}
impl<C> Debug for Session<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("store", &self.store)
			.field("refresher", &self.refresher)
			.field("generation", &self.generation.load(Ordering::Relaxed))
			.finish_non_exhaustive()
	}
}
