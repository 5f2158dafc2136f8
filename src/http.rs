//! Transport primitives shared by the refresher and the REST dispatcher.
//!
//! The module exposes [`HttpTransport`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can plug in custom HTTP clients (or
//! scripted fakes) without losing status reporting. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status is known, so failures surfaced by the
//! `oauth2` token exchange can still be tied to the status that caused them.

pub use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse};

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};
#[cfg(feature = "reqwest")] use crate::config::{SessionConfig, Timeouts};

/// Abstraction over HTTP transports used for broker fetches, token exchanges, and compute
/// API calls.
///
/// The trait is the crate's only dependency on an HTTP stack. Callers provide an
/// implementation (shared behind `Arc<T>`) and the crate requests short-lived
/// [`AsyncHttpClient`] handles that each carry a clone of a [`ResponseMetadataSlot`].
/// Handles must own whatever state they need so their request futures stay `Send` for the
/// lifetime of the in-flight call.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across retries.
	/// - Once an HTTP response provides a status, save it with [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// There is no `Default`: every constructor except [`ReqwestHttpClient::with_client`] applies
/// a [`Timeouts`] set, so a call can never hang on an unbounded client by accident.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client that applies the provided timeouts to every call.
	///
	/// reqwest has no dedicated write bound, so `write` only contributes to the total
	/// per-call deadline (`connect + write + read`).
	pub fn with_timeouts(timeouts: &Timeouts) -> Result<Self, ConfigError> {
		Self::from_builder(ReqwestClient::builder(), timeouts)
	}

	/// Builds a client from the timeouts carried by `config`.
	pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
		Self::with_timeouts(&config.timeouts)
	}

	/// Applies `timeouts` on top of a caller-prepared builder (custom TLS roots, proxies).
	pub fn from_builder(
		builder: reqwest::ClientBuilder,
		timeouts: &Timeouts,
	) -> Result<Self, ConfigError> {
		let client = builder
			.connect_timeout(timeouts.connect)
			.read_timeout(timeouts.read)
			.pool_idle_timeout(timeouts.pool)
			.timeout(timeouts.total())
			.build()?;

		Ok(Self(client))
	}

	/// Builds an instrumented HTTP client that captures response metadata.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

#[cfg(feature = "reqwest")]
/// Instrumented adapter that implements [`AsyncHttpClient`] for reqwest.
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

#[cfg(feature = "reqwest")]
/// Public handle returned by [`ReqwestHttpClient`] that satisfies [`HttpTransport`].
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

/// Sends one request through a fresh handle, mapping transport failures.
pub(crate) async fn execute<C>(
	transport: &C,
	endpoint: &'static str,
	slot: ResponseMetadataSlot,
	request: HttpRequest,
) -> Result<HttpResponse>
where
	C: ?Sized + HttpTransport,
{
	let handle = transport.with_metadata(slot);

	handle.call(request).await.map_err(|err| map_http_client_error(endpoint, err))
}

/// Normalizes [`HttpClientError`] values into crate errors.
pub(crate) fn map_http_client_error<E>(endpoint: &'static str, err: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match err {
		HttpClientError::Reqwest(inner) =>
			TransportError::Network { endpoint, source: inner }.into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { endpoint, message }.into(),
		_ => TransportError::Other { endpoint, message: "unrecognized transport failure".into() }
			.into(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn metadata_slot_is_consumed_on_take() {
		let slot = ResponseMetadataSlot::default();

		slot.store(ResponseMetadata { status: Some(429) });

		assert_eq!(slot.take().and_then(|meta| meta.status), Some(429));
		assert!(slot.take().is_none());
	}

	#[test]
	fn client_errors_map_into_transport_variants() {
		let err = map_http_client_error::<std::io::Error>(
			"compute API",
			HttpClientError::Other("connection reset".into()),
		);

		assert!(matches!(
			err,
			Error::Transport(TransportError::Other { endpoint: "compute API", .. })
		));
		assert!(err.to_string().contains("connection reset"));
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn timeouts_build_a_client() {
		assert!(ReqwestHttpClient::with_timeouts(&Timeouts::default()).is_ok());
	}

	#[cfg(feature = "reqwest")]
	#[tokio::test]
	async fn configured_timeouts_bound_every_call() {
		// Accepts the TCP connection but never answers.
		let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Listener should bind.");
		let addr = listener.local_addr().expect("Listener should have an address.");
		let config = crate::_preludet::session_config().with_timeouts(Timeouts {
			connect: StdDuration::from_millis(50),
			read: StdDuration::from_millis(50),
			write: StdDuration::from_millis(50),
			pool: StdDuration::from_millis(50),
		});
		let client = ReqwestHttpClient::from_config(&config).expect("Client should build.");
		let request = oauth2::http::Request::builder()
			.method(oauth2::http::Method::GET)
			.uri(format!("http://{addr}/v1/slow"))
			.body(Vec::new())
			.expect("Request should build.");
		let started = std::time::Instant::now();
		let err = execute(&client, "compute API", ResponseMetadataSlot::default(), request)
			.await
			.expect_err("A silent server must time out.");

		assert!(matches!(err, Error::Transport(TransportError::Network { .. })));
		assert!(started.elapsed() < StdDuration::from_secs(5));

		drop(listener);
	}
}
