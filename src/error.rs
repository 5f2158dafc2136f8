//! Session-level error types shared by the refresher, dispatcher, and enumerator.

// self
use crate::{_prelude::*, auth::IdentifierError, config::EndpointError};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Missing or invalid construction input; never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identity broker stayed unreachable or kept rejecting credentials.
	#[error(transparent)]
	AuthBroker(#[from] AuthBrokerError),
	/// Compute API rejected the call for a non rate-limit reason.
	#[error(transparent)]
	Remote(#[from] RemoteError),
	/// Compute API kept answering 429 through every retry attempt.
	#[error("Rate limit persisted after {attempts} attempts (code {code}).")]
	RateLimitExhausted {
		/// Remote status code, always 429.
		code: i64,
		/// Number of HTTP calls issued before giving up.
		attempts: u32,
	},
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Successful response carried a body that could not be decoded.
	#[error(transparent)]
	Decode(#[from] DecodeError),
}
impl Error {
	/// Remote status code carried by the error, when the compute API produced one.
	pub fn remote_code(&self) -> Option<i64> {
		match self {
			Self::Remote(remote) => Some(remote.code),
			Self::RateLimitExhausted { code, .. } => Some(*code),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Endpoint descriptor is invalid.
	#[error(transparent)]
	Endpoint(#[from] EndpointError),
	/// Identifier validation failed.
	#[error(transparent)]
	Identifier(#[from] IdentifierError),
	/// The token store has not been seeded with a bundle.
	#[error("No token bundle is available.")]
	MissingBundle,
	/// Session construction requires a broker descriptor.
	#[error("A broker descriptor is required to refresh handshake credentials.")]
	MissingBroker,
	/// Handshake payload carries no Google tokens.
	#[error("Authentication required: the handshake payload carries no Google tokens.")]
	AuthenticationRequired,
	/// No tenant (project) could be resolved for the session.
	#[error("A tenant project identifier is required.")]
	MissingTenant,
	/// Handshake carries no usable session cookie.
	#[error("The handshake cookie header is missing `{name}`.")]
	MissingSessionCookie {
		/// Cookie name that was expected.
		name: &'static str,
	},
	/// Handshake JSON could not be parsed.
	#[error("Handshake payload is malformed.")]
	InvalidHandshake {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// OAuth credentials JSON could not be parsed.
	#[error("OAuth credentials are malformed.")]
	InvalidCredentials {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// OAuth credentials file could not be read.
	#[error("Failed to read credentials from {path}.")]
	CredentialsFile {
		/// Path that failed to load.
		path: String,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// A header value contains characters HTTP does not allow.
	#[error("Header `{name}` has an invalid value.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// URL template still contains placeholders after substitution.
	#[error("URL template has unresolved placeholders: {url}.")]
	UnresolvedPlaceholder {
		/// URL after substitution.
		url: String,
	},
	/// URL produced from a template cannot be parsed.
	#[error("URL {url} is invalid.")]
	InvalidUrl {
		/// URL after substitution.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	InvalidBody(#[source] serde_json::Error),
	/// Token endpoint issued a token the session cannot schedule refreshes for.
	#[error(transparent)]
	TokenResponse(#[from] TokenResponseError),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Identity broker (or token endpoint) failure after bounded retries.
///
/// Cloneable so every caller waiting on the same refresh receives the identical error.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error(
	"Failed to retrieve credentials after {attempts} attempts, last status code: {}: {message}.",
	status_label(.status)
)]
pub struct AuthBrokerError {
	/// Last HTTP status observed, if any response arrived.
	pub status: Option<u16>,
	/// Attempts performed before giving up.
	pub attempts: u32,
	/// Description of the last failure.
	pub message: String,
}

fn status_label(status: &Option<u16>) -> String {
	status.map_or_else(|| "none".into(), |code| code.to_string())
}

/// Token endpoint answered 200 with an unusable lifetime. Never retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum TokenResponseError {
	/// Response omitted `expires_in`.
	#[error("Token endpoint response is missing expires_in.")]
	MissingExpiresIn,
	/// `expires_in` is too large to represent.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// `expires_in` is zero.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}

/// Failed refresh as handed to every caller that waited on it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RefreshError {
	/// Every attempt failed.
	#[error(transparent)]
	Exhausted(#[from] AuthBrokerError),
	/// The token endpoint answered with a token that cannot be used; no retry was made.
	#[error(transparent)]
	Rejected(#[from] TokenResponseError),
}
impl From<RefreshError> for Error {
	fn from(e: RefreshError) -> Self {
		match e {
			RefreshError::Exhausted(e) => Self::AuthBroker(e),
			RefreshError::Rejected(e) => Self::Config(e.into()),
		}
	}
}

/// Error envelope returned by the compute API, preserved verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ThisError)]
#[error("Remote API error {code} ({status}): {message}")]
pub struct RemoteError {
	/// HTTP or API status code.
	pub code: i64,
	/// Human-readable message.
	pub message: String,
	/// Symbolic status (e.g. `INVALID_ARGUMENT`).
	pub status: String,
	/// Structured details, when supplied.
	pub details: Option<Value>,
}
impl RemoteError {
	/// Status code that marks rate limiting.
	pub const RATE_LIMITED: i64 = 429;

	/// Returns `true` for the single condition retried by the dispatcher.
	pub fn is_rate_limited(&self) -> bool {
		self.code == Self::RATE_LIMITED
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Which endpoint was being called.
		endpoint: &'static str,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
	/// Transport failed without a structured error.
	#[error("HTTP client error occurred while calling {endpoint}: {message}.")]
	Other {
		/// Which endpoint was being called.
		endpoint: &'static str,
		/// Transport-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: &'static str,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}
}

/// Decoding failures for bodies of successful responses.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// Body is not valid JSON for the expected shape.
	#[error("Response body with status {status} is malformed.")]
	Body {
		/// HTTP status code of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Payload is valid JSON but lacks a required field.
	#[error("Response payload is missing `{field}`.")]
	MissingField {
		/// Field that was expected.
		field: &'static str,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn auth_broker_error_keeps_last_status() {
		let err = AuthBrokerError { status: Some(500), attempts: 3, message: "boom".into() };

		assert_eq!(
			err.to_string(),
			"Failed to retrieve credentials after 3 attempts, last status code: 500: boom."
		);

		let err = AuthBrokerError { status: None, attempts: 1, message: "refused".into() };

		assert!(err.to_string().contains("last status code: none"));
	}

	#[test]
	fn remote_errors_retain_code_and_message() {
		let remote = RemoteError {
			code: 403,
			message: "Permission denied.".into(),
			status: "PERMISSION_DENIED".into(),
			details: None,
		};
		let err = Error::from(remote.clone());

		assert_eq!(err.remote_code(), Some(403));
		assert!(err.to_string().contains("403"));
		assert!(err.to_string().contains("Permission denied."));
		assert!(!remote.is_rate_limited());
	}

	#[test]
	fn rate_limit_exhaustion_reports_code() {
		let err = Error::RateLimitExhausted { code: 429, attempts: 5 };

		assert_eq!(err.remote_code(), Some(429));
		assert_eq!(err.to_string(), "Rate limit persisted after 5 attempts (code 429).");
	}
}
