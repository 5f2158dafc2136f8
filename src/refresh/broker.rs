//! Credential fetch against the identity broker's user-files endpoint.

// crates.io
use base64::{Engine, engine::general_purpose::STANDARD};
use oauth2::http::{
	Method, Request, StatusCode,
	header::{ACCEPT, AUTHORIZATION, COOKIE},
};
// self
use crate::{
	_prelude::*,
	auth::{SESSION_COOKIE, SubjectId, TokenBundle, TokenSecret},
	config::BrokerDescriptor,
	http::{self, HttpTransport, ResponseMetadataSlot},
	refresh::AttemptFailure,
};

/// How requests to the broker prove the user's identity.
#[derive(Clone)]
pub enum BrokerAuth {
	/// Broker session cookie (`SEPAL-SESSIONID`) captured from the handshake.
	SessionCookie(TokenSecret),
	/// HTTP basic credentials.
	Basic {
		/// Broker username.
		username: String,
		/// Broker password.
		password: TokenSecret,
	},
}
impl BrokerAuth {
	/// Convenience constructor for basic credentials.
	pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
		Self::Basic { username: username.into(), password: TokenSecret::new(password) }
	}

	fn header(&self) -> (oauth2::http::HeaderName, String) {
		match self {
			Self::SessionCookie(cookie) =>
				(COOKIE, format!("{SESSION_COOKIE}={}", cookie.expose())),
			Self::Basic { username, password } => {
				let encoded = STANDARD.encode(format!("{username}:{}", password.expose()));

				(AUTHORIZATION, format!("Basic {encoded}"))
			},
		}
	}
}
impl Debug for BrokerAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::SessionCookie(_) => f.debug_tuple("SessionCookie").field(&"<redacted>").finish(),
			Self::Basic { username, .. } => f
				.debug_struct("Basic")
				.field("username", username)
				.field("password", &"<redacted>")
				.finish(),
		}
	}
}

/// Performs one credential GET and decodes the bundle.
pub(crate) async fn fetch<C>(
	transport: &C,
	descriptor: &BrokerDescriptor,
	auth: &BrokerAuth,
	subject: &SubjectId,
) -> Result<TokenBundle, AttemptFailure>
where
	C: ?Sized + HttpTransport,
{
	let (name, value) = auth.header();
	let request = Request::builder()
		.method(Method::GET)
		.uri(descriptor.credentials_url.as_str())
		.header(ACCEPT, "application/json")
		.header(name, value)
		.body(Vec::new())
		.map_err(|err| AttemptFailure::new(None, err.to_string()))?;
	let slot = ResponseMetadataSlot::default();
	let response = http::execute(transport, "identity broker", slot.clone(), request)
		.await
		.map_err(|err| {
			AttemptFailure::new(slot.take().and_then(|meta| meta.status), err.to_string())
		})?;
	let status = response.status();

	if status != StatusCode::OK {
		return Err(AttemptFailure::new(
			Some(status.as_u16()),
			format!("Identity broker responded with status {status}"),
		));
	}

	TokenBundle::from_broker_json(response.body(), subject.clone()).map_err(|err| {
		AttemptFailure::new(
			Some(status.as_u16()),
			format!("Credential payload is malformed: {err}"),
		)
	})
}
