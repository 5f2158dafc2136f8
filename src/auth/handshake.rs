//! Decoding of the handshake headers the identity broker forwards with each user session.
//!
//! The broker hands the application two header values: a `cookie` string carrying the
//! broker session id, and a `sepal-user` JSON document describing the user together with
//! the Google tokens minted for them. [`HandshakePayload::parse`] validates both and yields
//! the initial [`TokenBundle`] plus the cookie used for later refreshes.

// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TenantId, TokenBundle, TokenSecret},
	error::ConfigError,
};

/// Cookie carrying the broker session id.
pub const SESSION_COOKIE: &str = "SEPAL-SESSIONID";

/// Raw handshake header values forwarded by the broker.
#[derive(Clone)]
pub struct HandshakePayload {
	/// Value of the `cookie` header (`k=v; k=v`).
	pub cookie: String,
	/// Value of the `sepal-user` header (JSON).
	pub user: String,
}
impl HandshakePayload {
	/// Wraps raw header values.
	pub fn new(cookie: impl Into<String>, user: impl Into<String>) -> Self {
		Self { cookie: cookie.into(), user: user.into() }
	}

	/// Validates the payload and extracts the initial bundle and broker session cookie.
	pub fn parse(&self) -> Result<Handshake, ConfigError> {
		let de = &mut serde_json::Deserializer::from_str(&self.user);
		let user: BrokerUser = serde_path_to_error::deserialize(de)
			.map_err(|source| ConfigError::InvalidHandshake { source })?;
		let tokens = user.google_tokens.ok_or(ConfigError::AuthenticationRequired)?;

		if tokens.project_id.is_empty() {
			return Err(ConfigError::MissingTenant);
		}

		let subject = SubjectId::new(&user.username)?;
		let tenant = TenantId::new(&tokens.project_id)?;
		let session_cookie = parse_cookies(&self.cookie)
			.remove(SESSION_COOKIE)
			.filter(|value| !value.is_empty())
			.ok_or(ConfigError::MissingSessionCookie { name: SESSION_COOKIE })?;
		let bundle = TokenBundle {
			access_token: tokens.access_token,
			expiry_unix_ms: tokens.access_token_expiry_date,
			tenant_id: tenant,
			subject,
		};

		Ok(Handshake { bundle, session_cookie: TokenSecret::new(session_cookie) })
	}
}
impl Debug for HandshakePayload {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HandshakePayload")
			.field("cookie", &"<redacted>")
			.field("user", &"<redacted>")
			.finish()
	}
}

/// Validated handshake contents.
#[derive(Clone, Debug)]
pub struct Handshake {
	/// Bundle minted by the broker at login.
	pub bundle: TokenBundle,
	/// Broker session cookie used to fetch fresh bundles.
	pub session_cookie: TokenSecret,
}

#[derive(Deserialize)]
struct BrokerUser {
	username: String,
	#[serde(rename = "googleTokens", default)]
	google_tokens: Option<GoogleTokens>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTokens {
	access_token: TokenSecret,
	access_token_expiry_date: i64,
	#[serde(default)]
	project_id: String,
}

/// Splits a `cookie` header into name/value pairs; malformed pairs are skipped.
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
	header
		.split(';')
		.filter_map(|pair| pair.trim().split_once('='))
		.map(|(name, value)| (name.to_owned(), value.to_owned()))
		.collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const COOKIE: &str = "SEPAL-SESSIONID=s:random;";

	fn user(google_tokens: &str) -> String {
		format!(
			"{{\"id\":10001,\"username\":\"admin\",\"googleTokens\":{google_tokens},\"status\":\"ACTIVE\",\"roles\":[\"application_admin\"],\"systemUser\":false,\"admin\":true}}"
		)
	}

	#[test]
	fn parses_tokens_and_cookie() {
		let payload = HandshakePayload::new(
			COOKIE,
			user(
				"{\"accessToken\":\"test_token\",\"refreshToken\":\"test_refresh\",\"accessTokenExpiryDate\":1,\"projectId\":\"ee-project\",\"legacyProject\":false}",
			),
		);
		let handshake = payload.parse().expect("Handshake fixture should parse.");

		assert_eq!(handshake.bundle.access_token.expose(), "test_token");
		assert_eq!(handshake.bundle.expiry_unix_ms, 1);
		assert_eq!(handshake.bundle.tenant_id.as_ref(), "ee-project");
		assert_eq!(handshake.bundle.subject.as_ref(), "admin");
		assert_eq!(handshake.session_cookie.expose(), "s:random");
	}

	#[test]
	fn missing_google_tokens_require_authentication() {
		let err = HandshakePayload::new(COOKIE, user("null"))
			.parse()
			.expect_err("Null googleTokens must be rejected.");

		assert!(matches!(err, ConfigError::AuthenticationRequired));
	}

	#[test]
	fn empty_project_is_a_missing_tenant() {
		let err = HandshakePayload::new(
			COOKIE,
			user(
				"{\"accessToken\":\"test_token\",\"accessTokenExpiryDate\":1,\"projectId\":\"\",\"legacyProject\":false}",
			),
		)
		.parse()
		.expect_err("Empty projectId must be rejected.");

		assert!(matches!(err, ConfigError::MissingTenant));
	}

	#[test]
	fn missing_session_cookie_is_rejected() {
		let err = HandshakePayload::new(
			"other=1",
			user("{\"accessToken\":\"t\",\"accessTokenExpiryDate\":1,\"projectId\":\"p\"}"),
		)
		.parse()
		.expect_err("Cookie without a session id must be rejected.");

		assert!(matches!(err, ConfigError::MissingSessionCookie { .. }));
	}

	#[test]
	fn cookie_parsing_keeps_values_with_equals_signs() {
		let cookies = parse_cookies("a=1; SEPAL-SESSIONID=s:abc=def ; broken; b=");

		assert_eq!(cookies.get("a").map(String::as_str), Some("1"));
		assert_eq!(cookies.get(SESSION_COOKIE).map(String::as_str), Some("s:abc=def"));
		assert_eq!(cookies.get("b").map(String::as_str), Some(""));
		assert!(!cookies.contains_key("broken"));
	}
}
