//! OAuth 2.0 refresh-token exchange for sessions built from long-lived credentials.
//!
//! The exchange goes through the `oauth2` crate's [`BasicClient`] with the client secret
//! posted in the request body, matching the installed-application credential file layout
//! (`{client_id, client_secret, refresh_token, ...}`).

pub use oauth2;

// std
use std::path::Path;
// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, HttpClientError, RefreshToken, RequestTokenError,
	TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TenantId, TokenBundle, TokenSecret, token::bundle::unix_millis},
	error::{ConfigError, TokenResponseError},
	http::{self, HttpTransport, ResponseMetadata, ResponseMetadataSlot},
	refresh::{AttemptFailure, FetchError},
};

/// Long-lived OAuth credentials exchanged for short-lived access tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthCredentials {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Refresh token minted for the user.
	pub refresh_token: TokenSecret,
	/// Token endpoint; defaults to Google's.
	#[serde(default = "OAuthCredentials::default_token_endpoint", alias = "token_uri")]
	pub token_endpoint: String,
	/// Default project recorded alongside the credentials, if any.
	#[serde(default)]
	pub project: Option<String>,
}
impl OAuthCredentials {
	/// Google's token endpoint.
	pub const TOKEN_ENDPOINT: &'static str = "https://oauth2.googleapis.com/token";

	/// Loads credentials from a JSON file.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let raw = std::fs::read(path).map_err(|source| ConfigError::CredentialsFile {
			path: path.display().to_string(),
			source,
		})?;

		Self::from_json(&raw)
	}

	/// Parses credentials from JSON bytes.
	pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
		let de = &mut serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(de)
			.map_err(|source| ConfigError::InvalidCredentials { source })
	}

	/// Overrides the token endpoint.
	pub fn with_token_endpoint(mut self, token_endpoint: &Url) -> Self {
		self.token_endpoint = token_endpoint.to_string();

		self
	}

	/// Tenant recorded in the credentials, validated.
	pub fn tenant(&self) -> Result<Option<TenantId>, ConfigError> {
		match self.project.as_deref() {
			Some(project) if !project.is_empty() => Ok(Some(TenantId::new(project)?)),
			_ => Ok(None),
		}
	}

	fn default_token_endpoint() -> String {
		Self::TOKEN_ENDPOINT.into()
	}

	/// Exchanges the refresh token once.
	///
	/// Transport and endpoint failures are retryable; an unusable `expires_in` is not.
	pub(crate) async fn exchange<C>(
		&self,
		transport: &C,
		tenant: &TenantId,
		subject: &SubjectId,
	) -> Result<TokenBundle, FetchError>
	where
		C: ?Sized + HttpTransport,
	{
		let token_url = TokenUrl::new(self.token_endpoint.clone())
			.map_err(|err| AttemptFailure::new(None, err.to_string()))?;
		let client = BasicClient::new(ClientId::new(self.client_id.clone()))
			.set_client_secret(ClientSecret::new(self.client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);
		let refresh_token = RefreshToken::new(self.refresh_token.expose().to_owned());
		let slot = ResponseMetadataSlot::default();
		let handle = transport.with_metadata(slot.clone());
		let response = client
			.exchange_refresh_token(&refresh_token)
			.request_async(&handle)
			.await
			.map_err(|err| map_request_error(slot.take(), err))?;

		bundle_from_response(&response, tenant, subject).map_err(FetchError::Fatal)
	}
}
impl Debug for OAuthCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthCredentials")
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("token_endpoint", &self.token_endpoint)
			.field("project", &self.project)
			.finish()
	}
}

fn bundle_from_response(
	response: &BasicTokenResponse,
	tenant: &TenantId,
	subject: &SubjectId,
) -> Result<TokenBundle, TokenResponseError> {
	let expires_in =
		response.expires_in().ok_or(TokenResponseError::MissingExpiresIn)?.as_secs();
	let expires_in =
		i64::try_from(expires_in).map_err(|_| TokenResponseError::ExpiresInOutOfRange)?;

	if expires_in <= 0 {
		return Err(TokenResponseError::NonPositiveExpiresIn);
	}

	let expires_at = OffsetDateTime::now_utc()
		.checked_add(Duration::seconds(expires_in))
		.ok_or(TokenResponseError::ExpiresInOutOfRange)?;

	Ok(TokenBundle::new(
		response.access_token().secret().to_owned(),
		unix_millis(expires_at),
		tenant.clone(),
		subject.clone(),
	))
}

fn map_request_error<E>(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> AttemptFailure
where
	E: 'static + Send + Sync + StdError,
{
	let status = meta.and_then(|meta| meta.status);

	match err {
		RequestTokenError::ServerResponse(response) =>
			AttemptFailure::new(status, server_response_message(&response)),
		RequestTokenError::Request(error) => AttemptFailure::new(
			status,
			http::map_http_client_error("token endpoint", error).to_string(),
		),
		RequestTokenError::Parse(error, _body) =>
			AttemptFailure::new(status, format!("Token endpoint response is malformed: {error}")),
		RequestTokenError::Other(message) => AttemptFailure::new(
			status,
			format!("Token endpoint returned an unexpected response: {message}"),
		),
	}
}

fn server_response_message(response: &BasicErrorResponse) -> String {
	match response.error_description() {
		Some(description) => format!(
			"Token endpoint returned an OAuth error: {}: {description}",
			response.error().as_ref()
		),
		None => format!("Token endpoint returned an OAuth error: {}", response.error().as_ref()),
	}
}
