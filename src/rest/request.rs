//! REST request descriptions and URL template resolution.

// self
use crate::{_prelude::*, error::ConfigError};

/// HTTP methods used against the compute API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RestMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
}
impl RestMethod {
	/// Returns the method as an `http` crate value.
	pub fn as_http(self) -> oauth2::http::Method {
		match self {
			Self::Get => oauth2::http::Method::GET,
			Self::Post => oauth2::http::Method::POST,
		}
	}
}

/// One compute API call, described independently of the session that sends it.
///
/// `url_template` may reference `{api_base}` (alias `{EARTH_ENGINE_API_URL}`) and
/// `{project}`; both are substituted right before each attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RestRequest {
	/// HTTP method.
	pub method: RestMethod,
	/// URL with placeholders.
	pub url_template: String,
	/// Optional JSON body.
	pub body: Option<Value>,
}
impl RestRequest {
	/// Placeholder for the API base URL.
	pub const API_BASE: &'static str = "{api_base}";
	/// Alias of [`RestRequest::API_BASE`].
	pub const API_BASE_ALIAS: &'static str = "{EARTH_ENGINE_API_URL}";
	/// Placeholder for the tenant (billing project).
	pub const PROJECT: &'static str = "{project}";

	/// Builds a `GET` request.
	pub fn get(url_template: impl Into<String>) -> Self {
		Self { method: RestMethod::Get, url_template: url_template.into(), body: None }
	}

	/// Builds a `POST` request with a JSON body.
	pub fn post(url_template: impl Into<String>, body: Value) -> Self {
		Self { method: RestMethod::Post, url_template: url_template.into(), body: Some(body) }
	}

	/// Substitutes the placeholders and parses the result.
	pub fn resolve(&self, api_base: &str, project: &str) -> Result<Url, ConfigError> {
		let url = self
			.url_template
			.replace(Self::API_BASE, api_base)
			.replace(Self::API_BASE_ALIAS, api_base)
			.replace(Self::PROJECT, project);

		if url.contains(['{', '}']) {
			return Err(ConfigError::UnresolvedPlaceholder { url });
		}

		Url::parse(&url).map_err(|source| ConfigError::InvalidUrl { url, source })
	}
}
