//! Validated endpoint descriptors for the compute API and the identity broker.

// self
use crate::_prelude::*;

/// Errors raised while constructing or validating endpoint descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum EndpointError {
	/// Endpoints must use HTTPS unless explicitly allowed.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Endpoint URL cannot be parsed.
	#[error("The {endpoint} endpoint is not a valid URL: {url}.")]
	InvalidUrl {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Raw value that failed to parse.
		url: String,
	},
	/// Endpoint URL cannot carry a path.
	#[error("The {endpoint} endpoint cannot be used as a base URL: {url}.")]
	NotABase {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A required environment variable is unset or empty.
	#[error("Environment variable {name} is not set.")]
	MissingEnv {
		/// Variable name.
		name: &'static str,
	},
}

/// Base URL of the compute API, substituted for `{api_base}` in request templates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
	/// Base URL without a trailing slash.
	pub base: Url,
}
impl ApiDescriptor {
	/// Public Earth Engine REST endpoint.
	pub const DEFAULT_BASE: &'static str = "https://earthengine.googleapis.com/v1alpha";

	/// Validates an HTTPS base URL.
	pub fn new(base: Url) -> Result<Self, EndpointError> {
		Self::build(base, false)
	}

	/// Descriptor for the public Earth Engine REST endpoint.
	pub fn earth_engine() -> Result<Self, EndpointError> {
		let base = Url::parse(Self::DEFAULT_BASE).map_err(|_| EndpointError::InvalidUrl {
			endpoint: "api",
			url: Self::DEFAULT_BASE.into(),
		})?;

		Self::new(base)
	}

	/// Accepts plain HTTP as well; intended for local mocks.
	pub fn insecure(base: Url) -> Result<Self, EndpointError> {
		Self::build(base, true)
	}

	/// Base URL as a string without the trailing slash.
	pub fn base_str(&self) -> &str {
		self.base.as_str().trim_end_matches('/')
	}

	fn build(base: Url, allow_insecure: bool) -> Result<Self, EndpointError> {
		validate_endpoint("api", &base, allow_insecure)?;

		Ok(Self { base })
	}
}

/// Identity broker host and the credential document it serves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerDescriptor {
	/// Fully resolved credential endpoint (`…/download/?path=…`).
	pub credentials_url: Url,
}
impl BrokerDescriptor {
	/// Environment variable naming the broker host.
	pub const HOST_ENV: &'static str = "SEPAL_HOST";
	/// Download route on the broker host.
	pub const DOWNLOAD_ROUTE: &'static str = "/api/user-files/download/";
	/// Path of the Earth Engine credential document inside the user's files.
	pub const CREDENTIALS_PATH: &'static str = "/.config/earthengine/credentials";

	/// Builds the descriptor for an HTTPS broker host.
	pub fn for_host(host: &str) -> Result<Self, EndpointError> {
		let raw = format!("https://{host}");
		let base = Url::parse(&raw)
			.map_err(|_| EndpointError::InvalidUrl { endpoint: "broker", url: raw.clone() })?;

		Self::with_base(base, Self::CREDENTIALS_PATH, false)
	}

	/// Builds the descriptor from the `SEPAL_HOST` environment variable.
	pub fn from_env() -> Result<Self, EndpointError> {
		let host = std::env::var(Self::HOST_ENV)
			.ok()
			.filter(|value| !value.trim().is_empty())
			.ok_or(EndpointError::MissingEnv { name: Self::HOST_ENV })?;

		Self::for_host(host.trim())
	}

	/// Builds the descriptor from an explicit base URL and credential path.
	///
	/// `allow_insecure` admits plain HTTP, which is only meant for local mocks.
	pub fn with_base(
		base: Url,
		credentials_path: &str,
		allow_insecure: bool,
	) -> Result<Self, EndpointError> {
		validate_endpoint("broker", &base, allow_insecure)?;

		let mut credentials_url = base
			.join(Self::DOWNLOAD_ROUTE)
			.map_err(|_| EndpointError::NotABase { endpoint: "broker", url: base.to_string() })?;

		credentials_url.query_pairs_mut().clear().append_pair("path", credentials_path);

		Ok(Self { credentials_url })
	}
}

fn validate_endpoint(
	name: &'static str,
	url: &Url,
	allow_insecure: bool,
) -> Result<(), EndpointError> {
	if url.cannot_be_a_base() {
		return Err(EndpointError::NotABase { endpoint: name, url: url.to_string() });
	}

	match url.scheme() {
		"https" => Ok(()),
		"http" if allow_insecure => Ok(()),
		_ => Err(EndpointError::InsecureEndpoint { endpoint: name, url: url.to_string() }),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	#[test]
	fn api_descriptor_defaults_to_public_endpoint() {
		let api = ApiDescriptor::earth_engine().expect("Public endpoint should be valid.");

		assert_eq!(api.base_str(), ApiDescriptor::DEFAULT_BASE);
	}

	#[test]
	fn api_descriptor_rejects_plain_http_unless_insecure() {
		let err = ApiDescriptor::new(url("http://localhost:8080/v1"))
			.expect_err("Plain HTTP must be rejected.");

		assert!(matches!(err, EndpointError::InsecureEndpoint { endpoint: "api", .. }));

		let api = ApiDescriptor::insecure(url("http://localhost:8080/v1/"))
			.expect("Insecure descriptors should accept HTTP.");

		assert_eq!(api.base_str(), "http://localhost:8080/v1");
	}

	#[test]
	fn broker_descriptor_encodes_credentials_path() {
		let broker = BrokerDescriptor::for_host("sepal.example.org")
			.expect("Broker host should produce a descriptor.");

		assert_eq!(
			broker.credentials_url.as_str(),
			"https://sepal.example.org/api/user-files/download/?path=%2F.config%2Fearthengine%2Fcredentials"
		);
	}

	#[test]
	fn broker_descriptor_rejects_garbage_hosts() {
		assert!(BrokerDescriptor::for_host("bad host").is_err());
		assert!(
			BrokerDescriptor::with_base(url("http://broker.local"), "/creds", false).is_err(),
			"Plain HTTP must be rejected without the insecure flag."
		);
	}
}
