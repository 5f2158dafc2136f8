//! Classification of compute API responses into payloads and remote errors.

// crates.io
use oauth2::http::{StatusCode, header::CONTENT_TYPE};
// self
use crate::{
	_prelude::*,
	error::{DecodeError, RemoteError},
	http::HttpResponse,
};

/// Result of one HTTP exchange with the compute API.
#[derive(Clone, Debug, PartialEq)]
pub enum RestOutcome {
	/// Successful status with its decoded JSON body (`null` when the body is empty).
	Payload(Value),
	/// Failure status converted into the API's error envelope.
	Remote(RemoteError),
}
impl RestOutcome {
	/// Classifies a response: statuses below 400 decode as payloads, the rest as errors.
	pub fn from_response(response: &HttpResponse) -> Result<Self, DecodeError> {
		let status = response.status();

		if status.as_u16() < 400 {
			return decode_payload(status, response.body()).map(Self::Payload);
		}

		let is_json = response
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.is_some_and(|value| value.contains("application/json"));
		let remote = if is_json {
			serde_json::from_slice::<ErrorEnvelope>(response.body())
				.map(|envelope| envelope.error.into_remote())
				.unwrap_or_else(|_| synthesized(status))
		} else {
			synthesized(status)
		};

		Ok(Self::Remote(remote))
	}
}

#[derive(Deserialize)]
struct ErrorEnvelope {
	#[serde(default)]
	error: ErrorBody,
}

#[derive(Default, Deserialize)]
struct ErrorBody {
	code: Option<i64>,
	message: Option<String>,
	status: Option<String>,
	details: Option<Value>,
}
impl ErrorBody {
	fn into_remote(self) -> RemoteError {
		RemoteError {
			code: self.code.unwrap_or(-1),
			message: self.message.unwrap_or_else(|| "Remote API responded with an error".into()),
			status: self.status.unwrap_or_else(|| "UNDEFINED".into()),
			details: self.details,
		}
	}
}

fn synthesized(status: StatusCode) -> RemoteError {
	RemoteError {
		code: status.as_u16().into(),
		message: status.canonical_reason().unwrap_or("Unknown status").into(),
		status: "UNDEFINED".into(),
		details: None,
	}
}

fn decode_payload(status: StatusCode, body: &[u8]) -> Result<Value, DecodeError> {
	if body.iter().all(u8::is_ascii_whitespace) {
		return Ok(Value::Null);
	}

	let de = &mut serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(de)
		.map_err(|source| DecodeError::Body { status: status.as_u16(), source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn response(status: u16, content_type: Option<&str>, body: &str) -> HttpResponse {
		let mut builder = oauth2::http::Response::builder().status(status);

		if let Some(content_type) = content_type {
			builder = builder.header(CONTENT_TYPE, content_type);
		}

		builder.body(body.as_bytes().to_vec()).expect("Test response should build.")
	}

	#[test]
	fn success_bodies_decode_and_empty_is_null() {
		let outcome = RestOutcome::from_response(&response(200, None, r#"{"id":"a"}"#))
			.expect("JSON body should decode.");

		assert_eq!(outcome, RestOutcome::Payload(serde_json::json!({ "id": "a" })));
		assert_eq!(
			RestOutcome::from_response(&response(204, None, "")).expect("Empty body is fine."),
			RestOutcome::Payload(Value::Null)
		);
		assert!(matches!(
			RestOutcome::from_response(&response(200, None, "<html>")),
			Err(DecodeError::Body { status: 200, .. })
		));
	}

	#[test]
	fn json_error_envelopes_are_preserved() {
		let body = r#"{"error":{"code":403,"message":"Permission denied.","status":"PERMISSION_DENIED","details":[{"reason":"x"}]}}"#;
		let RestOutcome::Remote(remote) = RestOutcome::from_response(&response(
			403,
			Some("application/json; charset=UTF-8"),
			body,
		))
		.expect("Error responses classify.") else {
			panic!("Expected a remote error.");
		};

		assert_eq!(remote.code, 403);
		assert_eq!(remote.status, "PERMISSION_DENIED");
		assert_eq!(remote.details, Some(serde_json::json!([{ "reason": "x" }])));
	}

	#[test]
	fn envelope_fields_fall_back_to_defaults() {
		let outcome =
			RestOutcome::from_response(&response(400, Some("application/json"), r#"{"other":1}"#))
				.expect("Error responses classify.");

		assert_eq!(
			outcome,
			RestOutcome::Remote(RemoteError {
				code: -1,
				message: "Remote API responded with an error".into(),
				status: "UNDEFINED".into(),
				details: None,
			})
		);
	}

	#[test]
	fn non_json_errors_use_the_reason_phrase() {
		for content_type in [Some("text/html"), Some("application/json")] {
			let outcome = RestOutcome::from_response(&response(429, content_type, "<html>busy"))
				.expect("Error responses classify.");

			assert!(matches!(
				outcome,
				RestOutcome::Remote(RemoteError { code: 429, ref message, .. })
					if message == "Too Many Requests"
			));
		}
	}
}
