#![cfg(feature = "reqwest")]

mod common;

// std
use std::time::{Duration, Instant};
// crates.io
use httpmock::prelude::*;
// self
use common::*;
use ee_session::{config::Timeouts, error::Error};

const ASSET_PATH: &str = "/v1/projects/ee-project/assets/scenes";

#[tokio::test]
async fn persistent_rate_limits_stop_after_max_attempts() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ASSET_PATH);
			then.status(429)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({
					"error": {
						"code": 429,
						"message": "Quota exceeded.",
						"status": "RESOURCE_EXHAUSTED",
					}
				}));
		})
		.await;
	let err = dispatcher(&server, 4)
		.get_asset("scenes")
		.await
		.expect_err("Persistent 429 must exhaust retries.");

	mock.assert_calls_async(4).await;

	assert!(matches!(err, Error::RateLimitExhausted { code: 429, attempts: 4 }));
}

#[tokio::test]
async fn permission_errors_are_returned_without_retry() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ASSET_PATH);
			then.status(403)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({
					"error": {
						"code": 403,
						"message": "Caller lacks access.",
						"status": "PERMISSION_DENIED",
					}
				}));
		})
		.await;
	let err = dispatcher(&server, 5)
		.get_asset("scenes")
		.await
		.expect_err("403 must surface immediately.");

	mock.assert_calls_async(1).await;

	match err {
		Error::Remote(remote) => {
			assert_eq!(remote.code, 403);
			assert_eq!(remote.status, "PERMISSION_DENIED");
			assert_eq!(remote.message, "Caller lacks access.");
		},
		other => panic!("Expected a remote error, got {other:?}."),
	}
}

#[tokio::test]
async fn compute_calls_send_session_headers() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/v1/projects/ee-project/value:compute")
				.header("authorization", "Bearer ya29.initial")
				.header("x-goog-user-project", PROJECT)
				.header("username", "admin")
				.body_includes("\"expression\"");
			then.status(200).json_body(serde_json::json!({ "result": 42 }));
		})
		.await;
	let dispatcher = dispatcher(&server, 5);
	let value = dispatcher.compute_value(serde_json::json!({ "constantValue": 42 }), None).await?;

	mock.assert_async().await;

	assert_eq!(value, serde_json::json!(42));

	Ok(())
}

#[tokio::test]
async fn non_json_errors_are_synthesized_from_the_status() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ASSET_PATH);
			then.status(502).body("<html>Bad gateway</html>");
		})
		.await;
	let err = dispatcher(&server, 5).get_asset("scenes").await.expect_err("502 must surface.");

	assert_eq!(err.remote_code(), Some(502));
}

#[tokio::test]
async fn configured_timeouts_abort_slow_calls() {
	let server = MockServer::start_async().await;
	let _mock = server
		.mock_async(|when, then| {
			when.method(GET).path(ASSET_PATH);
			then.status(200).delay(Duration::from_millis(1_500)).json_body(serde_json::json!({}));
		})
		.await;
	let session_config = config(&server, 5).with_timeouts(Timeouts {
		connect: Duration::from_millis(100),
		read: Duration::from_millis(100),
		write: Duration::from_millis(100),
		pool: Duration::from_millis(100),
	});
	let started = Instant::now();
	let err = dispatcher_with(&session_config)
		.get_asset("scenes")
		.await
		.expect_err("A reply slower than the timeouts must fail.");

	assert!(matches!(err, Error::Transport(_)), "unexpected error: {err:?}");
	assert!(started.elapsed() < Duration::from_millis(1_500));
}
