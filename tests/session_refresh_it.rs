#![cfg(feature = "reqwest")]

mod common;

// std
use std::time::Duration;
// crates.io
use futures::future;
use httpmock::prelude::*;
// self
use common::*;
use ee_session::{error::Error, session::ReqwestSession};

#[tokio::test]
async fn concurrent_stale_callers_trigger_one_broker_fetch() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path(DOWNLOAD_PATH)
				.query_param("path", "/.config/earthengine/credentials")
				.header("cookie", format!("SEPAL-SESSIONID={SESSION_ID}"));
			then.status(200)
				.delay(Duration::from_millis(100))
				.json_body(broker_document("ya29.renewed"));
		})
		.await;
	let session = session(&server, 0);
	let results = future::join_all((0..16).map(|_| session.headers())).await;

	for headers in results {
		assert_eq!(headers?.authorization.expose(), "Bearer ya29.renewed");
	}

	mock.assert_calls_async(1).await;

	assert_eq!(session.metrics().attempts(), 1);

	Ok(())
}

#[tokio::test]
async fn fresh_sessions_never_contact_the_broker() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(DOWNLOAD_PATH);
			then.status(200).json_body(broker_document("ya29.unused"));
		})
		.await;
	let session = session(&server, FAR_FUTURE_MS);
	let headers = session.headers().await?;

	assert_eq!(headers.authorization.expose(), "Bearer ya29.initial");
	assert_eq!(headers.user_project.as_ref(), PROJECT);

	mock.assert_calls_async(0).await;

	Ok(())
}

#[tokio::test]
async fn broker_failures_exhaust_the_refresh_budget() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path(DOWNLOAD_PATH);
			then.status(503);
		})
		.await;
	let session_config = config(&server, 5);
	let session = ReqwestSession::from_handshake(
		transport(&session_config.timeouts),
		&handshake("ya29.stale", 0),
		&session_config,
	)
	.expect("Handshake session should build.");
	let err = session.headers().await.expect_err("A dead broker must surface an error.");

	mock.assert_calls_async(3).await;

	assert!(matches!(err, Error::AuthBroker(ref broker) if broker.status == Some(503)));
	assert_eq!(
		session.bundle().expect("Bundle should remain.").access_token.expose(),
		"ya29.stale"
	);
}
