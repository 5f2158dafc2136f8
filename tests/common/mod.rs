//! Helpers shared by the reqwest-backed integration tests.

#![allow(dead_code)]

// std
use std::{sync::Arc, time::Duration};
// crates.io
use httpmock::prelude::*;
// self
use ee_session::{
	auth::HandshakePayload,
	config::{
		ApiDescriptor, BrokerDescriptor, RefreshPolicy, RetryPolicy, SessionConfig, Timeouts,
	},
	http::ReqwestHttpClient,
	reqwest::Client,
	rest::RestDispatcher,
	session::{ReqwestSession, Session},
	url::Url,
};

/// Broker session id used by every handshake fixture.
pub const SESSION_ID: &str = "s:integration";
/// Tenant used by every handshake fixture.
pub const PROJECT: &str = "ee-project";
/// Expiry far enough ahead that bundles stay fresh for the whole run.
pub const FAR_FUTURE_MS: i64 = 4_102_444_800_000;
/// Route the broker serves credential documents from.
pub const DOWNLOAD_PATH: &str = "/api/user-files/download/";

/// Reqwest transport that trusts the mock server's self-signed certificate.
pub fn transport(timeouts: &Timeouts) -> Arc<ReqwestHttpClient> {
	let builder = Client::builder().danger_accept_invalid_certs(true);
	let client = ReqwestHttpClient::from_builder(builder, timeouts)
		.expect("Failed to build insecure Reqwest client for tests.");

	Arc::new(client)
}

pub fn api(server: &MockServer) -> ApiDescriptor {
	let base = Url::parse(&server.url("/v1")).expect("Mock API base should parse.");

	ApiDescriptor::insecure(base).expect("Mock API descriptor should build.")
}

pub fn broker(server: &MockServer) -> BrokerDescriptor {
	let base = Url::parse(&server.base_url()).expect("Mock broker base should parse.");

	BrokerDescriptor::with_base(base, BrokerDescriptor::CREDENTIALS_PATH, true)
		.expect("Mock broker descriptor should build.")
}

pub fn config(server: &MockServer, max_attempts: u32) -> SessionConfig {
	SessionConfig::new(api(server))
		.with_broker(broker(server))
		.with_retry_policy(RetryPolicy::new(
			max_attempts,
			Duration::from_millis(5),
			Duration::from_millis(20),
		))
		.with_refresh_policy(RefreshPolicy::default().with_backoff_unit(Duration::from_millis(5)))
}

pub fn handshake(access_token: &str, expiry_unix_ms: i64) -> HandshakePayload {
	let user = serde_json::json!({
		"username": "admin",
		"googleTokens": {
			"accessToken": access_token,
			"accessTokenExpiryDate": expiry_unix_ms,
			"projectId": PROJECT,
		},
	});

	HandshakePayload::new(format!("theme=dark; SEPAL-SESSIONID={SESSION_ID}"), user.to_string())
}

pub fn session_with(config: &SessionConfig, expiry_unix_ms: i64) -> Arc<ReqwestSession> {
	let session = Session::from_handshake(
		transport(&config.timeouts),
		&handshake("ya29.initial", expiry_unix_ms),
		config,
	)
	.expect("Handshake session should build.");

	Arc::new(session)
}

pub fn session(server: &MockServer, expiry_unix_ms: i64) -> Arc<ReqwestSession> {
	session_with(&config(server, 5), expiry_unix_ms)
}

pub fn dispatcher_with(config: &SessionConfig) -> RestDispatcher<ReqwestHttpClient> {
	RestDispatcher::from_config(session_with(config, FAR_FUTURE_MS), config)
}

pub fn dispatcher(server: &MockServer, max_attempts: u32) -> RestDispatcher<ReqwestHttpClient> {
	dispatcher_with(&config(server, max_attempts))
}

pub fn broker_document(access_token: &str) -> serde_json::Value {
	serde_json::json!({
		"access_token": access_token,
		"access_token_expiry_date": FAR_FUTURE_MS,
		"project_id": PROJECT,
	})
}
