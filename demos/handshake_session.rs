//! Walks an asset folder tree with a session built from the identity broker's handshake
//! headers. A local mock plays both the broker and the compute API.

// std
use std::sync::Arc;
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use ee_session::{
	auth::HandshakePayload,
	config::{ApiDescriptor, BrokerDescriptor, SessionConfig},
	http::ReqwestHttpClient,
	reqwest::Client,
	rest::RestDispatcher,
	session::ReqwestSession,
	tree::TreeEnumerator,
	url::Url,
};

const ROOT: &str = "projects/demo-project/assets";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let broker_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/user-files/download/").header_exists("cookie");
			then.status(200).header("content-type", "application/json").json_body(
				serde_json::json!({
					"access_token": "ya29.demo-fresh",
					"access_token_expiry_date": 4_102_444_800_000_i64,
					"project_id": "demo-project",
				}),
			);
		})
		.await;

	for (parent, assets) in [
		(
			ROOT.to_owned(),
			serde_json::json!([
				{ "type": "FOLDER", "name": format!("{ROOT}/scenes"), "id": "scenes" },
				{ "type": "TABLE", "name": format!("{ROOT}/plots"), "id": "plots" },
			]),
		),
		(
			format!("{ROOT}/scenes"),
			serde_json::json!([
				{ "type": "IMAGE", "name": format!("{ROOT}/scenes/2024"), "id": "2024" },
			]),
		),
	] {
		server
			.mock_async(|when, then| {
				when.method(GET)
					.path(format!("/v1/{parent}/:listAssets"))
					.header("authorization", "Bearer ya29.demo-fresh");
				then.status(200).json_body(serde_json::json!({ "assets": assets }));
			})
			.await;
	}

	let config = SessionConfig::new(ApiDescriptor::insecure(Url::parse(&server.url("/v1"))?)?)
		.with_broker(BrokerDescriptor::with_base(
			Url::parse(&server.base_url())?,
			BrokerDescriptor::CREDENTIALS_PATH,
			true,
		)?);
	let transport = ReqwestHttpClient::from_builder(
		Client::builder().danger_accept_invalid_certs(true),
		&config.timeouts,
	)?;
	// The handshake token is already expired, so the first call goes through the broker.
	let user = serde_json::json!({
		"username": "demo",
		"googleTokens": {
			"accessToken": "ya29.demo-expired",
			"accessTokenExpiryDate": 0,
			"projectId": "demo-project",
		},
	});
	let session = ReqwestSession::from_handshake(
		Arc::new(transport),
		&HandshakePayload::new("SEPAL-SESSIONID=s:demo", user.to_string()),
		&config,
	)?;
	let dispatcher = RestDispatcher::from_config(Arc::new(session), &config);
	let entries = TreeEnumerator::new(dispatcher).enumerate(ROOT).await?;

	for entry in &entries {
		println!("{:?} {}", entry.kind, entry.name);
	}

	broker_mock.assert_async().await;

	Ok(())
}
