//! Demonstrates a caller service reaching a called service through a [`Connection`]: cached
//! talking tokens are reused across calls, and a rejected token is renewed exactly once before
//! the call fails.

// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use serde_json::json;
// self
use service_connection::{
	connection::Connection, error::Error, http::RequestOptions, identity::ServiceData, url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let authorizator = MockServer::start_async().await;
	let called = MockServer::start_async().await;
	let token_mock = authorizator
		.mock_async(|when, then| {
			when.method(POST)
				.path("/oauth/token")
				.form_urlencoded_tuple("grant_type", "client_credentials");
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "demo-talking-token",
				"token_type": "bearer",
				"expires_in": 900,
				"scope": "service_mate",
			}));
		})
		.await;
	let ideas_mock = called
		.mock_async(|when, then| {
			when.method(GET)
				.path("/ideas")
				.header("authorization", "Bearer demo-talking-token");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(json!([{ "id": 1, "name": "talking tokens" }]));
		})
		.await;
	let admin_mock = called
		.mock_async(|when, then| {
			when.method(GET).path("/admin");
			then.status(401).header("www-authenticate", "Bearer error=\"invalid_token\"");
		})
		.await;
	let caller = ServiceData::new().with_client_id("demo-caller").with_client_secret("demo-secret");
	let called_service = ServiceData::new().with_site(Url::parse(&called.base_url())?);
	let authorizator_service = ServiceData::new().with_site(Url::parse(&authorizator.base_url())?);
	let connection = Connection::new(&caller, &called_service, &authorizator_service)?;

	for _ in 0..2 {
		let ideas = connection.get("/ideas", RequestOptions::new()).await?;

		println!("Called service answered: {ideas}.");
	}

	println!("Talking token fetches after cached calls: {}.", connection.metrics().fetches());

	// `/admin` keeps rejecting the token, so the connection renews it once and then gives up.
	match connection.get("/admin", RequestOptions::new()).await {
		Err(Error::CredentialRejected { code, attempts }) =>
			println!("Admin call rejected with `{code}` after {attempts} attempts."),
		other => println!("Unexpected admin outcome: {other:?}."),
	}

	println!(
		"Talking token fetches: {}, renewals: {}.",
		connection.metrics().fetches(),
		connection.metrics().renewals()
	);

	token_mock.assert_calls_async(2).await;
	ideas_mock.assert_calls_async(2).await;
	admin_mock.assert_calls_async(2).await;

	Ok(())
}
