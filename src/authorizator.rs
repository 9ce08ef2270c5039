//! Authorizator collaborator: obtains raw talking token data for a caller service.
//!
//! The connection never interprets authorizator responses itself; it only receives the raw
//! payload and leaves validation to [`crate::source`]. That keeps custom clients (gRPC, an
//! in-process issuer, test fakes) on equal footing with the bundled reqwest client.

// self
use crate::{
	_prelude::*,
	error::TransportError,
	identity::{AuthorizatorIdentity, CallerIdentity},
};
#[cfg(feature = "reqwest")] use crate::credential::TALKING_TOKEN_SCOPE;

/// Boxed future returned by [`AuthorizatorClient::fetch_talking_token`].
pub type AuthorizatorFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, TransportError>> + 'a + Send>>;

/// Client able to ask the authorizator for a talking token on behalf of a caller.
pub trait AuthorizatorClient
where
	Self: 'static + Send + Sync,
{
	/// Returns the raw token payload, or `None` when the authorizator sent nothing.
	///
	/// Implementations must not validate the payload; malformed data is reported by the caller
	/// as a [`crate::error::TokenAcquisitionError`] with the payload attached.
	fn fetch_talking_token<'a>(
		&'a self,
		caller: &'a CallerIdentity,
		authorizator: &'a AuthorizatorIdentity,
	) -> AuthorizatorFuture<'a>;
}

/// Reqwest-backed authorizator client using the OAuth 2.0 client credentials grant.
///
/// Sends `POST {site}/oauth/token` with `grant_type=client_credentials` and
/// `scope=service_mate`, authenticating with HTTP Basic. The response body is returned as-is
/// whatever the HTTP status, so error payloads surface through validation with their content.
/// Configure any custom [`ReqwestClient`] to disable redirect following; the token endpoint is
/// expected to answer directly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestAuthorizatorClient {
	client: ReqwestClient,
	token_path: String,
}
#[cfg(feature = "reqwest")]
impl ReqwestAuthorizatorClient {
	/// Path of the token endpoint relative to the authorizator site.
	pub const DEFAULT_TOKEN_PATH: &'static str = "/oauth/token";

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, token_path: Self::DEFAULT_TOKEN_PATH.into() }
	}

	/// Overrides the token endpoint path.
	pub fn with_token_path(mut self, path: impl Into<String>) -> Self {
		self.token_path = path.into();

		self
	}

	fn token_url(&self, site: &Url) -> Result<Url, TransportError> {
		site.join(&self.token_path)
			.map_err(|source| TransportError::InvalidPath { path: self.token_path.clone(), source })
	}
}
#[cfg(feature = "reqwest")]
impl Default for ReqwestAuthorizatorClient {
	fn default() -> Self {
		Self::with_client(ReqwestClient::default())
	}
}
#[cfg(feature = "reqwest")]
impl AuthorizatorClient for ReqwestAuthorizatorClient {
	fn fetch_talking_token<'a>(
		&'a self,
		caller: &'a CallerIdentity,
		authorizator: &'a AuthorizatorIdentity,
	) -> AuthorizatorFuture<'a> {
		Box::pin(async move {
			let url = self.token_url(&authorizator.site)?;
			let response = self
				.client
				.post(url)
				.basic_auth(&*caller.client_id, Some(caller.client_secret.expose()))
				.form(&[("grant_type", "client_credentials"), ("scope", TALKING_TOKEN_SCOPE)])
				.send()
				.await
				.map_err(|e| TransportError::network(&authorizator.site, e))?;
			let body =
				response.bytes().await.map_err(|e| TransportError::network(&authorizator.site, e))?;

			Ok(crate::http::parse_body(&body))
		})
	}
}
