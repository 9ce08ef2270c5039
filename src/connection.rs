//! The connection façade a caller service uses to reach a called service.

mod metrics;

pub use metrics::ConnectionMetrics;

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	authorizator::AuthorizatorClient,
	cache::CredentialCache,
	error::ConfigError,
	http::{RequestOptions, ServiceResponse, ServiceTransport, Verb},
	identity::{
		AuthorizatorIdentity, CalledIdentity, CallerIdentity, ServiceIdentities, ServiceIdentity,
	},
	source::CredentialSource,
};
#[cfg(feature = "reqwest")]
use crate::{
	authorizator::ReqwestAuthorizatorClient, config::ConnectionConfig,
	http::ReqwestServiceTransport,
};

#[cfg(feature = "reqwest")]
/// Connection specialized for the crate's default reqwest collaborators.
pub type ReqwestConnection = Connection<ReqwestAuthorizatorClient, ReqwestServiceTransport>;

/// Lets a caller service call a called service's endpoints with talking tokens attached.
///
/// The connection owns a private [`CredentialCache`], so talking tokens are never shared across
/// connections. It is `Send + Sync`; share one instance (for example behind an `Arc`) across
/// concurrent calls so they reuse the same token and collapse renewals into a single fetch.
pub struct Connection<A, T>
where
	A: ?Sized + AuthorizatorClient,
	T: ?Sized + ServiceTransport,
{
	pub(crate) caller: CallerIdentity,
	pub(crate) called: CalledIdentity,
	pub(crate) authorizator: AuthorizatorIdentity,
	pub(crate) cache: CredentialCache<A>,
	pub(crate) transport: Arc<T>,
	pub(crate) metrics: Arc<ConnectionMetrics>,
}
impl<A, T> Connection<A, T>
where
	A: ?Sized + AuthorizatorClient,
	T: ?Sized + ServiceTransport,
{
	/// Validates the three service records and binds them to the provided collaborators.
	///
	/// Fails with [`ConfigError::MissingField`] when the caller lacks `client_id` or
	/// `client_secret`, or when the called service or the authorizator lacks `site`.
	pub fn with_clients(
		caller: &(impl ?Sized + ServiceIdentity),
		called: &(impl ?Sized + ServiceIdentity),
		authorizator: &(impl ?Sized + ServiceIdentity),
		authorizator_client: impl Into<Arc<A>>,
		transport: impl Into<Arc<T>>,
	) -> Result<Self, ConfigError> {
		let identities = ServiceIdentities::from_services(caller, called, authorizator)?;

		Ok(Self::from_identities(identities, authorizator_client, transport))
	}

	/// Binds already validated identities to the provided collaborators.
	pub fn from_identities(
		identities: ServiceIdentities,
		authorizator_client: impl Into<Arc<A>>,
		transport: impl Into<Arc<T>>,
	) -> Self {
		let ServiceIdentities { caller, called, authorizator } = identities;
		let metrics = Arc::<ConnectionMetrics>::default();
		let source =
			CredentialSource::new(authorizator_client, caller.clone(), authorizator.clone());

		Self {
			caller,
			called,
			authorizator,
			cache: CredentialCache::with_metrics(source, metrics.clone()),
			transport: transport.into(),
			metrics,
		}
	}

	/// Identity of the service issuing calls.
	pub fn caller(&self) -> &CallerIdentity {
		&self.caller
	}

	/// Identity of the service being called.
	pub fn called(&self) -> &CalledIdentity {
		&self.called
	}

	/// Identity of the talking token issuer.
	pub fn authorizator(&self) -> &AuthorizatorIdentity {
		&self.authorizator
	}

	/// Credential cache private to this connection.
	pub fn cache(&self) -> &CredentialCache<A> {
		&self.cache
	}

	/// Credential lifecycle counters for this connection.
	pub fn metrics(&self) -> &ConnectionMetrics {
		&self.metrics
	}

	/// `Authorization` header mapping for the current talking token, fetching one if needed.
	pub async fn headers(&self) -> Result<BTreeMap<String, String>> {
		Ok(self.cache.get().await?.headers())
	}

	/// Issues `verb` against `path` and returns the parsed response body.
	pub async fn request(
		&self,
		verb: Verb,
		path: impl Into<String>,
		options: RequestOptions,
	) -> Result<Value> {
		Ok(self.execute(verb, path, options).await?.into_parsed())
	}

	/// `GET path` with a talking token attached.
	pub async fn get(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Verb::Get, path, options).await
	}

	/// `POST path` with a talking token attached.
	pub async fn post(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Verb::Post, path, options).await
	}

	/// `PUT path` with a talking token attached.
	pub async fn put(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Verb::Put, path, options).await
	}

	/// `PATCH path` with a talking token attached.
	pub async fn patch(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Verb::Patch, path, options).await
	}

	/// `DELETE path` with a talking token attached.
	pub async fn delete(&self, path: impl Into<String>, options: RequestOptions) -> Result<Value> {
		self.request(Verb::Delete, path, options).await
	}
}
#[cfg(feature = "reqwest")]
impl Connection<ReqwestAuthorizatorClient, ReqwestServiceTransport> {
	/// Creates a connection backed by the default reqwest collaborators.
	///
	/// Both collaborators share one [`ReqwestClient`] (and therefore one connection pool).
	pub fn new(
		caller: &(impl ?Sized + ServiceIdentity),
		called: &(impl ?Sized + ServiceIdentity),
		authorizator: &(impl ?Sized + ServiceIdentity),
	) -> Result<Self, ConfigError> {
		Self::with_reqwest_client(caller, called, authorizator, ReqwestClient::default())
	}

	/// Creates a connection whose collaborators use the provided [`ReqwestClient`].
	pub fn with_reqwest_client(
		caller: &(impl ?Sized + ServiceIdentity),
		called: &(impl ?Sized + ServiceIdentity),
		authorizator: &(impl ?Sized + ServiceIdentity),
		client: ReqwestClient,
	) -> Result<Self, ConfigError> {
		Self::with_clients(
			caller,
			called,
			authorizator,
			ReqwestAuthorizatorClient::with_client(client.clone()),
			ReqwestServiceTransport::with_client(client),
		)
	}

	/// Creates a connection from a loaded [`ConnectionConfig`].
	pub fn from_config(config: &ConnectionConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::default();

		Ok(Self::from_identities(
			config.identities()?,
			ReqwestAuthorizatorClient::with_client(client.clone()),
			ReqwestServiceTransport::with_client(client),
		))
	}
}
impl<A, T> Debug for Connection<A, T>
where
	A: ?Sized + AuthorizatorClient,
	T: ?Sized + ServiceTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Connection")
			.field("caller", &self.caller.client_id)
			.field("called", &self.called.site.as_str())
			.field("authorizator", &self.authorizator.site.as_str())
			.field("cache", &self.cache)
			.finish()
	}
}
