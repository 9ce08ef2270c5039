//! Service identities: the caller, the called service, and the authorizator.
//!
//! Callers hand in any [`ServiceIdentity`] (usually a [`ServiceData`] record loaded from
//! configuration). Each role then validates exactly the fields it needs into a typed record, so a
//! connection can never be built from an identity that lacks them.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::{_prelude::*, credential::Secret, error::ConfigError};

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier.
		kind: &'static str,
	},
}

/// OAuth client identifier of the caller service.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);
impl ClientId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		validate_view("Client", view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for ClientId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for ClientId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for ClientId {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<ClientId> for String {
	fn from(value: ClientId) -> Self {
		value.0
	}
}
impl TryFrom<String> for ClientId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view("Client", &value)?;

		Ok(Self(value))
	}
}
impl FromStr for ClientId {
	type Err = IdentifierError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}
impl Debug for ClientId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Client({})", self.0)
	}
}
impl Display for ClientId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}

/// Read-only view over a service record.
///
/// Every accessor is optional because the same record shape describes all three roles; the role
/// constructors ([`CallerIdentity::from_service`] and friends) decide which fields are required.
pub trait ServiceIdentity {
	/// OAuth client identifier, if the record carries one.
	fn client_id(&self) -> Option<&str> {
		None
	}

	/// OAuth client secret, if the record carries one.
	fn client_secret(&self) -> Option<&str> {
		None
	}

	/// Base endpoint of the service, if the record carries one.
	fn site(&self) -> Option<&Url> {
		None
	}
}

/// Plain service record, typically deserialized from configuration.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceData {
	/// OAuth client identifier.
	#[serde(default)]
	pub client_id: Option<String>,
	/// OAuth client secret.
	#[serde(default)]
	pub client_secret: Option<String>,
	/// Base endpoint.
	#[serde(default)]
	pub site: Option<Url>,
}
impl ServiceData {
	/// Creates an empty record.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the client identifier.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Sets the base endpoint.
	pub fn with_site(mut self, site: Url) -> Self {
		self.site = Some(site);

		self
	}

	/// Parses and sets the base endpoint.
	pub fn try_with_site(self, site: &str) -> Result<Self, url::ParseError> {
		Ok(self.with_site(Url::parse(site)?))
	}
}
impl ServiceIdentity for ServiceData {
	fn client_id(&self) -> Option<&str> {
		self.client_id.as_deref()
	}

	fn client_secret(&self) -> Option<&str> {
		self.client_secret.as_deref()
	}

	fn site(&self) -> Option<&Url> {
		self.site.as_ref()
	}
}
impl Debug for ServiceData {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceData")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("site", &self.site.as_ref().map(Url::as_str))
			.finish()
	}
}

/// Validated identity of the service issuing calls.
#[derive(Clone, Debug)]
pub struct CallerIdentity {
	/// OAuth client identifier presented to the authorizator.
	pub client_id: ClientId,
	/// OAuth client secret presented to the authorizator.
	pub client_secret: Secret,
}
impl CallerIdentity {
	const ROLE: &'static str = "caller";

	/// Validates the caller role fields (`client_id`, `client_secret`).
	pub fn from_service(service: &(impl ?Sized + ServiceIdentity)) -> Result<Self, ConfigError> {
		let client_id = service
			.client_id()
			.ok_or(ConfigError::MissingField { service: Self::ROLE, field: "client_id" })?;
		let client_id = ClientId::new(client_id)
			.map_err(|source| ConfigError::InvalidIdentifier { service: Self::ROLE, source })?;
		let client_secret = service
			.client_secret()
			.filter(|secret| !secret.is_empty())
			.ok_or(ConfigError::MissingField { service: Self::ROLE, field: "client_secret" })?;

		Ok(Self { client_id, client_secret: Secret::new(client_secret) })
	}
}

/// Validated identity of the service being called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CalledIdentity {
	/// Base endpoint every request path is resolved against.
	pub site: Url,
}
impl CalledIdentity {
	/// Validates the called role field (`site`).
	pub fn from_service(service: &(impl ?Sized + ServiceIdentity)) -> Result<Self, ConfigError> {
		Ok(Self { site: required_site("called", service)? })
	}
}

/// Validated identity of the talking token issuer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizatorIdentity {
	/// Base endpoint of the authorizator service.
	pub site: Url,
}
impl AuthorizatorIdentity {
	/// Validates the authorizator role field (`site`).
	pub fn from_service(service: &(impl ?Sized + ServiceIdentity)) -> Result<Self, ConfigError> {
		Ok(Self { site: required_site("authorizator", service)? })
	}
}

/// The three validated identities bound to one connection.
#[derive(Clone, Debug)]
pub struct ServiceIdentities {
	/// Service issuing calls.
	pub caller: CallerIdentity,
	/// Service being called.
	pub called: CalledIdentity,
	/// Talking token issuer.
	pub authorizator: AuthorizatorIdentity,
}
impl ServiceIdentities {
	/// Validates all three roles, reporting the first missing field.
	pub fn from_services(
		caller: &(impl ?Sized + ServiceIdentity),
		called: &(impl ?Sized + ServiceIdentity),
		authorizator: &(impl ?Sized + ServiceIdentity),
	) -> Result<Self, ConfigError> {
		Ok(Self {
			caller: CallerIdentity::from_service(caller)?,
			called: CalledIdentity::from_service(called)?,
			authorizator: AuthorizatorIdentity::from_service(authorizator)?,
		})
	}
}

fn required_site(
	service: &'static str,
	identity: &(impl ?Sized + ServiceIdentity),
) -> Result<Url, ConfigError> {
	identity.site().cloned().ok_or(ConfigError::MissingField { service, field: "site" })
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn site(value: &str) -> Url {
		Url::parse(value).expect("Site fixture should parse.")
	}

	#[test]
	fn client_ids_only_need_to_be_present() {
		assert_eq!(ClientId::new(""), Err(IdentifierError::Empty { kind: "Client" }));
		assert!(serde_json::from_str::<ClientId>("\"\"").is_err());

		let long = "a".repeat(512);

		for value in ["12345", "legacy client", long.as_str()] {
			let id = ClientId::new(value).expect("Any non-empty client id should be accepted.");

			assert_eq!(id.as_ref(), value);
		}

		let id = serde_json::from_str::<ClientId>("\"with space\"")
			.expect("Deserialized client ids follow the same rule.");

		assert_eq!(&*id, "with space");
	}

	#[test]
	fn caller_requires_client_id_and_secret() {
		let missing_id = ServiceData::new().with_client_secret("67890");
		let err = CallerIdentity::from_service(&missing_id)
			.expect_err("Caller without client_id should be rejected.");

		assert!(matches!(err, ConfigError::MissingField { service: "caller", field: "client_id" }));

		let missing_secret = ServiceData::new().with_client_id("12345");
		let err = CallerIdentity::from_service(&missing_secret)
			.expect_err("Caller without client_secret should be rejected.");

		assert!(matches!(
			err,
			ConfigError::MissingField { service: "caller", field: "client_secret" }
		));

		let caller = CallerIdentity::from_service(
			&ServiceData::new()
				.with_client_id("12345")
				.with_client_secret("67890")
				.with_site(site("https://caller.example.com")),
		)
		.expect("Complete caller record should validate.");

		assert_eq!(&*caller.client_id, "12345");
		assert_eq!(caller.client_secret.expose(), "67890");
	}

	#[test]
	fn called_and_authorizator_require_site() {
		let err = CalledIdentity::from_service(&ServiceData::new().with_client_id("3458686675"))
			.expect_err("Called service without site should be rejected.");

		assert!(matches!(err, ConfigError::MissingField { service: "called", field: "site" }));

		let err = AuthorizatorIdentity::from_service(&ServiceData::new())
			.expect_err("Authorizator without site should be rejected.");

		assert!(matches!(err, ConfigError::MissingField { service: "authorizator", field: "site" }));
	}

	#[test]
	fn custom_identities_only_need_their_role_fields() {
		struct Called;
		impl ServiceIdentity for Called {
			fn site(&self) -> Option<&Url> {
				static SITE: std::sync::OnceLock<Url> = std::sync::OnceLock::new();

				Some(SITE.get_or_init(|| site("https://called.example.com")))
			}
		}

		let called = CalledIdentity::from_service(&Called).expect("Site-only record should work.");

		assert_eq!(called.site.as_str(), "https://called.example.com/");
		assert!(CallerIdentity::from_service(&Called).is_err());
	}

	#[test]
	fn service_data_debug_hides_secret() {
		let data = ServiceData::new().with_client_id("12345").with_client_secret("67890");
		let rendered = format!("{data:?}");

		assert!(rendered.contains("client_secret_set: true"));
		assert!(!rendered.contains("67890"));
	}
}
