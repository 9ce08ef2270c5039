//! JSON configuration for the three service records a connection needs.
//!
//! ```json
//! {
//!   "caller_service": { "client_id": "12345", "client_secret": "67890" },
//!   "called_service": { "site": "https://called.example.com" },
//!   "authorizator_service": { "site": "https://authorizator.example.com" }
//! }
//! ```

// std
use std::path::Path;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	identity::{ServiceData, ServiceIdentities},
};

/// One service record as written in configuration.
///
/// `site` stays a plain string until validation so a malformed URL is reported against the role
/// that carries it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
	/// OAuth client identifier.
	#[serde(default)]
	pub client_id: Option<String>,
	/// OAuth client secret.
	#[serde(default)]
	pub client_secret: Option<String>,
	/// Base endpoint.
	#[serde(default)]
	pub site: Option<String>,
}
impl ServiceConfig {
	/// Converts the record into [`ServiceData`], parsing `site` for the named role.
	pub fn to_service_data(&self, service: &'static str) -> Result<ServiceData, ConfigError> {
		let mut data = ServiceData {
			client_id: self.client_id.clone(),
			client_secret: self.client_secret.clone(),
			site: None,
		};

		if let Some(site) = &self.site {
			data = data
				.try_with_site(site)
				.map_err(|source| ConfigError::InvalidSite { service, source })?;
		}

		Ok(data)
	}
}
impl Debug for ServiceConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceConfig")
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("site", &self.site)
			.finish()
	}
}

/// Configuration document describing a connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
	/// Service issuing calls; needs `client_id` and `client_secret`.
	#[serde(default)]
	pub caller_service: ServiceConfig,
	/// Service being called; needs `site`.
	#[serde(default)]
	pub called_service: ServiceConfig,
	/// Talking token issuer; needs `site`.
	#[serde(default)]
	pub authorizator_service: ServiceConfig,
}
impl ConnectionConfig {
	/// Parses a JSON document, reporting the path of the first malformed field.
	pub fn from_json_str(document: &str) -> Result<Self, ConfigError> {
		let mut deserializer = serde_json::Deserializer::from_str(document);

		Ok(serde_path_to_error::deserialize(&mut deserializer)?)
	}

	/// Reads and parses a JSON document from disk.
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let document = std::fs::read_to_string(path)?;

		Self::from_json_str(&document)
	}

	/// Validates every role and returns the identities a connection binds to.
	pub fn identities(&self) -> Result<ServiceIdentities, ConfigError> {
		ServiceIdentities::from_services(
			&self.caller_service.to_service_data("caller")?,
			&self.called_service.to_service_data("called")?,
			&self.authorizator_service.to_service_data("authorizator")?,
		)
	}
}
