//! Connection-level error types shared across identities, credentials, and transports.

// self
use crate::{_prelude::*, identity::IdentifierError, response::RejectionCode};

/// Connection-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical connection error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// The authorizator handed out data that is not a usable talking token.
	#[error(transparent)]
	TokenAcquisition(#[from] TokenAcquisitionError),
	/// The authorizator could not be reached or answered unreadably.
	#[error("Authorizator service request failed.")]
	Authorizator(#[source] TransportError),
	/// Transport failure while calling the called service.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The called service rejected a freshly renewed talking token.
	#[error("Called service rejected the talking token after {attempts} attempts: {code}.")]
	CredentialRejected {
		/// Rejection marker reported by the called service.
		code: RejectionCode,
		/// Number of attempts performed before giving up.
		attempts: u8,
	},
}

/// Configuration and validation failures raised while building a connection.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// A service record lacks a field its role requires.
	#[error("Must provide {service} service data including a `{field}` value.")]
	MissingField {
		/// Role of the offending service record.
		service: &'static str,
		/// Name of the absent field.
		field: &'static str,
	},
	/// A client identifier failed validation.
	#[error("The {service} service carries an invalid client identifier.")]
	InvalidIdentifier {
		/// Role of the offending service record.
		service: &'static str,
		/// Underlying validation failure.
		#[source]
		source: IdentifierError,
	},
	/// A site value could not be parsed into a URL.
	#[error("The {service} service site is not a valid URL.")]
	InvalidSite {
		/// Role of the offending service record.
		service: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Configuration document could not be read.
	#[error("Configuration file could not be read.")]
	Read(#[from] std::io::Error),
	/// Configuration document is malformed.
	#[error("Configuration document is malformed at `{path}`.")]
	Parse {
		/// Dotted path to the offending field.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: serde_json::Error,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<serde_path_to_error::Error<serde_json::Error>> for ConfigError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self::Parse { path, source: e.into_inner() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Why raw token data was refused.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TokenRejection {
	/// Nothing came back from the authorizator.
	#[error("no talking token data was received")]
	Absent,
	/// The payload was present but carried nothing.
	#[error("the talking token data is empty")]
	Empty,
	/// The payload is not a key-value mapping.
	#[error("the talking token data is not a mapping")]
	NotAMapping,
	/// `access_token` is absent or not a string.
	#[error("the talking token data has no token string")]
	MissingAccessToken,
	/// `access_token` is an empty string.
	#[error("the talking token data has an empty token string")]
	EmptyAccessToken,
	/// `expires_in` pushes the expiry past the representable calendar.
	#[error("the talking token expiry is out of range")]
	LifetimeOutOfRange,
	/// `scope` differs from the recognized talking token scope.
	#[error("the talking token scope {found:?} is not {expected:?}")]
	ScopeMismatch {
		/// Scope the authorizator declared, if any.
		found: Option<String>,
		/// The only scope accepted for talking tokens.
		expected: &'static str,
	},
}

/// Raised when the authorizator returns data that cannot become a talking token.
///
/// The offending payload is kept for diagnostics with any `access_token` value redacted.
#[derive(Clone, Debug, ThisError)]
#[error("Got invalid talking token: {reason}.")]
pub struct TokenAcquisitionError {
	/// Validation rule that failed first.
	pub reason: TokenRejection,
	/// Redacted copy of the raw payload.
	pub data: Option<serde_json::Value>,
}
impl TokenAcquisitionError {
	/// Builds the error, redacting secrets from the diagnostic payload.
	pub fn new(reason: TokenRejection, data: Option<&serde_json::Value>) -> Self {
		Self { reason, data: data.map(redact) }
	}
}

/// Transport-level failures (network, IO, malformed requests).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {site}.")]
	Network {
		/// Site the request was addressed to.
		site: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request path could not be joined onto the site.
	#[error("Path `{path}` cannot be resolved against the service site.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling a service.")]
	Io(#[from] std::io::Error),
	/// Transport-specific failure without a structured source.
	#[error("Transport failed: {message}.")]
	Other {
		/// Human-readable error payload.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(site: &Url, src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { site: site.to_string(), source: Box::new(src) }
	}
}

fn redact(data: &serde_json::Value) -> serde_json::Value {
	let mut data = data.clone();

	if let Some(serde_json::Value::String(token)) =
		data.as_object_mut().and_then(|map| map.get_mut("access_token"))
	{
		if !token.is_empty() {
			*token = "<redacted>".into();
		}
	}

	data
}
