//! Immutable talking token values and their builder.

pub mod secret;

pub use secret::Secret;

// self
use crate::_prelude::*;

/// The only scope the authorizator grants for service-to-service talking tokens.
pub const TALKING_TOKEN_SCOPE: &str = "service_mate";
/// Token type assumed when the authorizator omits `token_type`.
pub const DEFAULT_TOKEN_TYPE: &str = "bearer";
/// Longest lifetime a talking token is trusted for; larger `expires_in` values are capped.
pub const MAX_TOKEN_LIFETIME: Duration = Duration::days(365);

/// Errors produced by [`TalkingTokenBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum TalkingTokenBuilderError {
	/// Issued when no (or an empty) token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when the scope differs from [`TALKING_TOKEN_SCOPE`].
	#[error("Talking tokens must carry the `service_mate` scope.")]
	InvalidScope,
	/// Issued when the expiry instant cannot be represented.
	#[error("Talking token expiry is out of range.")]
	LifetimeOutOfRange,
}

/// Short-lived bearer credential issued by the authorizator.
///
/// Values are never mutated: renewal always produces a new instance, and the connection cache
/// hands out `Arc<TalkingToken>` so callers can tell instances apart even when two tokens carry
/// the same fields.
#[derive(Clone)]
pub struct TalkingToken {
	/// Bearer token value; callers must avoid logging it.
	pub token: Secret,
	/// Declared token type (usually `bearer`).
	pub token_type: String,
	/// Declared scope, always [`TALKING_TOKEN_SCOPE`].
	pub scope: String,
	/// Instant the token was accepted.
	pub issued_at: OffsetDateTime,
	/// Instant from which the token must no longer be used.
	pub expires_at: OffsetDateTime,
}
impl TalkingToken {
	/// Returns a builder for a token carrying the provided value.
	pub fn builder(token: impl Into<String>) -> TalkingTokenBuilder {
		TalkingTokenBuilder::new(token)
	}

	/// `Authorization` header value (`Bearer <token>`).
	pub fn authorization_header(&self) -> String {
		format!("Bearer {}", self.token.expose())
	}

	/// Header mapping a request carrying this token must include.
	pub fn headers(&self) -> BTreeMap<String, String> {
		BTreeMap::from([("Authorization".into(), self.authorization_header())])
	}

	/// Returns `true` once `instant` reaches the expiry instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Checks expiry against the current UTC clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Log-safe digest of the token value.
	pub fn fingerprint(&self) -> String {
		self.token.fingerprint()
	}
}
impl Debug for TalkingToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TalkingToken")
			.field("token", &"<redacted>")
			.field("token_type", &self.token_type)
			.field("scope", &self.scope)
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`TalkingToken`].
#[derive(Clone, Debug)]
pub struct TalkingTokenBuilder {
	token: Secret,
	token_type: Option<String>,
	scope: Option<String>,
	issued_at: Option<OffsetDateTime>,
	expires_in: Duration,
}
impl TalkingTokenBuilder {
	fn new(token: impl Into<String>) -> Self {
		Self {
			token: Secret::new(token),
			token_type: None,
			scope: None,
			issued_at: None,
			expires_in: Duration::ZERO,
		}
	}

	/// Sets the declared token type.
	pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
		self.token_type = Some(token_type.into());

		self
	}

	/// Sets the declared scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Sets the issued-at instant (defaults to now).
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets the lifetime, clamped to `0..=`[`MAX_TOKEN_LIFETIME`]; zero yields an already expired
	/// token.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = duration.clamp(Duration::ZERO, MAX_TOKEN_LIFETIME);

		self
	}

	/// Consumes the builder and produces a [`TalkingToken`].
	pub fn build(self) -> Result<TalkingToken, TalkingTokenBuilderError> {
		if self.token.is_empty() {
			return Err(TalkingTokenBuilderError::MissingAccessToken);
		}

		let scope = self.scope.unwrap_or_else(|| TALKING_TOKEN_SCOPE.into());

		if scope != TALKING_TOKEN_SCOPE {
			return Err(TalkingTokenBuilderError::InvalidScope);
		}

		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = issued_at
			.checked_add(self.expires_in)
			.ok_or(TalkingTokenBuilderError::LifetimeOutOfRange)?;

		Ok(TalkingToken {
			token: self.token,
			token_type: self.token_type.unwrap_or_else(|| DEFAULT_TOKEN_TYPE.into()),
			scope,
			issued_at,
			expires_at,
		})
	}
}
