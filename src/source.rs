//! Credential source: turns authorizator payloads into validated talking tokens.
//!
//! Validation short-circuits on the first failing rule, in this order:
//!
//! 1. the payload is absent or empty (`null`, `""`, `{}`, `[]`);
//! 2. the payload is not a key-value mapping;
//! 3. `access_token` is absent, not a string, or empty;
//! 4. `scope` is not exactly [`TALKING_TOKEN_SCOPE`].
//!
//! `expires_in` may be a number or a numeric string. Anything else (absent, zero, negative,
//! unparsable) yields a zero lifetime, so the token is used for the call that fetched it and
//! re-fetched on the next access. Lifetimes beyond
//! [`MAX_TOKEN_LIFETIME`](crate::credential::MAX_TOKEN_LIFETIME) are capped.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	authorizator::AuthorizatorClient,
	credential::{TALKING_TOKEN_SCOPE, TalkingToken, TalkingTokenBuilderError},
	error::{TokenAcquisitionError, TokenRejection},
	identity::{AuthorizatorIdentity, CallerIdentity},
};

/// Fetches talking tokens for one caller from one authorizator.
pub struct CredentialSource<A>
where
	A: ?Sized + AuthorizatorClient,
{
	client: Arc<A>,
	caller: CallerIdentity,
	authorizator: AuthorizatorIdentity,
}
impl<A> CredentialSource<A>
where
	A: ?Sized + AuthorizatorClient,
{
	/// Binds the authorizator client to the identities it fetches for.
	pub fn new(
		client: impl Into<Arc<A>>,
		caller: CallerIdentity,
		authorizator: AuthorizatorIdentity,
	) -> Self {
		Self { client: client.into(), caller, authorizator }
	}

	/// Authorizator client used by this source.
	pub fn client(&self) -> &Arc<A> {
		&self.client
	}

	/// Requests raw token data and validates it into a [`TalkingToken`].
	pub async fn fetch(&self) -> Result<TalkingToken> {
		let raw = self
			.client
			.fetch_talking_token(&self.caller, &self.authorizator)
			.await
			.map_err(Error::Authorizator)?;

		Ok(validate(raw.as_ref(), OffsetDateTime::now_utc())?)
	}
}
impl<A> Debug for CredentialSource<A>
where
	A: ?Sized + AuthorizatorClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialSource")
			.field("caller", &self.caller.client_id)
			.field("authorizator", &self.authorizator.site.as_str())
			.finish()
	}
}

/// Validates a raw authorizator payload, stamping the token as issued at `now`.
pub fn validate(
	raw: Option<&Value>,
	now: OffsetDateTime,
) -> Result<TalkingToken, TokenAcquisitionError> {
	let reject = |reason| TokenAcquisitionError::new(reason, raw);
	let data = raw.ok_or_else(|| reject(TokenRejection::Absent))?;

	if is_blank(data) {
		return Err(reject(TokenRejection::Empty));
	}

	let map = data.as_object().ok_or_else(|| reject(TokenRejection::NotAMapping))?;
	let token = match map.get("access_token") {
		Some(Value::String(token)) if token.is_empty() =>
			return Err(reject(TokenRejection::EmptyAccessToken)),
		Some(Value::String(token)) => token,
		_ => return Err(reject(TokenRejection::MissingAccessToken)),
	};
	let scope = map.get("scope").and_then(Value::as_str);

	if scope != Some(TALKING_TOKEN_SCOPE) {
		return Err(reject(TokenRejection::ScopeMismatch {
			found: scope.map(str::to_owned),
			expected: TALKING_TOKEN_SCOPE,
		}));
	}

	let mut builder = TalkingToken::builder(token.as_str())
		.scope(TALKING_TOKEN_SCOPE)
		.issued_at(now)
		.expires_in(expires_in(map));

	if let Some(token_type) = map.get("token_type").and_then(Value::as_str) {
		builder = builder.token_type(token_type);
	}

	builder.build().map_err(|e| {
		reject(match e {
			TalkingTokenBuilderError::MissingAccessToken => TokenRejection::EmptyAccessToken,
			TalkingTokenBuilderError::InvalidScope =>
				TokenRejection::ScopeMismatch { found: None, expected: TALKING_TOKEN_SCOPE },
			TalkingTokenBuilderError::LifetimeOutOfRange => TokenRejection::LifetimeOutOfRange,
		})
	})
}

fn is_blank(data: &Value) -> bool {
	match data {
		Value::Null => true,
		Value::String(text) => text.trim().is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::Object(map) => map.is_empty(),
		Value::Bool(_) | Value::Number(_) => false,
	}
}

fn expires_in(map: &Map<String, Value>) -> Duration {
	let seconds = match map.get("expires_in") {
		Some(Value::Number(number)) =>
			number.as_i64().or_else(|| number.as_f64().map(|value| value as i64)),
		Some(Value::String(text)) => text.trim().parse::<i64>().ok(),
		_ => None,
	};

	Duration::seconds(seconds.unwrap_or_default().max(0))
}
