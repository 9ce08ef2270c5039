//! Classification of called-service responses as rejected talking tokens.
//!
//! Two signals are recognized, checked in order:
//!
//! 1. a `WWW-Authenticate` header containing one of the [`RejectionCode`] markers;
//! 2. a structured error whose `code` equals one of the markers.
//!
//! The header signal wins when both are present. A response exposing neither headers nor a
//! structured error is never classified as rejected.

// self
use crate::{_prelude::*, http::ServiceResponse};

/// Header the called service uses to challenge a bearer token.
pub const WWW_AUTHENTICATE: &str = "www-authenticate";

/// Markers a called service reports for an unusable talking token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionCode {
	/// RFC 6750 `invalid_token`.
	InvalidToken,
	/// Talking-token specific rejection.
	InvalidTalkingToken,
}
impl RejectionCode {
	/// Every marker, in the order headers are scanned.
	pub const ALL: [RejectionCode; 2] =
		[RejectionCode::InvalidToken, RejectionCode::InvalidTalkingToken];

	/// Returns the wire marker.
	pub const fn as_str(self) -> &'static str {
		match self {
			RejectionCode::InvalidToken => "invalid_token",
			RejectionCode::InvalidTalkingToken => "invalid_talking_token",
		}
	}

	/// Matches an exact error code.
	pub fn from_code(code: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|marker| marker.as_str() == code)
	}
}
impl Display for RejectionCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Returns the rejection marker carried by `response`, if any.
pub fn classify<R>(response: &R) -> Option<RejectionCode>
where
	R: ?Sized + ServiceResponse,
{
	if let Some(challenge) = response.headers().and_then(|headers| headers.get(WWW_AUTHENTICATE))
	{
		if let Some(code) =
			RejectionCode::ALL.into_iter().find(|marker| challenge.contains(marker.as_str()))
		{
			return Some(code);
		}
	}

	response.error().and_then(|error| RejectionCode::from_code(&error.code))
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::{Value, json};
	// self
	use super::*;
	use crate::http::{HttpResponse, RemoteError, ResponseHeaders};

	struct Opaque;
	impl ServiceResponse for Opaque {
		fn into_parsed(self) -> Value {
			Value::Null
		}
	}

	struct HeadersOnly(ResponseHeaders);
	impl ServiceResponse for HeadersOnly {
		fn headers(&self) -> Option<&ResponseHeaders> {
			Some(&self.0)
		}

		fn into_parsed(self) -> Value {
			Value::Null
		}
	}

	#[test]
	fn response_without_signals_is_not_rejected() {
		assert_eq!(classify(&Opaque), None);
		assert_eq!(classify(&HeadersOnly(ResponseHeaders::new())), None);
		assert_eq!(classify(&HttpResponse::new(200, json!({ "yes": true }))), None);
	}

	#[test]
	fn header_markers_are_found_by_substring() {
		let invalid = HeadersOnly(
			ResponseHeaders::new().with("WWW-Authenticate", "Bearer error=\"invalid_token\""),
		);
		let talking = HeadersOnly(
			ResponseHeaders::new()
				.with("WWW-Authenticate", "Bearer error=\"invalid_talking_token\", realm=\"x\""),
		);
		let other = HeadersOnly(
			ResponseHeaders::new().with("WWW-Authenticate", "Bearer error=\"insufficient_scope\""),
		);

		assert_eq!(classify(&invalid), Some(RejectionCode::InvalidToken));
		assert_eq!(classify(&talking), Some(RejectionCode::InvalidTalkingToken));
		assert_eq!(classify(&other), None);
	}

	#[test]
	fn structured_error_codes_must_match_exactly() {
		let rejected = HttpResponse::new(401, Value::Null)
			.with_error(RemoteError::new("invalid_talking_token"));
		let unrelated = HttpResponse::new(422, Value::Null).with_error(RemoteError::new("7"));
		let near_miss = HttpResponse::new(401, Value::Null)
			.with_error(RemoteError::new("Invalid Talking Token"));

		assert_eq!(classify(&rejected), Some(RejectionCode::InvalidTalkingToken));
		assert_eq!(classify(&unrelated), None);
		assert_eq!(classify(&near_miss), None);
	}

	#[test]
	fn header_signal_wins_over_structured_error() {
		let response = HttpResponse::new(401, Value::Null)
			.with_header("WWW-Authenticate", "Bearer error=\"invalid_token\"")
			.with_error(RemoteError::new("invalid_talking_token"));

		assert_eq!(classify(&response), Some(RejectionCode::InvalidToken));
	}

	#[test]
	fn unrelated_header_falls_back_to_structured_error() {
		let response = HttpResponse::new(401, Value::Null)
			.with_header("WWW-Authenticate", "Basic realm=\"called\"")
			.with_error(RemoteError::new("invalid_token"));

		assert_eq!(classify(&response), Some(RejectionCode::InvalidToken));
	}
}
