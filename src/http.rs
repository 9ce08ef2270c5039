//! Transport primitives for calls to the called service.
//!
//! The module exposes [`ServiceTransport`], the connection's only dependency on an HTTP stack,
//! together with the crate-owned request and response types it exchanges. Responses implement
//! [`ServiceResponse`], whose header and error accessors are optional: a transport that cannot
//! expose them simply never reports a rejected talking token, and the connection will not retry.

// crates.io
use serde_json::Value;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`ServiceTransport::call`].
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// HTTP verbs the connection forwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
	/// `GET`.
	Get,
	/// `POST`.
	Post,
	/// `PUT`.
	Put,
	/// `PATCH`.
	Patch,
	/// `DELETE`.
	Delete,
}
impl Verb {
	/// Returns the canonical method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Verb::Get => "GET",
			Verb::Post => "POST",
			Verb::Put => "PUT",
			Verb::Patch => "PATCH",
			Verb::Delete => "DELETE",
		}
	}
}
impl Display for Verb {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Caller-supplied request options: query parameters, JSON body, and custom headers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
	/// Query string parameters.
	pub query: BTreeMap<String, String>,
	/// JSON body, if any.
	pub body: Option<Value>,
	/// Extra request headers.
	pub headers: BTreeMap<String, String>,
}
impl RequestOptions {
	/// Creates empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.insert(key.into(), value.into());

		self
	}

	/// Sets the JSON body.
	pub fn body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Adds a request header.
	pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Copies `credential_headers` over the caller's headers.
	///
	/// Header names compare case-insensitively, so a caller-supplied `authorization` entry is
	/// replaced rather than sent twice.
	pub fn merge_headers(&mut self, credential_headers: BTreeMap<String, String>) {
		for (name, value) in credential_headers {
			self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
			self.headers.insert(name, value);
		}
	}
}

/// Fully resolved request handed to a [`ServiceTransport`].
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceRequest {
	/// HTTP verb.
	pub verb: Verb,
	/// Base endpoint of the called service.
	pub site: Url,
	/// Path relative to `site`.
	pub path: String,
	/// Options, including the merged `Authorization` header.
	pub options: RequestOptions,
}
impl ServiceRequest {
	/// Returns the value of `name`, compared case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.options
			.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Resolves `path` against `site`.
	pub fn url(&self) -> Result<Url, TransportError> {
		self.site
			.join(&self.path)
			.map_err(|source| TransportError::InvalidPath { path: self.path.clone(), source })
	}
}

/// Response header map keyed by lowercase header names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseHeaders(BTreeMap<String, String>);
impl ResponseHeaders {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a header, lowercasing its name; repeated headers are joined with `, `.
	pub fn insert(&mut self, name: &str, value: impl Into<String>) {
		let value = value.into();

		self.0
			.entry(name.to_ascii_lowercase())
			.and_modify(|existing| {
				existing.push_str(", ");
				existing.push_str(&value);
			})
			.or_insert_with(|| value.clone());
	}

	/// Builder-style [`insert`](Self::insert).
	pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
		self.insert(name, value);

		self
	}

	/// Looks up a header by name, case-insensitively.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns `true` if no headers were captured.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Structured error reported by the called service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
	/// Machine-readable error code.
	pub code: String,
	/// Human-readable description, if any.
	#[serde(default)]
	pub message: Option<String>,
}
impl RemoteError {
	/// Creates an error carrying only a code.
	pub fn new(code: impl Into<String>) -> Self {
		Self { code: code.into(), message: None }
	}
}

/// Response contract consumed by the rejection classifier.
pub trait ServiceResponse {
	/// Response headers, when the transport exposes them.
	fn headers(&self) -> Option<&ResponseHeaders> {
		None
	}

	/// Structured error, when the transport exposes one.
	fn error(&self) -> Option<&RemoteError> {
		None
	}

	/// Parsed body returned to the caller on success.
	fn into_parsed(self) -> Value;
}

/// Transport able to issue requests against the called service.
///
/// Implementations own their timeouts and connection pooling. Errors are propagated to the
/// caller unchanged and are never retried by the connection.
pub trait ServiceTransport
where
	Self: 'static + Send + Sync,
{
	/// Response type produced by the transport.
	type Response: 'static + Send + ServiceResponse;

	/// Performs the request exactly once.
	fn call<'a>(&'a self, request: &'a ServiceRequest) -> TransportFuture<'a, Self::Response>;
}

/// Plain HTTP response captured by the bundled transport.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Captured headers.
	pub headers: ResponseHeaders,
	/// Parsed body (`null` when empty, a JSON string when not JSON).
	pub body: Value,
	/// Structured error extracted from the body, if any.
	pub error: Option<RemoteError>,
}
impl HttpResponse {
	/// Creates a response with no headers, extracting any structured error from `body`.
	pub fn new(status: u16, body: Value) -> Self {
		let error = extract_error(&body);

		Self { status, headers: ResponseHeaders::new(), body, error }
	}

	/// Replaces the captured headers.
	pub fn with_headers(mut self, headers: ResponseHeaders) -> Self {
		self.headers = headers;

		self
	}

	/// Adds a single header.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Overrides the structured error.
	pub fn with_error(mut self, error: RemoteError) -> Self {
		self.error = Some(error);

		self
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}
impl ServiceResponse for HttpResponse {
	fn headers(&self) -> Option<&ResponseHeaders> {
		Some(&self.headers)
	}

	fn error(&self) -> Option<&RemoteError> {
		self.error.as_ref()
	}

	fn into_parsed(self) -> Value {
		self.body
	}
}

/// Reqwest-backed transport for the called service.
///
/// Non-2xx statuses are returned as responses rather than errors so the connection can inspect
/// them for rejected talking tokens.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestServiceTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestServiceTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestServiceTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ServiceTransport for ReqwestServiceTransport {
	type Response = HttpResponse;

	fn call<'a>(&'a self, request: &'a ServiceRequest) -> TransportFuture<'a, HttpResponse> {
		Box::pin(async move {
			let method = reqwest::Method::from_bytes(request.verb.as_str().as_bytes())
				.map_err(|e| TransportError::Other { message: e.to_string() })?;
			let mut builder = self.0.request(method, request.url()?);

			if !request.options.query.is_empty() {
				builder = builder.query(&request.options.query);
			}
			for (name, value) in &request.options.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = &request.options.body {
				builder = builder.json(body);
			}

			let response =
				builder.send().await.map_err(|e| TransportError::network(&request.site, e))?;
			let status = response.status().as_u16();
			let mut headers = ResponseHeaders::new();

			for (name, value) in response.headers() {
				if let Ok(value) = value.to_str() {
					headers.insert(name.as_str(), value);
				}
			}

			let bytes =
				response.bytes().await.map_err(|e| TransportError::network(&request.site, e))?;

			Ok(HttpResponse::new(status, parse_body(&bytes).unwrap_or(Value::Null))
				.with_headers(headers))
		})
	}
}

/// Parses a response body: empty ⇒ `None`, JSON ⇒ the value, anything else ⇒ a JSON string.
pub fn parse_body(bytes: &[u8]) -> Option<Value> {
	if bytes.iter().all(u8::is_ascii_whitespace) {
		return None;
	}

	Some(
		serde_json::from_slice(bytes)
			.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
	)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorEnvelope {
	Nested { error: RemoteError },
	Flat { error: String, error_description: Option<String> },
}

fn extract_error(body: &Value) -> Option<RemoteError> {
	match ErrorEnvelope::deserialize(body).ok()? {
		ErrorEnvelope::Nested { error } => Some(error),
		ErrorEnvelope::Flat { error, error_description } =>
			Some(RemoteError { code: error, message: error_description }),
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn errors_are_extracted_from_both_body_shapes() {
		let nested = HttpResponse::new(401, json!({ "error": { "code": "invalid_talking_token" } }));
		let flat = HttpResponse::new(
			401,
			json!({ "error": "invalid_token", "error_description": "Token expired." }),
		);
		let plain = HttpResponse::new(200, json!({ "error": 7 }));

		assert_eq!(nested.error, Some(RemoteError::new("invalid_talking_token")));
		assert_eq!(
			flat.error,
			Some(RemoteError {
				code: "invalid_token".into(),
				message: Some("Token expired.".into())
			})
		);
		assert_eq!(plain.error, None);
	}

	#[test]
	fn body_parsing_handles_empty_and_plain_text() {
		assert_eq!(parse_body(b""), None);
		assert_eq!(parse_body(b"  \n"), None);
		assert_eq!(parse_body(b"{\"yes\":true}"), Some(json!({ "yes": true })));
		assert_eq!(parse_body(b"not json"), Some(json!("not json")));
	}

	#[test]
	fn headers_are_case_insensitive_and_joined() {
		let headers = ResponseHeaders::new()
			.with("WWW-Authenticate", "Bearer realm=\"called\"")
			.with("www-authenticate", "Bearer error=\"invalid_token\"");

		assert_eq!(
			headers.get("Www-Authenticate"),
			Some("Bearer realm=\"called\", Bearer error=\"invalid_token\"")
		);
	}

	#[test]
	fn credential_headers_replace_caller_authorization() {
		let mut options = RequestOptions::new()
			.header("authorization", "Bearer stale")
			.header("X-Trace", "abc");

		options.merge_headers(BTreeMap::from([("Authorization".into(), "Bearer TOK1".into())]));

		assert_eq!(options.headers.len(), 2);
		assert_eq!(options.headers.get("Authorization").map(String::as_str), Some("Bearer TOK1"));
	}

	#[test]
	fn request_urls_join_site_and_path() {
		let request = ServiceRequest {
			verb: Verb::Get,
			site: Url::parse("https://called.example.com").expect("Site fixture should parse."),
			path: "/users/7".into(),
			options: RequestOptions::new(),
		};

		assert_eq!(
			request.url().expect("Path should resolve.").as_str(),
			"https://called.example.com/users/7"
		);
		assert_eq!(serde_json::to_string(&Verb::Patch).expect("Verb serializes."), "\"PATCH\"");
	}
}
