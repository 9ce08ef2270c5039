//! Request execution with reactive talking token renewal.
//!
//! [`Connection::execute`] attaches the current talking token and performs the call. When the
//! called service signals that the token was rejected (see [`crate::response::classify`]), the
//! connection drops exactly that token from its cache, obtains a fresh one, and repeats the call
//! once. A second rejection surfaces as [`Error::CredentialRejected`]; transport errors and
//! token acquisition failures are never retried.

// self
use crate::{
	_prelude::*,
	authorizator::AuthorizatorClient,
	connection::Connection,
	credential::TalkingToken,
	http::{RequestOptions, ServiceRequest, ServiceTransport, Verb},
	obs::{self, Operation, OperationOutcome, OperationSpan},
	response::{self, RejectionCode},
};

/// Outcome of a single transport round trip.
enum Attempt<R> {
	Accepted(R),
	Rejected { token: Arc<TalkingToken>, code: RejectionCode },
}

impl<A, T> Connection<A, T>
where
	A: ?Sized + AuthorizatorClient,
	T: ?Sized + ServiceTransport,
{
	/// Performs `verb path` and returns the raw transport response.
	///
	/// At most two transport calls are made. The response handed back is never classified as a
	/// rejected talking token.
	pub async fn execute(
		&self,
		verb: Verb,
		path: impl Into<String>,
		options: RequestOptions,
	) -> Result<T::Response> {
		const OP: Operation = Operation::Call;

		let span = OperationSpan::new(OP, verb.as_str());
		let path = path.into();

		obs::record_operation_outcome(OP, OperationOutcome::Attempt);

		let result = span
			.instrument(async move {
				let (token, code) = match self.attempt(verb, &path, &options).await? {
					Attempt::Accepted(response) => return Ok(response),
					Attempt::Rejected { token, code } => (token, code),
				};

				obs::record_renewal(code.as_str(), &token.fingerprint());
				obs::record_operation_outcome(OP, OperationOutcome::Renewal);
				self.metrics.record_renewal();
				self.cache.invalidate_if_current(&token);

				match self.attempt(verb, &path, &options).await? {
					Attempt::Accepted(response) => Ok(response),
					Attempt::Rejected { code, .. } => {
						self.metrics.record_rejection();

						Err(Error::CredentialRejected { code, attempts: 2 })
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_operation_outcome(OP, OperationOutcome::Success),
			Err(_) => obs::record_operation_outcome(OP, OperationOutcome::Failure),
		}

		result
	}

	async fn attempt(
		&self,
		verb: Verb,
		path: &str,
		options: &RequestOptions,
	) -> Result<Attempt<T::Response>> {
		let token = self.cache.get().await?;
		let mut options = options.clone();

		options.merge_headers(token.headers());

		let request =
			ServiceRequest { verb, site: self.called.site.clone(), path: path.to_owned(), options };
		let response = self.transport.call(&request).await?;

		Ok(match response::classify(&response) {
			Some(code) => Attempt::Rejected { token, code },
			None => Attempt::Accepted(response),
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::{Value, json};
	// self
	use super::*;
	use crate::{
		_preludet::{
			ScriptedAuthorizator, ScriptedConnection, ScriptedTransport, service_data,
			talking_token_data,
		},
		error::TransportError,
		http::{HttpResponse, RemoteError},
	};

	fn connection(
		authorizator: ScriptedAuthorizator,
		transport: ScriptedTransport,
	) -> (ScriptedConnection, Arc<ScriptedAuthorizator>, Arc<ScriptedTransport>) {
		let (caller, called, authorizator_service) = service_data();
		let authorizator = Arc::new(authorizator);
		let transport = Arc::new(transport);
		let connection = ScriptedConnection::with_clients(
			&caller,
			&called,
			&authorizator_service,
			authorizator.clone(),
			transport.clone(),
		)
		.expect("Connection fixture should build.");

		(connection, authorizator, transport)
	}

	fn rejected_by_header() -> HttpResponse {
		HttpResponse::new(401, Value::Null)
			.with_header("WWW-Authenticate", "Bearer error=\"invalid_token\"")
	}

	fn rejected_by_code() -> HttpResponse {
		HttpResponse::new(401, Value::Null).with_error(RemoteError::new("invalid_talking_token"))
	}

	fn authorization_headers(transport: &ScriptedTransport) -> Vec<String> {
		transport
			.requests()
			.iter()
			.map(|request| request.header("Authorization").unwrap_or_default().to_owned())
			.collect()
	}

	#[tokio::test]
	async fn accepted_response_is_returned_without_retry() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::with_tokens(["TOK1"]),
			ScriptedTransport::new([Ok(HttpResponse::new(200, json!({ "yes": true })))]),
		);
		let body =
			connection.get("/check", RequestOptions::new()).await.expect("Call should succeed.");

		assert_eq!(body, json!({ "yes": true }));
		assert_eq!(transport.calls(), 1);
		assert_eq!(authorizator.fetches(), 1);
		assert_eq!(authorization_headers(&transport), ["Bearer TOK1"]);
	}

	#[tokio::test]
	async fn rejection_renews_the_token_and_retries_once() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::with_tokens(["TOK1", "TOK2"]),
			ScriptedTransport::new([
				Ok(rejected_by_header()),
				Ok(HttpResponse::new(200, json!({ "yes": true }))),
			]),
		);
		let body =
			connection.get("/check", RequestOptions::new()).await.expect("Retry should succeed.");

		assert_eq!(body, json!({ "yes": true }));
		assert_eq!(transport.calls(), 2);
		assert_eq!(authorizator.fetches(), 2);
		assert_eq!(authorization_headers(&transport), ["Bearer TOK1", "Bearer TOK2"]);
		assert_eq!(connection.metrics().renewals(), 1);
		assert_eq!(
			connection.cache().current().expect("Renewed token should be cached.").token.expose(),
			"TOK2"
		);
	}

	#[tokio::test]
	async fn structured_error_code_also_triggers_renewal() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::with_tokens(["TOK1", "TOK2"]),
			ScriptedTransport::new([
				Ok(rejected_by_code()),
				Ok(HttpResponse::new(200, json!({ "id": 7 }))),
			]),
		);
		let body = connection
			.post("/ideas", RequestOptions::new().body(json!({ "name": "idea" })))
			.await
			.expect("Retry should succeed.");

		assert_eq!(body, json!({ "id": 7 }));
		assert_eq!(transport.calls(), 2);
		assert_eq!(authorizator.fetches(), 2);
	}

	#[tokio::test]
	async fn second_rejection_fails_without_a_third_call() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::with_tokens(["TOK1", "TOK2", "TOK3"]),
			ScriptedTransport::new([Ok(rejected_by_header()), Ok(rejected_by_code())]),
		);
		let err = connection
			.get("/check", RequestOptions::new())
			.await
			.expect_err("Two rejections should fail the call.");

		assert!(matches!(
			err,
			Error::CredentialRejected { code: RejectionCode::InvalidTalkingToken, attempts: 2 }
		));
		assert_eq!(transport.calls(), 2);
		assert_eq!(authorizator.fetches(), 2);
		assert_eq!(connection.metrics().rejections(), 1);
	}

	#[tokio::test]
	async fn unrelated_errors_are_not_retried() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::with_tokens(["TOK1", "TOK2"]),
			ScriptedTransport::new([Ok(HttpResponse::new(
				422,
				json!({ "error": { "code": "7", "message": "no" } }),
			))]),
		);
		let body =
			connection.get("/check", RequestOptions::new()).await.expect("Call should succeed.");

		assert_eq!(body, json!({ "error": { "code": "7", "message": "no" } }));
		assert_eq!(transport.calls(), 1);
		assert_eq!(authorizator.fetches(), 1);
	}

	#[tokio::test]
	async fn invalid_token_data_fails_before_any_call() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::new([Some(json!({ "access_token": "TOK1", "scope": "other" }))]),
			ScriptedTransport::default(),
		);
		let err = connection
			.get("/check", RequestOptions::new())
			.await
			.expect_err("Invalid token data should fail the call.");

		assert!(matches!(err, Error::TokenAcquisition(_)));
		assert_eq!(transport.calls(), 0);
		assert_eq!(authorizator.fetches(), 1);
	}

	#[tokio::test]
	async fn invalid_renewal_data_fails_after_one_call() {
		let (connection, _, transport) = connection(
			ScriptedAuthorizator::new([Some(talking_token_data("TOK1")), None]),
			ScriptedTransport::new([Ok(rejected_by_header())]),
		);
		let err = connection
			.get("/check", RequestOptions::new())
			.await
			.expect_err("Empty renewal data should fail the call.");

		assert!(matches!(err, Error::TokenAcquisition(_)));
		assert_eq!(transport.calls(), 1);
	}

	#[tokio::test]
	async fn transport_errors_propagate_without_retry() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::with_tokens(["TOK1", "TOK2"]),
			ScriptedTransport::new([Err(TransportError::Other { message: "reset".into() })]),
		);
		let err = connection
			.get("/check", RequestOptions::new())
			.await
			.expect_err("Transport failure should propagate.");

		assert!(matches!(err, Error::Transport(TransportError::Other { .. })));
		assert_eq!(transport.calls(), 1);
		assert_eq!(authorizator.fetches(), 1);
		assert!(connection.cache().current().is_some());
	}

	#[tokio::test]
	async fn caller_authorization_header_is_replaced() {
		let (connection, _, transport) =
			connection(ScriptedAuthorizator::with_tokens(["TOK1"]), ScriptedTransport::default());

		connection
			.get("/check", RequestOptions::new().header("authorization", "Bearer mine"))
			.await
			.expect("Call should succeed.");

		let request = transport.requests().remove(0);

		assert_eq!(request.header("Authorization"), Some("Bearer TOK1"));
		assert_eq!(request.options.headers.len(), 1);
	}

	#[tokio::test]
	async fn cached_token_is_reused_across_calls_until_rejected() {
		let (connection, authorizator, transport) = connection(
			ScriptedAuthorizator::with_tokens(["TOK1", "TOK2"]),
			ScriptedTransport::new([
				Ok(HttpResponse::new(200, json!({ "n": 1 }))),
				Ok(rejected_by_header()),
				Ok(HttpResponse::new(200, json!({ "n": 2 }))),
				Ok(HttpResponse::new(200, json!({ "n": 3 }))),
			]),
		);

		for _ in 0..3 {
			connection.get("/check", RequestOptions::new()).await.expect("Call should succeed.");
		}

		assert_eq!(authorizator.fetches(), 2);
		assert_eq!(
			authorization_headers(&transport),
			["Bearer TOK1", "Bearer TOK1", "Bearer TOK2", "Bearer TOK2"]
		);
	}

	/// Rejects `Bearer TOK1` only once both concurrent callers have presented it.
	struct LockstepTransport {
		rendezvous: async_lock::Barrier,
		calls: Mutex<Vec<String>>,
	}
	impl ServiceTransport for LockstepTransport {
		type Response = HttpResponse;

		fn call<'a>(
			&'a self,
			request: &'a ServiceRequest,
		) -> crate::http::TransportFuture<'a, HttpResponse> {
			let authorization = request.header("Authorization").unwrap_or_default().to_owned();

			self.calls.lock().push(authorization.clone());

			Box::pin(async move {
				if authorization == "Bearer TOK1" {
					self.rendezvous.wait().await;

					return Ok(rejected_by_header());
				}

				Ok(HttpResponse::new(200, json!({ "yes": true })))
			})
		}
	}

	#[tokio::test]
	async fn concurrent_rejections_share_one_renewal() {
		let (caller, called, authorizator_service) = service_data();
		let authorizator = Arc::new(ScriptedAuthorizator::with_tokens(["TOK1", "TOK2", "TOK3"]));
		let transport = Arc::new(LockstepTransport {
			rendezvous: async_lock::Barrier::new(2),
			calls: Mutex::new(Vec::new()),
		});
		let connection = Arc::new(
			Connection::<ScriptedAuthorizator, LockstepTransport>::with_clients(
				&caller,
				&called,
				&authorizator_service,
				authorizator.clone(),
				transport.clone(),
			)
			.expect("Connection fixture should build."),
		);

		connection.headers().await.expect("Warm-up fetch should succeed.");

		let handles = (0..2)
			.map(|_| {
				let connection = connection.clone();

				tokio::spawn(async move { connection.get("/check", RequestOptions::new()).await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			let body = handle.await.expect("Task should not panic.").expect("Retry should succeed.");

			assert_eq!(body, json!({ "yes": true }));
		}

		let mut calls = transport.calls.lock().clone();

		calls.sort();

		assert_eq!(calls, ["Bearer TOK1", "Bearer TOK1", "Bearer TOK2", "Bearer TOK2"]);
		assert_eq!(authorizator.fetches(), 2);
		assert_eq!(connection.metrics().renewals(), 2);
	}
}
