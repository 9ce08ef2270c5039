//! Service-to-service connections that call another service's endpoints on behalf of a caller
//! service, acquiring authorizator-issued talking tokens lazily, caching them until they expire,
//! and renewing them once when the called service rejects them.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod authorizator;
pub mod cache;
pub mod config;
pub mod connection;
pub mod credential;
pub mod error;
pub mod http;
pub mod identity;
pub mod obs;
pub mod request;
pub mod response;
pub mod source;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and scripted collaborators for tests; enabled via `cfg(test)` or
	//! the `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::{
		collections::VecDeque,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		authorizator::{AuthorizatorClient, AuthorizatorFuture},
		connection::Connection,
		error::TransportError,
		http::{HttpResponse, ServiceRequest, ServiceTransport, TransportFuture},
		identity::{AuthorizatorIdentity, CallerIdentity, ServiceData},
	};

	/// Connection type alias wired to the scripted collaborators.
	pub type ScriptedConnection = Connection<ScriptedAuthorizator, ScriptedTransport>;

	/// Canonical valid raw token payload used across tests.
	pub fn talking_token_data(token: &str) -> serde_json::Value {
		serde_json::json!({
			"access_token": token,
			"token_type": "bearer",
			"expires_in": 1000,
			"scope": "service_mate",
		})
	}

	/// Caller, called, and authorizator records matching the reference scenario.
	pub fn service_data() -> (ServiceData, ServiceData, ServiceData) {
		let caller = ServiceData::new().with_client_id("12345").with_client_secret("67890");
		let called = ServiceData::new().with_site(
			Url::parse("https://called.example.com").expect("Called site fixture should parse."),
		);
		let authorizator = ServiceData::new().with_site(
			Url::parse("http://localhost:3000").expect("Authorizator site fixture should parse."),
		);

		(caller, called, authorizator)
	}

	/// Builds a connection over scripted collaborators using [`service_data`].
	pub fn scripted_connection(
		authorizator: ScriptedAuthorizator,
		transport: ScriptedTransport,
	) -> ScriptedConnection {
		let (caller, called, authorizator_service) = service_data();

		Connection::with_clients(&caller, &called, &authorizator_service, authorizator, transport)
			.expect("Scripted connection fixture should build.")
	}

	/// Authorizator fake that replays queued payloads and counts fetches.
	///
	/// Once the queue is exhausted the last payload is repeated.
	#[derive(Debug, Default)]
	pub struct ScriptedAuthorizator {
		payloads: Mutex<VecDeque<Option<serde_json::Value>>>,
		last: Mutex<Option<serde_json::Value>>,
		fetches: AtomicUsize,
	}
	impl ScriptedAuthorizator {
		/// Queues the provided payloads in order.
		pub fn new<I>(payloads: I) -> Self
		where
			I: IntoIterator<Item = Option<serde_json::Value>>,
		{
			Self { payloads: Mutex::new(payloads.into_iter().collect()), ..Default::default() }
		}

		/// Queues one valid payload per token value.
		pub fn with_tokens<I, S>(tokens: I) -> Self
		where
			I: IntoIterator<Item = S>,
			S: AsRef<str>,
		{
			Self::new(tokens.into_iter().map(|token| Some(talking_token_data(token.as_ref()))))
		}

		/// Number of fetches served so far.
		pub fn fetches(&self) -> usize {
			self.fetches.load(Ordering::SeqCst)
		}
	}
	impl AuthorizatorClient for ScriptedAuthorizator {
		fn fetch_talking_token<'a>(
			&'a self,
			_caller: &'a CallerIdentity,
			_authorizator: &'a AuthorizatorIdentity,
		) -> AuthorizatorFuture<'a> {
			self.fetches.fetch_add(1, Ordering::SeqCst);

			let payload = match self.payloads.lock().pop_front() {
				Some(payload) => {
					*self.last.lock() = payload.clone();

					payload
				},
				None => self.last.lock().clone(),
			};

			Box::pin(async move { Ok(payload) })
		}
	}

	/// Transport fake that replays queued responses and records every request.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
		requests: Mutex<Vec<ServiceRequest>>,
	}
	impl ScriptedTransport {
		/// Queues the provided outcomes in order; an exhausted queue answers `200 {}`.
		pub fn new<I>(responses: I) -> Self
		where
			I: IntoIterator<Item = Result<HttpResponse, TransportError>>,
		{
			Self { responses: Mutex::new(responses.into_iter().collect()), ..Default::default() }
		}

		/// Requests observed so far.
		pub fn requests(&self) -> Vec<ServiceRequest> {
			self.requests.lock().clone()
		}

		/// Number of calls observed so far.
		pub fn calls(&self) -> usize {
			self.requests.lock().len()
		}
	}
	impl ServiceTransport for ScriptedTransport {
		type Response = HttpResponse;

		fn call<'a>(&'a self, request: &'a ServiceRequest) -> TransportFuture<'a, HttpResponse> {
			self.requests.lock().push(request.clone());

			let outcome = self
				.responses
				.lock()
				.pop_front()
				.unwrap_or_else(|| Ok(HttpResponse::new(200, serde_json::json!({}))));

			Box::pin(async move { outcome })
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
