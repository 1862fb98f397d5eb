use std::sync::Arc;

use blpapi_protocol::{
	AUTH_SERVICE, AUTHORIZATION_REQUEST, CorrelationId, Identity, TOKEN_GENERATION_REQUEST,
	response_route,
};
use blpapi_runtime::{Error, Result, Transport, TransportResult, translate};
use tokio::sync::oneshot;

use super::request::{RequestCallback, Response};
use super::{Inner, Session};
use crate::completion;

impl Session {
	/// Generates an authentication token through `//blp/apiauth`.
	pub async fn authenticate(&self) -> Result<String> {
		let response = self
			.inner
			.outcome_request(TOKEN_GENERATION_REQUEST, |transport, correlation| {
				transport.generate_token(correlation)
			})
			.await?;
		if let Some(token) = response.data["token"].as_str() {
			return Ok(token.to_string());
		}
		Err(Error::Protocol {
			message: "TokenGenerationSuccess carries no token".to_string(),
			data: response.data,
		})
	}

	/// Authorizes a fresh identity with `token`.
	pub async fn authorize(&self, token: &str) -> Result<Identity> {
		{
			let mut state = self.inner.state.lock();
			state.accepting()?;
		}
		let identity = self.inner.transport.create_identity().map_err(translate)?;

		let token = token.to_string();
		let authorizing = identity.clone();
		self.inner
			.outcome_request(AUTHORIZATION_REQUEST, move |transport, correlation| {
				transport.send_authorization_request(&token, &authorizing, correlation)
			})
			.await?;
		tracing::debug!("Identity authorized");
		Ok(identity)
	}

	/// Callback form of [`authenticate`](Self::authenticate).
	pub fn authenticate_with<C>(&self, callback: C)
	where
		C: FnOnce(Result<String>) + Send + 'static,
	{
		let session = self.clone();
		completion::attach(async move { session.authenticate().await }, callback);
	}

	/// Callback form of [`authorize`](Self::authorize).
	pub fn authorize_with<C>(&self, token: impl Into<String>, callback: C)
	where
		C: FnOnce(Result<Identity>) + Send + 'static,
	{
		let session = self.clone();
		let token = token.into();
		completion::attach(async move { session.authorize(&token).await }, callback);
	}
}

impl Inner {
	/// Runs a single-outcome request against the auth service.
	async fn outcome_request<E>(self: &Arc<Self>, request_name: &str, execute: E) -> Result<Response>
	where
		E: FnOnce(&dyn Transport, CorrelationId) -> TransportResult<()> + Send + 'static,
	{
		let route = response_route(request_name)
			.ok_or_else(|| Error::UnknownRequest(request_name.to_string()))?;
		let (tx, rx) = oneshot::channel();
		let mut tx = Some(tx);
		let callback = RequestCallback::new(move |result| {
			if let Some(tx) = tx.take() {
				let _ = tx.send(result);
			}
		});
		self.dispatch_request(AUTH_SERVICE, route, callback, execute);
		rx.await.unwrap_or(Err(Error::SessionTerminated))
	}
}
