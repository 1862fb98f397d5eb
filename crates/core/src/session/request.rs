//! Request lifecycle.
//!
//! A request is registered under a fresh correlation id, waits for its service
//! to open, then listens on the response events of its route and hands every
//! response chunk to the caller's callback. The callback sees zero or more
//! partial chunks followed by exactly one final chunk or exactly one error.

use std::sync::Arc;

use blpapi_protocol::{CorrelationId, ResponseRoute, TransportEvent, response_route};
use blpapi_runtime::{Error, Handler, Result, Transport, TransportResult, translate};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::service::opened;
use super::{Inner, Session};
use crate::options::CallOptions;

/// One chunk of a request's response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
	/// Message payload
	pub data: Value,
	/// True on the last chunk
	pub is_final: bool,
	/// Message type name, when the transport reports one
	pub message_type: Option<String>,
}

impl Response {
	fn from_event(event: &TransportEvent, is_final: bool) -> Self {
		Self {
			data: event.payload(),
			is_final,
			message_type: event.message_type.clone(),
		}
	}
}

type Callback = Box<dyn FnMut(Result<Response>) + Send>;

/// Caller callback of a pending request.
#[derive(Clone)]
pub(super) struct RequestCallback(Arc<Mutex<Callback>>);

impl RequestCallback {
	pub(super) fn new<F>(callback: F) -> Self
	where
		F: FnMut(Result<Response>) + Send + 'static,
	{
		Self(Arc::new(Mutex::new(Box::new(callback))))
	}

	pub(super) fn call(&self, result: Result<Response>) {
		(self.0.lock())(result)
	}
}

impl Session {
	/// Sends `request_name` to the service at `uri`.
	///
	/// Every outcome, including failure to open the service and session
	/// termination, is delivered through `callback`. Only an unknown request
	/// name is reported through the return value, before anything is sent.
	pub fn request<F>(
		&self,
		uri: &str,
		request_name: &str,
		payload: Value,
		callback: F,
		options: impl Into<CallOptions>,
	) -> Result<()>
	where
		F: FnMut(Result<Response>) + Send + 'static,
	{
		let route = response_route(request_name)
			.ok_or_else(|| Error::UnknownRequest(request_name.to_string()))?;
		let options = options.into();
		let service = uri.to_string();
		let name = request_name.to_string();

		self.inner.dispatch_request(
			uri,
			route,
			RequestCallback::new(callback),
			move |transport, correlation| {
				transport.request(
					&service,
					&name,
					&payload,
					correlation,
					options.identity.as_ref(),
					options.label.as_deref(),
				)
			},
		);
		Ok(())
	}

	/// Like [`request`](Self::request), delivering chunks on a channel.
	///
	/// The channel closes after the final chunk or the first error.
	pub fn request_stream(
		&self,
		uri: &str,
		request_name: &str,
		payload: Value,
		options: impl Into<CallOptions>,
	) -> Result<mpsc::UnboundedReceiver<Result<Response>>> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.request(
			uri,
			request_name,
			payload,
			move |chunk| {
				let _ = tx.send(chunk);
			},
			options,
		)?;
		Ok(rx)
	}
}

impl Inner {
	/// Registers a request and sends it once `uri` is open.
	///
	/// `execute` performs the transport call for the allocated correlation id.
	pub(super) fn dispatch_request<E>(
		self: &Arc<Self>,
		uri: &str,
		route: ResponseRoute,
		callback: RequestCallback,
		execute: E,
	) where
		E: FnOnce(&dyn Transport, CorrelationId) -> TransportResult<()> + Send + 'static,
	{
		let registered = {
			let mut state = self.state.lock();
			state.accepting().map(|tables| {
				let correlation = tables.correlator.next();
				tables.requests.insert(correlation, callback.clone());
				correlation
			})
		};
		let correlation = match registered {
			Ok(correlation) => correlation,
			Err(err) => {
				callback.call(Err(err));
				return;
			}
		};
		tracing::debug!(uri, correlation, "Request registered");

		let open = self.open_service(uri);
		let inner = Arc::clone(self);
		tokio::spawn(async move {
			let outcome = opened(open).await;
			inner.send_request(correlation, route, outcome, execute);
		});
	}

	fn send_request<E>(
		self: &Arc<Self>,
		correlation: CorrelationId,
		route: ResponseRoute,
		open_outcome: Result<()>,
		execute: E,
	) where
		E: FnOnce(&dyn Transport, CorrelationId) -> TransportResult<()>,
	{
		let events = route.event_names();
		let failure = {
			let mut state = self.state.lock();
			// Gone when termination already failed the callback.
			let Some(tables) = state.tables.as_mut() else {
				return;
			};
			if !tables.requests.contains_key(&correlation) {
				return;
			}
			let sent = open_outcome.and_then(|()| {
				tables.listen_all(&events, correlation, self.response_handler(correlation, route))?;
				execute(self.transport.as_ref(), correlation).map_err(|err| {
					tables.unlisten_all(&events, correlation);
					translate(err)
				})
			});
			match sent {
				Ok(()) => None,
				Err(err) => Some((err, tables.requests.remove(&correlation))),
			}
		};
		if let Some((err, Some(callback))) = failure {
			tracing::debug!(correlation, error = %err, "Request failed before dispatch");
			callback.call(Err(err));
		}
	}

	fn response_handler(self: &Arc<Self>, correlation: CorrelationId, route: ResponseRoute) -> Handler {
		let session = Arc::downgrade(self);
		Arc::new(move |event: &TransportEvent| {
			let Some(inner) = session.upgrade() else {
				return;
			};
			let result = match route {
				ResponseRoute::Stream(_) => Ok(Response::from_event(event, event.kind().is_final())),
				ResponseRoute::Outcome { success, .. } if event.name == success => {
					Ok(Response::from_event(event, true))
				}
				ResponseRoute::Outcome { .. } => Err(Error::protocol_from(event.payload())),
			};
			let is_final = result.as_ref().map_or(true, |response| response.is_final);

			let callback = {
				let mut state = inner.state.lock();
				let Some(tables) = state.tables.as_mut() else {
					return;
				};
				if is_final {
					tables.unlisten_all(&route.event_names(), correlation);
					tables.requests.remove(&correlation)
				} else {
					tables.requests.get(&correlation).cloned()
				}
			};
			tracing::trace!(correlation, is_final, "Response routed");
			if let Some(callback) = callback {
				callback.call(result);
			}
		})
	}
}
