//! Service-open cache.
//!
//! At most one open is in flight or completed per URI. Every caller of the
//! same URI awaits the same shared future. A failed open removes its entry so
//! the next caller starts a fresh attempt.

use std::sync::Arc;

use blpapi_protocol::{CorrelationId, SERVICE_OPEN_FAILURE, SERVICE_OPENED, TransportEvent};
use blpapi_runtime::{Error, Handler, Result, translate};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{Inner, Session};

const SERVICE_EVENTS: [&str; 2] = [SERVICE_OPENED, SERVICE_OPEN_FAILURE];

pub(super) type ServiceOpen = Shared<BoxFuture<'static, std::result::Result<(), OpenFailure>>>;

/// Outcome of a failed open, shared between all waiters.
#[derive(Debug, Clone)]
pub(super) enum OpenFailure {
	Rejected { uri: String, message: String },
	Terminated,
}

impl OpenFailure {
	fn into_error(self) -> Error {
		match self {
			OpenFailure::Rejected { uri, message } => Error::ServiceOpen { uri, message },
			OpenFailure::Terminated => Error::SessionTerminated,
		}
	}
}

/// Waits for a service open obtained from [`Inner::open_service`].
pub(super) async fn opened(open: Result<ServiceOpen>) -> Result<()> {
	open?.await.map_err(OpenFailure::into_error)
}

impl Session {
	/// Opens `uri`, or joins the open already in flight for it.
	///
	/// Resolves immediately for services that are already open.
	pub async fn open_service(&self, uri: &str) -> Result<()> {
		opened(self.inner.open_service(uri)).await
	}
}

impl Inner {
	pub(super) fn open_service(self: &Arc<Self>, uri: &str) -> Result<ServiceOpen> {
		let mut state = self.state.lock();
		let tables = state.accepting()?;
		if let Some(open) = tables.services.get(uri) {
			return Ok(open.clone());
		}

		let correlation = tables.correlator.next();
		let (tx, rx) = oneshot::channel();
		tables.listen_all(&SERVICE_EVENTS, correlation, self.open_handler(uri, correlation, tx))?;
		if let Err(err) = self.transport.open_service(uri, correlation) {
			tables.unlisten_all(&SERVICE_EVENTS, correlation);
			return Err(translate(err));
		}
		tracing::debug!(uri, correlation, "Opening service");

		let open = rx
			.map(|outcome| outcome.unwrap_or(Err(OpenFailure::Terminated)))
			.boxed()
			.shared();
		tables.services.insert(uri.to_string(), open.clone());
		Ok(open)
	}

	fn open_handler(
		self: &Arc<Self>,
		uri: &str,
		correlation: CorrelationId,
		tx: oneshot::Sender<std::result::Result<(), OpenFailure>>,
	) -> Handler {
		let session = Arc::downgrade(self);
		let uri = uri.to_string();
		let tx = Mutex::new(Some(tx));
		Arc::new(move |event: &TransportEvent| {
			let Some(inner) = session.upgrade() else {
				return;
			};
			let outcome = if event.name == SERVICE_OPENED {
				tracing::debug!(uri = %uri, "Service opened");
				Ok(())
			} else {
				let message = Error::protocol_from(event.payload()).to_string();
				tracing::warn!(uri = %uri, %message, "Service open failed");
				Err(OpenFailure::Rejected {
					uri: uri.clone(),
					message,
				})
			};
			{
				let mut state = inner.state.lock();
				if let Some(tables) = state.tables.as_mut() {
					tables.unlisten_all(&SERVICE_EVENTS, correlation);
					if outcome.is_err() {
						tables.services.remove(&uri);
					}
				}
			}
			if let Some(tx) = tx.lock().take() {
				let _ = tx.send(outcome);
			}
		})
	}
}
