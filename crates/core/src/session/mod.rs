//! Session state machine and transport event dispatch.
//!
//! A [`Session`] owns one transport instance. All mutable bookkeeping (the
//! correlator, the demultiplexer, pending requests, registered subscriptions
//! and the service-open cache) lives in a single [`Tables`] value behind one
//! lock. The tables are taken out of the session exactly once, on termination,
//! which is what makes every later operation fail with
//! [`Error::SessionTerminated`].
//!
//! Caller code (request callbacks, subscription event senders, start waiters)
//! never runs while the lock is held.

mod auth;
mod request;
mod service;
mod subscribe;

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Weak};

use blpapi_protocol::{
	CorrelationId, SESSION_STARTED, SESSION_STARTUP_FAILURE, SESSION_TERMINATED, SessionOptions,
	TransportEvent,
};
use blpapi_runtime::{
	Connector, Correlator, Error, EventDemux, Handler, Result, Transport, TransportParts, translate,
};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};

pub use request::Response;
use request::RequestCallback;
use service::ServiceOpen;

use crate::completion;
use crate::events::{EVENT_CHANNEL_CAPACITY, SessionEvent};
use crate::subscription::{SubscriptionEvent, SubscriptionTable};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	/// Constructed, or returned here after a failed start.
	Created,
	/// `start` issued, waiting for `SessionStarted`.
	Starting,
	/// Started.
	Active,
	/// `stop` issued, waiting for `SessionTerminated`.
	Stopping,
	/// Terminated. Final.
	Terminated,
}

/// Snapshot of a session's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
	pub pending_requests: usize,
	pub subscriptions: usize,
	pub open_services: usize,
	pub raw_listeners: usize,
}

/// Handle to a session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
	inner: Arc<Inner>,
}

struct Inner {
	transport: Arc<dyn Transport>,
	options: SessionOptions,
	state: Mutex<State>,
	events: broadcast::Sender<SessionEvent>,
	terminated: Shared<BoxFuture<'static, ()>>,
}

struct State {
	lifecycle: Lifecycle,
	tables: Option<Tables>,
	start_waiters: Vec<oneshot::Sender<Result<()>>>,
	terminated_tx: Option<oneshot::Sender<()>>,
}

impl State {
	fn is_accepting(&self) -> bool {
		!matches!(self.lifecycle, Lifecycle::Stopping | Lifecycle::Terminated)
	}

	/// Returns the tables if new operations may still be started.
	fn accepting(&mut self) -> Result<&mut Tables> {
		if !self.is_accepting() {
			return Err(Error::SessionTerminated);
		}
		self.tables.as_mut().ok_or(Error::SessionTerminated)
	}
}

#[derive(Default)]
struct Tables {
	correlator: Correlator,
	demux: EventDemux,
	requests: HashMap<CorrelationId, RequestCallback>,
	subscriptions: SubscriptionTable,
	services: HashMap<String, ServiceOpen>,
}

impl Tables {
	/// Registers `handler` for every event in `events`, or for none of them.
	fn listen_all(&mut self, events: &[&str], correlation: CorrelationId, handler: Handler) -> Result<()> {
		for (registered, event) in events.iter().enumerate() {
			if let Err(err) = self.demux.listen(event, correlation, Arc::clone(&handler)) {
				self.unlisten_all(&events[..registered], correlation);
				return Err(err);
			}
		}
		Ok(())
	}

	fn unlisten_all(&mut self, events: &[&str], correlation: CorrelationId) {
		for event in events {
			self.demux.unlisten(event, correlation);
		}
	}
}

impl Session {
	/// Creates a session over an already connected transport and starts
	/// dispatching its events.
	///
	/// Must be called from within a tokio runtime.
	pub fn new(options: SessionOptions, parts: TransportParts) -> Self {
		let TransportParts { transport, events } = parts;
		let (terminated_tx, terminated_rx) = oneshot::channel::<()>();
		let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

		let inner = Arc::new(Inner {
			transport,
			options,
			state: Mutex::new(State {
				lifecycle: Lifecycle::Created,
				tables: Some(Tables::default()),
				start_waiters: Vec::new(),
				terminated_tx: Some(terminated_tx),
			}),
			events: events_tx,
			terminated: terminated_rx.map(|_| ()).boxed().shared(),
		});

		tokio::spawn(dispatch_loop(Arc::downgrade(&inner), events));
		Self { inner }
	}

	/// Connects a transport through `connector` and wraps it in a session.
	pub fn connect(options: SessionOptions, connector: &impl Connector) -> Result<Self> {
		tracing::debug!(
			host = %options.server_host,
			port = options.server_port,
			"Connecting transport"
		);
		let parts = connector.connect(&options).map_err(translate)?;
		Ok(Self::new(options, parts))
	}

	/// Starts the session.
	///
	/// Resolves on `SessionStarted` and fails with a protocol error on
	/// `SessionStartupFailure`, after which `start` may be called again.
	/// Concurrent calls share one transport start.
	pub async fn start(&self) -> Result<()> {
		let waiter = {
			let mut state = self.inner.state.lock();
			match state.lifecycle {
				Lifecycle::Active => return Ok(()),
				Lifecycle::Stopping | Lifecycle::Terminated => return Err(Error::SessionTerminated),
				Lifecycle::Starting => {}
				Lifecycle::Created => {
					self.inner.transport.start().map_err(translate)?;
					state.lifecycle = Lifecycle::Starting;
					tracing::debug!("Session starting");
				}
			}
			let (tx, rx) = oneshot::channel();
			state.start_waiters.push(tx);
			rx
		};
		waiter.await.unwrap_or(Err(Error::SessionTerminated))
	}

	/// Stops the session and waits for termination.
	///
	/// Idempotent: only the first call reaches the transport and every call
	/// resolves once termination has been observed.
	pub async fn stop(&self) -> Result<()> {
		let terminated = {
			let mut state = self.inner.state.lock();
			match state.lifecycle {
				Lifecycle::Terminated => return Ok(()),
				Lifecycle::Stopping => {}
				_ => {
					self.inner.transport.stop().map_err(translate)?;
					state.lifecycle = Lifecycle::Stopping;
					tracing::debug!("Session stopping");
				}
			}
			self.inner.terminated.clone()
		};
		terminated.await;
		Ok(())
	}

	/// Callback form of [`start`](Self::start).
	pub fn start_with<C>(&self, callback: C)
	where
		C: FnOnce(Result<()>) + Send + 'static,
	{
		let session = self.clone();
		completion::attach(async move { session.start().await }, callback);
	}

	/// Callback form of [`stop`](Self::stop).
	pub fn stop_with<C>(&self, callback: C)
	where
		C: FnOnce(Result<()>) + Send + 'static,
	{
		let session = self.clone();
		completion::attach(async move { session.stop().await }, callback);
	}

	pub fn lifecycle(&self) -> Lifecycle {
		self.inner.state.lock().lifecycle
	}

	pub fn options(&self) -> &SessionOptions {
		&self.inner.options
	}

	/// Subscribes to session-level events.
	pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
		self.inner.events.subscribe()
	}

	pub fn stats(&self) -> SessionStats {
		let state = self.inner.state.lock();
		state
			.tables
			.as_ref()
			.map(|tables| SessionStats {
				pending_requests: tables.requests.len(),
				subscriptions: tables.subscriptions.len(),
				open_services: tables.services.len(),
				raw_listeners: tables.demux.raw_listener_count(),
			})
			.unwrap_or_default()
	}

	/// Returns true if a raw listener is installed for `event`.
	pub fn is_listening(&self, event: &str) -> bool {
		let state = self.inner.state.lock();
		state
			.tables
			.as_ref()
			.is_some_and(|tables| tables.demux.is_listening(event))
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("options", &self.inner.options)
			.field("lifecycle", &self.lifecycle())
			.finish()
	}
}

async fn dispatch_loop(inner: Weak<Inner>, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
	while let Some(event) = events.recv().await {
		let Some(inner) = inner.upgrade() else {
			return;
		};
		if inner.dispatch(event).is_break() {
			return;
		}
	}
	if let Some(inner) = inner.upgrade() {
		tracing::debug!("Transport event channel closed");
		inner.terminate(Value::Null);
	}
}

impl Inner {
	fn dispatch(&self, event: TransportEvent) -> ControlFlow<()> {
		tracing::trace!(event = %event.name, correlation = ?event.correlation_id(), "Transport event");
		match event.name.as_str() {
			SESSION_STARTED => self.on_started(),
			SESSION_STARTUP_FAILURE => self.on_startup_failure(event.payload()),
			SESSION_TERMINATED => {
				self.terminate(event.payload());
				return ControlFlow::Break(());
			}
			_ => self.route(event),
		}
		ControlFlow::Continue(())
	}

	fn route(&self, event: TransportEvent) {
		let routed = {
			let state = self.state.lock();
			let Some(tables) = state.tables.as_ref() else {
				tracing::trace!(event = %event.name, "Event after termination dropped");
				return;
			};
			tables.demux.route(&event)
		};
		match routed {
			Ok(Some(handler)) => handler(&event),
			Ok(None) => {
				let _ = self.events.send(SessionEvent::Unrouted(event));
			}
			Err(err) => tracing::error!(error = %err, "Dropping transport event"),
		}
	}

	fn on_started(&self) {
		let waiters = {
			let mut state = self.state.lock();
			if state.lifecycle != Lifecycle::Starting {
				tracing::warn!(lifecycle = ?state.lifecycle, "Unexpected SessionStarted");
				return;
			}
			state.lifecycle = Lifecycle::Active;
			std::mem::take(&mut state.start_waiters)
		};
		tracing::debug!("Session started");
		for waiter in waiters {
			let _ = waiter.send(Ok(()));
		}
		let _ = self.events.send(SessionEvent::Started);
	}

	fn on_startup_failure(&self, data: Value) {
		let waiters = {
			let mut state = self.state.lock();
			if state.lifecycle == Lifecycle::Starting {
				state.lifecycle = Lifecycle::Created;
			}
			std::mem::take(&mut state.start_waiters)
		};
		let message = Error::protocol_from(data.clone()).to_string();
		tracing::warn!(%message, "Session startup failed");
		for waiter in waiters {
			let _ = waiter.send(Err(Error::protocol_from(data.clone())));
		}
		let _ = self.events.send(SessionEvent::StartupFailure(message));
	}

	/// Tears the session down. Runs once; later calls return immediately.
	fn terminate(&self, data: Value) {
		let (tables, waiters, terminated_tx) = {
			let mut state = self.state.lock();
			if state.lifecycle == Lifecycle::Terminated {
				return;
			}
			state.lifecycle = Lifecycle::Terminated;
			(
				state.tables.take(),
				std::mem::take(&mut state.start_waiters),
				state.terminated_tx.take(),
			)
		};

		if let Some(mut tables) = tables {
			tracing::debug!(
				requests = tables.requests.len(),
				subscriptions = tables.subscriptions.len(),
				"Failing pending operations"
			);
			for (_, callback) in tables.requests.drain() {
				callback.call(Err(Error::SessionTerminated));
			}
			for (_, subscription) in tables.subscriptions.drain() {
				subscription.emit(SubscriptionEvent::Error(Error::SessionTerminated));
			}
			let removed = tables.demux.clear();
			tracing::trace!(removed, "Raw listeners removed");
		}
		for waiter in waiters {
			let _ = waiter.send(Err(Error::SessionTerminated));
		}
		if let Err(err) = self.transport.destroy() {
			tracing::warn!(error = %translate(err), "Transport destroy failed");
		}
		if let Some(tx) = terminated_tx {
			let _ = tx.send(());
		}
		tracing::debug!("Session terminated");
		let _ = self.events.send(SessionEvent::Terminated(data));
	}
}

impl Drop for Inner {
	fn drop(&mut self) {
		if self.state.get_mut().lifecycle == Lifecycle::Terminated {
			return;
		}
		tracing::debug!("Session dropped before termination, destroying transport");
		if let Err(err) = self.transport.destroy() {
			tracing::warn!(error = %translate(err), "Transport destroy failed");
		}
	}
}
