//! Event demultiplexer.
//!
//! Many operations share one named event stream (every historical request
//! is answered on `HistoricalDataResponse`, every market data subscription on
//! `MarketDataEvents`). The demultiplexer keeps one raw listener per event
//! name and, under it, one handler per correlation id.
//!
//! # Invariant
//!
//! A raw listener exists for an event name exactly while at least one
//! correlation id is registered under it.
//!
//! Routing returns the handler rather than invoking it so that the owner can
//! release its locks before running caller code.

use std::collections::HashMap;
use std::sync::Arc;

use blpapi_protocol::{CorrelationId, TransportEvent};

use crate::error::{Error, Result};

/// Callback invoked with each event routed to a correlation id.
pub type Handler = Arc<dyn Fn(&TransportEvent) + Send + Sync>;

/// Per-event-name handler tables.
#[derive(Default)]
pub struct EventDemux {
	listeners: HashMap<String, HashMap<CorrelationId, Handler>>,
}

impl EventDemux {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handler` for events named `event` carrying `correlation`.
	///
	/// Installs the raw listener for `event` if this is its first handler.
	/// Registering the same pair twice is rejected and leaves the existing
	/// handler in place.
	pub fn listen(&mut self, event: &str, correlation: CorrelationId, handler: Handler) -> Result<()> {
		let handlers = self.listeners.entry(event.to_string()).or_insert_with(|| {
			tracing::trace!(event, "Listener added");
			HashMap::new()
		});

		if handlers.contains_key(&correlation) {
			return Err(Error::DuplicateCorrelationId(format!(
				"{event} already has a handler for correlation id {correlation}"
			)));
		}
		handlers.insert(correlation, handler);
		Ok(())
	}

	/// Removes the handler for (`event`, `correlation`).
	///
	/// Removes the raw listener when its last handler goes. Returns whether a
	/// handler was removed.
	pub fn unlisten(&mut self, event: &str, correlation: CorrelationId) -> bool {
		let Some(handlers) = self.listeners.get_mut(event) else {
			return false;
		};
		let removed = handlers.remove(&correlation).is_some();
		if handlers.is_empty() {
			self.listeners.remove(event);
			tracing::trace!(event, "Listener removed");
		}
		removed
	}

	/// Finds the handler for an incoming event.
	///
	/// Returns `Ok(None)` when no raw listener exists for the event name.
	/// An event that has a raw listener but an unknown or missing correlation
	/// id means the transport broke its contract and is reported as an error.
	pub fn route(&self, event: &TransportEvent) -> Result<Option<Handler>> {
		let Some(handlers) = self.listeners.get(&event.name) else {
			return Ok(None);
		};
		let correlation = event
			.correlation_id()
			.ok_or_else(|| Error::Uncorrelated(event.name.clone()))?;

		match handlers.get(&correlation) {
			Some(handler) => Ok(Some(Arc::clone(handler))),
			None => Err(Error::CorrelationNotRegistered {
				event: event.name.clone(),
				correlation,
			}),
		}
	}

	/// Returns true if a raw listener is installed for `event`.
	pub fn is_listening(&self, event: &str) -> bool {
		self.listeners.contains_key(event)
	}

	/// Number of handlers registered under `event`.
	pub fn handler_count(&self, event: &str) -> usize {
		self.listeners.get(event).map_or(0, HashMap::len)
	}

	/// Number of raw listeners installed.
	pub fn raw_listener_count(&self) -> usize {
		self.listeners.len()
	}

	/// Removes every raw listener and handler. Returns how many raw listeners
	/// were removed.
	pub fn clear(&mut self) -> usize {
		let count = self.listeners.len();
		for event in self.listeners.keys() {
			tracing::trace!(event = %event, "Listener removed");
		}
		self.listeners.clear();
		count
	}
}
