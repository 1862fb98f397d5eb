//! Caller-facing subscriptions and the session's registry of them.

use std::collections::HashMap;
use std::sync::Arc;

use blpapi_protocol::{CorrelationId, SubscriptionRecord, service_for_security};
use blpapi_runtime::Error;
use serde_json::Value;
use tokio::sync::mpsc;

/// Event delivered to a subscription's [`SubscriptionEvents`] stream.
#[derive(Debug)]
pub enum SubscriptionEvent {
	/// One update, paired with the record the subscription was made with.
	Data {
		data: Value,
		record: Arc<SubscriptionRecord>,
	},
	/// The subscription was ended by a failure (e.g. session termination).
	Error(Error),
	/// The subscription was ended by an explicit unsubscribe.
	End,
}

/// A market data subscription.
///
/// Handles are cheap to clone and clones refer to the same subscription: a
/// subscription registered with a session through one clone counts as
/// registered for all of them.
#[derive(Clone)]
pub struct Subscription {
	inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
	security: String,
	fields: Vec<String>,
	options: Option<Value>,
	events_tx: mpsc::UnboundedSender<SubscriptionEvent>,
}

impl Subscription {
	/// Creates a subscription and the stream its events are delivered on.
	pub fn new<I, S>(
		security: impl Into<String>,
		fields: I,
		options: Option<Value>,
	) -> (Self, SubscriptionEvents)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let subscription = Self {
			inner: Arc::new(SubscriptionInner {
				security: security.into(),
				fields: fields.into_iter().map(Into::into).collect(),
				options,
				events_tx,
			}),
		};
		(subscription, SubscriptionEvents { rx: events_rx })
	}

	/// Returns the security string.
	pub fn security(&self) -> &str {
		&self.inner.security
	}

	/// Returns the requested fields.
	pub fn fields(&self) -> &[String] {
		&self.inner.fields
	}

	/// Returns the subscription options, if any.
	pub fn options(&self) -> Option<&Value> {
		self.inner.options.as_ref()
	}

	/// Returns the service URI this subscription is made through.
	pub fn service(&self) -> &str {
		service_for_security(&self.inner.security)
	}

	/// Builds the transport record for this subscription.
	pub(crate) fn record(&self, correlation: CorrelationId) -> SubscriptionRecord {
		SubscriptionRecord {
			security: self.inner.security.clone(),
			fields: self.inner.fields.clone(),
			correlation,
			options: self.inner.options.clone(),
		}
	}

	pub(crate) fn emit(&self, event: SubscriptionEvent) {
		if self.inner.events_tx.send(event).is_err() {
			tracing::trace!(security = %self.inner.security, "Subscription events dropped by receiver");
		}
	}

	/// Identity of the underlying subscription, shared by all clones.
	fn instance_key(&self) -> usize {
		Arc::as_ptr(&self.inner) as usize
	}
}

impl PartialEq for Subscription {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Subscription {}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("security", &self.inner.security)
			.field("fields", &self.inner.fields)
			.field("options", &self.inner.options)
			.finish()
	}
}

/// Receiving half of a subscription's events.
#[derive(Debug)]
pub struct SubscriptionEvents {
	rx: mpsc::UnboundedReceiver<SubscriptionEvent>,
}

impl SubscriptionEvents {
	/// Receives the next event.
	///
	/// Returns `None` once every handle of the subscription is dropped and all
	/// queued events have been received.
	pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
		self.rx.recv().await
	}

	/// Receives an already queued event without waiting.
	pub fn try_recv(&mut self) -> Option<SubscriptionEvent> {
		self.rx.try_recv().ok()
	}
}

/// Subscriptions registered with a session, by correlation id and by instance.
///
/// A registered handle keeps its instance alive, so instance keys cannot be
/// reused while registered.
#[derive(Default)]
pub(crate) struct SubscriptionTable {
	by_correlation: HashMap<CorrelationId, Subscription>,
	by_instance: HashMap<usize, CorrelationId>,
}

impl SubscriptionTable {
	pub fn correlation_of(&self, subscription: &Subscription) -> Option<CorrelationId> {
		self.by_instance.get(&subscription.instance_key()).copied()
	}

	pub fn insert(&mut self, correlation: CorrelationId, subscription: Subscription) {
		self.by_instance
			.insert(subscription.instance_key(), correlation);
		self.by_correlation.insert(correlation, subscription);
	}

	pub fn remove(&mut self, correlation: CorrelationId) -> Option<Subscription> {
		let subscription = self.by_correlation.remove(&correlation)?;
		self.by_instance.remove(&subscription.instance_key());
		Some(subscription)
	}

	pub fn drain(&mut self) -> Vec<(CorrelationId, Subscription)> {
		self.by_instance.clear();
		self.by_correlation.drain().collect()
	}

	pub fn len(&self) -> usize {
		self.by_correlation.len()
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn test_clones_share_identity() {
		let (first, _events) = Subscription::new("IBM US Equity", ["LAST_PRICE"], None);
		let (second, _other) = Subscription::new("IBM US Equity", ["LAST_PRICE"], None);

		assert_eq!(first, first.clone());
		assert_ne!(first, second);
	}

	#[test]
	fn test_record_carries_options() {
		let (subscription, _events) = Subscription::new(
			"//blp/mktbar/ticker/VOD LN Equity",
			["LAST_PRICE"],
			Some(json!({"interval": 5})),
		);
		let record = subscription.record(12);

		assert_eq!(subscription.service(), "//blp/mktbar");
		assert_eq!(record.correlation, 12);
		assert_eq!(record.options, Some(json!({"interval": 5})));
	}

	#[test]
	fn test_table_tracks_instances() {
		let (subscription, _events) = Subscription::new("IBM US Equity", ["BID"], None);
		let mut table = SubscriptionTable::default();

		table.insert(3, subscription.clone());
		assert_eq!(table.correlation_of(&subscription.clone()), Some(3));
		assert_eq!(table.len(), 1);

		assert_eq!(table.remove(3), Some(subscription.clone()));
		assert_eq!(table.correlation_of(&subscription), None);
		assert!(table.remove(3).is_none());
	}

	#[test]
	fn test_emit_reaches_events() {
		let (subscription, mut events) = Subscription::new("IBM US Equity", ["BID"], None);
		subscription.emit(SubscriptionEvent::End);
		assert!(matches!(events.try_recv(), Some(SubscriptionEvent::End)));
		assert!(events.try_recv().is_none());
	}
}
