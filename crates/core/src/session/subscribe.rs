use std::sync::Arc;

use blpapi_protocol::{CorrelationId, SubscriptionRecord, TransportEvent, subscription_events};
use blpapi_runtime::{Error, Handler, Result, translate};
use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture, join_all};

use super::service::opened;
use super::{Inner, Session, Tables};
use crate::completion;
use crate::options::CallOptions;
use crate::subscription::{Subscription, SubscriptionEvent};

/// A subscription registered by one `subscribe` call.
struct Registered {
	correlation: CorrelationId,
	subscription: Subscription,
	record: Arc<SubscriptionRecord>,
	events: &'static [&'static str],
}

/// A registered batch waiting for its services to open.
///
/// Unregisters the batch on drop unless it was handed to
/// [`Inner::activate_subscriptions`].
struct PendingBatch {
	inner: Arc<Inner>,
	registered: Vec<Registered>,
	armed: bool,
}

impl PendingBatch {
	fn activate(mut self, options: &CallOptions) -> Result<()> {
		self.armed = false;
		self.inner.activate_subscriptions(&self.registered, options)
	}
}

impl Drop for PendingBatch {
	fn drop(&mut self) {
		if self.armed {
			tracing::debug!(count = self.registered.len(), "Subscribe abandoned, unregistering");
			self.inner.unregister_subscriptions(&self.registered);
		}
	}
}

impl Session {
	/// Subscribes a batch of subscriptions.
	///
	/// The batch is registered and its service opens are issued before this
	/// returns, so a batch that is already registered or maps to an unknown
	/// service fails immediately and the returned future resolves to that
	/// error. Services are opened concurrently; if any open fails nothing is
	/// sent to the transport and the batch is unregistered again. Dropping the
	/// future before it resolves also unregisters the batch.
	pub fn subscribe(
		&self,
		subscriptions: &[Subscription],
		options: impl Into<CallOptions>,
	) -> BoxFuture<'static, Result<()>> {
		let options = options.into();
		let registered = match self.inner.register_subscriptions(subscriptions) {
			Ok(registered) => registered,
			Err(err) => return future::ready(Err(err)).boxed(),
		};
		let batch = PendingBatch {
			inner: Arc::clone(&self.inner),
			registered,
			armed: true,
		};

		let mut services: Vec<&str> = Vec::new();
		for entry in &batch.registered {
			let service = entry.subscription.service();
			if !services.contains(&service) {
				services.push(service);
			}
		}
		let opens: Vec<_> = services
			.into_iter()
			.map(|uri| opened(self.inner.open_service(uri)))
			.collect();

		async move {
			if let Some(err) = join_all(opens).await.into_iter().find_map(Result::err) {
				return Err(err);
			}
			batch.activate(&options)
		}
		.boxed()
	}

	/// Callback form of [`subscribe`](Self::subscribe).
	pub fn subscribe_with<C>(&self, subscriptions: Vec<Subscription>, options: impl Into<CallOptions>, callback: C)
	where
		C: FnOnce(Result<()>) + Send + 'static,
	{
		completion::attach(self.subscribe(&subscriptions, options), callback);
	}

	/// Cancels a batch of subscriptions.
	///
	/// Fails without side effects if any subscription is not registered. Each
	/// subscription receives [`SubscriptionEvent::End`] once the cancellation
	/// has been processed.
	pub fn unsubscribe(&self, subscriptions: &[Subscription], label: Option<&str>) -> Result<()> {
		let correlations = {
			let mut state = self.inner.state.lock();
			let tables = state.accepting()?;
			let mut correlations = Vec::with_capacity(subscriptions.len());
			for (index, subscription) in subscriptions.iter().enumerate() {
				let Some(correlation) = tables.subscriptions.correlation_of(subscription) else {
					return Err(Error::SubscriptionNotFound { index });
				};
				if correlations.contains(&correlation) {
					return Err(Error::DuplicateSubscription { index });
				}
				correlations.push(correlation);
			}
			let records: Vec<SubscriptionRecord> = subscriptions
				.iter()
				.zip(&correlations)
				.map(|(subscription, &correlation)| subscription.record(correlation))
				.collect();
			self.inner
				.transport
				.unsubscribe(&records, label)
				.map_err(translate)?;
			correlations
		};
		tracing::debug!(count = correlations.len(), "Unsubscribed");

		let inner = Arc::clone(&self.inner);
		tokio::spawn(async move { inner.end_subscriptions(&correlations) });
		Ok(())
	}
}

impl Inner {
	fn register_subscriptions(&self, subscriptions: &[Subscription]) -> Result<Vec<Registered>> {
		let mut state = self.state.lock();
		let tables = state.accepting()?;

		let mut events = Vec::with_capacity(subscriptions.len());
		for (index, subscription) in subscriptions.iter().enumerate() {
			if tables.subscriptions.correlation_of(subscription).is_some()
				|| subscriptions[..index].contains(subscription)
			{
				return Err(Error::DuplicateSubscription { index });
			}
			let service = subscription.service();
			events.push(
				subscription_events(service)
					.ok_or_else(|| Error::UnknownService(service.to_string()))?,
			);
		}

		Ok(subscriptions
			.iter()
			.zip(events)
			.map(|(subscription, events)| {
				let correlation = tables.correlator.next();
				tables.subscriptions.insert(correlation, subscription.clone());
				Registered {
					correlation,
					subscription: subscription.clone(),
					record: Arc::new(subscription.record(correlation)),
					events,
				}
			})
			.collect())
	}

	fn unregister_subscriptions(&self, registered: &[Registered]) {
		let mut state = self.state.lock();
		if let Some(tables) = state.tables.as_mut() {
			unregister(tables, registered);
		}
	}

	fn activate_subscriptions(&self, registered: &[Registered], options: &CallOptions) -> Result<()> {
		let mut state = self.state.lock();
		let accepting = state.is_accepting();
		// Termination already ended every registered subscription.
		let Some(tables) = state.tables.as_mut() else {
			return Err(Error::SessionTerminated);
		};
		if !accepting {
			unregister(tables, registered);
			return Err(Error::SessionTerminated);
		}

		// Entries unsubscribed while their service was opening already ended.
		let live: Vec<&Registered> = registered
			.iter()
			.filter(|entry| tables.subscriptions.correlation_of(&entry.subscription) == Some(entry.correlation))
			.collect();
		if live.len() < registered.len() {
			tracing::debug!(skipped = registered.len() - live.len(), "Skipping cancelled subscriptions");
		}
		if live.is_empty() {
			return Ok(());
		}

		for (listening, entry) in live.iter().enumerate() {
			let handler = data_handler(entry.subscription.clone(), Arc::clone(&entry.record));
			if let Err(err) = tables.listen_all(entry.events, entry.correlation, handler) {
				for entry in &live[..listening] {
					tables.unlisten_all(entry.events, entry.correlation);
				}
				unregister(tables, registered);
				return Err(err);
			}
		}

		let records: Vec<SubscriptionRecord> = live
			.iter()
			.map(|entry| entry.record.as_ref().clone())
			.collect();
		if let Err(err) = self.transport.subscribe(
			&records,
			options.identity.as_ref(),
			options.label.as_deref(),
		) {
			for entry in &live {
				tables.unlisten_all(entry.events, entry.correlation);
			}
			unregister(tables, registered);
			return Err(translate(err));
		}
		tracing::debug!(count = records.len(), "Subscribed");
		Ok(())
	}

	fn end_subscriptions(&self, correlations: &[CorrelationId]) {
		let ended: Vec<Subscription> = {
			let mut state = self.state.lock();
			let Some(tables) = state.tables.as_mut() else {
				return;
			};
			correlations
				.iter()
				.filter_map(|&correlation| {
					let subscription = tables.subscriptions.remove(correlation)?;
					if let Some(events) = subscription_events(subscription.service()) {
						tables.unlisten_all(events, correlation);
					}
					Some(subscription)
				})
				.collect()
		};
		for subscription in ended {
			subscription.emit(SubscriptionEvent::End);
		}
	}
}

fn unregister(tables: &mut Tables, registered: &[Registered]) {
	for entry in registered {
		tables.subscriptions.remove(entry.correlation);
	}
}

fn data_handler(subscription: Subscription, record: Arc<SubscriptionRecord>) -> Handler {
	Arc::new(move |event: &TransportEvent| {
		subscription.emit(SubscriptionEvent::Data {
			data: event.payload(),
			record: Arc::clone(&record),
		});
	})
}
