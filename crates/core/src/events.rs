//! Session-level events for external listeners.

use blpapi_protocol::TransportEvent;
use serde_json::Value;

/// Capacity of the session event broadcast channel.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events published on [`Session::events`](crate::Session::events).
#[derive(Debug, Clone)]
pub enum SessionEvent {
	/// The transport reported a successful start.
	Started,
	/// The transport reported a failed start.
	StartupFailure(String),
	/// The session terminated. Carries the transport's termination payload.
	Terminated(Value),
	/// A transport event no operation was listening for (status and admin
	/// events such as `SessionConnectionUp` or `SlowConsumerWarning`).
	Unrouted(TransportEvent),
}
