//! Events emitted by the transport.
//!
//! Every event has a name and carries zero or more correlation entries. The
//! first entry is the one used to route the event back to the operation that
//! caused it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::CorrelationId;

/// Session started successfully.
pub const SESSION_STARTED: &str = "SessionStarted";
/// Session failed to start.
pub const SESSION_STARTUP_FAILURE: &str = "SessionStartupFailure";
/// Session terminated, either on request or unsolicited.
pub const SESSION_TERMINATED: &str = "SessionTerminated";
/// A service open completed.
pub const SERVICE_OPENED: &str = "ServiceOpened";
/// A service open failed.
pub const SERVICE_OPEN_FAILURE: &str = "ServiceOpenFailure";

/// One correlation entry attached to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
	pub value: CorrelationId,
}

/// A named event delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportEvent {
	/// Event name (e.g. `"ServiceOpened"`, `"HistoricalDataResponse"`)
	pub name: String,
	/// Correlation entries, first one routes the event
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub correlations: Vec<Correlation>,
	/// Transport event type tag (`RESPONSE`, `PARTIAL_RESPONSE`, ...)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub event_type: Option<String>,
	/// Message type name inside the event
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message_type: Option<String>,
	/// Opaque payload
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl TransportEvent {
	/// Creates an event with no correlations or payload.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	/// Attaches a correlation id.
	pub fn correlated(mut self, id: CorrelationId) -> Self {
		self.correlations.push(Correlation { value: id });
		self
	}

	/// Sets the event type tag.
	pub fn event_type(mut self, event_type: EventType) -> Self {
		self.event_type = Some(event_type.as_str().to_string());
		self
	}

	/// Sets the message type name.
	pub fn message_type(mut self, message_type: impl Into<String>) -> Self {
		self.message_type = Some(message_type.into());
		self
	}

	/// Sets the payload.
	pub fn data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	/// Returns the routing correlation id (first entry), if any.
	pub fn correlation_id(&self) -> Option<CorrelationId> {
		self.correlations.first().map(|c| c.value)
	}

	/// Returns the payload or `Value::Null`.
	pub fn payload(&self) -> Value {
		self.data.clone().unwrap_or(Value::Null)
	}

	/// Classifies the event type tag.
	pub fn kind(&self) -> EventType {
		EventType::parse(self.event_type.as_deref())
	}
}

/// Transport event type tags relevant to response handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
	/// Final chunk of a response
	Response,
	/// Intermediate chunk of a response
	PartialResponse,
	/// Any other tag (token status, subscription data, ...)
	Other,
}

impl EventType {
	pub fn parse(tag: Option<&str>) -> Self {
		match tag {
			Some("RESPONSE") => EventType::Response,
			Some("PARTIAL_RESPONSE") => EventType::PartialResponse,
			_ => EventType::Other,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			EventType::Response => "RESPONSE",
			EventType::PartialResponse => "PARTIAL_RESPONSE",
			EventType::Other => "OTHER",
		}
	}

	/// Returns true only for the `RESPONSE` tag.
	///
	/// Untagged and status-tagged chunks of a streamed response are not
	/// final; single-shot outcome routes do not consult this.
	pub fn is_final(&self) -> bool {
		matches!(self, EventType::Response)
	}
}
