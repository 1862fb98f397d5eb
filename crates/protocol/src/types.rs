//! Shared protocol types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Caller-assigned tag binding an outbound operation to its inbound events.
pub type CorrelationId = u64;

/// Subscription as handed to the transport's subscribe and unsubscribe calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
	/// Security string, optionally prefixed with a service URI
	pub security: String,
	/// Requested fields in order
	pub fields: Vec<String>,
	/// Correlation id assigned at subscribe time
	pub correlation: CorrelationId,
	/// Subscription options (interval, delayed, ...)
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<Value>,
}

/// Opaque user identity produced by the transport.
///
/// Identities are passed back to the transport untouched on requests and
/// subscriptions made on behalf of an authorized user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Value);

impl Identity {
	/// Wraps a transport identity handle.
	pub fn from_handle(handle: Value) -> Self {
		Self(handle)
	}

	/// Returns the transport handle.
	pub fn handle(&self) -> &Value {
		&self.0
	}
}
