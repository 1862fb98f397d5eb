//! Boundary to the native transport.
//!
//! The transport is a black box with two surfaces:
//!
//! - a synchronous call surface ([`Transport`]) that accepts operations tagged
//!   with correlation ids and never blocks waiting for their outcome
//! - an event stream of [`TransportEvent`]s carrying those ids back
//!
//! Connection establishment, the wire protocol and authentication handshake
//! internals live behind this boundary.

use std::sync::Arc;

use blpapi_protocol::{CorrelationId, Identity, SessionOptions, SubscriptionRecord, TransportEvent};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

/// Raw failure raised by a transport call.
///
/// `type_name` carries the native exception type, when the binding knows it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
	pub type_name: Option<String>,
	pub message: String,
}

impl TransportError {
	/// Creates an untagged error.
	pub fn new(message: impl Into<String>) -> Self {
		Self {
			type_name: None,
			message: message.into(),
		}
	}

	/// Creates an error tagged with a native exception type name.
	pub fn tagged(type_name: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			type_name: Some(type_name.into()),
			message: message.into(),
		}
	}
}

/// Result type alias for transport calls.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Synchronous call surface of the native transport.
///
/// Every call returns as soon as the operation is queued; outcomes arrive later
/// as events carrying the supplied correlation id.
pub trait Transport: Send + Sync {
	/// Begins session startup. Answered by `SessionStarted` or `SessionStartupFailure`.
	fn start(&self) -> TransportResult<()>;

	/// Begins session shutdown. Answered by `SessionTerminated`.
	fn stop(&self) -> TransportResult<()>;

	/// Releases native resources. Called exactly once, after termination.
	fn destroy(&self) -> TransportResult<()>;

	/// Opens a service. Answered by `ServiceOpened` or `ServiceOpenFailure`.
	fn open_service(&self, uri: &str, correlation: CorrelationId) -> TransportResult<()>;

	/// Sends a request to an opened service.
	fn request(
		&self,
		uri: &str,
		request_name: &str,
		payload: &Value,
		correlation: CorrelationId,
		identity: Option<&Identity>,
		label: Option<&str>,
	) -> TransportResult<()>;

	/// Subscribes to a batch of securities.
	fn subscribe(
		&self,
		subscriptions: &[SubscriptionRecord],
		identity: Option<&Identity>,
		label: Option<&str>,
	) -> TransportResult<()>;

	/// Cancels a batch of subscriptions.
	fn unsubscribe(
		&self,
		subscriptions: &[SubscriptionRecord],
		label: Option<&str>,
	) -> TransportResult<()>;

	/// Requests a token. Answered by `TokenGenerationSuccess` or `TokenGenerationFailure`.
	fn generate_token(&self, correlation: CorrelationId) -> TransportResult<()>;

	/// Creates an empty identity to be filled by authorization.
	fn create_identity(&self) -> TransportResult<Identity>;

	/// Authorizes `identity` with `token`. Answered by `AuthorizationSuccess` or
	/// `AuthorizationFailure`.
	fn send_authorization_request(
		&self,
		token: &str,
		identity: &Identity,
		correlation: CorrelationId,
	) -> TransportResult<()>;
}

/// Call surface plus event stream of one transport instance.
pub struct TransportParts {
	pub transport: Arc<dyn Transport>,
	pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportParts {
	pub fn new(
		transport: Arc<dyn Transport>,
		events: mpsc::UnboundedReceiver<TransportEvent>,
	) -> Self {
		Self { transport, events }
	}
}

/// Builds transports from session options.
pub trait Connector {
	fn connect(&self, options: &SessionOptions) -> TransportResult<TransportParts>;
}
