//! Error types for the session engine.
//!
//! Failures raised by the transport arrive as [`TransportError`] values tagged
//! with the name of the native exception type. [`translate`] maps the known
//! tags onto typed variants and passes everything else through unchanged.

use serde_json::Value;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the session engine.
#[derive(Debug, Error)]
pub enum Error {
	/// Operation attempted after the session was stopped or terminated.
	#[error("session terminated")]
	SessionTerminated,

	/// A subscription in the batch is already registered with the session.
	#[error("Subscription already exists for index {index}")]
	DuplicateSubscription { index: usize },

	/// A subscription in the batch is not registered with the session.
	#[error("Subscription not found at index {index}")]
	SubscriptionNotFound { index: usize },

	/// No response route is known for the request name.
	#[error("Request, {0}, not handled")]
	UnknownRequest(String),

	/// No subscription events are known for the service.
	#[error("Service, {0}, not handled")]
	UnknownService(String),

	/// The transport reported that a service could not be opened.
	#[error("Failed to open service {uri}: {message}")]
	ServiceOpen { uri: String, message: String },

	/// The transport reported a failure event (startup, token, authorization).
	#[error("{message}")]
	Protocol {
		/// Reason message or description
		message: String,
		/// Raw failure payload
		data: Value,
	},

	#[error("DuplicateCorrelationIdException: {0}")]
	DuplicateCorrelationId(String),

	#[error("InvalidStateException: {0}")]
	InvalidState(String),

	#[error("InvalidArgumentException: {0}")]
	InvalidArgument(String),

	#[error("InvalidConversionException: {0}")]
	InvalidConversion(String),

	#[error("IndexOutOfRangeException: {0}")]
	IndexOutOfRange(String),

	#[error("FieldNotFoundException: {0}")]
	FieldNotFound(String),

	#[error("NotFoundException: {0}")]
	NotFound(String),

	#[error("UnknownErrorException: {0}")]
	UnknownError(String),

	#[error("UnsupportedOperationException: {0}")]
	UnsupportedOperation(String),

	/// Transport failure with no recognised type tag.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// An event arrived for a correlation id nobody registered.
	#[error("correlation id does not exist: {correlation} (event {event})")]
	CorrelationNotRegistered { event: String, correlation: u64 },

	/// An event with a registered listener arrived without any correlation.
	#[error("event {0} carries no correlation id")]
	Uncorrelated(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Builds a protocol error from a failure payload.
	///
	/// Subscription failures describe themselves with `reason.description`,
	/// other failures with `reason.message`.
	pub fn protocol_from(data: Value) -> Self {
		let reason = &data["reason"];
		let message = reason["message"]
			.as_str()
			.or_else(|| reason["description"].as_str())
			.unwrap_or("unknown failure")
			.to_string();
		Error::Protocol { message, data }
	}

	/// Returns true if this is the session-terminated error.
	pub fn is_session_terminated(&self) -> bool {
		matches!(self, Error::SessionTerminated)
	}

	/// Returns the native exception type name for translated transport errors.
	pub fn type_name(&self) -> Option<&str> {
		let name = match self {
			Error::DuplicateCorrelationId(_) => "DuplicateCorrelationIdException",
			Error::InvalidState(_) => "InvalidStateException",
			Error::InvalidArgument(_) => "InvalidArgumentException",
			Error::InvalidConversion(_) => "InvalidConversionException",
			Error::IndexOutOfRange(_) => "IndexOutOfRangeException",
			Error::FieldNotFound(_) => "FieldNotFoundException",
			Error::NotFound(_) => "NotFoundException",
			Error::UnknownError(_) => "UnknownErrorException",
			Error::UnsupportedOperation(_) => "UnsupportedOperationException",
			Error::Transport(raw) => return raw.type_name.as_deref(),
			_ => return None,
		};
		Some(name)
	}
}

/// Converts a tagged transport failure into a typed [`Error`].
///
/// Unknown or missing tags yield [`Error::Transport`] carrying the raw error.
pub fn translate(error: TransportError) -> Error {
	let Some(type_name) = error.type_name.as_deref() else {
		return Error::Transport(error);
	};
	let ctor: fn(String) -> Error = match type_name {
		"DuplicateCorrelationIdException" => Error::DuplicateCorrelationId,
		"InvalidStateException" => Error::InvalidState,
		// older bindings shipped the tag misspelled
		"InvalidArgumentException" | "InvalidAggrgumentException" => Error::InvalidArgument,
		"InvalidConversionException" => Error::InvalidConversion,
		"IndexOutOfRangeException" => Error::IndexOutOfRange,
		"FieldNotFoundException" => Error::FieldNotFound,
		"NotFoundException" => Error::NotFound,
		"UnknownErrorException" => Error::UnknownError,
		"UnsupportedOperationException" => Error::UnsupportedOperation,
		_ => return Error::Transport(error),
	};
	ctor(error.message)
}
