//! Per-call options for requests and subscriptions.
//!
//! Older call sites pass an identity, a label, both, or neither. All of those
//! shapes convert into one [`CallOptions`] at the API boundary so the session
//! internals only ever see a single form.

use blpapi_protocol::Identity;

/// Identity and label attached to a request or subscription.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
	/// Identity the operation is performed for
	pub identity: Option<Identity>,
	/// Free-form label recorded by the transport
	pub label: Option<String>,
}

impl CallOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the identity.
	pub fn identity(mut self, identity: Identity) -> Self {
		self.identity = Some(identity);
		self
	}

	/// Sets the label.
	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}
}

impl From<()> for CallOptions {
	fn from(_: ()) -> Self {
		Self::default()
	}
}

impl From<Identity> for CallOptions {
	fn from(identity: Identity) -> Self {
		Self::new().identity(identity)
	}
}

impl From<Option<Identity>> for CallOptions {
	fn from(identity: Option<Identity>) -> Self {
		Self {
			identity,
			label: None,
		}
	}
}

impl From<&str> for CallOptions {
	fn from(label: &str) -> Self {
		Self::new().label(label)
	}
}

impl From<String> for CallOptions {
	fn from(label: String) -> Self {
		Self::new().label(label)
	}
}

impl From<(Identity, &str)> for CallOptions {
	fn from((identity, label): (Identity, &str)) -> Self {
		Self::new().identity(identity).label(label)
	}
}

impl From<(Option<Identity>, Option<&str>)> for CallOptions {
	fn from((identity, label): (Option<Identity>, Option<&str>)) -> Self {
		Self {
			identity,
			label: label.map(str::to_string),
		}
	}
}
