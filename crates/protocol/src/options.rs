//! Session configuration.

use serde::{Deserialize, Serialize};

/// Default host the transport connects to.
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// Default port the transport connects to.
pub const DEFAULT_SERVER_PORT: u16 = 8194;

/// Options used to construct a session's transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOptions {
	/// Server host name
	pub server_host: String,
	/// Server port
	pub server_port: u16,
	/// Authentication options string understood by the transport
	#[serde(skip_serializing_if = "Option::is_none")]
	pub authentication_options: Option<String>,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			server_host: DEFAULT_SERVER_HOST.to_string(),
			server_port: DEFAULT_SERVER_PORT,
			authentication_options: None,
		}
	}
}

impl SessionOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the server host.
	pub fn server_host(mut self, host: impl Into<String>) -> Self {
		self.server_host = host.into();
		self
	}

	/// Sets the server port.
	pub fn server_port(mut self, port: u16) -> Self {
		self.server_port = port;
		self
	}

	/// Sets the authentication options string.
	pub fn authentication_options(mut self, options: impl Into<String>) -> Self {
		self.authentication_options = Some(options.into());
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_partial_json_uses_defaults() {
		let options: SessionOptions = serde_json::from_str(r#"{"serverPort": 8294}"#).unwrap();
		assert_eq!(options.server_host, "localhost");
		assert_eq!(options.server_port, 8294);
		assert!(options.authentication_options.is_none());
	}

	#[test]
	fn test_builder() {
		let options = SessionOptions::new()
			.server_host("bpipe.example.com")
			.authentication_options("AuthenticationMode=APPLICATION_ONLY");
		assert_eq!(options.server_host, "bpipe.example.com");
		assert_eq!(options.server_port, DEFAULT_SERVER_PORT);
		assert_eq!(
			options.authentication_options.as_deref(),
			Some("AuthenticationMode=APPLICATION_ONLY")
		);
	}
}
