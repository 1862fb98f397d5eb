//! Loading session options from disk.

use std::path::Path;

use blpapi_protocol::SessionOptions;

use crate::error::Result;

/// Reads [`SessionOptions`] from a JSON file.
///
/// Missing keys fall back to their defaults.
pub fn load_options(path: &Path) -> Result<SessionOptions> {
	let contents = std::fs::read_to_string(path)?;
	let options = serde_json::from_str(&contents)?;
	tracing::debug!(path = %path.display(), ?options, "Loaded session options");
	Ok(options)
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;
	use crate::Error;

	#[test]
	fn test_load_options() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"serverHost": "10.0.0.7", "authenticationOptions": "AuthenticationType=OS_LOGON"}}"#
		)
		.unwrap();

		let options = load_options(file.path()).unwrap();
		assert_eq!(options.server_host, "10.0.0.7");
		assert_eq!(options.server_port, 8194);
		assert_eq!(
			options.authentication_options.as_deref(),
			Some("AuthenticationType=OS_LOGON")
		);
	}

	#[test]
	fn test_load_options_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let err = load_options(&dir.path().join("absent.json")).unwrap_err();
		assert!(matches!(err, Error::Io(_)), "Expected Io error, got {err:?}");
	}

	#[test]
	fn test_load_options_invalid_json() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(file, "serverHost = 1").unwrap();

		let err = load_options(file.path()).unwrap_err();
		assert!(matches!(err, Error::Json(_)), "Expected Json error, got {err:?}");
	}
}
