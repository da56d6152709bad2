//! Session configuration.
//!
//! Loaded from JSON (camelCase keys); every field has a default so an empty
//! object is a valid config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_DISPATCH_THREAD_NAME: &str = "tether-dispatch";
const DEFAULT_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionConfig {
	/// Name of the spawned designated dispatch thread.
	pub dispatch_thread_name: String,
	/// Buffer size of the [`SessionEvent`](crate::SessionEvent) broadcast channel.
	pub event_capacity: usize,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			dispatch_thread_name: DEFAULT_DISPATCH_THREAD_NAME.to_string(),
			event_capacity: DEFAULT_EVENT_CAPACITY,
		}
	}
}

impl SessionConfig {
	pub fn from_path(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)?;
		let config: Self = serde_json::from_str(&content).map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<()> {
		if self.dispatch_thread_name.trim().is_empty() {
			return Err(Error::Config("dispatchThreadName must not be empty".to_string()));
		}
		if self.event_capacity == 0 {
			return Err(Error::Config("eventCapacity must be greater than zero".to_string()));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_object_yields_defaults() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tether.json");
		fs::write(&path, "{}").unwrap();

		assert_eq!(SessionConfig::from_path(&path).unwrap(), SessionConfig::default());
	}

	#[test]
	fn partial_config_overrides_named_fields() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tether.json");
		fs::write(&path, r#"{ "eventCapacity": 8 }"#).unwrap();

		let config = SessionConfig::from_path(&path).unwrap();
		assert_eq!(config.event_capacity, 8);
		assert_eq!(config.dispatch_thread_name, DEFAULT_DISPATCH_THREAD_NAME);
	}

	#[test]
	fn zero_capacity_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tether.json");
		fs::write(&path, r#"{ "eventCapacity": 0 }"#).unwrap();

		let err = SessionConfig::from_path(&path).unwrap_err();
		assert!(matches!(err, Error::Config(_)));
	}

	#[test]
	fn missing_file_is_io_error() {
		let err = SessionConfig::from_path(Path::new("/nonexistent/tether.json")).unwrap_err();
		assert!(matches!(err, Error::Io(_)));
	}
}
