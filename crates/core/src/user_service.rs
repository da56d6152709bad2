//! User service arguments and the local connection callback.
//!
//! A user service is a component of the calling application that the server
//! runs in a separate privileged process. Services are keyed by component and
//! optional tag; the version code tells the server when to recreate an
//! existing instance after an upgrade.

use std::sync::Arc;

use tether_protocol::keys::{
	USER_SERVICE_ARG_COMPONENT, USER_SERVICE_ARG_DEBUGGABLE, USER_SERVICE_ARG_PROCESS_NAME, USER_SERVICE_ARG_TAG, USER_SERVICE_ARG_VERSION_CODE,
};
use tether_protocol::{Bundle, ComponentName};
use tether_runtime::RemoteHandle;

use crate::error::{Error, Result};

/// Receives connect/disconnect events for a bound user service.
///
/// Both methods run on the dispatch thread.
pub trait ServiceConnection: Send + Sync {
	fn on_service_connected(&self, component: &ComponentName, service: Arc<dyn RemoteHandle>);

	fn on_service_disconnected(&self, component: &ComponentName);
}

/// Registry key of a user service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserServiceKey {
	pub component: ComponentName,
	pub tag: Option<String>,
}

/// Validated, immutable arguments for binding a user service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserServiceArgs {
	component: ComponentName,
	tag: Option<String>,
	version_code: i32,
	debuggable: bool,
	process_name_suffix: String,
}

impl UserServiceArgs {
	pub fn builder(component: ComponentName) -> UserServiceArgsBuilder {
		UserServiceArgsBuilder {
			component,
			tag: None,
			version_code: 1,
			debuggable: false,
			process_name_suffix: None,
		}
	}

	pub fn component(&self) -> &ComponentName {
		&self.component
	}

	pub fn tag(&self) -> Option<&str> {
		self.tag.as_deref()
	}

	pub fn version_code(&self) -> i32 {
		self.version_code
	}

	pub fn debuggable(&self) -> bool {
		self.debuggable
	}

	pub fn process_name_suffix(&self) -> &str {
		&self.process_name_suffix
	}

	pub fn key(&self) -> UserServiceKey {
		UserServiceKey {
			component: self.component.clone(),
			tag: self.tag.clone(),
		}
	}

	/// Options sent with the remote add call.
	pub fn add_options(&self) -> Bundle {
		let mut options = Bundle::new();
		options.put_component(USER_SERVICE_ARG_COMPONENT, self.component.clone());
		options.put_bool(USER_SERVICE_ARG_DEBUGGABLE, self.debuggable);
		options.put_int(USER_SERVICE_ARG_VERSION_CODE, self.version_code);
		options.put_string(USER_SERVICE_ARG_PROCESS_NAME, self.process_name_suffix.clone());
		if let Some(tag) = &self.tag {
			options.put_string(USER_SERVICE_ARG_TAG, tag.clone());
		}
		options
	}

	/// Options sent with the remote remove call.
	pub fn remove_options(&self) -> Bundle {
		let mut options = Bundle::new();
		options.put_component(USER_SERVICE_ARG_COMPONENT, self.component.clone());
		if let Some(tag) = &self.tag {
			options.put_string(USER_SERVICE_ARG_TAG, tag.clone());
		}
		options
	}
}

pub struct UserServiceArgsBuilder {
	component: ComponentName,
	tag: Option<String>,
	version_code: i32,
	debuggable: bool,
	process_name_suffix: Option<String>,
}

impl UserServiceArgsBuilder {
	/// Distinguishes several instances of the same component.
	pub fn tag(mut self, tag: impl Into<String>) -> Self {
		self.tag = Some(tag.into());
		self
	}

	/// A different version makes the server recreate a running instance.
	pub fn version(mut self, version_code: i32) -> Self {
		self.version_code = version_code;
		self
	}

	pub fn debuggable(mut self, debuggable: bool) -> Self {
		self.debuggable = debuggable;
		self
	}

	/// Suffix of the service process name (`<package>:<suffix>`). Required.
	pub fn process_name_suffix(mut self, suffix: impl Into<String>) -> Self {
		self.process_name_suffix = Some(suffix.into());
		self
	}

	pub fn build(self) -> Result<UserServiceArgs> {
		let process_name_suffix = match self.process_name_suffix {
			Some(suffix) if !suffix.trim().is_empty() => suffix,
			_ => return Err(Error::InvalidArgs("process name suffix is required for standalone user services".to_string())),
		};
		if self.tag.as_deref().is_some_and(|tag| tag.is_empty()) {
			return Err(Error::InvalidArgs("tag must not be empty".to_string()));
		}
		Ok(UserServiceArgs {
			component: self.component,
			tag: self.tag,
			version_code: self.version_code,
			debuggable: self.debuggable,
			process_name_suffix,
		})
	}
}
