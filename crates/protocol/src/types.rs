//! Small value types shared by several message schemas.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a component inside an application package.
///
/// Renders as `package/class`, e.g. `com.example/.FileService`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentName {
	pub package: String,
	pub class: String,
}

impl ComponentName {
	pub fn new(package: impl Into<String>, class: impl Into<String>) -> Self {
		Self {
			package: package.into(),
			class: class.into(),
		}
	}
}

impl fmt::Display for ComponentName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.package, self.class)
	}
}

/// Index of an object reference inside a parcel's object table.
///
/// Handles and stubs cannot be serialized into the byte payload, so the
/// payload refers to them by position instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectSlot(pub u32);

impl ObjectSlot {
	pub const FIRST: ObjectSlot = ObjectSlot(0);

	pub fn index(self) -> usize {
		self.0 as usize
	}
}

/// Outcome of a permission check or request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionResult {
	Granted,
	Denied,
}

impl PermissionResult {
	/// Maps the wire code of a permission check: `0` is granted, any other
	/// code is a denial.
	pub fn from_code(code: i32) -> Self {
		if code == 0 { Self::Granted } else { Self::Denied }
	}

	pub fn from_allowed(allowed: bool) -> Self {
		if allowed { Self::Granted } else { Self::Denied }
	}
}
