//! Tagged key/value bundle used for attach replies, permission results and
//! user service arguments.
//!
//! Lookups are lenient: a missing key or a value of the wrong type yields the
//! caller's default, so older and newer peers can add fields freely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ComponentName;

/// A single tagged bundle value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BundleValue {
	Int(i32),
	Bool(bool),
	String(String),
	Component(ComponentName),
}

/// Ordered map of tagged values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle(BTreeMap<String, BundleValue>);

impl Bundle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn contains_key(&self, key: &str) -> bool {
		self.0.contains_key(key)
	}

	pub fn get(&self, key: &str) -> Option<&BundleValue> {
		self.0.get(key)
	}

	pub fn put(&mut self, key: impl Into<String>, value: BundleValue) {
		self.0.insert(key.into(), value);
	}

	pub fn put_int(&mut self, key: impl Into<String>, value: i32) {
		self.put(key, BundleValue::Int(value));
	}

	pub fn put_bool(&mut self, key: impl Into<String>, value: bool) {
		self.put(key, BundleValue::Bool(value));
	}

	pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.put(key, BundleValue::String(value.into()));
	}

	pub fn put_component(&mut self, key: impl Into<String>, value: ComponentName) {
		self.put(key, BundleValue::Component(value));
	}

	/// Chained form of [`Bundle::put_int`].
	pub fn with_int(mut self, key: impl Into<String>, value: i32) -> Self {
		self.put_int(key, value);
		self
	}

	/// Chained form of [`Bundle::put_bool`].
	pub fn with_bool(mut self, key: impl Into<String>, value: bool) -> Self {
		self.put_bool(key, value);
		self
	}

	/// Chained form of [`Bundle::put_string`].
	pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.put_string(key, value);
		self
	}

	pub fn get_int(&self, key: &str, default: i32) -> i32 {
		match self.0.get(key) {
			Some(BundleValue::Int(value)) => *value,
			_ => default,
		}
	}

	pub fn get_bool(&self, key: &str, default: bool) -> bool {
		match self.0.get(key) {
			Some(BundleValue::Bool(value)) => *value,
			_ => default,
		}
	}

	pub fn get_string(&self, key: &str) -> Option<&str> {
		match self.0.get(key) {
			Some(BundleValue::String(value)) => Some(value),
			_ => None,
		}
	}

	pub fn get_component(&self, key: &str) -> Option<&ComponentName> {
		match self.0.get(key) {
			Some(BundleValue::Component(value)) => Some(value),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn typed_getters_fall_back_on_mismatch() {
		let bundle = Bundle::new().with_int("uid", 2000).with_string("context", "u:r:shell:s0");

		assert_eq!(bundle.get_int("uid", -1), 2000);
		assert_eq!(bundle.get_int("missing", -1), -1);
		assert_eq!(bundle.get_int("context", -1), -1);
		assert!(!bundle.get_bool("uid", false));
		assert_eq!(bundle.get_string("context"), Some("u:r:shell:s0"));
		assert_eq!(bundle.get_string("uid"), None);
	}

	#[test]
	fn wire_shape_is_tagged() {
		let bundle = Bundle::new().with_bool("granted", true);
		let json = serde_json::to_value(&bundle).unwrap();
		assert_eq!(json["granted"]["type"], "bool");
		assert_eq!(json["granted"]["value"], true);
	}
}
