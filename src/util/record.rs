//! Generic record type exchanged between controller components
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A generic record describing one cluster entity (a resource, an ideal
/// state, a computed assignment). It carries three field collections keyed
/// by string:
/// - simple fields: scalar configuration values,
/// - list fields: an ordered list of values per key,
/// - map fields: a map of values per key.
///
/// All collections are ordered maps so that serializing a record is
/// byte-stable and two records computed from the same inputs compare equal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
	/// Identifier of the entity this record describes
	pub id: String,
	/// Scalar fields
	pub simple_fields: BTreeMap<String, String>,
	/// Ordered list fields
	pub list_fields: BTreeMap<String, Vec<String>>,
	/// Map fields
	pub map_fields: BTreeMap<String, BTreeMap<String, String>>,
}

impl Record {
	pub fn new(id: impl Into<String>) -> Self {
		Record {
			id: id.into(),
			simple_fields: BTreeMap::new(),
			list_fields: BTreeMap::new(),
			map_fields: BTreeMap::new(),
		}
	}

	pub fn simple_field(&self, key: &str) -> Option<&str> {
		self.simple_fields.get(key).map(String::as_str)
	}

	pub fn set_simple_field(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.simple_fields.insert(key.into(), value.into());
	}

	pub fn list_field(&self, key: &str) -> Option<&[String]> {
		self.list_fields.get(key).map(Vec::as_slice)
	}

	pub fn set_list_field(&mut self, key: impl Into<String>, value: Vec<String>) {
		self.list_fields.insert(key.into(), value);
	}

	pub fn map_field(&self, key: &str) -> Option<&BTreeMap<String, String>> {
		self.map_fields.get(key)
	}

	pub fn set_map_field(&mut self, key: impl Into<String>, value: BTreeMap<String, String>) {
		self.map_fields.insert(key.into(), value);
	}
}
