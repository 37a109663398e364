use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use conductor_util::error::*;
use conductor_util::record::Record;

/// How the controller computes the placement of a resource's replicas
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RebalanceMode {
	/// The controller recomputes the full placement automatically
	Auto,
	/// The controller only picks states; placement is given by the user
	SemiAuto,
	/// Placement and states are both given by the user
	Customized,
}

impl RebalanceMode {
	pub fn parse(v: &str) -> Option<Self> {
		match v {
			"AUTO" => Some(Self::Auto),
			"SEMI_AUTO" => Some(Self::SemiAuto),
			"CUSTOMIZED" => Some(Self::Customized),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Auto => "AUTO",
			Self::SemiAuto => "SEMI_AUTO",
			Self::Customized => "CUSTOMIZED",
		}
	}
}

/// The ideal state of a resource: the target placement of its partitions'
/// replicas on cluster instances, together with the scalar configuration
/// of the resource (replica count, state model, rebalance mode, caps).
///
/// This is a thin typed wrapper around a [`Record`]: scalar configuration
/// lives in the record's simple fields, the per-partition placement in its
/// list fields (one node id per replica slot) and map fields (node id to
/// state name).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdealState {
	record: Record,
}

impl IdealState {
	pub const REPLICAS: &'static str = "REPLICAS";
	pub const STATE_MODEL_DEF_REF: &'static str = "STATE_MODEL_DEF_REF";
	pub const REBALANCE_MODE: &'static str = "IDEAL_STATE_MODE";
	pub const MAX_PARTITIONS_PER_INSTANCE: &'static str = "MAX_PARTITIONS_PER_INSTANCE";

	pub fn new(resource_name: impl Into<String>) -> Self {
		IdealState {
			record: Record::new(resource_name),
		}
	}

	pub fn from_record(record: Record) -> Self {
		IdealState { record }
	}

	pub fn record(&self) -> &Record {
		&self.record
	}

	pub fn record_mut(&mut self) -> &mut Record {
		&mut self.record
	}

	pub fn resource_name(&self) -> &str {
		&self.record.id
	}

	/// The partitions of this resource, in the stable order given by the
	/// underlying record. In customized mode partitions are keyed by the
	/// map fields, otherwise by the list fields.
	pub fn partitions(&self) -> Vec<String> {
		match self.rebalance_mode() {
			Some(RebalanceMode::Customized) => self.record.map_fields.keys().cloned().collect(),
			_ => self.record.list_fields.keys().cloned().collect(),
		}
	}

	/// Register a partition of this resource, with no placement yet
	pub fn add_partition(&mut self, partition: impl Into<String>) {
		self.record.set_list_field(partition, Vec::new());
	}

	pub fn preference_list(&self, partition: &str) -> Option<&[String]> {
		self.record.list_field(partition)
	}

	pub fn instance_state_map(&self, partition: &str) -> Option<&BTreeMap<String, String>> {
		self.record.map_field(partition)
	}

	pub fn rebalance_mode(&self) -> Option<RebalanceMode> {
		self.record
			.simple_field(Self::REBALANCE_MODE)
			.and_then(RebalanceMode::parse)
	}

	pub fn set_rebalance_mode(&mut self, mode: RebalanceMode) {
		self.record
			.set_simple_field(Self::REBALANCE_MODE, mode.as_str());
	}

	pub fn state_model_def_ref(&self) -> Option<&str> {
		self.record.simple_field(Self::STATE_MODEL_DEF_REF)
	}

	pub fn set_state_model_def_ref(&mut self, name: impl Into<String>) {
		self.record.set_simple_field(Self::STATE_MODEL_DEF_REF, name);
	}

	pub fn replica_count(&self) -> Result<usize, Error> {
		let raw = self
			.record
			.simple_field(Self::REPLICAS)
			.ok_or_message(format!(
				"resource {} has no {} field",
				self.record.id,
				Self::REPLICAS
			))?;
		raw.parse::<usize>()
			.map_err(|e| Error::InvalidNumericField(Self::REPLICAS.into(), e))
	}

	pub fn set_replica_count(&mut self, replicas: usize) {
		self.record
			.set_simple_field(Self::REPLICAS, replicas.to_string());
	}

	/// Cap on the number of replicas a single instance may carry for this
	/// resource; `None` if unlimited (absent or non-positive field)
	pub fn max_partitions_per_instance(&self) -> Option<usize> {
		self.record
			.simple_field(Self::MAX_PARTITIONS_PER_INSTANCE)
			.and_then(|v| v.parse::<i64>().ok())
			.filter(|v| *v > 0)
			.map(|v| v as usize)
	}

	pub fn set_max_partitions_per_instance(&mut self, max: usize) {
		self.record
			.set_simple_field(Self::MAX_PARTITIONS_PER_INSTANCE, max.to_string());
	}
}
