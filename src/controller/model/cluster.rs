use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::state_model::StateModelDefinition;

/// A read-only snapshot of the cluster, assembled by the caller from its
/// state store and handed to the controller stages.
///
/// The two instance lists are ordered and their order is part of the
/// contract: rebalancing walks them as given, so a caller that supplies a
/// stable order gets deterministic placements. `live_instances` must be a
/// subset of `instances`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
	instances: Vec<String>,
	live_instances: Vec<String>,
	state_model_defs: BTreeMap<String, StateModelDefinition>,
}

impl ClusterSnapshot {
	pub fn new(instances: Vec<String>, live_instances: Vec<String>) -> Self {
		ClusterSnapshot {
			instances,
			live_instances,
			state_model_defs: BTreeMap::new(),
		}
	}

	/// All configured instances, live or not
	pub fn instances(&self) -> &[String] {
		&self.instances
	}

	pub fn live_instances(&self) -> &[String] {
		&self.live_instances
	}

	pub fn add_state_model_def(&mut self, def: StateModelDefinition) {
		self.state_model_defs.insert(def.name().to_string(), def);
	}

	pub fn state_model_def(&self, name: &str) -> Option<&StateModelDefinition> {
		self.state_model_defs.get(name)
	}
}

/// The replica states reported by the cluster for one or more resources:
/// for each (resource, partition), which instance holds the replica in
/// which state. Pending entries describe state transitions that have been
/// requested but not yet acknowledged; a rebalance must take both into
/// account to avoid double-placing a replica that is already on its way.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentStateOutput {
	current_states: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
	pending_states: BTreeMap<String, BTreeMap<String, BTreeMap<String, String>>>,
}

impl CurrentStateOutput {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_current_state(
		&mut self,
		resource: impl Into<String>,
		partition: impl Into<String>,
		instance: impl Into<String>,
		state: impl Into<String>,
	) {
		self.current_states
			.entry(resource.into())
			.or_default()
			.entry(partition.into())
			.or_default()
			.insert(instance.into(), state.into());
	}

	pub fn set_pending_state(
		&mut self,
		resource: impl Into<String>,
		partition: impl Into<String>,
		instance: impl Into<String>,
		state: impl Into<String>,
	) {
		self.pending_states
			.entry(resource.into())
			.or_default()
			.entry(partition.into())
			.or_default()
			.insert(instance.into(), state.into());
	}

	/// Acknowledged states of a partition's replicas: instance id → state
	pub fn current_state_map(
		&self,
		resource: &str,
		partition: &str,
	) -> Option<&BTreeMap<String, String>> {
		self.current_states.get(resource)?.get(partition)
	}

	/// Requested-but-unacknowledged states of a partition's replicas
	pub fn pending_state_map(
		&self,
		resource: &str,
		partition: &str,
	) -> Option<&BTreeMap<String, String>> {
		self.pending_states.get(resource)?.get(partition)
	}
}
