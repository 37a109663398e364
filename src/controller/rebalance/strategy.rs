//! The AUTO-mode rebalancing stage: glue between cluster snapshots and
//! the placement computation.

use std::collections::BTreeMap;

use conductor_util::encode::debug_serialize;
use conductor_util::error::*;

use crate::model::{ClusterSnapshot, CurrentStateOutput, IdealState, RebalanceMode};

use super::algorithm::AutoRebalancer;
use super::placement::{DefaultPlacementScheme, PlacementScheme};
use super::states::StateCounts;
use super::CurrentMapping;

/// Computes a new ideal state for a resource in AUTO rebalance mode.
///
/// The strategy resolves the resource's state model against the cluster
/// snapshot, merges current and pending replica states into one mapping,
/// runs the placement computation and wraps its output back into an ideal
/// state record. It owns nothing persistent: the caller stores the
/// returned ideal state.
pub struct AutoRebalanceStrategy<S: PlacementScheme = DefaultPlacementScheme> {
	placement: S,
}

impl Default for AutoRebalanceStrategy<DefaultPlacementScheme> {
	fn default() -> Self {
		Self::new(DefaultPlacementScheme)
	}
}

impl<S: PlacementScheme> AutoRebalanceStrategy<S> {
	pub fn new(placement: S) -> Self {
		AutoRebalanceStrategy { placement }
	}

	/// Compute the next ideal state of `resource_name`.
	///
	/// The returned ideal state inherits the current one's scalar fields,
	/// is forced to AUTO mode, and carries the newly computed per-replica
	/// node lists. Map fields are not carried over: in AUTO mode the ideal
	/// state stores only the node lists, and replica states are recomputed
	/// downstream.
	///
	/// Fails if the resource references a state model definition the
	/// cluster snapshot does not contain, or if its replica count is not a
	/// number; in that case the rebalance is skipped and the previous
	/// ideal state stays in effect.
	pub fn compute_new_ideal_state(
		&mut self,
		resource_name: &str,
		current_ideal_state: &IdealState,
		current_state_output: &CurrentStateOutput,
		cluster: &ClusterSnapshot,
	) -> Result<IdealState, Error> {
		let partitions = current_ideal_state.partitions();
		let model_name = current_ideal_state
			.state_model_def_ref()
			.ok_or_message(format!(
				"resource {} does not reference a state model",
				resource_name
			))?;
		let state_model_def = cluster.state_model_def(model_name).ok_or_message(format!(
			"state model definition {} of resource {} not found in cluster",
			model_name, resource_name
		))?;
		let replicas = current_ideal_state.replica_count()?;

		let live_nodes = cluster.live_instances();
		let all_nodes = cluster.instances();
		let state_counts = StateCounts::resolve(state_model_def, live_nodes.len(), replicas);
		let current_mapping = current_mapping(
			current_state_output,
			resource_name,
			&partitions,
			&state_counts,
		);
		let max_per_node = current_ideal_state.max_partitions_per_instance();

		info!(
			"rebalancing {}: currentMapping = {}",
			resource_name,
			debug_serialize(&current_mapping)
		);
		info!(
			"rebalancing {}: stateCounts = {:?}, liveNodes = {:?}, allNodes = {:?}, maxPerNode = {:?}",
			resource_name, state_counts, live_nodes, all_nodes, max_per_node
		);

		self.placement.init(cluster);
		let rebalancer = AutoRebalancer::new(
			resource_name,
			&partitions,
			&state_counts,
			max_per_node,
			&self.placement,
		);
		let new_mapping =
			rebalancer.compute_partition_assignment(live_nodes, &current_mapping, all_nodes);
		info!(
			"rebalancing {}: newMapping = {}",
			resource_name,
			debug_serialize(&new_mapping)
		);

		let mut new_ideal_state = IdealState::new(resource_name);
		new_ideal_state.record_mut().simple_fields =
			current_ideal_state.record().simple_fields.clone();
		new_ideal_state.set_rebalance_mode(RebalanceMode::Auto);
		new_ideal_state.record_mut().list_fields = new_mapping.list_fields;
		Ok(new_ideal_state)
	}
}

/// Merge the current and pending states of a resource into one mapping,
/// keeping only states that the state counts know about. Pending entries
/// overwrite current ones for the same (partition, node): a replica on its
/// way somewhere is already accounted there. Every partition gets an
/// entry, placed or not.
pub(crate) fn current_mapping(
	current_state_output: &CurrentStateOutput,
	resource_name: &str,
	partitions: &[String],
	state_counts: &StateCounts,
) -> CurrentMapping {
	let mut mapping = CurrentMapping::new();
	for partition in partitions {
		let entry = mapping.entry(partition.clone()).or_insert_with(BTreeMap::new);
		if let Some(cur) = current_state_output.current_state_map(resource_name, partition) {
			for (node, state) in cur.iter() {
				if state_counts.contains_state(state) {
					entry.insert(node.clone(), state.clone());
				}
			}
		}
		if let Some(pending) = current_state_output.pending_state_map(resource_name, partition) {
			for (node, state) in pending.iter() {
				if state_counts.contains_state(state) {
					entry.insert(node.clone(), state.clone());
				}
			}
		}
	}
	mapping
}
