use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use conductor_util::record::Record;

use super::placement::PlacementScheme;
use super::states::StateCounts;
use super::CurrentMapping;

/// One replica of a partition, identified by the partition name and a
/// partition-relative index in `0..num_replicas`. The state a replica
/// carries is derived from its index alone, by walking the ordered state
/// counts; replicas of a partition are otherwise interchangeable.
///
/// Replicas order by `(partition, index)`. This is the ordering used for
/// every replica set the algorithm iterates, so it is part of the
/// determinism contract.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Replica {
	partition: String,
	index: usize,
}

impl Replica {
	pub fn new(partition: impl Into<String>, index: usize) -> Self {
		Replica {
			partition: partition.into(),
			index,
		}
	}

	pub fn partition(&self) -> &str {
		&self.partition
	}

	pub fn index(&self) -> usize {
		self.index
	}

	fn canonical(&self) -> String {
		format!("{}|{}", self.partition, self.index)
	}

	/// Polynomial hash of the canonical form, accumulated in a wrapping
	/// 32-bit register. Used to pick the starting point of circular scans
	/// over the live node list; must be identical on every platform.
	fn placement_hash(&self) -> u32 {
		let mut h: i32 = 0;
		for unit in self.canonical().encode_utf16() {
			h = h.wrapping_mul(31).wrapping_add(unit as i32);
		}
		(h & 0x7FFF_FFFF) as u32
	}
}

impl fmt::Debug for Replica {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}|{}", self.partition, self.index)
	}
}

/// A node is an entity that can serve replicas. It has a capacity and
/// knowledge of the replicas assigned to it, so it can decide if it can
/// receive additional replicas.
struct Node {
	id: String,
	is_alive: bool,
	capacity: usize,
	currently_assigned: usize,
	preferred: Vec<Replica>,
	non_preferred: Vec<Replica>,
}

impl Node {
	fn new(id: &str) -> Self {
		Node {
			id: id.to_string(),
			is_alive: false,
			capacity: 0,
			currently_assigned: 0,
			preferred: Vec::new(),
			non_preferred: Vec::new(),
		}
	}

	/// Check if a replica can be legally added to this node: the node is
	/// live, under capacity, and does not already hold a replica of the
	/// same partition.
	fn can_add(&self, replica: &Replica) -> bool {
		if !self.is_alive {
			return false;
		}
		if self.currently_assigned >= self.capacity {
			return false;
		}
		!self.holds_partition(replica.partition())
	}

	fn holds_partition(&self, partition: &str) -> bool {
		self.preferred
			.iter()
			.chain(self.non_preferred.iter())
			.any(|r| r.partition() == partition)
	}

	fn holds_partition_preferred(&self, partition: &str) -> bool {
		self.preferred.iter().any(|r| r.partition() == partition)
	}
}

/// The auto-rebalance placement computation for one resource.
///
/// Given the resource's partitions, its resolved state counts, an optional
/// per-node cap and a placement scheme, `compute_partition_assignment`
/// derives a full replica placement from the live node set and the
/// existing placements. The goals, all honored simultaneously and in this
/// order of precedence: no node holds two replicas of one partition, load
/// is spread evenly over live nodes, and replicas stay where they already
/// are whenever possible.
///
/// The computation is purely functional: each invocation builds its own
/// working data from the inputs, and equal inputs produce equal records.
pub struct AutoRebalancer<'a> {
	resource_name: &'a str,
	partitions: &'a [String],
	states: &'a StateCounts,
	maximum_per_node: Option<usize>,
	placement: &'a dyn PlacementScheme,
}

impl<'a> AutoRebalancer<'a> {
	pub fn new(
		resource_name: &'a str,
		partitions: &'a [String],
		states: &'a StateCounts,
		maximum_per_node: Option<usize>,
		placement: &'a dyn PlacementScheme,
	) -> Self {
		AutoRebalancer {
			resource_name,
			partitions,
			states,
			maximum_per_node,
			placement,
		}
	}

	/// Compute the placement record for this resource.
	///
	/// `live_nodes` are the nodes that may receive replicas, walked in the
	/// order given; `all_nodes` is the full instance set (a superset of
	/// `live_nodes`) over which the preferred plan is laid out;
	/// `current_mapping` holds the existing placements. The returned
	/// record carries, per partition, a map field (node id → state) and a
	/// list field (one node id per placed replica slot, in replica index
	/// order, so that callers can spot anti-affinity violations).
	///
	/// This function does not fail: with no live nodes it returns an empty
	/// record, and replicas that cannot be placed are dropped from the
	/// output with a warning.
	pub fn compute_partition_assignment(
		&self,
		live_nodes: &[String],
		current_mapping: &CurrentMapping,
		all_nodes: &[String],
	) -> Record {
		let mut record = Record::new(self.resource_name);
		if live_nodes.is_empty() {
			return record;
		}

		let mut comp = Computation::new(self.partitions, self.states);
		comp.build_nodes(live_nodes, all_nodes, self.maximum_per_node);

		// the preferred plan deliberately ignores liveness: it is the
		// anchor that placements converge back to when nodes return
		comp.compute_preferred_placement(all_nodes, self.placement);

		// sort the existing placements into preferred / non-preferred,
		// filling in the per-node occupancy counts as we go
		comp.classify_preferred(current_mapping);
		comp.classify_non_preferred(current_mapping);
		comp.compute_orphaned();
		info!(
			"resource {}: orphaned replicas = {:?}",
			self.resource_name, comp.orphaned
		);

		comp.move_non_preferred_to_preferred();
		comp.assign_orphans();
		comp.move_excess_replicas();

		comp.fill_record(&mut record);
		record
	}
}

/// Working state of one `compute_partition_assignment` call. Nodes are
/// referenced by their index in `nodes`; nothing here outlives the call.
struct Computation<'a> {
	partitions: &'a [String],
	num_replicas: usize,
	/// replica index → state name
	state_map: Vec<String>,

	nodes: Vec<Node>,
	node_ix: HashMap<String, usize>,
	/// indices of live nodes, in caller order
	live: Vec<usize>,

	/// where every replica would sit if all nodes were up
	preferred: BTreeMap<Replica, usize>,
	/// replicas currently sitting at their preferred node
	existing_preferred: BTreeMap<Replica, usize>,
	/// replicas currently sitting elsewhere
	existing_non_preferred: BTreeMap<Replica, usize>,
	/// replicas present in no current placement
	orphaned: BTreeSet<Replica>,
}

impl<'a> Computation<'a> {
	fn new(partitions: &'a [String], states: &'a StateCounts) -> Self {
		Computation {
			partitions,
			num_replicas: states.total_replicas(),
			state_map: states.state_map(),
			nodes: Vec::new(),
			node_ix: HashMap::new(),
			live: Vec::new(),
			preferred: BTreeMap::new(),
			existing_preferred: BTreeMap::new(),
			existing_non_preferred: BTreeMap::new(),
			orphaned: BTreeSet::new(),
		}
	}

	// ---- setup ----

	/// Create the node records and derive per-node capacities: the total
	/// replica count is split over live nodes as floor + remainder, the
	/// first nodes of the list absorbing the remainder, and a positive
	/// per-node cap truncates both.
	fn build_nodes(
		&mut self,
		live_nodes: &[String],
		all_nodes: &[String],
		maximum_per_node: Option<usize>,
	) {
		for id in all_nodes {
			let ix = self.nodes.len();
			self.nodes.push(Node::new(id));
			self.node_ix.insert(id.clone(), ix);
		}

		let total_replicas = self.num_replicas * self.partitions.len();
		let dist_floor = total_replicas / live_nodes.len();
		let mut dist_remainder = total_replicas % live_nodes.len();

		for id in live_nodes {
			let ix = match self.node_ix.get(id.as_str()) {
				Some(&ix) => ix,
				None => {
					warn!("live node {} is not part of the instance set, ignoring", id);
					continue;
				}
			};
			let mut target_size = match maximum_per_node {
				Some(max) => std::cmp::min(dist_floor, max),
				None => dist_floor,
			};
			let below_cap = maximum_per_node.map_or(true, |max| target_size < max);
			if dist_remainder > 0 && below_cap {
				target_size += 1;
				dist_remainder -= 1;
			}
			let node = &mut self.nodes[ix];
			node.is_alive = true;
			node.capacity = target_size;
			self.live.push(ix);
		}
	}

	/// Ask the placement scheme where every replica of every partition
	/// would prefer to sit, over the full instance set.
	fn compute_preferred_placement(&mut self, all_nodes: &[String], scheme: &dyn PlacementScheme) {
		for (partition_id, partition) in self.partitions.iter().enumerate() {
			for replica_id in 0..self.num_replicas {
				let replica = Replica::new(partition.as_str(), replica_id);
				let location = scheme.get_location(
					partition_id,
					replica_id,
					self.partitions.len(),
					self.num_replicas,
					all_nodes,
				);
				match self.node_ix.get(location) {
					Some(&ix) => {
						self.preferred.insert(replica, ix);
					}
					None => warn!(
						"placement scheme returned unknown node {} for replica {:?}",
						location, replica
					),
				}
			}
		}
	}

	// ---- classification of the current mapping ----

	/// First classification pass: count every existing placement against
	/// its node, and record the replicas that already sit at their
	/// preferred node. Each node occurrence claims the first unclaimed
	/// replica index whose preferred node it is.
	fn classify_preferred(&mut self, current_mapping: &CurrentMapping) {
		for (partition, node_states) in current_mapping.iter() {
			for node_id in node_states.keys() {
				let ix = match self.node_ix.get(node_id.as_str()) {
					Some(&ix) => ix,
					None => {
						warn!("current mapping names unknown node {}, ignoring", node_id);
						continue;
					}
				};
				self.nodes[ix].currently_assigned += 1;
				for replica_id in 0..self.num_replicas {
					let replica = Replica::new(partition.as_str(), replica_id);
					if self.preferred.get(&replica) == Some(&ix)
						&& !self.existing_preferred.contains_key(&replica)
					{
						self.nodes[ix].preferred.push(replica.clone());
						self.existing_preferred.insert(replica, ix);
						break;
					}
				}
			}
		}
	}

	/// Second classification pass: every remaining occurrence claims the
	/// first replica index of its partition that prefers a different node
	/// and is still unclaimed. The replica index a node ends up with may
	/// differ from the one it was serving; replicas of a partition are
	/// interchangeable.
	fn classify_non_preferred(&mut self, current_mapping: &CurrentMapping) {
		for (partition, node_states) in current_mapping.iter() {
			for node_id in node_states.keys() {
				let ix = match self.node_ix.get(node_id.as_str()) {
					Some(&ix) => ix,
					None => continue,
				};
				if self.nodes[ix].holds_partition_preferred(partition) {
					continue;
				}
				for replica_id in 0..self.num_replicas {
					let replica = Replica::new(partition.as_str(), replica_id);
					let preferred_elsewhere = match self.preferred.get(&replica) {
						Some(&p) => p != ix,
						None => false,
					};
					if preferred_elsewhere
						&& !self.existing_preferred.contains_key(&replica)
						&& !self.existing_non_preferred.contains_key(&replica)
					{
						self.nodes[ix].non_preferred.push(replica.clone());
						self.existing_non_preferred.insert(replica, ix);
						break;
					}
				}
			}
		}
	}

	/// Replicas of the preferred plan claimed by neither classification
	/// pass are not placed anywhere yet.
	fn compute_orphaned(&mut self) {
		let mut orphaned = BTreeSet::new();
		for replica in self.preferred.keys() {
			if !self.existing_preferred.contains_key(replica)
				&& !self.existing_non_preferred.contains_key(replica)
			{
				orphaned.insert(replica.clone());
			}
		}
		self.orphaned = orphaned;
	}

	// ---- the three transformation passes ----

	/// Move replicas sitting at non-preferred nodes back to their
	/// preferred node, when the donor is over capacity and the preferred
	/// node can take them.
	fn move_non_preferred_to_preferred(&mut self) {
		let entries: Vec<(Replica, usize)> = self
			.existing_non_preferred
			.iter()
			.map(|(r, &ix)| (r.clone(), ix))
			.collect();
		for (replica, donor_ix) in entries {
			let receiver_ix = match self.preferred.get(&replica) {
				Some(&ix) => ix,
				None => continue,
			};
			let donor = &self.nodes[donor_ix];
			let receiver = &self.nodes[receiver_ix];
			if donor.currently_assigned > donor.capacity
				&& receiver.currently_assigned < receiver.capacity
				&& receiver.can_add(&replica)
			{
				let donor = &mut self.nodes[donor_ix];
				donor.currently_assigned -= 1;
				if let Some(pos) = donor.non_preferred.iter().position(|r| *r == replica) {
					donor.non_preferred.remove(pos);
				}
				let receiver = &mut self.nodes[receiver_ix];
				receiver.currently_assigned += 1;
				receiver.preferred.push(replica.clone());
				self.existing_non_preferred.remove(&replica);
			}
		}
	}

	/// Slot orphaned replicas onto live nodes with spare capacity. The
	/// scan starts at a point derived from the replica's stable hash so
	/// that orphans spread over the cluster instead of piling onto the
	/// first nodes of the list.
	fn assign_orphans(&mut self) {
		let orphans: Vec<Replica> = self.orphaned.iter().cloned().collect();
		for replica in orphans {
			let start_index = (replica.placement_hash() as usize) % self.live.len();
			for offset in 0..self.live.len() {
				let ix = self.live[(start_index + offset) % self.live.len()];
				let receiver = &self.nodes[ix];
				if receiver.currently_assigned < receiver.capacity && receiver.can_add(&replica) {
					let receiver = &mut self.nodes[ix];
					receiver.currently_assigned += 1;
					receiver.non_preferred.push(replica.clone());
					self.orphaned.remove(&replica);
					break;
				}
			}
		}
		if !self.orphaned.is_empty() {
			warn!("could not assign nodes to replicas: {:?}", self.orphaned);
		}
	}

	/// Drain nodes that ended up over capacity by handing their
	/// non-preferred replicas to any node that can take them. Replicas are
	/// handed off in replica order and receivers scanned circularly from
	/// the replica's hash, for determinism.
	fn move_excess_replicas(&mut self) {
		for li in 0..self.live.len() {
			let donor_ix = self.live[li];
			if self.nodes[donor_ix].currently_assigned <= self.nodes[donor_ix].capacity {
				continue;
			}
			self.nodes[donor_ix].non_preferred.sort();
			let excess: Vec<Replica> = self.nodes[donor_ix].non_preferred.clone();
			for replica in excess {
				let start_index = (replica.placement_hash() as usize) % self.live.len();
				for offset in 0..self.live.len() {
					let ix = self.live[(start_index + offset) % self.live.len()];
					if self.nodes[ix].can_add(&replica) {
						let receiver = &mut self.nodes[ix];
						receiver.currently_assigned += 1;
						receiver.non_preferred.push(replica.clone());
						let donor = &mut self.nodes[donor_ix];
						donor.currently_assigned -= 1;
						if let Some(pos) = donor.non_preferred.iter().position(|r| *r == replica) {
							donor.non_preferred.remove(pos);
						}
						break;
					}
				}
				if self.nodes[donor_ix].currently_assigned <= self.nodes[donor_ix].capacity {
					break;
				}
			}
			if self.nodes[donor_ix].currently_assigned > self.nodes[donor_ix].capacity {
				warn!(
					"could not take replicas out of node {}",
					self.nodes[donor_ix].id
				);
			}
		}
	}

	// ---- emission ----

	/// Write the placement into the record: per partition, the map field
	/// carries node id → state, and the list field one node id per placed
	/// replica slot, iterated in replica index order.
	fn fill_record(&self, record: &mut Record) {
		for partition in self.partitions {
			record.set_map_field(partition.clone(), BTreeMap::new());
			record.set_list_field(partition.clone(), Vec::new());
		}
		for &ix in self.live.iter() {
			let node = &self.nodes[ix];
			for replica in node.preferred.iter().chain(node.non_preferred.iter()) {
				if let Some(map) = record.map_fields.get_mut(replica.partition()) {
					map.insert(node.id.clone(), self.state_map[replica.index()].clone());
				}
			}
		}
		for replica_id in 0..self.num_replicas {
			for &ix in self.live.iter() {
				let node = &self.nodes[ix];
				for replica in node.preferred.iter().chain(node.non_preferred.iter()) {
					if replica.index() == replica_id {
						if let Some(list) = record.list_fields.get_mut(replica.partition()) {
							list.push(node.id.clone());
						}
					}
				}
			}
		}
	}
}
