use crate::model::ClusterSnapshot;

/// Pluggable policy computing the preferred location of every replica.
///
/// The preferred plan is computed over all configured nodes, live or not:
/// it describes where replicas would sit if the whole cluster were up, and
/// the rebalance algorithm then keeps replicas at their preferred location
/// whenever it can. Implementations must be pure in their arguments and
/// must return a node id present in `node_ids`.
pub trait PlacementScheme {
	/// Hook for schemes that need cluster handles; called once per
	/// rebalance before any `get_location` call.
	fn init(&mut self, _cluster: &ClusterSnapshot) {}

	/// The node that replica `replica_id` of partition `partition_id`
	/// prefers to be served by, among `node_ids`.
	fn get_location<'a>(
		&self,
		partition_id: usize,
		replica_id: usize,
		num_partitions: usize,
		num_replicas: usize,
		node_ids: &'a [String],
	) -> &'a str;
}

/// Default placement: spread replicas over nodes with modular arithmetic,
/// switching formula on the relative sizes of the node and partition sets
/// so that replicas of one partition land on distinct nodes in each
/// regime.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultPlacementScheme;

impl PlacementScheme for DefaultPlacementScheme {
	fn get_location<'a>(
		&self,
		partition_id: usize,
		replica_id: usize,
		num_partitions: usize,
		_num_replicas: usize,
		node_ids: &'a [String],
	) -> &'a str {
		let n = node_ids.len();
		let index = if n > num_partitions {
			// assign replicas in partition order in case there are more
			// nodes than partitions
			(partition_id + replica_id * num_partitions) % n
		} else if n == num_partitions {
			// need a replica offset in case the sizes of these sets are
			// the same
			((partition_id + replica_id * num_partitions) % n + replica_id) % n
		} else {
			// in all other cases, assigning a replica at a time for each
			// partition is reasonable
			(partition_id + replica_id) % n
		};
		&node_ids[index]
	}
}
