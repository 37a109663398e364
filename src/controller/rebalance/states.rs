use crate::model::StateModelDefinition;

/// The resolved replica counts of a state model: for each state, how many
/// replicas of a partition must hold it, by decreasing state priority.
///
/// Iteration order is part of the contract: replica indices are mapped to
/// states by walking the counts in order, so the first `count(s0)` indices
/// carry the highest-priority state, the next `count(s1)` the second one,
/// and so on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateCounts(Vec<(String, usize)>);

impl StateCounts {
	/// Build directly from resolved `(state, count)` pairs; counts must be
	/// positive.
	pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, usize)>) -> Self {
		StateCounts(pairs.into_iter().map(|(s, c)| (s.into(), c)).collect())
	}

	/// Resolve a state model definition into concrete counts.
	///
	/// Symbolic specifiers are resolved here: `"N"` becomes the live node
	/// count, and the (at most one) `"R"` state receives whatever is left
	/// of `total_replicas` once all numeric states are accounted for.
	/// Numeric specifiers are kept only if positive; invalid specifiers
	/// drop their state, as does a non-positive remainder for `"R"`.
	pub fn resolve(
		def: &StateModelDefinition,
		live_node_count: usize,
		total_replicas: usize,
	) -> Self {
		// None marks the slot of the R state, filled once the remainder
		// is known
		let mut counts = Vec::<(String, Option<usize>)>::new();
		let mut remainder = total_replicas as i64;
		for state in def.states_priority_list() {
			match def.num_instances_per_state(state) {
				Some("N") => counts.push((state.clone(), Some(live_node_count))),
				Some("R") => {
					// at most one state may use R
					if !counts.iter().any(|(_, c)| c.is_none()) {
						counts.push((state.clone(), None));
					}
				}
				Some(num) => {
					if let Ok(n) = num.parse::<i64>() {
						if n > 0 {
							counts.push((state.clone(), Some(n as usize)));
							remainder -= n;
						}
					}
				}
				None => (),
			}
		}
		StateCounts(
			counts
				.into_iter()
				.filter_map(|(state, count)| match count {
					Some(n) => Some((state, n)),
					None if remainder > 0 => Some((state, remainder as usize)),
					None => None,
				})
				.collect(),
		)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
		self.0.iter().map(|(s, c)| (s.as_str(), *c))
	}

	pub fn contains_state(&self, state: &str) -> bool {
		self.0.iter().any(|(s, _)| s == state)
	}

	/// Total number of replicas per partition
	pub fn total_replicas(&self) -> usize {
		self.0.iter().map(|(_, c)| *c).sum()
	}

	/// The state carried by a given replica index
	pub fn state_of_replica(&self, mut index: usize) -> Option<&str> {
		for (state, count) in self.0.iter() {
			if index < *count {
				return Some(state);
			}
			index -= count;
		}
		None
	}

	/// Materialize the replica index → state mapping for all
	/// `total_replicas()` indices
	pub fn state_map(&self) -> Vec<String> {
		let mut map = Vec::with_capacity(self.total_replicas());
		for (state, count) in self.0.iter() {
			for _ in 0..*count {
				map.push(state.clone());
			}
		}
		map
	}
}
