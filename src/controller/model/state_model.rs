use serde::{Deserialize, Serialize};

/// Definition of a replica state model: the ordered list of states a
/// replica of a resource may be in, and for each state how many replicas
/// of a partition should hold it.
///
/// The count specifier for a state is a string: a positive integer, `"N"`
/// (one replica per live node), or `"R"` (all replicas not accounted for
/// by the other states; at most one state may use it). States are listed
/// by decreasing priority and that order is significant: it decides which
/// replica indices map to which state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateModelDefinition {
	name: String,
	states_priority_list: Vec<String>,
	counts: Vec<String>,
}

impl StateModelDefinition {
	/// Build a definition from `(state name, count specifier)` pairs given
	/// by decreasing priority
	pub fn new<S: Into<String>, C: Into<String>>(
		name: impl Into<String>,
		states: impl IntoIterator<Item = (S, C)>,
	) -> Self {
		let (states_priority_list, counts) = states
			.into_iter()
			.map(|(s, c)| (s.into(), c.into()))
			.unzip();
		StateModelDefinition {
			name: name.into(),
			states_priority_list,
			counts,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn states_priority_list(&self) -> &[String] {
		&self.states_priority_list
	}

	/// The raw count specifier for a state, if the state is part of this
	/// model
	pub fn num_instances_per_state(&self, state: &str) -> Option<&str> {
		self.states_priority_list
			.iter()
			.position(|s| s == state)
			.map(|i| self.counts[i].as_str())
	}
}
