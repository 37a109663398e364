//! Crate containing the Conductor controller logic: in-memory models of
//! cluster resources and the rebalancing strategies that compute new
//! ideal states from cluster snapshots.

#[macro_use]
extern crate log;

pub mod model;
pub mod rebalance;
