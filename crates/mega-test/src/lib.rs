//! Integration test infrastructure for minimega VLAN alias handling
//!
//! Provides:
//! - Scripted mesh transports and allocators
//! - Multi-node clusters wired through in-process meshes
//! - Convergence and persistence verification helpers

mod cluster;
pub mod fixtures;
mod verification;

pub use cluster::TestCluster;
pub use fixtures::*;
pub use verification::*;
