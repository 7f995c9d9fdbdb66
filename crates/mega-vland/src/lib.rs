//! vland - VLAN alias allocation for minimega
//!
//! Resolves operator-chosen VLAN aliases to IDs per namespace, persists the
//! alias table, propagates new bindings to the rest of the mesh and parses
//! the netspecs that VM network configuration is written in.

mod allocator;
mod broadcast;
mod command;
mod error;
mod netspec;
mod node;
mod persist;
mod resolver;
mod types;

pub use allocator::{qualify, split_qualified, AllocatedVlans, VlanAllocator, VlanError, ALIAS_SEP};
pub use broadcast::{
    AliasBroadcaster, BroadcastOutcome, LocalMesh, MeshError, MeshTransport, RegistrationSink,
};
pub use command::{CommandError, RegistrationCommand};
pub use error::{NetSpecError, VlandError, VlandResult};
pub use netspec::{classify, DriverSet, NetSpecFields, NetSpecParser};
pub use node::MegaNode;
pub use persist::{
    parse_alias_table, read_alias_table, render_alias_table, AliasTableWriter, ALIAS_TABLE_FILE,
    ALIAS_TABLE_HEADER,
};
pub use resolver::VlanAliasResolver;
pub use types::{network_table, NetConfig};
