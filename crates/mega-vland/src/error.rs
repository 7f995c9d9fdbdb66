//! Error types for the resolver, netspec parser and node.

use crate::allocator::VlanError;
use crate::command::CommandError;
use mega_common::CommonError;
use mega_types::VlanId;
use thiserror::Error;

/// Result type for resolver and node operations.
pub type VlandResult<T> = Result<T, VlandError>;

/// Errors from alias resolution and node setup.
#[derive(Debug, Error)]
pub enum VlandError {
    /// Aliases must be non-empty.
    #[error("VLAN must be non-empty string")]
    EmptyAlias,

    /// The allocator refused the request.
    #[error(transparent)]
    Vlan(#[from] VlanError),

    /// The binding exists in memory but the alias table could not be written.
    #[error("failed to persist alias table after allocating VLAN {vlan}: {source}")]
    Persist {
        vlan: VlanId,
        #[source]
        source: std::io::Error,
    },

    /// A peer sent something that is not a registration.
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Config(#[from] CommonError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from parsing a netspec.
#[derive(Debug, Error)]
pub enum NetSpecError {
    #[error("malformed netspec: expected 1 to 4 comma-separated fields, got {fields}")]
    Malformed { fields: usize },

    #[error("malformed netspec, invalid driver: {0}")]
    InvalidDriver(String),

    #[error("malformed netspec, invalid mac address: {0}")]
    InvalidMac(String),

    #[error(transparent)]
    Resolve(#[from] VlandError),
}

impl NetSpecError {
    /// True for syntax problems, false for resolution failures.
    pub fn is_syntax(&self) -> bool {
        !matches!(self, NetSpecError::Resolve(_))
    }
}
