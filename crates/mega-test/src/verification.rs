//! Verification helpers for cluster state

use crate::cluster::TestCluster;
use mega_types::VlanId;
use mega_vland::VlanError;
use std::path::Path;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("{host} has no binding for {namespace}//{alias}: {source}")]
    Missing {
        host: String,
        namespace: String,
        alias: String,
        source: VlanError,
    },

    #[error("{namespace}//{alias} is {first} on {first_host} but {other} on {other_host}")]
    Diverged {
        namespace: String,
        alias: String,
        first_host: String,
        first: VlanId,
        other_host: String,
        other: VlanId,
    },

    #[error("alias table {path} does not list {alias}")]
    NotPersisted { path: String, alias: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Checks that every node agrees on the binding of an alias, returning it.
pub fn assert_converged(cluster: &TestCluster, namespace: &str, alias: &str) -> VerifyResult<VlanId> {
    let mut first: Option<(String, VlanId)> = None;

    for node in cluster.nodes() {
        let vlan = node
            .allocator()
            .parse_vlan(namespace, alias)
            .map_err(|source| VerificationError::Missing {
                host: node.hostname().to_string(),
                namespace: namespace.to_string(),
                alias: alias.to_string(),
                source,
            })?;

        match &first {
            None => first = Some((node.hostname().to_string(), vlan)),
            Some((first_host, first_vlan)) if *first_vlan != vlan => {
                return Err(VerificationError::Diverged {
                    namespace: namespace.to_string(),
                    alias: alias.to_string(),
                    first_host: first_host.clone(),
                    first: *first_vlan,
                    other_host: node.hostname().to_string(),
                    other: vlan,
                });
            }
            Some(_) => {}
        }
    }

    first.map(|(_, vlan)| vlan).ok_or_else(|| VerificationError::Missing {
        host: "<empty cluster>".to_string(),
        namespace: namespace.to_string(),
        alias: alias.to_string(),
        source: VlanError::Unallocated,
    })
}

/// Checks that the alias table file lists the fully qualified alias.
pub fn assert_persisted(path: &Path, qualified_alias: &str) -> VerifyResult<()> {
    let text = std::fs::read_to_string(path)?;
    let listed = mega_vland::parse_alias_table(&text)
        .iter()
        .any(|(alias, _)| alias == qualified_alias);
    if !listed {
        return Err(VerificationError::NotPersisted {
            path: path.display().to_string(),
            alias: qualified_alias.to_string(),
        });
    }
    Ok(())
}
