//! Namespace-scoped alias resolution with allocate-on-miss.

use crate::allocator::{VlanAllocator, VlanError};
use crate::broadcast::AliasBroadcaster;
use crate::error::{VlandError, VlandResult};
use crate::persist::AliasTableWriter;
use dashmap::DashMap;
use mega_common::{DebugMutex, LockMode};
use mega_types::VlanId;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Resolves `(namespace, alias)` to a VLAN ID.
///
/// The first resolution of an alias allocates an ID, rewrites the alias
/// table on disk and announces the binding to the mesh before returning.
/// Later resolutions are pure lookups.
pub struct VlanAliasResolver {
    allocator: Arc<dyn VlanAllocator>,
    writer: Arc<AliasTableWriter>,
    broadcaster: Arc<AliasBroadcaster>,
    locks: DashMap<String, Arc<DebugMutex<()>>>,
    lock_mode: LockMode,
}

impl VlanAliasResolver {
    pub fn new(
        allocator: Arc<dyn VlanAllocator>,
        writer: Arc<AliasTableWriter>,
        broadcaster: Arc<AliasBroadcaster>,
        lock_mode: LockMode,
    ) -> Self {
        Self {
            allocator,
            writer,
            broadcaster,
            locks: DashMap::new(),
            lock_mode,
        }
    }

    pub fn allocator(&self) -> &Arc<dyn VlanAllocator> {
        &self.allocator
    }

    pub fn broadcaster(&self) -> &Arc<AliasBroadcaster> {
        &self.broadcaster
    }

    fn namespace_lock(&self, namespace: &str) -> Arc<DebugMutex<()>> {
        let entry = self
            .locks
            .entry(namespace.to_string())
            .or_insert_with(|| {
                Arc::new(DebugMutex::new(
                    format!("vlans/{namespace}"),
                    (),
                    self.lock_mode,
                ))
            });
        Arc::clone(entry.value())
    }

    /// Looks up or allocates the VLAN for `alias` in `namespace`.
    ///
    /// When the table write fails the binding still stands and is still
    /// announced; the error carries the allocated ID.
    #[instrument(skip(self), level = "debug")]
    pub async fn resolve(&self, namespace: &str, alias: &str) -> VlandResult<VlanId> {
        if alias.is_empty() {
            return Err(VlandError::EmptyAlias);
        }

        let (vlan, created) = {
            let lock = self.namespace_lock(namespace);
            let _guard = lock.lock();

            match self.allocator.parse_vlan(namespace, alias) {
                Ok(vlan) => return Ok(vlan),
                Err(VlanError::Unallocated) => {}
                Err(e) => return Err(e.into()),
            }
            self.allocator.allocate(namespace, alias)?
        };

        if !created {
            return Ok(vlan);
        }
        info!(namespace, alias, %vlan, "Allocated VLAN for alias");

        let persisted = self.writer.persist(self.allocator.as_ref()).await;
        if let Err(e) = &persisted {
            error!(
                path = %self.writer.path().display(),
                error = %e,
                "unable to write alias table"
            );
        }

        self.broadcaster.announce(namespace, alias, vlan).await;

        persisted.map_err(|source| VlandError::Persist { vlan, source })?;
        Ok(vlan)
    }
}
