//! A minimega node: owns the alias table and wires the parser to it.

use crate::allocator::{AllocatedVlans, VlanAllocator};
use crate::broadcast::{AliasBroadcaster, MeshTransport, RegistrationSink};
use crate::command::RegistrationCommand;
use crate::error::{VlandError, VlandResult};
use crate::netspec::{DriverSet, NetSpecParser};
use crate::persist::{read_alias_table, render_alias_table, AliasTableWriter};
use crate::resolver::VlanAliasResolver;
use mega_common::{CommonError, MegaConfig};
use mega_types::{MacAddress, MacPrefixRegistry, VlanId};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything alias resolution needs on one node.
pub struct MegaNode {
    config: MegaConfig,
    allocator: Arc<dyn VlanAllocator>,
    registry: Arc<MacPrefixRegistry>,
    resolver: Arc<VlanAliasResolver>,
    parser: NetSpecParser,
}

impl MegaNode {
    /// Builds a node with the in-memory allocator, seeded from the alias
    /// table a previous run left on disk.
    pub async fn start(config: MegaConfig, mesh: Arc<dyn MeshTransport>) -> VlandResult<Self> {
        config.validate()?;
        let min = VlanId::new(config.vlans.min).map_err(|e| {
            CommonError::invalid_config("vlans.min", e.to_string())
        })?;
        let max = VlanId::new(config.vlans.max).map_err(|e| {
            CommonError::invalid_config("vlans.max", e.to_string())
        })?;
        Self::with_allocator(config, Arc::new(AllocatedVlans::new(min, max)), mesh).await
    }

    /// Builds a node around an existing allocator.
    pub async fn with_allocator(
        config: MegaConfig,
        allocator: Arc<dyn VlanAllocator>,
        mesh: Arc<dyn MeshTransport>,
    ) -> VlandResult<Self> {
        let registry = match &config.network.mac_registry {
            Some(path) => MacPrefixRegistry::load(path)?,
            None => MacPrefixRegistry::builtin(),
        };
        let registry = Arc::new(registry);

        let table_path = config.alias_table_path();
        let mut restored = 0;
        for (alias, vlan) in read_alias_table(&table_path).await? {
            match allocator.add_alias("", &alias, vlan) {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(e) => warn!(alias = %alias, %vlan, error = %e, "Skipping persisted alias"),
            }
        }

        let resolver = Arc::new(VlanAliasResolver::new(
            Arc::clone(&allocator),
            Arc::new(AliasTableWriter::new(table_path)),
            Arc::new(AliasBroadcaster::new(mesh)),
            config.lock_mode(),
        ));

        let parser = NetSpecParser::new(
            Arc::clone(&resolver),
            Arc::clone(&registry),
            config.network.drivers.iter().cloned().collect::<DriverSet>(),
            config.network.default_bridge.clone(),
            config.network.default_driver.clone(),
        );

        info!(
            hostname = %config.node.hostname,
            restored,
            prefixes = registry.len(),
            "Node started"
        );

        Ok(Self {
            config,
            allocator,
            registry,
            resolver,
            parser,
        })
    }

    pub fn hostname(&self) -> &str {
        &self.config.node.hostname
    }

    pub fn config(&self) -> &MegaConfig {
        &self.config
    }

    pub fn parser(&self) -> &NetSpecParser {
        &self.parser
    }

    pub fn resolver(&self) -> &Arc<VlanAliasResolver> {
        &self.resolver
    }

    pub fn allocator(&self) -> &Arc<dyn VlanAllocator> {
        &self.allocator
    }

    pub fn registry(&self) -> &MacPrefixRegistry {
        &self.registry
    }

    /// A MAC with a registered vendor prefix.
    pub fn random_mac(&self) -> Option<MacAddress> {
        self.registry.random_mac()
    }

    /// The alias table as written to disk, optionally limited to a namespace.
    pub fn vlan_info(&self, namespace: Option<&str>) -> String {
        render_alias_table(&self.allocator.tabular(namespace))
    }

    /// Applies a registration received from a peer.
    ///
    /// Returns true for a new binding. A repeat of a known binding is a no-op;
    /// a conflicting one is logged by the allocator and returned as an error.
    pub fn apply_registration(&self, text: &str) -> VlandResult<bool> {
        let command = RegistrationCommand::parse(text)?;
        let added = self
            .allocator
            .add_alias(&command.namespace, &command.alias, command.vlan)
            .map_err(VlandError::from)?;
        if added {
            info!(
                hostname = %self.hostname(),
                namespace = %command.namespace,
                alias = %command.alias,
                vlan = %command.vlan,
                "Learned alias from peer"
            );
        }
        Ok(added)
    }

    /// Waits for outstanding broadcasts up to the configured timeout.
    pub async fn shutdown(&self) -> bool {
        self.resolver
            .broadcaster()
            .shutdown(self.config.shutdown_timeout())
            .await
    }
}

impl RegistrationSink for MegaNode {
    fn deliver(&self, command: &str) -> Result<(), String> {
        self.apply_registration(command)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
