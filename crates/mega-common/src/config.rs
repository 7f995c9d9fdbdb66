//! Configuration file support for vland
//!
//! Loads and validates node configuration from TOML files.
//! Default location: /etc/minimega/vland.toml

use crate::error::{CommonError, CommonResult};
use crate::lock::LockMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/minimega/vland.toml";

/// Node identity and local state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Base directory for persisted node state
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Name this node uses when talking to the mesh
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Log every namespace lock acquisition with its call site
    #[serde(default)]
    pub debug_locks: bool,
}

/// Interface defaults used by the netspec parser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bridge used when a netspec does not name one
    #[serde(default = "default_bridge")]
    pub default_bridge: String,

    /// NIC driver used when a netspec does not name one
    #[serde(default = "default_driver")]
    pub default_driver: String,

    /// Known NIC driver names
    #[serde(default = "default_drivers")]
    pub drivers: Vec<String>,

    /// Optional MAC prefix registry file (IEEE oui.txt format)
    #[serde(default)]
    pub mac_registry: Option<PathBuf>,
}

/// Range the local VLAN allocator hands IDs out from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlanRangeConfig {
    /// First allocatable VLAN
    #[serde(default = "default_vlan_min")]
    pub min: u16,

    /// Last allocatable VLAN (inclusive)
    #[serde(default = "default_vlan_max")]
    pub max: u16,
}

/// Alias propagation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Buffered response batches per broadcast
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How long shutdown waits for in-flight broadcasts
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

/// Complete vland configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MegaConfig {
    #[serde(default)]
    pub node: NodeConfig,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub vlans: VlanRangeConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

// Default functions
fn default_base_dir() -> PathBuf {
    PathBuf::from("/tmp/minimega")
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_bridge() -> String {
    "mega_bridge".to_string()
}

fn default_driver() -> String {
    "e1000".to_string()
}

fn default_drivers() -> Vec<String> {
    [
        "e1000",
        "e1000e",
        "i82550",
        "i82551",
        "i82557a",
        "i82557b",
        "i82557c",
        "i82558a",
        "i82558b",
        "i82559a",
        "i82559b",
        "i82559c",
        "i82559er",
        "i82562",
        "i82801",
        "ne2k_pci",
        "pcnet",
        "rtl8139",
        "virtio-net-pci",
        "vmxnet3",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_vlan_min() -> u16 {
    101
}

fn default_vlan_max() -> u16 {
    4094
}

fn default_channel_capacity() -> usize {
    64
}

fn default_shutdown_timeout() -> u64 {
    10
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            hostname: default_hostname(),
            debug_locks: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            default_bridge: default_bridge(),
            default_driver: default_driver(),
            drivers: default_drivers(),
            mac_registry: None,
        }
    }
}

impl Default for VlanRangeConfig {
    fn default() -> Self {
        Self {
            min: default_vlan_min(),
            max: default_vlan_max(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl MegaConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> CommonResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    CommonError::Config(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(CommonError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> CommonResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CommonError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, content)?;
        Ok(())
    }

    /// Path of the persisted alias table
    pub fn alias_table_path(&self) -> PathBuf {
        self.node.base_dir.join("vlans")
    }

    /// Lock flavour for namespace critical sections
    pub fn lock_mode(&self) -> LockMode {
        if self.node.debug_locks {
            LockMode::Logging
        } else {
            LockMode::Plain
        }
    }

    /// Get broadcast shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast.shutdown_timeout_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> CommonResult<()> {
        if self.vlans.min == 0 || self.vlans.max > 4094 {
            return Err(CommonError::invalid_config(
                "vlans",
                "range must lie within 1-4094",
            ));
        }

        if self.vlans.min > self.vlans.max {
            return Err(CommonError::invalid_config(
                "vlans.min",
                "must be <= vlans.max",
            ));
        }

        if self.network.default_bridge.is_empty() {
            return Err(CommonError::invalid_config(
                "network.default_bridge",
                "must not be empty",
            ));
        }

        if !self
            .network
            .drivers
            .iter()
            .any(|d| d == &self.network.default_driver)
        {
            return Err(CommonError::invalid_config(
                "network.default_driver",
                format!("{} is not in network.drivers", self.network.default_driver),
            ));
        }

        if self.broadcast.channel_capacity == 0 {
            return Err(CommonError::invalid_config(
                "broadcast.channel_capacity",
                "must be > 0",
            ));
        }

        Ok(())
    }
}
