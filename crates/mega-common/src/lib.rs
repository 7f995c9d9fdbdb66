//! Common infrastructure for minimega network daemons.
//!
//! This crate provides shared functionality used by the VLAN alias daemon and
//! its test harness:
//!
//! - [`config`]: TOML configuration with per-field defaults
//! - [`lock`]: mutex that can log every acquisition for deadlock hunting
//! - [`error`]: error types for configuration handling
//!
//! # Example
//!
//! ```ignore
//! use mega_common::{MegaConfig, DebugMutex};
//!
//! let config = MegaConfig::load_or_default("/etc/minimega/vland.toml")?;
//! let table = DebugMutex::new("alias-table", (), config.lock_mode());
//! let _guard = table.lock();
//! ```

pub mod config;
pub mod error;
pub mod lock;

pub use config::{
    BroadcastConfig, MegaConfig, NetworkConfig, NodeConfig, VlanRangeConfig, DEFAULT_CONFIG_PATH,
};
pub use error::{CommonError, CommonResult};
pub use lock::{DebugMutex, DebugMutexGuard, LockMode};
