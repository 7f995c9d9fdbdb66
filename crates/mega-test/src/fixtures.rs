//! Test fixtures for alias resolution
//!
//! Provides mesh transports and allocators with scripted behavior, plus
//! configuration and netspec builders.

use async_trait::async_trait;
use mega_common::MegaConfig;
use mega_types::VlanId;
use mega_vland::{
    qualify, read_alias_table, AllocatedVlans, BroadcastOutcome, MeshError, MeshTransport,
    RegistrationCommand, VlanAllocator, VlanError,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Installs a test-friendly tracing subscriber once per process.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Node configuration rooted at `base_dir`.
pub fn node_config(base_dir: &Path, hostname: &str) -> MegaConfig {
    let mut config = MegaConfig::default();
    config.node.base_dir = base_dir.to_path_buf();
    config.node.hostname = hostname.to_string();
    config
}

/// Mesh that records every broadcast and answers with scripted outcomes.
///
/// With [`watching_table`](Self::watching_table) it also records, for each
/// command, whether the alias table on disk already listed the binding at
/// the moment the broadcast was posted.
#[derive(Default)]
pub struct RecordingMesh {
    hosts: Vec<String>,
    failing: Vec<String>,
    table: Option<PathBuf>,
    sent: Mutex<Vec<RegistrationCommand>>,
    on_disk: Mutex<Vec<bool>>,
}

impl RecordingMesh {
    /// A mesh with no peers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a peer that accepts everything.
    pub fn with_peer(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Adds a peer that rejects everything.
    pub fn with_failing_peer(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.failing.push(host.clone());
        self.hosts.push(host);
        self
    }

    /// Checks `path` for each broadcast binding before answering.
    pub fn watching_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.table = Some(path.into());
        self
    }

    /// Per broadcast, whether the watched table listed the binding when it
    /// was posted.
    pub fn on_disk_at_send(&self) -> Vec<bool> {
        self.on_disk.lock().clone()
    }

    /// Commands broadcast so far.
    pub fn sent(&self) -> Vec<RegistrationCommand> {
        self.sent.lock().clone()
    }

    /// Number of broadcasts so far.
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl MeshTransport for RecordingMesh {
    async fn broadcast(
        &self,
        command: &RegistrationCommand,
    ) -> Result<mpsc::Receiver<Vec<BroadcastOutcome>>, MeshError> {
        if let Some(path) = &self.table {
            let expected = (qualify(&command.namespace, &command.alias), command.vlan);
            let listed = read_alias_table(path)
                .await
                .map(|rows| rows.contains(&expected))
                .unwrap_or(false);
            self.on_disk.lock().push(listed);
        }
        self.sent.lock().push(command.clone());

        let batch: Vec<BroadcastOutcome> = self
            .hosts
            .iter()
            .map(|host| {
                if self.failing.contains(host) {
                    BroadcastOutcome::failed(host.clone(), "connection refused")
                } else {
                    BroadcastOutcome::ok(host.clone())
                }
            })
            .collect();

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            if !batch.is_empty() {
                let _ = tx.send(batch).await;
            }
        });
        Ok(rx)
    }
}

/// Mesh whose broadcasts always fail.
pub struct FailingMesh {
    attempts: AtomicUsize,
}

impl FailingMesh {
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FailingMesh {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeshTransport for FailingMesh {
    async fn broadcast(
        &self,
        _command: &RegistrationCommand,
    ) -> Result<mpsc::Receiver<Vec<BroadcastOutcome>>, MeshError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MeshError::Unavailable("mesh is down".to_string()))
    }
}

/// Allocator that fails lookups or allocations on demand.
///
/// Anything not scripted to fail is passed to an inner [`AllocatedVlans`].
#[derive(Default)]
pub struct FailingAllocator {
    inner: AllocatedVlans,
    parse_error: Option<VlanError>,
    allocate_error: Option<VlanError>,
    allocate_calls: AtomicUsize,
}

impl FailingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every lookup fails with `error`.
    pub fn failing_parse(mut self, error: VlanError) -> Self {
        self.parse_error = Some(error);
        self
    }

    /// Every allocation fails with `error`.
    pub fn failing_allocate(mut self, error: VlanError) -> Self {
        self.allocate_error = Some(error);
        self
    }

    pub fn allocate_calls(&self) -> usize {
        self.allocate_calls.load(Ordering::SeqCst)
    }
}

impl VlanAllocator for FailingAllocator {
    fn parse_vlan(&self, namespace: &str, alias: &str) -> Result<VlanId, VlanError> {
        match &self.parse_error {
            Some(e) => Err(e.clone()),
            None => self.inner.parse_vlan(namespace, alias),
        }
    }

    fn allocate(&self, namespace: &str, alias: &str) -> Result<(VlanId, bool), VlanError> {
        self.allocate_calls.fetch_add(1, Ordering::SeqCst);
        match &self.allocate_error {
            Some(e) => Err(e.clone()),
            None => self.inner.allocate(namespace, alias),
        }
    }

    fn print_vlan(&self, namespace: &str, vlan: VlanId) -> String {
        self.inner.print_vlan(namespace, vlan)
    }

    fn tabular(&self, namespace: Option<&str>) -> Vec<(String, VlanId)> {
        self.inner.tabular(namespace)
    }

    fn add_alias(&self, namespace: &str, alias: &str, vlan: VlanId) -> Result<bool, VlanError> {
        self.inner.add_alias(namespace, alias, vlan)
    }
}

/// Netspecs covering every field layout.
pub mod netspec_fixtures {
    /// Sample MAC with a registered (Intel) prefix.
    pub const INTEL_MAC: &str = "00:1b:21:12:34:56";

    /// One netspec per layout, in table order.
    pub fn every_layout() -> Vec<&'static str> {
        vec![
            "DMZ",
            "DMZ,00:1b:21:12:34:56",
            "DMZ,virtio-net-pci",
            "br0,DMZ",
            "br0,DMZ,00:1b:21:12:34:56",
            "DMZ,00:1b:21:12:34:56,virtio-net-pci",
            "br0,DMZ,virtio-net-pci",
            "br0,DMZ,00:1b:21:12:34:56,virtio-net-pci",
        ]
    }

    /// Aliases `prefix-0 .. prefix-(n-1)`.
    pub fn aliases(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}-{i}")).collect()
    }
}
