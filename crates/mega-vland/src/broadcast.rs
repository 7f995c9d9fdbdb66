//! Cluster-wide propagation of new alias bindings.
//!
//! [`AliasBroadcaster`] posts a [`RegistrationCommand`] to every peer through a
//! [`MeshTransport`] and hands the response stream to a background task that
//! logs per-peer failures. Announcing never waits for peers and never fails
//! the caller.
//!
//! [`LocalMesh`] is an in-process transport that delivers commands straight to
//! [`RegistrationSink`]s, used to wire several nodes together in one process.

use crate::command::RegistrationCommand;
use async_trait::async_trait;
use mega_types::VlanId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Mesh transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("mesh unavailable: {0}")]
    Unavailable(String),
}

/// Result of delivering a command to one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub host: String,
    pub error: Option<String>,
}

impl BroadcastOutcome {
    pub fn ok(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            error: None,
        }
    }

    pub fn failed(host: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            error: Some(error.into()),
        }
    }
}

/// Delivers commands to every peer.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Posts `command` to all peers. The returned channel yields batches of
    /// per-peer outcomes and closes once every peer has answered.
    async fn broadcast(
        &self,
        command: &RegistrationCommand,
    ) -> Result<mpsc::Receiver<Vec<BroadcastOutcome>>, MeshError>;
}

/// Receiving end of a registration.
pub trait RegistrationSink: Send + Sync {
    /// Applies one command line. The error text is reported back to the sender.
    fn deliver(&self, command: &str) -> Result<(), String>;
}

/// In-process mesh.
///
/// Peers are held weakly so nodes and the mesh can reference each other.
pub struct LocalMesh {
    hostname: String,
    capacity: usize,
    peers: RwLock<Vec<(String, Weak<dyn RegistrationSink>)>>,
}

impl LocalMesh {
    pub fn new(hostname: impl Into<String>, capacity: usize) -> Self {
        Self {
            hostname: hostname.into(),
            capacity: capacity.max(1),
            peers: RwLock::new(Vec::new()),
        }
    }

    /// Registers a peer, replacing any existing peer with the same name.
    pub fn add_peer(&self, host: impl Into<String>, sink: &Arc<dyn RegistrationSink>) {
        let host = host.into();
        let mut peers = self.peers.write();
        peers.retain(|(name, _)| name != &host);
        debug!(mesh = %self.hostname, peer = %host, "Added mesh peer");
        peers.push((host, Arc::downgrade(sink)));
    }

    /// Names of registered peers.
    pub fn peers(&self) -> Vec<String> {
        self.peers.read().iter().map(|(h, _)| h.clone()).collect()
    }
}

#[async_trait]
impl MeshTransport for LocalMesh {
    async fn broadcast(
        &self,
        command: &RegistrationCommand,
    ) -> Result<mpsc::Receiver<Vec<BroadcastOutcome>>, MeshError> {
        let peers = self.peers.read().clone();
        let text = command.compile();
        let (tx, rx) = mpsc::channel(self.capacity);

        debug!(
            mesh = %self.hostname,
            source = ?command.source,
            record = command.record,
            peers = peers.len(),
            "Broadcasting {}", text
        );

        tokio::spawn(async move {
            for (host, sink) in peers {
                let outcome = match sink.upgrade() {
                    Some(sink) => match sink.deliver(&text) {
                        Ok(()) => BroadcastOutcome::ok(host),
                        Err(e) => BroadcastOutcome::failed(host, e),
                    },
                    None => BroadcastOutcome::failed(host, "peer is gone"),
                };
                if tx.send(vec![outcome]).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }
}

/// Announces new bindings and supervises the response drains.
pub struct AliasBroadcaster {
    mesh: Arc<dyn MeshTransport>,
    tracker: TaskTracker,
    failures: Arc<AtomicU64>,
}

impl AliasBroadcaster {
    pub fn new(mesh: Arc<dyn MeshTransport>) -> Self {
        Self {
            mesh,
            tracker: TaskTracker::new(),
            failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Sends the binding to all peers. Errors are logged, never returned.
    pub async fn announce(&self, namespace: &str, alias: &str, vlan: VlanId) {
        let command = RegistrationCommand::new(namespace, alias, vlan)
            .with_record(false)
            .with_source(namespace);

        let responses = match self.mesh.broadcast(&command).await {
            Ok(rx) => rx,
            Err(e) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                error!(namespace, alias, %vlan, error = %e, "unable to send alias to mesh");
                return;
            }
        };

        let alias = alias.to_string();
        let failures = Arc::clone(&self.failures);
        self.tracker
            .spawn(drain_responses(responses, alias, vlan, failures));
    }

    /// Peer deliveries that failed so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Number of response drains still running.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every drain started so far. New announcements may still be
    /// made afterwards.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Waits up to `timeout` for outstanding drains. Returns false if some
    /// were still running.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!(
                in_flight = self.tracker.len(),
                "alias broadcasts did not complete within timeout"
            );
            return false;
        }
        info!("alias broadcasts drained");
        true
    }
}

async fn drain_responses(
    mut responses: mpsc::Receiver<Vec<BroadcastOutcome>>,
    alias: String,
    vlan: VlanId,
    failures: Arc<AtomicU64>,
) {
    while let Some(batch) = responses.recv().await {
        for outcome in batch {
            match outcome.error {
                Some(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        alias = %alias,
                        %vlan,
                        host = %outcome.host,
                        error = %e,
                        "unable to send alias {} -> {} to {}", alias, vlan, outcome.host
                    );
                }
                None => debug!(alias = %alias, %vlan, host = %outcome.host, "Peer accepted alias"),
            }
        }
    }
}
