//! In-process multi-node clusters
//!
//! Every node gets its own base directory and its own [`LocalMesh`] whose
//! peers are all the other nodes, so a broadcast from one node reaches
//! everybody else exactly as it would over the wire.

use crate::fixtures::node_config;
use mega_vland::{LocalMesh, MegaNode, RegistrationSink, VlandResult};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::debug;

/// A set of nodes connected through [`LocalMesh`]es.
pub struct TestCluster {
    nodes: Vec<Arc<MegaNode>>,
    _base: TempDir,
}

impl TestCluster {
    /// Starts `size` nodes named `node0 .. node{size-1}`.
    pub async fn start(size: usize) -> VlandResult<Self> {
        let base = tempfile::tempdir()?;
        let mut nodes = Vec::with_capacity(size);
        let mut meshes = Vec::with_capacity(size);

        for i in 0..size {
            let hostname = format!("node{i}");
            let dir = base.path().join(&hostname);
            let mesh = Arc::new(LocalMesh::new(hostname.clone(), 16));
            let node = MegaNode::start(node_config(&dir, &hostname), mesh.clone()).await?;
            nodes.push(Arc::new(node));
            meshes.push(mesh);
        }

        for (i, mesh) in meshes.iter().enumerate() {
            for (j, node) in nodes.iter().enumerate() {
                if i != j {
                    let sink: Arc<dyn RegistrationSink> = node.clone();
                    mesh.add_peer(node.hostname(), &sink);
                }
            }
        }
        debug!(size, "Cluster started");

        Ok(Self { nodes, _base: base })
    }

    pub fn node(&self, i: usize) -> &Arc<MegaNode> {
        &self.nodes[i]
    }

    pub fn nodes(&self) -> &[Arc<MegaNode>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Waits until every broadcast started so far has been delivered.
    pub async fn settle(&self) {
        for node in &self.nodes {
            node.resolver().broadcaster().flush().await;
        }
    }
}
