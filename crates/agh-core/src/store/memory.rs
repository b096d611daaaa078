// # Memory Registry
//
// In-memory implementation of NodeRegistry.
//
// Nothing survives a restart. Selected with `StoreConfig::Memory`; tests and
// embedders seed nodes and records through `with_contents`. Nodes iterate in
// insertion order.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{Node, RecordSet};
use crate::traits::NodeRegistry;

#[derive(Debug, Default)]
struct Inner {
    nodes: Vec<Node>,
    records: RecordSet,
}

/// In-memory registry implementation
///
/// # Example
///
/// ```rust,no_run
/// use agh_core::store::MemoryRegistry;
/// use agh_core::traits::NodeRegistry;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = MemoryRegistry::new();
///
///     registry.set_record("nas.lan", "10.0.0.5").await?;
///     let records = registry.canonical_records().await?;
///     assert_eq!(records.get("nas.lan").map(String::as_str), Some("10.0.0.5"));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with nodes and records
    pub fn with_contents(nodes: Vec<Node>, records: RecordSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner { nodes, records })),
        }
    }
}

#[async_trait]
impl NodeRegistry for MemoryRegistry {
    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        Ok(self.inner.read().await.nodes.clone())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error> {
        let guard = self.inner.read().await;
        Ok(guard.nodes.iter().find(|n| n.name == name).cloned())
    }

    async fn add_node(&self, node: Node) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        if guard.nodes.iter().any(|n| n.name == node.name) {
            return Ok(false);
        }
        guard.nodes.push(node);
        Ok(true)
    }

    async fn remove_node(&self, name: &str) -> Result<bool, Error> {
        let mut guard = self.inner.write().await;
        let before = guard.nodes.len();
        guard.nodes.retain(|n| n.name != name);
        Ok(guard.nodes.len() != before)
    }

    async fn canonical_records(&self) -> Result<RecordSet, Error> {
        Ok(self.inner.read().await.records.clone())
    }

    async fn set_record(&self, domain: &str, answer: &str) -> Result<Option<String>, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.records.insert(domain.to_string(), answer.to_string()))
    }

    async fn remove_record(&self, domain: &str) -> Result<Option<String>, Error> {
        let mut guard = self.inner.write().await;
        Ok(guard.records.remove(domain))
    }

    async fn replace_records(&self, records: RecordSet) -> Result<(), Error> {
        self.inner.write().await.records = records;
        Ok(())
    }
}
