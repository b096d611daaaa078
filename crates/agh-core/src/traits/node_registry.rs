// # Node Registry Trait
//
// Defines the interface to the store holding the managed nodes and the
// canonical record set.
//
// ## Implementations
//
// - File-based: `FileRegistry` (JSON at `~/.config/agh-control/data.json`)
// - In-memory: `MemoryRegistry`
//
// The sync entry points take a registry handle explicitly; nothing in the
// core reads process-wide state.

use async_trait::async_trait;

use crate::model::{Node, RecordSet};

/// Trait for node registry implementations
///
/// The canonical record set is single-writer: implementations do not need to
/// resolve concurrent edits.
#[async_trait]
pub trait NodeRegistry: Send + Sync {
    /// All managed nodes, in registry order
    async fn list_nodes(&self) -> Result<Vec<Node>, crate::Error>;

    /// Look up one node by name
    async fn get_node(&self, name: &str) -> Result<Option<Node>, crate::Error>;

    /// Register a node
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: the node was added
    /// - `Ok(false)`: a node with that name already exists (nothing changed)
    async fn add_node(&self, node: Node) -> Result<bool, crate::Error>;

    /// Forget a node
    ///
    /// Returns `false` when no node had that name.
    async fn remove_node(&self, name: &str) -> Result<bool, crate::Error>;

    /// The canonical domain → answer mapping
    async fn canonical_records(&self) -> Result<RecordSet, crate::Error>;

    /// Insert or overwrite one canonical record
    ///
    /// Returns the previous answer, if any.
    async fn set_record(&self, domain: &str, answer: &str)
    -> Result<Option<String>, crate::Error>;

    /// Remove one canonical record
    ///
    /// Returns the removed answer, if any.
    async fn remove_record(&self, domain: &str) -> Result<Option<String>, crate::Error>;

    /// Replace the whole canonical record set
    async fn replace_records(&self, records: RecordSet) -> Result<(), crate::Error>;
}
