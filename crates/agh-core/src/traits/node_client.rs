// # Node Client Trait
//
// Defines the interface for talking to one node's DNS rewrite control API.
//
// ## Implementations
//
// - HTTP: `agh-node-http` crate
// - Tests: recording fakes in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use agh_core::{NodeClient, Record};
//
// async fn example(client: &dyn NodeClient) -> agh_core::Result<()> {
//     for record in client.list().await? {
//         println!("{}", record);
//     }
//     client.add(&Record::new("nas.lan", "10.0.0.5")).await?;
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::model::{Node, Record};

/// Trait for node client implementations
///
/// One client talks to exactly one node. Every method is a single-shot
/// request: no retries, no caching, no background work. A non-2xx response or
/// a transport failure must be reported as [`crate::Error::Request`] so the
/// orchestrator can isolate it to this node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Fetch the node's full current record set
    async fn list(&self) -> Result<Vec<Record>, crate::Error>;

    /// Request creation of a record
    ///
    /// Not idempotent: calling it twice for the same domain may fail or
    /// create a duplicate depending on the node. Never call speculatively.
    async fn add(&self, record: &Record) -> Result<(), crate::Error>;

    /// Request removal of the exact `{domain, answer}` pair
    ///
    /// Pass records exactly as reported by [`NodeClient::list`]; a record
    /// whose answer differs from what the node holds will not match.
    async fn delete(&self, record: &Record) -> Result<(), crate::Error>;

    /// Name of the node this client talks to (for logging)
    fn node_name(&self) -> &str;
}

/// Helper trait for constructing node clients
pub trait NodeClientFactory: Send + Sync {
    /// Create a client bound to `node`
    ///
    /// A node whose base URL cannot be used should fail with
    /// [`crate::Error::Request`] so only that node is skipped.
    fn create(&self, node: &Node) -> Result<Box<dyn NodeClient>, crate::Error>;
}
