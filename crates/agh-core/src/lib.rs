// # agh-core
//
// Core library for keeping DNS rewrite records consistent across a cluster
// of independently managed DNS-control nodes.
//
// ## Architecture Overview
//
// - **NodeClient**: Trait for one node's rewrite control API (list / add / delete)
// - **NodeRegistry**: Trait for the managed nodes and the canonical record set
// - **Reconciler**: Diffs one node against the canonical set and applies the difference
// - **SyncEngine**: Runs the reconciler over every node, isolating failures
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Diffing is pure; I/O lives behind traits
// 2. **Sequential**: Nodes are processed one at a time, in registry order
// 3. **Failure Isolation**: One node's request error never stops the others
// 4. **Library-First**: The binary is a thin layer over this crate
// 5. **No Hidden Retries**: The first failing call ends that node's run

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod reconcile;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{ClientConfig, StoreConfig, SyncConfig};
pub use engine::{FetchReport, NodeFailure, NodeOutcome, NodeResult, SyncEngine, SyncReport};
pub use error::{Error, RequestError, Result};
pub use model::{Credential, Node, Record, RecordSet, merge};
pub use reconcile::{Reconciler, SyncCounts};
pub use store::{FileRegistry, MemoryRegistry};
pub use traits::{NodeClient, NodeClientFactory, NodeRegistry};
