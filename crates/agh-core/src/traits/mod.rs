//! Core traits for the sync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`NodeClient`]: Talk to one node's rewrite control API
//! - [`NodeRegistry`]: Managed nodes plus the canonical record set

pub mod node_client;
pub mod node_registry;

pub use node_client::{NodeClient, NodeClientFactory};
pub use node_registry::NodeRegistry;
