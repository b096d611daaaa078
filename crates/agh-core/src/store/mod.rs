// # Registry Store Implementations
//
// This module provides implementations of the NodeRegistry trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::FileRegistry;
pub use memory::MemoryRegistry;

use crate::config::StoreConfig;
use crate::traits::NodeRegistry;

/// Open the registry described by `config`
pub async fn open(config: &StoreConfig) -> Result<Box<dyn NodeRegistry>, crate::Error> {
    match config {
        StoreConfig::File { path } => Ok(Box::new(FileRegistry::open(path).await?)),
        StoreConfig::Memory => Ok(Box::new(MemoryRegistry::new())),
    }
}
