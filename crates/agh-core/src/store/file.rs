// # File Registry
//
// File-based implementation of NodeRegistry with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "nodes": {
//     "primary": { "url": "https://ns1.example.org", "auth": "YWRtaW46cGFzcw==" }
//   },
//   "records": {
//     "nas.lan": "10.0.0.5"
//   }
// }
// ```
//
// Both keys are optional. Nodes keep the order they appear in the file, and
// new nodes are appended.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{Credential, Node, RecordSet};
use crate::traits::NodeRegistry;

/// One node as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeEntry {
    url: String,
    auth: Credential,
}

/// Serializable data file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DataFile {
    #[serde(default, with = "ordered_nodes")]
    nodes: Vec<(String, NodeEntry)>,
    #[serde(default)]
    records: RecordSet,
}

impl DataFile {
    fn node(&self, name: &str) -> Option<&NodeEntry> {
        self.nodes.iter().find(|(n, _)| n == name).map(|(_, e)| e)
    }
}

/// A JSON object read and written as a list of entries in document order
mod ordered_nodes {
    use serde::de::{Deserializer, MapAccess, Visitor};
    use serde::ser::Serializer;
    use std::fmt;

    use super::NodeEntry;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(entries: &Vec<(String, NodeEntry)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(entries.iter().map(|(name, entry)| (name, entry)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, NodeEntry)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Vec<(String, NodeEntry)>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of nodes keyed by name")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, NodeEntry)> =
                    Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((name, entry)) = map.next_entry::<String, NodeEntry>()? {
                    // Duplicate key: last value wins, first position is kept
                    match entries.iter_mut().find(|(n, _)| *n == name) {
                        Some(slot) => slot.1 = entry,
                        None => entries.push((name, entry)),
                    }
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// File-based registry with crash recovery
///
/// Every mutation is written to disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use agh_core::store::FileRegistry;
/// use agh_core::traits::NodeRegistry;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = FileRegistry::open("/home/me/.config/agh-control/data.json").await?;
///
///     registry.set_record("nas.lan", "10.0.0.5").await?;
///     for node in registry.list_nodes().await? {
///         println!("{} @ {}", node.name, node.base_url);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    data: Arc<RwLock<DataFile>>,
}

impl FileRegistry {
    /// Create or load a file registry
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing data file
    /// 3. If it is corrupted, try to load from backup
    /// 4. If no usable copy remains, fail without touching either file
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::registry(format!(
                    "Failed to create data directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let data = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            data: Arc::new(RwLock::new(data)),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the data file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main file
    /// 2. If JSON parse error, try loading backup
    /// 3. If there is no backup or it is unreadable too, return
    ///    `Error::Registry` so nothing overwrites the damaged file
    async fn load_with_recovery(path: &Path) -> Result<DataFile, Error> {
        match Self::load(path).await {
            Ok(data) => {
                tracing::debug!(
                    "Loaded registry: {} node(s), {} record(s)",
                    data.nodes.len(),
                    data.records.len()
                );
                Ok(data)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Data file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    return Err(Error::registry(format!(
                        "Data file {} is not valid JSON ({}) and no backup exists. \
                        Fix or remove the file.",
                        path.display(),
                        e
                    )));
                }

                match Self::load(&backup_path).await {
                    Ok(data) => {
                        tracing::info!(
                            "Recovered registry from backup: {} node(s), {} record(s)",
                            data.nodes.len(),
                            data.records.len()
                        );
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore data file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(data)
                    }
                    Err(backup_err) => Err(Error::registry(format!(
                        "Data file {} is not valid JSON ({}) and backup {} is unreadable ({}). \
                        Fix or remove the files.",
                        path.display(),
                        e,
                        backup_path.display(),
                        backup_err
                    ))),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Load the data file; a missing file is an empty registry
    async fn load(path: &Path) -> Result<DataFile, Error> {
        if !path.exists() {
            tracing::debug!("Data file does not exist: {}", path.display());
            return Ok(DataFile::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::registry(format!("Failed to read data file {}: {}", path.display(), e))
        })?;

        Ok(serde_json::from_str(&content)?)
    }

    /// Write the data file atomically
    async fn write(&self, data: &DataFile) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(data)?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::registry(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::registry(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Registry written to {}", self.path.display());
        Ok(())
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    /// Get path to backup file
    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

fn to_node(name: &str, entry: &NodeEntry) -> Node {
    Node::new(name, entry.url.clone(), entry.auth.clone())
}

#[async_trait]
impl NodeRegistry for FileRegistry {
    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        let guard = self.data.read().await;
        Ok(guard
            .nodes
            .iter()
            .map(|(name, entry)| to_node(name, entry))
            .collect())
    }

    async fn get_node(&self, name: &str) -> Result<Option<Node>, Error> {
        let guard = self.data.read().await;
        Ok(guard.node(name).map(|entry| to_node(name, entry)))
    }

    async fn add_node(&self, node: Node) -> Result<bool, Error> {
        let mut guard = self.data.write().await;
        if guard.node(&node.name).is_some() {
            return Ok(false);
        }
        guard.nodes.push((
            node.name,
            NodeEntry {
                url: node.base_url,
                auth: node.credential,
            },
        ));
        self.write(&guard).await?;
        Ok(true)
    }

    async fn remove_node(&self, name: &str) -> Result<bool, Error> {
        let mut guard = self.data.write().await;
        let before = guard.nodes.len();
        guard.nodes.retain(|(n, _)| n != name);
        if guard.nodes.len() == before {
            return Ok(false);
        }
        self.write(&guard).await?;
        Ok(true)
    }

    async fn canonical_records(&self) -> Result<RecordSet, Error> {
        Ok(self.data.read().await.records.clone())
    }

    async fn set_record(&self, domain: &str, answer: &str) -> Result<Option<String>, Error> {
        let mut guard = self.data.write().await;
        let previous = guard
            .records
            .insert(domain.to_string(), answer.to_string());
        self.write(&guard).await?;
        Ok(previous)
    }

    async fn remove_record(&self, domain: &str) -> Result<Option<String>, Error> {
        let mut guard = self.data.write().await;
        let removed = guard.records.remove(domain);
        if removed.is_some() {
            self.write(&guard).await?;
        }
        Ok(removed)
    }

    async fn replace_records(&self, records: RecordSet) -> Result<(), Error> {
        let mut guard = self.data.write().await;
        guard.records = records;
        self.write(&guard).await
    }
}
