//! Remotes: the name -> path registry and the handle used to operate on
//! another repository's stores.
//!
//! A remote is just another repository's data directory reachable
//! through the filesystem. Nothing about a registered path is validated
//! until fetch or push actually touches it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{VellumError, VellumResult};
use crate::fsutil::atomic_write;
use crate::graph::GraphState;
use crate::object::ObjectStore;

/// Registered remotes, stored as `remotes.json`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteRegistry {
    /// Map of remote name -> path to that repository's data directory.
    pub remotes: BTreeMap<String, String>,
}

impl RemoteRegistry {
    /// Load the registry from disk, or return an empty one.
    pub fn load(path: &Path) -> VellumResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save the registry atomically.
    pub fn save(&self, path: &Path) -> VellumResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    /// Register a remote.
    pub fn add(&mut self, name: &str, path: &str) -> VellumResult<()> {
        if self.remotes.contains_key(name) {
            return Err(VellumError::RemoteExists(name.to_string()));
        }
        self.remotes.insert(name.to_string(), path.to_string());
        Ok(())
    }

    /// Drop a remote from the registry.
    pub fn remove(&mut self, name: &str) -> VellumResult<()> {
        if self.remotes.remove(name).is_none() {
            return Err(VellumError::RemoteNotFound(name.to_string()));
        }
        Ok(())
    }

    /// The registered path for a remote.
    pub fn path_of(&self, name: &str) -> VellumResult<&str> {
        self.remotes
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| VellumError::RemoteNotFound(name.to_string()))
    }
}

/// A second repository opened by data-directory path for sync.
///
/// Only the pieces sync needs: the object store and the graph state.
/// The remote's working tree, staging index, and registry are never
/// touched.
pub struct RemoteHandle {
    data_dir: PathBuf,
    /// The remote's content-addressed store.
    pub objects: ObjectStore,
}

impl RemoteHandle {
    /// Open a remote repository's data directory.
    ///
    /// Fails with `RemoteUnreachable` when the directory is missing.
    pub fn open(data_dir: &Path) -> VellumResult<Self> {
        if !data_dir.is_dir() {
            return Err(VellumError::RemoteUnreachable(
                data_dir.display().to_string(),
            ));
        }
        Ok(RemoteHandle {
            data_dir: data_dir.to_path_buf(),
            objects: ObjectStore::new(&data_dir.join("objects")),
        })
    }

    /// Load the remote's graph state.
    pub fn load_graph(&self) -> VellumResult<GraphState> {
        GraphState::load(&self.data_dir.join("graph.json"))
    }

    /// Save the remote's graph state.
    pub fn save_graph(&self, graph: &GraphState) -> VellumResult<()> {
        graph.save(&self.data_dir.join("graph.json"))
    }
}

/// Counts of objects copied by one fetch or push.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncStats {
    /// Commit records copied.
    pub commits_copied: usize,
    /// Blob records copied.
    pub blobs_copied: usize,
    /// Raw content objects copied.
    pub contents_copied: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_registry_add_duplicate_fails() {
        let mut registry = RemoteRegistry::default();
        registry.add("origin", "/tmp/remote").unwrap();
        assert!(matches!(
            registry.add("origin", "/elsewhere"),
            Err(VellumError::RemoteExists(_))
        ));
    }

    #[test]
    fn test_registry_remove_missing_fails() {
        let mut registry = RemoteRegistry::default();
        assert!(matches!(
            registry.remove("origin"),
            Err(VellumError::RemoteNotFound(_))
        ));
    }

    #[test]
    fn test_registry_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("remotes.json");

        let mut registry = RemoteRegistry::default();
        registry.add("origin", "/tmp/remote").unwrap();
        registry.save(&path).unwrap();

        let loaded = RemoteRegistry::load(&path).unwrap();
        assert_eq!(loaded.path_of("origin").unwrap(), "/tmp/remote");
    }

    #[test]
    fn test_handle_open_missing_dir() {
        let dir = tempdir().unwrap();
        let result = RemoteHandle::open(&dir.path().join("gone"));
        assert!(matches!(result, Err(VellumError::RemoteUnreachable(_))));
    }
}
