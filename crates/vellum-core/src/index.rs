//! The staging index: pending additions and deletions.
//!
//! Bridges working-directory edits and the next commit. Stored as
//! `index.json`. A path lives in at most one of the two maps at any
//! time; both are emptied on every successful commit.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::VellumResult;
use crate::fsutil::atomic_write;

/// Pending changes keyed by repository-relative path.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagingIndex {
    /// Files staged for addition: path -> blob hash.
    pub additions: BTreeMap<String, String>,
    /// Files staged for removal: path -> blob hash tracked at staging time.
    pub deletions: BTreeMap<String, String>,
}

impl StagingIndex {
    /// Load the index from disk, or return an empty one.
    pub fn load(path: &Path) -> VellumResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save the index atomically.
    pub fn save(&self, path: &Path) -> VellumResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    /// True when nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }

    /// Stage a path for addition, displacing any staged deletion.
    pub fn stage_addition(&mut self, path: &str, blob_hash: &str) {
        self.deletions.remove(path);
        self.additions
            .insert(path.to_string(), blob_hash.to_string());
    }

    /// Stage a path for removal, displacing any staged addition.
    pub fn stage_deletion(&mut self, path: &str, blob_hash: &str) {
        self.additions.remove(path);
        self.deletions
            .insert(path.to_string(), blob_hash.to_string());
    }

    /// Fold the staged changes into a commit's file map: start from the
    /// head map, apply additions, then drop deletions.
    pub fn fold(&self, head_map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = head_map.clone();
        for (path, blob_hash) in &self.additions {
            merged.insert(path.clone(), blob_hash.clone());
        }
        for path in self.deletions.keys() {
            merged.remove(path);
        }
        merged
    }

    /// Empty both maps.
    pub fn clear(&mut self) {
        self.additions.clear();
        self.deletions.clear();
    }
}
