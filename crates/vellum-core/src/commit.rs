//! Commit records — immutable snapshots of the tracked file tree.
//!
//! A commit maps repository-relative paths to blob hashes and links to
//! its parent(s) by commit hash, forming the history DAG. Cycles cannot
//! occur: a commit can only reference parents that were already saved,
//! hence already hashed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hash::hash_bytes;

/// An immutable snapshot record, content-addressed by its own serialized
/// form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Commit {
    /// Commit message.
    pub message: String,
    /// When this commit was created.
    pub timestamp: DateTime<Utc>,
    /// First parent's commit hash (None only for the root commit).
    pub parent: Option<String>,
    /// Second parent's commit hash (set only on merge commits).
    pub parent2: Option<String>,
    /// Map of repository-relative path -> blob hash.
    pub files: BTreeMap<String, String>,
    /// SHA-256 of this record serialized with `hash` empty. Assigned
    /// exactly once, at creation; never recomputed.
    pub hash: String,
}

impl Commit {
    /// Create a commit and compute its content hash.
    ///
    /// The hash covers the serialized record with the `hash` field set to
    /// the empty string, so two commits with equal (message, timestamp,
    /// parents, files) tuples always collide to the same id — which is
    /// exactly what lets every repository share the root commit.
    pub fn new(
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
        parent: Option<String>,
        parent2: Option<String>,
        files: BTreeMap<String, String>,
    ) -> Self {
        let mut commit = Commit {
            message: message.into(),
            timestamp,
            parent,
            parent2,
            files,
            hash: String::new(),
        };
        let json = serde_json::to_string(&commit).expect("commit serialization should not fail");
        commit.hash = hash_bytes(json.as_bytes());
        commit
    }

    /// The root commit every repository starts from: no parents, no
    /// files, epoch timestamp. Identical across all repositories.
    pub fn root() -> Self {
        Commit::new(
            "initial commit",
            DateTime::UNIX_EPOCH,
            None,
            None,
            BTreeMap::new(),
        )
    }

    /// True if this commit has two parents.
    pub fn is_merge(&self) -> bool {
        self.parent2.is_some()
    }

    /// The blob hash tracked for a path, if any.
    pub fn blob_for(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// True if this commit tracks the path.
    pub fn tracks(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}
