//! Content-addressable object store.
//!
//! Three partitions live under the store root: raw file contents keyed by
//! the hash of their bytes, blob records keyed by the hash of their own
//! serialized form, and commit records keyed likewise. All writes are
//! create-if-absent; nothing is ever updated in place or deleted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::commit::Commit;
use crate::error::{VellumError, VellumResult};
use crate::fsutil::plain_filenames_in;
use crate::hash::hash_bytes;

/// Partition directory for raw file contents.
const CONTENTS: &str = "contents";
/// Partition directory for blob records.
const BLOBS: &str = "blobs";
/// Partition directory for commit records.
const COMMITS: &str = "commits";

/// A content-addressed record wrapping a reference to raw file bytes.
///
/// The blob's own hash covers its serialized record, not the file
/// bytes: blob identity and content identity live in separate
/// namespaces, and the record can grow fields without touching
/// content hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Blob {
    /// SHA-256 of the raw file bytes this blob points at.
    pub content_hash: String,
}

impl Blob {
    /// Deterministic serialized form used both for persistence and as
    /// hash input.
    fn to_json(&self) -> String {
        serde_json::to_string(self).expect("blob serialization should not fail")
    }

    /// The blob's identity: hash of its serialized record.
    pub fn blob_hash(&self) -> String {
        hash_bytes(self.to_json().as_bytes())
    }
}

/// The object store manages content-addressable storage on disk.
pub struct ObjectStore {
    /// Store root, e.g. `.vellum/objects/`.
    root: PathBuf,
}

impl ObjectStore {
    /// Create a handle rooted at the given path.
    pub fn new(objects_dir: &Path) -> Self {
        Self {
            root: objects_dir.to_path_buf(),
        }
    }

    /// Create the partition directories.
    pub fn init(objects_dir: &Path) -> VellumResult<()> {
        fs::create_dir_all(objects_dir.join(CONTENTS))?;
        fs::create_dir_all(objects_dir.join(BLOBS))?;
        fs::create_dir_all(objects_dir.join(COMMITS))?;
        Ok(())
    }

    fn content_path(&self, hash: &str) -> PathBuf {
        self.root.join(CONTENTS).join(hash)
    }

    fn blob_path(&self, hash: &str) -> PathBuf {
        self.root.join(BLOBS).join(hash)
    }

    fn commit_path(&self, hash: &str) -> PathBuf {
        self.root.join(COMMITS).join(hash)
    }

    // --- Contents ---

    /// Store raw file bytes and return their content hash.
    ///
    /// Idempotent: identical bytes land on the same path, and an existing
    /// object is left untouched.
    pub fn put_content(&self, data: &[u8]) -> VellumResult<String> {
        let hash = hash_bytes(data);
        let path = self.content_path(&hash);
        if !path.exists() {
            fs::write(&path, data)?;
        }
        Ok(hash)
    }

    /// Retrieve raw file bytes by content hash.
    pub fn get_content(&self, content_hash: &str) -> VellumResult<Vec<u8>> {
        let path = self.content_path(content_hash);
        if !path.exists() {
            return Err(VellumError::ObjectNotFound(content_hash.to_string()));
        }
        Ok(fs::read(&path)?)
    }

    /// Check whether raw bytes with this hash are stored.
    pub fn has_content(&self, content_hash: &str) -> bool {
        self.content_path(content_hash).exists()
    }

    // --- Blobs ---

    /// Wrap a content hash in a blob record, persist it if absent, and
    /// return the blob hash.
    pub fn put_blob(&self, content_hash: &str) -> VellumResult<String> {
        let blob = Blob {
            content_hash: content_hash.to_string(),
        };
        let hash = blob.blob_hash();
        let path = self.blob_path(&hash);
        if !path.exists() {
            fs::write(&path, blob.to_json())?;
        }
        Ok(hash)
    }

    /// Retrieve a blob record by blob hash.
    pub fn get_blob(&self, blob_hash: &str) -> VellumResult<Blob> {
        let path = self.blob_path(blob_hash);
        if !path.exists() {
            return Err(VellumError::ObjectNotFound(blob_hash.to_string()));
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Check whether a blob record with this hash is stored.
    pub fn has_blob(&self, blob_hash: &str) -> bool {
        self.blob_path(blob_hash).exists()
    }

    // --- Commits ---

    /// Persist a commit record under its own hash if absent.
    pub fn put_commit(&self, commit: &Commit) -> VellumResult<()> {
        let path = self.commit_path(&commit.hash);
        if !path.exists() {
            fs::write(&path, serde_json::to_string(commit)?)?;
        }
        Ok(())
    }

    /// Retrieve a commit record by commit hash.
    pub fn get_commit(&self, commit_hash: &str) -> VellumResult<Commit> {
        let path = self.commit_path(commit_hash);
        if !path.exists() {
            return Err(VellumError::CommitMissing(commit_hash.to_string()));
        }
        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Check whether a commit record with this hash is stored.
    pub fn has_commit(&self, commit_hash: &str) -> bool {
        self.commit_path(commit_hash).exists()
    }

    /// Hashes of every commit record in the store, sorted.
    pub fn list_commits(&self) -> VellumResult<Vec<String>> {
        plain_filenames_in(&self.root.join(COMMITS))
    }

    // --- Cross-store copies (remote sync) ---

    /// Copy one raw content object from `src` into this store if absent.
    ///
    /// Byte-for-byte copy, so hashes are preserved exactly.
    pub fn adopt_content(&self, src: &ObjectStore, content_hash: &str) -> VellumResult<bool> {
        if self.has_content(content_hash) {
            return Ok(false);
        }
        let data = src.get_content(content_hash)?;
        fs::write(self.content_path(content_hash), data)?;
        Ok(true)
    }

    /// Copy one blob record from `src` into this store if absent.
    pub fn adopt_blob(&self, src: &ObjectStore, blob_hash: &str) -> VellumResult<bool> {
        if self.has_blob(blob_hash) {
            return Ok(false);
        }
        let path = src.blob_path(blob_hash);
        if !path.exists() {
            return Err(VellumError::ObjectNotFound(blob_hash.to_string()));
        }
        fs::write(self.blob_path(blob_hash), fs::read(&path)?)?;
        Ok(true)
    }

    /// Copy one commit record from `src` into this store if absent.
    pub fn adopt_commit(&self, src: &ObjectStore, commit_hash: &str) -> VellumResult<bool> {
        if self.has_commit(commit_hash) {
            return Ok(false);
        }
        let path = src.commit_path(commit_hash);
        if !path.exists() {
            return Err(VellumError::CommitMissing(commit_hash.to_string()));
        }
        fs::write(self.commit_path(commit_hash), fs::read(&path)?)?;
        Ok(true)
    }
}
