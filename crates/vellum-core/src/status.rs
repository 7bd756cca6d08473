//! Working directory state.
//!
//! Compares the files on disk against the head commit and the staging
//! index. The report is plain data; the CLI owns its presentation.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use walkdir::WalkDir;

use crate::error::VellumResult;
use crate::graph::GraphState;
use crate::hash::hash_bytes;
use crate::index::StagingIndex;
use crate::object::ObjectStore;

/// How an unstaged file differs from what the repository expects.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModifiedKind {
    /// Content on disk differs from the tracked or staged version.
    Modified,
    /// The tracked or staged file is missing from disk.
    Deleted,
}

/// One entry in the "modifications not staged" section.
#[derive(Debug, Clone, Serialize)]
pub struct ModifiedEntry {
    pub path: String,
    pub kind: ModifiedKind,
}

/// Everything `status` reports, as data.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// The current branch name.
    pub current_branch: String,
    /// All branch names, sorted.
    pub branches: Vec<String>,
    /// Paths staged for addition, sorted.
    pub staged: Vec<String>,
    /// Paths staged for removal, sorted.
    pub removed: Vec<String>,
    /// Unstaged modifications and deletions, sorted by path.
    pub modified: Vec<ModifiedEntry>,
    /// Working files neither staged nor tracked, sorted.
    pub untracked: Vec<String>,
}

/// Enumerate every plain file under `root` as sorted repository-relative
/// paths, skipping the repository data directory.
pub fn working_files(root: &Path, skip_dir: &str) -> VellumResult<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| e.file_name().to_string_lossy() != skip_dir)
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            files.push(rel.to_string_lossy().to_string());
        }
    }
    files.sort();
    Ok(files)
}

/// Build the full status report.
pub fn compute_status(
    root: &Path,
    skip_dir: &str,
    graph: &GraphState,
    index: &StagingIndex,
    objects: &ObjectStore,
) -> VellumResult<StatusReport> {
    let head = graph.head_commit()?;
    let files = working_files(root, skip_dir)?;

    let mut on_disk: BTreeSet<&str> = BTreeSet::new();
    let mut modified = Vec::new();
    let mut untracked = Vec::new();

    for file in &files {
        on_disk.insert(file.as_str());

        // Files that vanish between the walk and the read just drop out
        // of this pass; the deletion loops below still see them.
        let bytes = match fs::read(root.join(file)) {
            Ok(b) => b,
            Err(_) => continue,
        };
        let content_hash = hash_bytes(&bytes);

        if let Some(blob_hash) = index.additions.get(file) {
            // Staged, then edited again.
            if objects.get_blob(blob_hash)?.content_hash != content_hash {
                modified.push(ModifiedEntry {
                    path: file.clone(),
                    kind: ModifiedKind::Modified,
                });
            }
        } else if let Some(blob_hash) = head.blob_for(file) {
            // Tracked, edited, not staged either way.
            if !index.deletions.contains_key(file)
                && objects.get_blob(blob_hash)?.content_hash != content_hash
            {
                modified.push(ModifiedEntry {
                    path: file.clone(),
                    kind: ModifiedKind::Modified,
                });
            }
        }

        if !index.additions.contains_key(file) && !head.tracks(file) {
            untracked.push(file.clone());
        }
    }

    // Staged for addition but gone from disk.
    for path in index.additions.keys() {
        if !on_disk.contains(path.as_str()) {
            modified.push(ModifiedEntry {
                path: path.clone(),
                kind: ModifiedKind::Deleted,
            });
        }
    }
    // Tracked but gone from disk and not staged for removal.
    for path in head.files.keys() {
        if !on_disk.contains(path.as_str())
            && !index.deletions.contains_key(path)
            && !index.additions.contains_key(path)
        {
            modified.push(ModifiedEntry {
                path: path.clone(),
                kind: ModifiedKind::Deleted,
            });
        }
    }
    modified.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(StatusReport {
        current_branch: graph.head_branch.clone(),
        branches: graph.branches.keys().cloned().collect(),
        staged: index.additions.keys().cloned().collect(),
        removed: index.deletions.keys().cloned().collect(),
        modified,
        untracked,
    })
}
