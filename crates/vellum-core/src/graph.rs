//! The commit graph: branch pointers, HEAD, and ancestry queries.
//!
//! The whole graph state is one serialized record (`graph.json`):
//! load it, mutate it, save it back atomically. The embedded hash->commit
//! map backs abbreviated-id resolution, global log, and ancestry walks
//! without touching the object store.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::commit::Commit;
use crate::error::{VellumError, VellumResult};
use crate::fsutil::atomic_write;

/// The default branch created at init.
pub const DEFAULT_BRANCH: &str = "master";

/// Branch pointers, HEAD, and the set of all known commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphState {
    /// Hash of the commit HEAD points at.
    pub head: String,
    /// Name of the current branch. Matches `branches[head_branch]`
    /// except transiently while a reset moves the pointer.
    pub head_branch: String,
    /// Map of branch name -> commit hash. Always contains at least
    /// the default branch after init.
    pub branches: BTreeMap<String, String>,
    /// Every commit this repository knows about, keyed by hash.
    pub commits: BTreeMap<String, Commit>,
}

impl GraphState {
    /// Fresh graph state pointing the default branch at `root`.
    pub fn bootstrap(root: Commit) -> Self {
        let head = root.hash.clone();
        let mut branches = BTreeMap::new();
        branches.insert(DEFAULT_BRANCH.to_string(), head.clone());
        let mut commits = BTreeMap::new();
        commits.insert(head.clone(), root);
        GraphState {
            head,
            head_branch: DEFAULT_BRANCH.to_string(),
            branches,
            commits,
        }
    }

    /// Load the graph state record.
    pub fn load(path: &Path) -> VellumResult<Self> {
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save the graph state record atomically.
    pub fn save(&self, path: &Path) -> VellumResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        atomic_write(path, json.as_bytes())
    }

    /// Look up a commit by exact hash.
    pub fn commit(&self, hash: &str) -> VellumResult<&Commit> {
        self.commits
            .get(hash)
            .ok_or_else(|| VellumError::CommitMissing(hash.to_string()))
    }

    /// The commit HEAD points at.
    pub fn head_commit(&self) -> VellumResult<&Commit> {
        self.commit(&self.head)
    }

    /// The commit a branch points at.
    pub fn branch_tip(&self, name: &str) -> Option<&str> {
        self.branches.get(name).map(String::as_str)
    }

    /// Record a newly created commit.
    pub fn record(&mut self, commit: Commit) {
        self.commits.insert(commit.hash.clone(), commit);
    }

    /// Move HEAD, and the named branch's pointer if one is given.
    pub fn set_head(&mut self, commit_hash: &str, branch: Option<&str>) {
        self.head = commit_hash.to_string();
        if let Some(name) = branch {
            self.branches
                .insert(name.to_string(), commit_hash.to_string());
            self.head_branch = name.to_string();
        }
    }

    /// Point a new branch at the current head.
    pub fn create_branch(&mut self, name: &str) -> VellumResult<()> {
        if self.branches.contains_key(name) {
            return Err(VellumError::BranchExists(name.to_string()));
        }
        self.branches.insert(name.to_string(), self.head.clone());
        Ok(())
    }

    /// Delete a branch pointer. The commits it pointed at stay.
    pub fn delete_branch(&mut self, name: &str) -> VellumResult<()> {
        if !self.branches.contains_key(name) {
            return Err(VellumError::BranchNotFound(name.to_string()));
        }
        if name == self.head_branch {
            return Err(VellumError::CannotDeleteCurrent(name.to_string()));
        }
        self.branches.remove(name);
        Ok(())
    }

    /// Resolve an abbreviated commit id.
    ///
    /// Substring containment over all known hashes, first match wins.
    /// Deliberately not a prefix match, and not checked for uniqueness —
    /// behavioral compatibility with the original resolution rule.
    pub fn resolve_abbreviated(&self, id: &str) -> VellumResult<String> {
        self.commits
            .keys()
            .find(|hash| hash.contains(id))
            .cloned()
            .ok_or_else(|| VellumError::NoSuchCommit(id.to_string()))
    }

    /// All ancestors of a commit (the commit itself included), in
    /// breadth-first discovery order following both parent links.
    pub fn ancestor_list(&self, commit_hash: &str) -> VellumResult<Vec<String>> {
        let mut order = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut fringe: VecDeque<String> = VecDeque::new();

        fringe.push_back(commit_hash.to_string());
        visited.insert(commit_hash.to_string());

        while let Some(hash) = fringe.pop_front() {
            let commit = self.commit(&hash)?;
            order.push(hash);
            for parent in [commit.parent.as_deref(), commit.parent2.as_deref()]
                .into_iter()
                .flatten()
            {
                if visited.insert(parent.to_string()) {
                    fringe.push_back(parent.to_string());
                }
            }
        }
        Ok(order)
    }

    /// The transitive parent closure of a commit, itself included.
    pub fn ancestors(&self, commit_hash: &str) -> VellumResult<HashSet<String>> {
        Ok(self.ancestor_list(commit_hash)?.into_iter().collect())
    }

    /// Find the merge split point of two commits.
    ///
    /// Walks the given side's ancestor list in breadth-first order and
    /// returns the first hash that is also an ancestor of the current
    /// side. With multiple merge bases this is a first-found heuristic,
    /// not a provably lowest common ancestor; acceptable for the
    /// histories this engine produces.
    pub fn split_point(&self, given: &str, current: &str) -> VellumResult<String> {
        let current_set = self.ancestors(current)?;
        self.ancestor_list(given)?
            .into_iter()
            .find(|hash| current_set.contains(hash))
            .ok_or(VellumError::NoCommonAncestor)
    }
}
