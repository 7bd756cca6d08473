//! Repository — the main entry point for vellum operations.
//!
//! A `Repository` is an explicit handle bundling the working-tree root
//! and the data directory, so several instances can coexist in one
//! process — which is exactly what remote sync needs when it copies
//! between two stores.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use crate::commit::Commit;
use crate::error::{VellumError, VellumResult};
use crate::graph::GraphState;
use crate::index::StagingIndex;
use crate::lock::RepoLock;
use crate::merge::{classify, conflict_markers, MergeAction, MergeOutcome};
use crate::object::ObjectStore;
use crate::remote::{RemoteHandle, RemoteRegistry, SyncStats};
use crate::status::{self, StatusReport};

/// The repository data directory name. Its presence marks a root as
/// initialized.
const VELLUM_DIR: &str = ".vellum";

/// A vellum repository.
pub struct Repository {
    /// Root of the working tree (where `.vellum/` lives).
    root: PathBuf,
    /// Path to the `.vellum/` directory.
    data_dir: PathBuf,
    /// Content-addressable object store.
    objects: ObjectStore,
}

impl Repository {
    /// Default lock timeout for mutating operations.
    const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

    /// Initialize a new repository in the given directory.
    ///
    /// Creates the object partitions and the three state records, and
    /// points a fresh `master` at the shared root commit.
    pub fn init(root: &Path) -> VellumResult<Self> {
        let data_dir = root.join(VELLUM_DIR);
        if data_dir.exists() {
            return Err(VellumError::AlreadyInitialized);
        }

        fs::create_dir_all(&data_dir)?;
        ObjectStore::init(&data_dir.join("objects"))?;

        let objects = ObjectStore::new(&data_dir.join("objects"));
        let root_commit = Commit::root();
        objects.put_commit(&root_commit)?;

        GraphState::bootstrap(root_commit).save(&data_dir.join("graph.json"))?;
        StagingIndex::default().save(&data_dir.join("index.json"))?;
        RemoteRegistry::default().save(&data_dir.join("remotes.json"))?;

        Self::open(root)
    }

    /// Open an existing repository rooted at the given directory.
    pub fn open(root: &Path) -> VellumResult<Self> {
        let data_dir = root.join(VELLUM_DIR);
        if !data_dir.exists() {
            return Err(VellumError::NotARepo);
        }
        let objects = ObjectStore::new(&data_dir.join("objects"));
        Ok(Self {
            root: root.to_path_buf(),
            data_dir,
            objects,
        })
    }

    /// The working-tree root this handle operates on.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> VellumResult<RepoLock> {
        RepoLock::acquire(&self.data_dir, Self::LOCK_TIMEOUT)
    }

    fn graph_path(&self) -> PathBuf {
        self.data_dir.join("graph.json")
    }

    fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }

    fn remotes_path(&self) -> PathBuf {
        self.data_dir.join("remotes.json")
    }

    fn load_graph(&self) -> VellumResult<GraphState> {
        GraphState::load(&self.graph_path())
    }

    fn load_index(&self) -> VellumResult<StagingIndex> {
        StagingIndex::load(&self.index_path())
    }

    fn load_remotes(&self) -> VellumResult<RemoteRegistry> {
        RemoteRegistry::load(&self.remotes_path())
    }
}

// ---------------------------------------------------------------------------
// Staging and commits
// ---------------------------------------------------------------------------

impl Repository {
    /// Stage a working file for addition.
    ///
    /// The file's content and blob record are persisted eagerly; content
    /// addressing keeps that safe even when the path ends up unstaged.
    /// Re-staging unchanged content is a no-op, and content identical to
    /// what the head commit already tracks is not staged at all.
    pub fn stage_addition(&self, name: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let file_path = self.root.join(name);
        if !file_path.is_file() {
            return Err(VellumError::FileNotFound(name.to_string()));
        }

        let bytes = fs::read(&file_path)?;
        let content_hash = self.objects.put_content(&bytes)?;
        let blob_hash = self.objects.put_blob(&content_hash)?;

        let mut index = self.load_index()?;
        if index.additions.get(name).map(String::as_str) == Some(blob_hash.as_str()) {
            // Staged already with identical content.
            return Ok(());
        }
        index.deletions.remove(name);

        let graph = self.load_graph()?;
        let head = graph.head_commit()?;
        if head.blob_for(name) == Some(blob_hash.as_str()) {
            // Back to the tracked version: drop any stale staged edit
            // and stage nothing.
            index.additions.remove(name);
        } else {
            index.stage_addition(name, &blob_hash);
        }
        index.save(&self.index_path())
    }

    /// Stage a file for removal.
    ///
    /// Unstages a pending addition; if the head commit tracks the path,
    /// records the tracked blob under deletions and removes the working
    /// file.
    pub fn stage_deletion(&self, name: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let mut index = self.load_index()?;
        let graph = self.load_graph()?;
        let head = graph.head_commit()?;

        let was_staged = index.additions.contains_key(name);
        let tracked = head.blob_for(name).map(str::to_string);
        if !was_staged && tracked.is_none() {
            return Err(VellumError::NothingToRemove);
        }

        index.additions.remove(name);
        if let Some(blob_hash) = tracked {
            index.deletions.insert(name.to_string(), blob_hash);
            let file_path = self.root.join(name);
            if file_path.exists() {
                fs::remove_file(file_path)?;
            }
        }
        index.save(&self.index_path())
    }

    /// Create a commit from the staged changes.
    pub fn commit(&self, message: &str) -> VellumResult<Commit> {
        let _lock = self.lock()?;
        let mut graph = self.load_graph()?;
        let mut index = self.load_index()?;
        self.commit_staged(&mut graph, &mut index, message, None)
    }

    /// Fold the staging index into a new commit on the current branch.
    ///
    /// Shared by `commit` and the merge finalization (which supplies the
    /// second parent). Fails with `NothingToCommit` on an empty index;
    /// clears the index and persists both state records on success.
    fn commit_staged(
        &self,
        graph: &mut GraphState,
        index: &mut StagingIndex,
        message: &str,
        parent2: Option<String>,
    ) -> VellumResult<Commit> {
        if index.is_empty() {
            return Err(VellumError::NothingToCommit);
        }

        let head = graph.head_commit()?;
        let files = index.fold(&head.files);
        let commit = Commit::new(
            message,
            Utc::now(),
            Some(graph.head.clone()),
            parent2,
            files,
        );
        self.objects.put_commit(&commit)?;

        graph.record(commit.clone());
        let branch = graph.head_branch.clone();
        graph.set_head(&commit.hash, Some(&branch));

        index.clear();
        index.save(&self.index_path())?;
        graph.save(&self.graph_path())?;
        Ok(commit)
    }
}

// ---------------------------------------------------------------------------
// History queries
// ---------------------------------------------------------------------------

impl Repository {
    /// The first-parent chain from HEAD back to the root, newest first.
    pub fn log(&self) -> VellumResult<Vec<Commit>> {
        let graph = self.load_graph()?;
        let mut out = Vec::new();
        let mut cursor = Some(graph.head.clone());
        while let Some(hash) = cursor {
            let commit = graph.commit(&hash)?;
            cursor = commit.parent.clone();
            out.push(commit.clone());
        }
        Ok(out)
    }

    /// Every commit ever made, in no particular order.
    ///
    /// Reads the store's commit partition directly, so it also surfaces
    /// commits no branch currently reaches.
    pub fn log_all(&self) -> VellumResult<Vec<Commit>> {
        let mut out = Vec::new();
        for hash in self.objects.list_commits()? {
            out.push(self.objects.get_commit(&hash)?);
        }
        Ok(out)
    }

    /// Hashes of all commits whose message matches exactly.
    pub fn find(&self, message: &str) -> VellumResult<Vec<String>> {
        Ok(self
            .log_all()?
            .into_iter()
            .filter(|c| c.message == message)
            .map(|c| c.hash)
            .collect())
    }

    /// The full status report for the working tree.
    pub fn status(&self) -> VellumResult<StatusReport> {
        let graph = self.load_graph()?;
        let index = self.load_index()?;
        status::compute_status(&self.root, VELLUM_DIR, &graph, &index, &self.objects)
    }
}

// ---------------------------------------------------------------------------
// Checkout, branches, reset
// ---------------------------------------------------------------------------

impl Repository {
    /// Restore a file from the head commit into the working tree.
    /// The restored file is not staged.
    pub fn checkout_file(&self, name: &str) -> VellumResult<()> {
        let graph = self.load_graph()?;
        let head = graph.head_commit()?;
        self.restore_file(head, name)
    }

    /// Restore a file from the commit matching an abbreviated id.
    pub fn checkout_file_at(&self, commit_id: &str, name: &str) -> VellumResult<()> {
        let graph = self.load_graph()?;
        let hash = graph.resolve_abbreviated(commit_id)?;
        let commit = graph.commit(&hash)?;
        self.restore_file(commit, name)
    }

    /// Switch to another branch, replacing the working tree with its
    /// tip's snapshot and clearing the staging index.
    pub fn checkout_branch(&self, name: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let mut graph = self.load_graph()?;
        let tip = graph
            .branch_tip(name)
            .ok_or_else(|| VellumError::CheckoutBranchNotFound(name.to_string()))?
            .to_string();
        if name == graph.head_branch {
            return Err(VellumError::CheckoutCurrentBranch(name.to_string()));
        }

        let target = graph.commit(&tip)?.clone();
        self.update_working_tree(&graph, &target)?;

        graph.head = tip;
        graph.head_branch = name.to_string();
        graph.save(&self.graph_path())?;

        let mut index = self.load_index()?;
        index.clear();
        index.save(&self.index_path())
    }

    /// Point a new branch at the current head. Does not switch to it.
    pub fn create_branch(&self, name: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let mut graph = self.load_graph()?;
        graph.create_branch(name)?;
        graph.save(&self.graph_path())
    }

    /// Delete a branch pointer.
    pub fn delete_branch(&self, name: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let mut graph = self.load_graph()?;
        graph.delete_branch(name)?;
        graph.save(&self.graph_path())
    }

    /// Move the current branch to an arbitrary commit, restoring its
    /// snapshot into the working tree and clearing the staging index.
    pub fn reset(&self, commit_id: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let mut graph = self.load_graph()?;
        let hash = graph.resolve_abbreviated(commit_id)?;
        let target = graph.commit(&hash)?.clone();

        self.update_working_tree(&graph, &target)?;

        let branch = graph.head_branch.clone();
        graph.set_head(&hash, Some(&branch));
        graph.save(&self.graph_path())?;

        let mut index = self.load_index()?;
        index.clear();
        index.save(&self.index_path())
    }

    fn restore_file(&self, commit: &Commit, name: &str) -> VellumResult<()> {
        let blob_hash = commit
            .blob_for(name)
            .ok_or_else(|| VellumError::FileNotInCommit(name.to_string()))?;
        self.write_working_file(name, blob_hash)
    }

    /// Write one tracked file's content into the working tree.
    fn write_working_file(&self, name: &str, blob_hash: &str) -> VellumResult<()> {
        let blob = self.objects.get_blob(blob_hash)?;
        let bytes = self.objects.get_content(&blob.content_hash)?;
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Replace the working tree with `target`'s snapshot.
    ///
    /// Fails with `UntrackedObstruction` before touching anything if a
    /// working file the head commit does not track would be overwritten
    /// by a file `target` tracks.
    fn update_working_tree(&self, graph: &GraphState, target: &Commit) -> VellumResult<()> {
        let head = graph.head_commit()?;

        for file in status::working_files(&self.root, VELLUM_DIR)? {
            if !head.tracks(&file) && target.tracks(&file) {
                return Err(VellumError::UntrackedObstruction);
            }
        }

        for (path, blob_hash) in &target.files {
            self.write_working_file(path, blob_hash)?;
        }
        for path in head.files.keys() {
            if !target.tracks(path) {
                let file_path = self.root.join(path);
                if file_path.exists() {
                    fs::remove_file(file_path)?;
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

impl Repository {
    /// Merge the given branch into the current branch.
    ///
    /// Preconditions are checked before anything mutates: the staging
    /// index must be empty, the branch must exist and differ from the
    /// current one. Fast paths short-circuit when one tip already
    /// contains the other; otherwise every path in the three snapshots
    /// is classified and applied, conflicts are materialized in-tree,
    /// and a two-parent commit concludes the merge even when conflicted.
    pub fn merge(&self, branch: &str) -> VellumResult<MergeOutcome> {
        let _lock = self.lock()?;
        let mut graph = self.load_graph()?;
        let mut index = self.load_index()?;

        if !index.is_empty() {
            return Err(VellumError::UncommittedChanges);
        }
        let given_tip = graph
            .branch_tip(branch)
            .ok_or_else(|| VellumError::BranchNotFound(branch.to_string()))?
            .to_string();
        if branch == graph.head_branch {
            return Err(VellumError::MergeWithSelf(branch.to_string()));
        }

        let current_tip = graph.head.clone();
        let split = graph.split_point(&given_tip, &current_tip)?;

        if split == given_tip {
            return Ok(MergeOutcome::AlreadyAncestor);
        }
        if split == current_tip {
            // Fast-forward: advance the current branch pointer to the
            // given tip without a merge commit.
            let target = graph.commit(&given_tip)?.clone();
            self.update_working_tree(&graph, &target)?;
            let head_branch = graph.head_branch.clone();
            graph.set_head(&given_tip, Some(&head_branch));
            graph.save(&self.graph_path())?;
            index.clear();
            index.save(&self.index_path())?;
            return Ok(MergeOutcome::FastForward);
        }

        let given = graph.commit(&given_tip)?.clone();
        let current = graph.commit(&current_tip)?.clone();
        let split_commit = graph.commit(&split)?.clone();

        // Untracked guard: nothing has mutated yet.
        for file in status::working_files(&self.root, VELLUM_DIR)? {
            if !current.tracks(&file) && given.tracks(&file) {
                return Err(VellumError::UntrackedObstruction);
            }
        }

        let mut paths: BTreeSet<&String> = BTreeSet::new();
        paths.extend(given.files.keys());
        paths.extend(current.files.keys());
        paths.extend(split_commit.files.keys());

        let mut had_conflict = false;
        for path in paths {
            let g = given.blob_for(path);
            let c = current.blob_for(path);
            let s = split_commit.blob_for(path);

            match classify(g, c, s) {
                MergeAction::Keep => {}
                MergeAction::TakeGiven => {
                    if let Some(blob_hash) = g {
                        self.write_working_file(path, blob_hash)?;
                        index.stage_addition(path, blob_hash);
                    }
                }
                MergeAction::Delete => {
                    if let Some(blob_hash) = c {
                        index.stage_deletion(path, blob_hash);
                    }
                    let file_path = self.root.join(path);
                    if file_path.exists() {
                        fs::remove_file(file_path)?;
                    }
                }
                MergeAction::Conflict => {
                    let current_text = self.blob_text(c)?;
                    let given_text = self.blob_text(g)?;
                    let merged = conflict_markers(&current_text, &given_text);

                    let file_path = self.root.join(path);
                    if let Some(parent) = file_path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(&file_path, merged.as_bytes())?;

                    let content_hash = self.objects.put_content(merged.as_bytes())?;
                    let blob_hash = self.objects.put_blob(&content_hash)?;
                    index.stage_addition(path, &blob_hash);
                    had_conflict = true;
                }
            }
        }

        let message = format!("Merged {} into {}.", branch, graph.head_branch);
        let commit = self.commit_staged(&mut graph, &mut index, &message, Some(given_tip))?;

        Ok(MergeOutcome::Merged {
            commit_hash: commit.hash,
            had_conflict,
        })
    }

    /// A blob's content as text; an absent blob reads as empty.
    fn blob_text(&self, blob_hash: Option<&str>) -> VellumResult<String> {
        match blob_hash {
            Some(hash) => {
                let blob = self.objects.get_blob(hash)?;
                let bytes = self.objects.get_content(&blob.content_hash)?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            None => Ok(String::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Remote sync
// ---------------------------------------------------------------------------

impl Repository {
    /// Register a named remote pointing at another repository's data
    /// directory.
    pub fn add_remote(&self, name: &str, path: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let mut registry = self.load_remotes()?;
        registry.add(name, path)?;
        registry.save(&self.remotes_path())
    }

    /// Drop a named remote from the registry.
    pub fn remove_remote(&self, name: &str) -> VellumResult<()> {
        let _lock = self.lock()?;
        let mut registry = self.load_remotes()?;
        registry.remove(name)?;
        registry.save(&self.remotes_path())
    }

    /// Fetch a remote branch: update the local tracking ref
    /// `<remote>/<branch>` and copy the remote's first-parent history
    /// into the local stores.
    ///
    /// Second parents of remote merge commits are deliberately not
    /// traversed; history reachable only through them is not fetched.
    pub fn fetch(&self, remote_name: &str, remote_branch: &str) -> VellumResult<SyncStats> {
        let _lock = self.lock()?;
        let registry = self.load_remotes()?;
        let remote = RemoteHandle::open(Path::new(registry.path_of(remote_name)?))?;
        let remote_graph = remote.load_graph()?;
        let remote_tip = remote_graph
            .branch_tip(remote_branch)
            .ok_or_else(|| VellumError::RemoteBranchNotFound(remote_branch.to_string()))?
            .to_string();

        // The tracking ref moves first; a crash mid-copy leaves it ahead
        // of fully-copied history. The copy loop is idempotent, so
        // re-running the fetch completes it.
        let mut graph = self.load_graph()?;
        let tracking = format!("{remote_name}/{remote_branch}");
        graph.branches.insert(tracking, remote_tip.clone());
        graph.save(&self.graph_path())?;

        let stats = Self::copy_first_parent_chain(
            &remote.objects,
            &self.objects,
            &mut graph,
            &remote_tip,
            None,
        )?;
        graph.save(&self.graph_path())?;
        Ok(stats)
    }

    /// Push the current head to a remote branch.
    ///
    /// Rejected with `NotFastForward` unless the remote branch's tip is
    /// already contained in the local head's ancestor set. Mirrors
    /// fetch's copy semantics in the opposite direction, again following
    /// first parents only.
    pub fn push(&self, remote_name: &str, remote_branch: &str) -> VellumResult<SyncStats> {
        let _lock = self.lock()?;
        let registry = self.load_remotes()?;
        let remote = RemoteHandle::open(Path::new(registry.path_of(remote_name)?))?;
        let mut remote_graph = remote.load_graph()?;
        let graph = self.load_graph()?;

        let prior_tip = remote_graph.branch_tip(remote_branch).map(str::to_string);
        if let Some(ref tip) = prior_tip {
            if !graph.ancestors(&graph.head)?.contains(tip) {
                return Err(VellumError::NotFastForward);
            }
        }

        // Ref moves first, mirroring fetch's documented ordering.
        remote_graph
            .branches
            .insert(remote_branch.to_string(), graph.head.clone());
        if remote_graph.head_branch == remote_branch {
            remote_graph.head = graph.head.clone();
        }
        remote.save_graph(&remote_graph)?;

        let stats = Self::copy_first_parent_chain(
            &self.objects,
            &remote.objects,
            &mut remote_graph,
            &graph.head,
            prior_tip.as_deref(),
        )?;
        remote.save_graph(&remote_graph)?;
        Ok(stats)
    }

    /// Fetch a remote branch, then merge its tracking ref into the
    /// current branch.
    pub fn pull(&self, remote_name: &str, remote_branch: &str) -> VellumResult<MergeOutcome> {
        self.fetch(remote_name, remote_branch)?;
        self.merge(&format!("{remote_name}/{remote_branch}"))
    }

    /// Copy the first-parent chain starting at `tip` from `src` into
    /// `dst`, stopping before `stop_at` or at the root. Each commit's
    /// blobs and their content bytes come along; records are copied
    /// byte-for-byte so hashes survive the trip exactly.
    fn copy_first_parent_chain(
        src: &ObjectStore,
        dst: &ObjectStore,
        dst_graph: &mut GraphState,
        tip: &str,
        stop_at: Option<&str>,
    ) -> VellumResult<SyncStats> {
        let mut stats = SyncStats::default();
        let mut cursor = Some(tip.to_string());

        while let Some(hash) = cursor {
            if stop_at == Some(hash.as_str()) {
                break;
            }
            let commit = src.get_commit(&hash)?;
            if dst.adopt_commit(src, &hash)? {
                stats.commits_copied += 1;
            }
            for blob_hash in commit.files.values() {
                let blob = src.get_blob(blob_hash)?;
                if dst.adopt_blob(src, blob_hash)? {
                    stats.blobs_copied += 1;
                }
                if dst.adopt_content(src, &blob.content_hash)? {
                    stats.contents_copied += 1;
                }
            }
            if !dst_graph.commits.contains_key(&hash) {
                dst_graph.commits.insert(hash.clone(), commit.clone());
            }
            cursor = commit.parent;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DEFAULT_BRANCH;
    use crate::status::ModifiedKind;
    use tempfile::tempdir;

    fn write(repo: &Repository, name: &str, contents: &str) {
        fs::write(repo.root().join(name), contents).unwrap();
    }

    fn add_and_commit(repo: &Repository, name: &str, contents: &str, message: &str) -> Commit {
        write(repo, name, contents);
        repo.stage_addition(name).unwrap();
        repo.commit(message).unwrap()
    }

    fn read(repo: &Repository, name: &str) -> String {
        fs::read_to_string(repo.root().join(name)).unwrap()
    }

    // --- Init / open ---

    #[test]
    fn test_init_creates_structure() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();

        assert!(dir.path().join(".vellum/objects/contents").exists());
        assert!(dir.path().join(".vellum/objects/blobs").exists());
        assert!(dir.path().join(".vellum/objects/commits").exists());
        assert!(dir.path().join(".vellum/graph.json").exists());
        assert!(dir.path().join(".vellum/index.json").exists());
        assert!(dir.path().join(".vellum/remotes.json").exists());
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = tempdir().unwrap();
        Repository::init(dir.path()).unwrap();
        assert!(matches!(
            Repository::init(dir.path()),
            Err(VellumError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Repository::open(dir.path()),
            Err(VellumError::NotARepo)
        ));
    }

    #[test]
    fn test_fresh_repos_share_the_root_commit() {
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let repo_a = Repository::init(a.path()).unwrap();
        let repo_b = Repository::init(b.path()).unwrap();

        let log_a = repo_a.log().unwrap();
        let log_b = repo_b.log().unwrap();
        assert_eq!(log_a.len(), 1);
        assert_eq!(log_a[0].hash, log_b[0].hash);
    }

    // --- Staging ---

    #[test]
    fn test_add_missing_file_fails() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(
            repo.stage_addition("ghost.txt"),
            Err(VellumError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_add_stages_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(&repo, "a.txt", "one");

        repo.stage_addition("a.txt").unwrap();
        let first = repo.load_index().unwrap();
        repo.stage_addition("a.txt").unwrap();
        let second = repo.load_index().unwrap();

        assert_eq!(first.additions, second.additions);
        assert_eq!(second.additions.len(), 1);
    }

    #[test]
    fn test_add_unchanged_tracked_file_not_staged() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "one", "first");

        // Same content as HEAD: nothing to stage.
        repo.stage_addition("a.txt").unwrap();
        assert!(repo.load_index().unwrap().is_empty());
    }

    #[test]
    fn test_add_reverted_file_unstages_stale_edit() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "one", "first");

        write(&repo, "a.txt", "two");
        repo.stage_addition("a.txt").unwrap();
        assert!(!repo.load_index().unwrap().is_empty());

        // Revert to the tracked content and add again: index drains.
        write(&repo, "a.txt", "one");
        repo.stage_addition("a.txt").unwrap();
        assert!(repo.load_index().unwrap().is_empty());
    }

    #[test]
    fn test_add_cancels_staged_deletion() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "one", "first");

        repo.stage_deletion("a.txt").unwrap();
        assert!(!repo.root().join("a.txt").exists());

        write(&repo, "a.txt", "one");
        repo.stage_addition("a.txt").unwrap();
        let index = repo.load_index().unwrap();
        assert!(index.deletions.is_empty());
        // Content equals HEAD's version, so nothing is staged either.
        assert!(index.additions.is_empty());
    }

    #[test]
    fn test_rm_untracked_unstaged_fails() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(&repo, "a.txt", "one");
        assert!(matches!(
            repo.stage_deletion("a.txt"),
            Err(VellumError::NothingToRemove)
        ));
    }

    #[test]
    fn test_rm_tracked_file_deletes_and_stages() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "one", "first");

        repo.stage_deletion("a.txt").unwrap();
        assert!(!repo.root().join("a.txt").exists());
        let index = repo.load_index().unwrap();
        assert!(index.deletions.contains_key("a.txt"));

        let commit = repo.commit("drop a").unwrap();
        assert!(!commit.tracks("a.txt"));
    }

    #[test]
    fn test_rm_staged_only_file_just_unstages() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        write(&repo, "a.txt", "one");
        repo.stage_addition("a.txt").unwrap();

        repo.stage_deletion("a.txt").unwrap();
        // Not tracked by HEAD: the working file stays put.
        assert!(repo.root().join("a.txt").exists());
        assert!(repo.load_index().unwrap().is_empty());
    }

    // --- Commit ---

    #[test]
    fn test_commit_empty_staging_fails() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(
            repo.commit("nothing"),
            Err(VellumError::NothingToCommit)
        ));
        assert_eq!(repo.log_all().unwrap().len(), 1);
    }

    #[test]
    fn test_commit_folds_and_clears() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = add_and_commit(&repo, "a.txt", "one", "first");
        assert!(first.tracks("a.txt"));
        assert!(repo.load_index().unwrap().is_empty());

        let second = add_and_commit(&repo, "b.txt", "two", "second");
        assert!(second.tracks("a.txt"));
        assert!(second.tracks("b.txt"));
        assert_eq!(second.parent.as_deref(), Some(first.hash.as_str()));
    }

    #[test]
    fn test_blob_round_trip_through_checkout() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "original", "first");

        write(&repo, "a.txt", "scribbled");
        repo.checkout_file("a.txt").unwrap();
        assert_eq!(read(&repo, "a.txt"), "original");
    }

    #[test]
    fn test_checkout_file_not_in_commit() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(
            repo.checkout_file("ghost.txt"),
            Err(VellumError::FileNotInCommit(_))
        ));
    }

    #[test]
    fn test_checkout_file_at_abbreviated_commit() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = add_and_commit(&repo, "a.txt", "v1", "first");
        add_and_commit(&repo, "a.txt", "v2", "second");

        repo.checkout_file_at(&first.hash[..10], "a.txt").unwrap();
        assert_eq!(read(&repo, "a.txt"), "v1");

        assert!(matches!(
            repo.checkout_file_at("zzzz", "a.txt"),
            Err(VellumError::NoSuchCommit(_))
        ));
    }

    // --- Log / find ---

    #[test]
    fn test_log_follows_first_parents() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "one", "first");
        add_and_commit(&repo, "b.txt", "two", "second");

        let log = repo.log().unwrap();
        assert_eq!(log.len(), 3); // second, first, root
        assert_eq!(log[0].message, "second");
        assert_eq!(log[1].message, "first");
        assert_eq!(log[2].message, "initial commit");
    }

    #[test]
    fn test_find_by_message() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let c = add_and_commit(&repo, "a.txt", "one", "needle");
        add_and_commit(&repo, "b.txt", "two", "other");

        assert_eq!(repo.find("needle").unwrap(), vec![c.hash]);
        assert!(repo.find("absent message").unwrap().is_empty());
    }

    // --- Branches / checkout / reset ---

    #[test]
    fn test_branch_create_delete() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        repo.create_branch("dev").unwrap();
        assert!(matches!(
            repo.create_branch("dev"),
            Err(VellumError::BranchExists(_))
        ));
        assert!(matches!(
            repo.delete_branch(DEFAULT_BRANCH),
            Err(VellumError::CannotDeleteCurrent(_))
        ));
        repo.delete_branch("dev").unwrap();
        assert!(matches!(
            repo.delete_branch("dev"),
            Err(VellumError::BranchNotFound(_))
        ));
    }

    #[test]
    fn test_checkout_branch_switches_tree() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "base", "first");

        repo.create_branch("side").unwrap();
        add_and_commit(&repo, "a.txt", "master edit", "second");

        repo.checkout_branch("side").unwrap();
        assert_eq!(read(&repo, "a.txt"), "base");

        repo.checkout_branch(DEFAULT_BRANCH).unwrap();
        assert_eq!(read(&repo, "a.txt"), "master edit");
    }

    #[test]
    fn test_checkout_branch_errors() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(
            repo.checkout_branch("ghost"),
            Err(VellumError::CheckoutBranchNotFound(_))
        ));
        assert!(matches!(
            repo.checkout_branch(DEFAULT_BRANCH),
            Err(VellumError::CheckoutCurrentBranch(_))
        ));
    }

    #[test]
    fn test_checkout_branch_untracked_obstruction() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "base", "first");
        repo.create_branch("side").unwrap();
        repo.checkout_branch("side").unwrap();
        add_and_commit(&repo, "b.txt", "side file", "side commit");

        repo.checkout_branch(DEFAULT_BRANCH).unwrap();
        // b.txt is untracked on master but tracked by side.
        write(&repo, "b.txt", "precious scratch work");
        assert!(matches!(
            repo.checkout_branch("side"),
            Err(VellumError::UntrackedObstruction)
        ));
        assert_eq!(read(&repo, "b.txt"), "precious scratch work");
    }

    #[test]
    fn test_reset_moves_branch_pointer() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let first = add_and_commit(&repo, "a.txt", "v1", "first");
        add_and_commit(&repo, "a.txt", "v2", "second");

        repo.reset(&first.hash[..12]).unwrap();
        assert_eq!(read(&repo, "a.txt"), "v1");

        let graph = repo.load_graph().unwrap();
        assert_eq!(graph.head, first.hash);
        assert_eq!(graph.branch_tip(DEFAULT_BRANCH), Some(first.hash.as_str()));
        assert!(repo.load_index().unwrap().is_empty());
    }

    #[test]
    fn test_reset_unknown_id_fails() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        assert!(matches!(
            repo.reset("zzzz"),
            Err(VellumError::NoSuchCommit(_))
        ));
    }

    // --- Status ---

    #[test]
    fn test_status_sections() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "tracked.txt", "v1", "first");
        repo.create_branch("dev").unwrap();

        write(&repo, "staged.txt", "new");
        repo.stage_addition("staged.txt").unwrap();
        write(&repo, "untracked.txt", "loose");
        write(&repo, "tracked.txt", "edited behind the index");

        let report = repo.status().unwrap();
        assert_eq!(report.current_branch, DEFAULT_BRANCH);
        assert_eq!(report.branches, vec!["dev", DEFAULT_BRANCH]);
        assert_eq!(report.staged, vec!["staged.txt"]);
        assert!(report.removed.is_empty());
        assert_eq!(report.untracked, vec!["untracked.txt"]);
        assert_eq!(report.modified.len(), 1);
        assert_eq!(report.modified[0].path, "tracked.txt");
        assert_eq!(report.modified[0].kind, ModifiedKind::Modified);
    }

    #[test]
    fn test_status_reports_unstaged_deletion() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "v1", "first");
        fs::remove_file(repo.root().join("a.txt")).unwrap();

        let report = repo.status().unwrap();
        assert_eq!(report.modified.len(), 1);
        assert_eq!(report.modified[0].kind, ModifiedKind::Deleted);
    }

    // --- Merge ---

    /// Set up: base commit on master with `a.txt`, then divergent work.
    /// Returns (tempdir, repo) with `side` branched off after "base".
    fn diverged() -> (tempfile::TempDir, Repository) {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        add_and_commit(&repo, "a.txt", "shared\n", "base");
        repo.create_branch("side").unwrap();
        (dir, repo)
    }

    #[test]
    fn test_merge_precondition_errors() {
        let (_dir, repo) = diverged();

        assert!(matches!(
            repo.merge("ghost"),
            Err(VellumError::BranchNotFound(_))
        ));
        assert!(matches!(
            repo.merge(DEFAULT_BRANCH),
            Err(VellumError::MergeWithSelf(_))
        ));

        write(&repo, "b.txt", "pending");
        repo.stage_addition("b.txt").unwrap();
        assert!(matches!(
            repo.merge("side"),
            Err(VellumError::UncommittedChanges)
        ));
    }

    #[test]
    fn test_merge_disjoint_edits_is_clean() {
        let (_dir, repo) = diverged();
        add_and_commit(&repo, "b.txt", "master only\n", "master adds b");

        repo.checkout_branch("side").unwrap();
        add_and_commit(&repo, "c.txt", "side only\n", "side adds c");

        repo.checkout_branch(DEFAULT_BRANCH).unwrap();
        let outcome = repo.merge("side").unwrap();
        assert!(!outcome.had_conflict());

        let head = repo.log().unwrap().remove(0);
        assert!(head.is_merge());
        assert!(head.tracks("a.txt"));
        assert!(head.tracks("b.txt"));
        assert!(head.tracks("c.txt"));
        assert_eq!(head.message, "Merged side into master.");
        assert_eq!(read(&repo, "c.txt"), "side only\n");
    }

    #[test]
    fn test_merge_conflict_materializes_markers() {
        let (_dir, repo) = diverged();
        add_and_commit(&repo, "a.txt", "master version\n", "master edit");

        repo.checkout_branch("side").unwrap();
        add_and_commit(&repo, "a.txt", "side version\n", "side edit");

        repo.checkout_branch(DEFAULT_BRANCH).unwrap();
        let outcome = repo.merge("side").unwrap();
        assert!(outcome.had_conflict());

        let merged = read(&repo, "a.txt");
        assert_eq!(
            merged,
            "<<<<<<< HEAD\nmaster version\n=======\nside version\n>>>>>>>\n"
        );

        // The conflicted merge still commits with two parents.
        let head = repo.log().unwrap().remove(0);
        assert!(head.is_merge());
    }

    #[test]
    fn test_merge_delete_vs_keep() {
        let (_dir, repo) = diverged();
        add_and_commit(&repo, "b.txt", "filler\n", "master moves on");

        repo.checkout_branch("side").unwrap();
        repo.stage_deletion("a.txt").unwrap();
        repo.commit("side drops a").unwrap();

        repo.checkout_branch(DEFAULT_BRANCH).unwrap();
        repo.merge("side").unwrap();

        // Deleted in given, unchanged in current: the deletion lands.
        assert!(!repo.root().join("a.txt").exists());
        let head = repo.log().unwrap().remove(0);
        assert!(!head.tracks("a.txt"));
    }

    #[test]
    fn test_merge_fast_forward() {
        let (_dir, repo) = diverged();
        repo.checkout_branch("side").unwrap();
        let side_tip = add_and_commit(&repo, "b.txt", "ahead\n", "side advances");

        repo.checkout_branch(DEFAULT_BRANCH).unwrap();
        let outcome = repo.merge("side").unwrap();
        assert_eq!(outcome, MergeOutcome::FastForward);

        let graph = repo.load_graph().unwrap();
        // The current branch pointer advanced; no merge commit exists.
        assert_eq!(graph.head_branch, DEFAULT_BRANCH);
        assert_eq!(graph.branch_tip(DEFAULT_BRANCH), Some(side_tip.hash.as_str()));
        assert!(!graph.head_commit().unwrap().is_merge());
        assert_eq!(read(&repo, "b.txt"), "ahead\n");
    }

    #[test]
    fn test_merge_already_ancestor() {
        let (_dir, repo) = diverged();
        add_and_commit(&repo, "b.txt", "ahead\n", "master advances");

        let before = repo.log().unwrap();
        let outcome = repo.merge("side").unwrap();
        assert_eq!(outcome, MergeOutcome::AlreadyAncestor);
        // No mutation at all.
        assert_eq!(repo.log().unwrap().len(), before.len());
    }

    #[test]
    fn test_merge_untracked_obstruction() {
        let (_dir, repo) = diverged();
        add_and_commit(&repo, "b.txt", "master\n", "master work");

        repo.checkout_branch("side").unwrap();
        add_and_commit(&repo, "c.txt", "side\n", "side work");

        repo.checkout_branch(DEFAULT_BRANCH).unwrap();
        write(&repo, "c.txt", "unsaved local file");
        assert!(matches!(
            repo.merge("side"),
            Err(VellumError::UntrackedObstruction)
        ));
    }

    // --- Remote sync ---

    /// A local repo with one commit beyond root, plus an empty remote
    /// registered as "origin".
    fn local_and_remote() -> (tempfile::TempDir, tempfile::TempDir, Repository, Repository) {
        let local_dir = tempdir().unwrap();
        let remote_dir = tempdir().unwrap();
        let local = Repository::init(local_dir.path()).unwrap();
        let remote = Repository::init(remote_dir.path()).unwrap();
        local
            .add_remote(
                "origin",
                remote_dir.path().join(".vellum").to_str().unwrap(),
            )
            .unwrap();
        (local_dir, remote_dir, local, remote)
    }

    #[test]
    fn test_remote_registry_errors() {
        let (_l, _r, local, _remote) = local_and_remote();
        assert!(matches!(
            local.add_remote("origin", "/elsewhere"),
            Err(VellumError::RemoteExists(_))
        ));
        assert!(matches!(
            local.remove_remote("upstream"),
            Err(VellumError::RemoteNotFound(_))
        ));
        local.remove_remote("origin").unwrap();
    }

    #[test]
    fn test_fetch_unreachable_remote() {
        let dir = tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        repo.add_remote("origin", "/no/such/place").unwrap();
        assert!(matches!(
            repo.fetch("origin", DEFAULT_BRANCH),
            Err(VellumError::RemoteUnreachable(_))
        ));
    }

    #[test]
    fn test_fetch_missing_remote_branch() {
        let (_l, _r, local, _remote) = local_and_remote();
        assert!(matches!(
            local.fetch("origin", "ghost"),
            Err(VellumError::RemoteBranchNotFound(_))
        ));
    }

    #[test]
    fn test_fetch_creates_tracking_ref_and_copies_history() {
        let (_l, _r, local, remote) = local_and_remote();
        let tip = add_and_commit(&remote, "r.txt", "remote work\n", "remote commit");

        let stats = local.fetch("origin", DEFAULT_BRANCH).unwrap();
        assert_eq!(stats.commits_copied, 1); // root already shared
        assert_eq!(stats.blobs_copied, 1);
        assert_eq!(stats.contents_copied, 1);

        let graph = local.load_graph().unwrap();
        assert_eq!(graph.branch_tip("origin/master"), Some(tip.hash.as_str()));

        // First-parent chains are hash-identical after the trip.
        let local_chain: Vec<String> = {
            let mut out = Vec::new();
            let mut cursor = Some(tip.hash.clone());
            while let Some(hash) = cursor {
                let c = graph.commit(&hash).unwrap();
                cursor = c.parent.clone();
                out.push(hash);
            }
            out
        };
        let remote_chain: Vec<String> =
            remote.log().unwrap().into_iter().map(|c| c.hash).collect();
        assert_eq!(local_chain, remote_chain);
    }

    #[test]
    fn test_pull_merges_tracking_branch() {
        let (_l, _r, local, remote) = local_and_remote();
        add_and_commit(&remote, "r.txt", "remote work\n", "remote commit");

        let outcome = local.pull("origin", DEFAULT_BRANCH).unwrap();
        assert_eq!(outcome, MergeOutcome::FastForward);
        assert_eq!(read(&local, "r.txt"), "remote work\n");
    }

    #[test]
    fn test_push_copies_and_moves_ref() {
        let (_l, _r, local, remote) = local_and_remote();
        let tip = add_and_commit(&local, "l.txt", "local work\n", "local commit");

        let stats = local.push("origin", DEFAULT_BRANCH).unwrap();
        assert_eq!(stats.commits_copied, 1);

        let remote_log = remote.log().unwrap();
        assert_eq!(remote_log[0].hash, tip.hash);
        assert_eq!(read_blob(&remote, &remote_log[0], "l.txt"), "local work\n");
    }

    #[test]
    fn test_push_rejected_when_remote_is_ahead() {
        let (_l, _r, local, remote) = local_and_remote();
        add_and_commit(&remote, "r.txt", "remote moved on\n", "remote commit");
        add_and_commit(&local, "l.txt", "local diverged\n", "local commit");

        let before = remote.log().unwrap();
        assert!(matches!(
            local.push("origin", DEFAULT_BRANCH),
            Err(VellumError::NotFastForward)
        ));
        // The remote is untouched.
        let after = remote.log().unwrap();
        assert_eq!(
            before.iter().map(|c| &c.hash).collect::<Vec<_>>(),
            after.iter().map(|c| &c.hash).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_push_then_fetch_round_trip() {
        let (_l, _r, local, _remote) = local_and_remote();
        let tip = add_and_commit(&local, "l.txt", "payload\n", "local commit");

        local.push("origin", DEFAULT_BRANCH).unwrap();
        local.fetch("origin", DEFAULT_BRANCH).unwrap();

        let graph = local.load_graph().unwrap();
        assert_eq!(graph.branch_tip("origin/master"), Some(tip.hash.as_str()));
    }

    /// Read a file's content out of a commit through the blob layer.
    fn read_blob(repo: &Repository, commit: &Commit, path: &str) -> String {
        let blob_hash = commit.blob_for(path).unwrap();
        let blob = repo.objects.get_blob(blob_hash).unwrap();
        String::from_utf8(repo.objects.get_content(&blob.content_hash).unwrap()).unwrap()
    }
}
