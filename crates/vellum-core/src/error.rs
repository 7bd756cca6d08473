//! Error types for vellum operations.

use std::fmt;
use std::io;

/// All possible vellum errors.
///
/// Every precondition failure has its own variant so the CLI can surface
/// the exact user-legible message the operation contract promises.
#[derive(Debug)]
pub enum VellumError {
    /// The current directory is not a vellum repository.
    NotARepo,
    /// A vellum repository already exists here.
    AlreadyInitialized,
    /// An I/O error occurred.
    Io(io::Error),
    /// JSON serialization/deserialization failed.
    Json(serde_json::Error),
    /// A content or blob object with the given hash was not found.
    ObjectNotFound(String),
    /// A commit record with the given hash was not found in the store.
    CommitMissing(String),
    /// An abbreviated commit id matched nothing.
    NoSuchCommit(String),
    /// The named file does not exist in the working directory.
    FileNotFound(String),
    /// The named file is not tracked by the commit it was requested from.
    FileNotInCommit(String),
    /// The staging index is empty — nothing to commit.
    NothingToCommit,
    /// The file is neither staged nor tracked — nothing to remove.
    NothingToRemove,
    /// A branch with this name already exists.
    BranchExists(String),
    /// No branch with this name exists.
    BranchNotFound(String),
    /// Checkout target branch does not exist.
    CheckoutBranchNotFound(String),
    /// Checkout targets the branch that is already current.
    CheckoutCurrentBranch(String),
    /// The current branch cannot be deleted.
    CannotDeleteCurrent(String),
    /// The staging index must be empty before merging.
    UncommittedChanges,
    /// A branch cannot be merged into itself.
    MergeWithSelf(String),
    /// An untracked working file would be overwritten.
    UntrackedObstruction,
    /// The two histories share no common ancestor.
    NoCommonAncestor,
    /// A remote with this name is already registered.
    RemoteExists(String),
    /// No remote with this name is registered.
    RemoteNotFound(String),
    /// The remote's directory is not reachable on the filesystem.
    RemoteUnreachable(String),
    /// The remote has no branch with this name.
    RemoteBranchNotFound(String),
    /// The remote branch has moved past local history — push rejected.
    NotFastForward,
    /// Could not acquire the repository lock within the timeout.
    LockTimeout,
}

impl fmt::Display for VellumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VellumError::NotARepo => {
                write!(f, "Not in an initialized vellum directory.")
            }
            VellumError::AlreadyInitialized => write!(
                f,
                "A vellum version-control system already exists in the current directory."
            ),
            VellumError::Io(e) => write!(f, "I/O error: {e}"),
            VellumError::Json(e) => write!(f, "JSON error: {e}"),
            VellumError::ObjectNotFound(hash) => write!(f, "object not found: {hash}"),
            VellumError::CommitMissing(hash) => write!(f, "commit object not found: {hash}"),
            VellumError::NoSuchCommit(_) => write!(f, "No commit with that id exists."),
            VellumError::FileNotFound(_) => write!(f, "File does not exist."),
            VellumError::FileNotInCommit(_) => {
                write!(f, "File does not exist in that commit.")
            }
            VellumError::NothingToCommit => write!(f, "No changes added to the commit."),
            VellumError::NothingToRemove => write!(f, "No reason to remove the file."),
            VellumError::BranchExists(_) => {
                write!(f, "A branch with that name already exists.")
            }
            VellumError::BranchNotFound(_) => {
                write!(f, "A branch with that name does not exist.")
            }
            VellumError::CheckoutBranchNotFound(_) => write!(f, "No such branch exists."),
            VellumError::CheckoutCurrentBranch(_) => {
                write!(f, "No need to checkout the current branch.")
            }
            VellumError::CannotDeleteCurrent(_) => {
                write!(f, "Cannot remove the current branch.")
            }
            VellumError::UncommittedChanges => write!(f, "You have uncommitted changes."),
            VellumError::MergeWithSelf(_) => write!(f, "Cannot merge a branch with itself."),
            VellumError::UntrackedObstruction => write!(
                f,
                "There is an untracked file in the way; delete it, or add and commit it first."
            ),
            VellumError::NoCommonAncestor => {
                write!(f, "these branches share no common ancestor")
            }
            VellumError::RemoteExists(_) => {
                write!(f, "A remote with that name already exists.")
            }
            VellumError::RemoteNotFound(_) => {
                write!(f, "A remote with that name does not exist.")
            }
            VellumError::RemoteUnreachable(_) => write!(f, "Remote directory not found."),
            VellumError::RemoteBranchNotFound(_) => {
                write!(f, "That remote does not have that branch.")
            }
            VellumError::NotFastForward => {
                write!(f, "Please pull down remote changes before pushing.")
            }
            VellumError::LockTimeout => {
                write!(f, "could not acquire repository lock within timeout")
            }
        }
    }
}

impl std::error::Error for VellumError {}

impl From<io::Error> for VellumError {
    fn from(e: io::Error) -> Self {
        VellumError::Io(e)
    }
}

impl From<serde_json::Error> for VellumError {
    fn from(e: serde_json::Error) -> Self {
        VellumError::Json(e)
    }
}

/// Convenience alias for Results in vellum.
pub type VellumResult<T> = Result<T, VellumError>;
