//! Three-way merge classification and conflict materialization.
//!
//! The reconciliation step compares three blob hashes per path — given
//! branch (G), current branch (C), and split point (S) — where "absent"
//! is its own state distinct from any real hash. The decision logic is
//! pure; the repository layer applies the resulting actions to the
//! working tree and staging index.

use serde::Serialize;

/// What the reconciliation pass decided for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeAction {
    /// Keep the current branch's version (which may be "absent").
    Keep,
    /// Take the given branch's version and stage it as an addition.
    TakeGiven,
    /// Delete the file and stage the deletion.
    Delete,
    /// Both sides changed the path in different ways: write conflict
    /// markers and stage the marked file.
    Conflict,
}

/// Classify one path from the three snapshots' blob hashes.
///
/// `None` means the path is absent in that snapshot. Clause order is
/// load-bearing:
///
/// 1. both sides agree -> keep (covers identical edits and both-absent)
/// 2. given matches the split point -> the given side did nothing; keep
///    whatever the current side did (edit, delete, or nothing)
/// 3. current matches the split point -> only the given side acted;
///    take its version, or delete when it removed the file
/// 4. all three differ -> conflict
pub fn classify(
    given: Option<&str>,
    current: Option<&str>,
    split: Option<&str>,
) -> MergeAction {
    if given == current {
        return MergeAction::Keep;
    }
    if given == split {
        return MergeAction::Keep;
    }
    if split == current {
        return match given {
            Some(_) => MergeAction::TakeGiven,
            None => MergeAction::Delete,
        };
    }
    MergeAction::Conflict
}

/// Render the conflicted contents of a file: current branch's version
/// above the separator, given branch's version below. An absent side
/// contributes nothing between its markers.
pub fn conflict_markers(current: &str, given: &str) -> String {
    format!("<<<<<<< HEAD\n{current}=======\n{given}>>>>>>>\n")
}

/// How a merge invocation concluded.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The given branch's tip is already in the current history;
    /// nothing to do.
    AlreadyAncestor,
    /// The current branch pointer was advanced to the given tip without
    /// creating a merge commit.
    FastForward,
    /// A two-parent merge commit was created.
    Merged {
        /// Hash of the merge commit.
        commit_hash: String,
        /// True if any path needed conflict markers. The commit is
        /// still created; conflicts are recorded in-tree.
        had_conflict: bool,
    },
}

impl MergeOutcome {
    /// True when conflict markers were written somewhere.
    pub fn had_conflict(&self) -> bool {
        matches!(
            self,
            MergeOutcome::Merged {
                had_conflict: true,
                ..
            }
        )
    }
}
