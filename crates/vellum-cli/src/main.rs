//! vellum CLI — argument parsing and dispatch onto the core engine.
//!
//! Every subcommand maps 1:1 onto a `Repository` operation; this binary
//! only parses operands and formats results.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use vellum_core::commit::Commit;
use vellum_core::merge::MergeOutcome;
use vellum_core::status::ModifiedKind;
use vellum_core::Repository;

#[derive(Parser)]
#[command(name = "vellum", about = "vellum — a local-first version-control system", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new vellum repository in the current directory.
    Init,

    /// Stage a file for addition.
    Add {
        /// File to stage.
        file: String,
    },

    /// Create a commit from the staged changes.
    Commit {
        /// Commit message.
        message: String,
    },

    /// Unstage a file, or stage a tracked file for removal.
    Rm {
        /// File to remove.
        file: String,
    },

    /// Show the current branch's history, first parents only.
    Log,

    /// Show every commit ever made, in no particular order.
    GlobalLog,

    /// Print the ids of all commits with the given message.
    Find {
        /// Exact commit message to look for.
        message: String,
    },

    /// Show branches, staged changes, and working tree differences.
    Status,

    /// Switch to a branch, or restore a file with --file.
    Checkout {
        /// Branch to switch to, or a commit id when --file is given.
        target: Option<String>,

        /// Restore this file instead of switching branches. Without a
        /// commit id the head commit's version is used.
        #[arg(long)]
        file: Option<String>,
    },

    /// Create a branch pointing at the current head.
    Branch {
        /// Name for the new branch.
        name: String,
    },

    /// Delete a branch pointer.
    RmBranch {
        /// Branch to delete.
        name: String,
    },

    /// Move the current branch to a commit and restore its snapshot.
    Reset {
        /// Commit id (abbreviations accepted).
        commit_id: String,
    },

    /// Merge a branch into the current branch.
    Merge {
        /// Branch to merge from.
        branch: String,
    },

    /// Register a remote repository by filesystem path.
    AddRemote {
        /// Remote name.
        name: String,
        /// Path to the remote repository's data directory.
        path: String,
    },

    /// Remove a registered remote.
    RmRemote {
        /// Remote name.
        name: String,
    },

    /// Copy a remote branch's history into this repository.
    Fetch {
        /// Remote name.
        remote: String,
        /// Branch on the remote.
        branch: String,
    },

    /// Push the current branch to a remote.
    Push {
        /// Remote name.
        remote: String,
        /// Branch on the remote.
        branch: String,
    },

    /// Fetch a remote branch and merge it into the current branch.
    Pull {
        /// Remote name.
        remote: String,
        /// Branch on the remote.
        branch: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let cwd = std::env::current_dir().unwrap_or_else(|e| {
        eprintln!("error: cannot determine current directory: {e}");
        process::exit(1);
    });

    let result = match cli.command {
        Commands::Init => cmd_init(&cwd),
        Commands::Add { file } => cmd_add(&cwd, &file),
        Commands::Commit { message } => cmd_commit(&cwd, &message),
        Commands::Rm { file } => cmd_rm(&cwd, &file),
        Commands::Log => cmd_log(&cwd),
        Commands::GlobalLog => cmd_global_log(&cwd),
        Commands::Find { message } => cmd_find(&cwd, &message),
        Commands::Status => cmd_status(&cwd),
        Commands::Checkout { target, file } => cmd_checkout(&cwd, target, file),
        Commands::Branch { name } => cmd_branch(&cwd, &name),
        Commands::RmBranch { name } => cmd_rm_branch(&cwd, &name),
        Commands::Reset { commit_id } => cmd_reset(&cwd, &commit_id),
        Commands::Merge { branch } => cmd_merge(&cwd, &branch),
        Commands::AddRemote { name, path } => cmd_add_remote(&cwd, &name, &path),
        Commands::RmRemote { name } => cmd_rm_remote(&cwd, &name),
        Commands::Fetch { remote, branch } => cmd_fetch(&cwd, &remote, &branch),
        Commands::Push { remote, branch } => cmd_push(&cwd, &remote, &branch),
        Commands::Pull { remote, branch } => cmd_pull(&cwd, &remote, &branch),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn cmd_init(cwd: &PathBuf) -> CmdResult {
    Repository::init(cwd)?;
    Ok(())
}

fn cmd_add(cwd: &PathBuf, file: &str) -> CmdResult {
    Repository::open(cwd)?.stage_addition(file)?;
    Ok(())
}

fn cmd_commit(cwd: &PathBuf, message: &str) -> CmdResult {
    if message.is_empty() {
        eprintln!("Please enter a commit message.");
        process::exit(1);
    }
    Repository::open(cwd)?.commit(message)?;
    Ok(())
}

fn cmd_rm(cwd: &PathBuf, file: &str) -> CmdResult {
    Repository::open(cwd)?.stage_deletion(file)?;
    Ok(())
}

/// Print one commit in log format.
fn print_commit(commit: &Commit) {
    println!("===");
    println!("commit {}", commit.hash);
    if let (Some(p1), Some(p2)) = (&commit.parent, &commit.parent2) {
        println!("Merge: {} {}", &p1[..7], &p2[..7]);
    }
    println!("Date: {}", commit.timestamp.format("%a %b %d %H:%M:%S %Y %z"));
    println!("{}\n", commit.message);
}

fn cmd_log(cwd: &PathBuf) -> CmdResult {
    for commit in Repository::open(cwd)?.log()? {
        print_commit(&commit);
    }
    Ok(())
}

fn cmd_global_log(cwd: &PathBuf) -> CmdResult {
    for commit in Repository::open(cwd)?.log_all()? {
        print_commit(&commit);
    }
    Ok(())
}

fn cmd_find(cwd: &PathBuf, message: &str) -> CmdResult {
    let ids = Repository::open(cwd)?.find(message)?;
    if ids.is_empty() {
        println!("Found no commit with that message.");
        return Ok(());
    }
    for id in ids {
        println!("{id}");
    }
    Ok(())
}

fn cmd_status(cwd: &PathBuf) -> CmdResult {
    let report = Repository::open(cwd)?.status()?;

    println!("=== Branches ===");
    for branch in &report.branches {
        if *branch == report.current_branch {
            println!("*{branch}");
        } else {
            println!("{branch}");
        }
    }

    println!("\n=== Staged Files ===");
    for file in &report.staged {
        println!("{file}");
    }

    println!("\n=== Removed Files ===");
    for file in &report.removed {
        println!("{file}");
    }

    println!("\n=== Modifications Not Staged For Commit ===");
    for entry in &report.modified {
        match entry.kind {
            ModifiedKind::Modified => println!("{} (modified)", entry.path),
            ModifiedKind::Deleted => println!("{} (deleted)", entry.path),
        }
    }

    println!("\n=== Untracked Files ===");
    for file in &report.untracked {
        println!("{file}");
    }
    Ok(())
}

fn cmd_checkout(cwd: &PathBuf, target: Option<String>, file: Option<String>) -> CmdResult {
    let repo = Repository::open(cwd)?;
    match (target, file) {
        // checkout <branch>
        (Some(branch), None) => repo.checkout_branch(&branch)?,
        // checkout --file <file>
        (None, Some(file)) => repo.checkout_file(&file)?,
        // checkout <commit> --file <file>
        (Some(commit_id), Some(file)) => repo.checkout_file_at(&commit_id, &file)?,
        (None, None) => {
            eprintln!("Incorrect operands.");
            process::exit(1);
        }
    }
    Ok(())
}

fn cmd_branch(cwd: &PathBuf, name: &str) -> CmdResult {
    Repository::open(cwd)?.create_branch(name)?;
    Ok(())
}

fn cmd_rm_branch(cwd: &PathBuf, name: &str) -> CmdResult {
    Repository::open(cwd)?.delete_branch(name)?;
    Ok(())
}

fn cmd_reset(cwd: &PathBuf, commit_id: &str) -> CmdResult {
    Repository::open(cwd)?.reset(commit_id)?;
    Ok(())
}

/// Print the user-facing line for a merge outcome, if it has one.
fn report_merge(outcome: &MergeOutcome) {
    match outcome {
        MergeOutcome::AlreadyAncestor => {
            println!("Given branch is an ancestor of the current branch.");
        }
        MergeOutcome::FastForward => {
            println!("Current branch fast-forwarded.");
        }
        MergeOutcome::Merged { had_conflict, .. } => {
            if *had_conflict {
                println!("Encountered a merge conflict.");
            }
        }
    }
}

fn cmd_merge(cwd: &PathBuf, branch: &str) -> CmdResult {
    let outcome = Repository::open(cwd)?.merge(branch)?;
    report_merge(&outcome);
    Ok(())
}

fn cmd_add_remote(cwd: &PathBuf, name: &str, path: &str) -> CmdResult {
    Repository::open(cwd)?.add_remote(name, path)?;
    Ok(())
}

fn cmd_rm_remote(cwd: &PathBuf, name: &str) -> CmdResult {
    Repository::open(cwd)?.remove_remote(name)?;
    Ok(())
}

fn cmd_fetch(cwd: &PathBuf, remote: &str, branch: &str) -> CmdResult {
    Repository::open(cwd)?.fetch(remote, branch)?;
    Ok(())
}

fn cmd_push(cwd: &PathBuf, remote: &str, branch: &str) -> CmdResult {
    Repository::open(cwd)?.push(remote, branch)?;
    Ok(())
}

fn cmd_pull(cwd: &PathBuf, remote: &str, branch: &str) -> CmdResult {
    let outcome = Repository::open(cwd)?.pull(remote, branch)?;
    report_merge(&outcome);
    Ok(())
}
