//! Git operations
//!
//! Shallow clones at a tag using the gix crate. Each working copy carries a
//! pin file recording the tag and commit it was cloned at, so a later run can
//! tell whether the copy is already where it should be. A copy pinned at an
//! older tag is moved forward in place with the host's `git`: the new tag is
//! fetched shallow, checked out, and untracked build output is cleaned.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use gix::remote::fetch::Shallow;
use tracing::debug;

use crate::core::host::{SourceControl, UpdateOutcome};
use crate::error::GitError;

/// Name of the pin file inside the repository's `.git` directory
const PIN_FILE: &str = "ffstack-pin";

/// Tag and commit a working copy was cloned at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    /// Tag requested at clone time
    pub tag: String,
    /// Commit the tag resolved to
    pub commit: String,
}

impl Pin {
    fn render(&self) -> String {
        format!("{}\n{}\n", self.tag, self.commit)
    }

    fn parse(content: &str) -> Option<Self> {
        let mut lines = content.lines();
        let tag = lines.next()?.trim();
        let commit = lines.next()?.trim();
        if tag.is_empty() || commit.is_empty() {
            return None;
        }
        Some(Self {
            tag: tag.to_string(),
            commit: commit.to_string(),
        })
    }
}

/// Location of the pin file for the working copy at `dest`
pub fn pin_path(dest: &Path) -> PathBuf {
    dest.join(".git").join(PIN_FILE)
}

/// Read the pin of the working copy at `dest`, if any
pub fn read_pin(dest: &Path) -> Option<Pin> {
    fs::read_to_string(pin_path(dest))
        .ok()
        .and_then(|content| Pin::parse(&content))
}

/// Record the pin of the working copy at `dest`
pub fn write_pin(dest: &Path, pin: &Pin) -> Result<(), GitError> {
    let path = pin_path(dest);
    fs::write(&path, pin.render()).map_err(|e| GitError::IoError {
        path,
        error: e.to_string(),
    })
}

/// Git repository operations
#[derive(Debug, Default)]
pub struct GitOperations;

impl GitOperations {
    /// Create a new git operations handler
    pub fn new() -> Self {
        Self
    }

    /// Shallow-clone `url` with `tag` checked out, returning the commit id
    fn clone_internal(url: &str, tag: &str, dest: &Path) -> Result<String, GitError> {
        let clone_failed = |e: &dyn std::fmt::Display| GitError::CloneFailed {
            url: url.to_string(),
            error: e.to_string(),
        };

        let depth = 1u32.try_into().map_err(|e| clone_failed(&e))?;
        let mut prepare = gix::prepare_clone(url, dest)
            .map_err(|e| clone_failed(&e))?
            .with_shallow(Shallow::DepthAtRemote(depth))
            .with_ref_name(Some(tag))
            .map_err(|e| GitError::CheckoutFailed {
                repo: url.to_string(),
                reference: tag.to_string(),
                error: e.to_string(),
            })?;

        let (mut checkout, _outcome) = prepare
            .fetch_then_checkout(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(|e| clone_failed(&e))?;

        let (repo, _outcome) = checkout
            .main_worktree(gix::progress::Discard, &gix::interrupt::IS_INTERRUPTED)
            .map_err(|e| GitError::CheckoutFailed {
                repo: url.to_string(),
                reference: tag.to_string(),
                error: e.to_string(),
            })?;

        Self::head_commit(&repo, dest)
    }

    /// Fetch `tag` into the working copy at `dest` and check it out
    fn move_to_tag(dest: &Path, tag: &str) -> Result<String, GitError> {
        let refspec = format!("+refs/tags/{tag}:refs/tags/{tag}");
        Self::run_git(dest, tag, &["fetch", "--depth", "1", "--no-tags", "origin", &refspec])?;
        Self::run_git(dest, tag, &["checkout", "--force", "--detach", &format!("refs/tags/{tag}")])?;
        Self::run_git(dest, tag, &["clean", "-ffdxq"])?;

        let repo = gix::open(dest).map_err(|e| GitError::InvalidRepository {
            path: dest.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::head_commit(&repo, dest)
    }

    fn run_git(dest: &Path, tag: &str, args: &[&str]) -> Result<(), GitError> {
        let checkout_failed = |error: String| GitError::CheckoutFailed {
            repo: dest.display().to_string(),
            reference: tag.to_string(),
            error,
        };

        let output = Command::new("git")
            .arg("-C")
            .arg(dest)
            .args(args)
            .output()
            .map_err(|e| checkout_failed(format!("failed to run git: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(checkout_failed(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    fn head_commit(repo: &gix::Repository, dest: &Path) -> Result<String, GitError> {
        repo.head_id()
            .map(|id| id.to_hex().to_string())
            .map_err(|e| GitError::InvalidRepository {
                path: dest.to_path_buf(),
                error: e.to_string(),
            })
    }
}

impl SourceControl for GitOperations {
    fn clone_at(&self, url: &str, tag: &str, dest: &Path) -> Result<String, GitError> {
        if dest.exists() {
            fs::remove_dir_all(dest).map_err(|e| GitError::IoError {
                path: dest.to_path_buf(),
                error: e.to_string(),
            })?;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| GitError::IoError {
                path: parent.to_path_buf(),
                error: e.to_string(),
            })?;
        }

        debug!("Cloning {url} at {tag} into {}", dest.display());
        let commit = Self::clone_internal(url, tag, dest)?;
        write_pin(
            dest,
            &Pin {
                tag: tag.to_string(),
                commit: commit.clone(),
            },
        )?;
        Ok(commit)
    }

    fn update(&self, dest: &Path, tag: &str) -> Result<UpdateOutcome, GitError> {
        let Ok(repo) = gix::open(dest) else {
            debug!("{} is not a git repository", dest.display());
            return Ok(UpdateOutcome::Unusable);
        };
        let Some(pin) = read_pin(dest) else {
            debug!("{} has no pin", dest.display());
            return Ok(UpdateOutcome::Unusable);
        };
        if pin.tag != tag {
            debug!("{} is pinned at {}, moving to {tag}", dest.display(), pin.tag);
            return match Self::move_to_tag(dest, tag) {
                Ok(commit) => {
                    write_pin(
                        dest,
                        &Pin {
                            tag: tag.to_string(),
                            commit,
                        },
                    )?;
                    Ok(UpdateOutcome::Moved)
                }
                Err(e) => {
                    debug!("{e}");
                    Ok(UpdateOutcome::Unusable)
                }
            };
        }

        match Self::head_commit(&repo, dest) {
            Ok(head) if head == pin.commit => Ok(UpdateOutcome::Current),
            Ok(head) => {
                debug!("{} moved to {head}, pinned at {}", dest.display(), pin.commit);
                Ok(UpdateOutcome::Unusable)
            }
            Err(_) => Ok(UpdateOutcome::Unusable),
        }
    }
}
