use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, WatchError};
use crate::git;

const WORKTREE_DIR: &str = ".worktrees";

/// Checkout location for a PR: `<root>/.worktrees/pr-<number>`.
pub fn worktree_path(root: &Path, number: u64) -> PathBuf {
    root.join(WORKTREE_DIR).join(format!("pr-{}", number))
}

/// Local ref the PR head is fetched into before checkout
fn local_ref(number: u64) -> String {
    format!("refs/prwatch/pr-{}", number)
}

/// Paths listed by `git worktree list --porcelain`
fn registered_paths(porcelain: &str) -> impl Iterator<Item = PathBuf> + '_ {
    porcelain
        .lines()
        .filter_map(|line| line.strip_prefix("worktree "))
        .map(PathBuf::from)
}

/// PR number encoded in a worktree path, if it lives under `<root>/.worktrees/`
fn pr_number_of(root: &Path, path: &Path) -> Option<u64> {
    let rest = path.strip_prefix(root.join(WORKTREE_DIR)).ok()?;
    let mut components = rest.components();
    let name = components.next()?.as_os_str().to_str()?;
    if components.next().is_some() {
        return None;
    }
    name.strip_prefix("pr-")?.parse().ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorktreeOp {
    Create,
    Remove,
}

impl WorktreeOp {
    /// Perform the operation. Creating an existing worktree is a no-op.
    pub fn run(self, manager: &WorktreeManager, number: u64) -> Result<()> {
        match self {
            WorktreeOp::Create => {
                if manager.exists(number)? {
                    tracing::info!(number, "worktree already present");
                    return Ok(());
                }
                manager.create(number)
            }
            WorktreeOp::Remove => manager.remove(number),
        }
    }
}

impl fmt::Display for WorktreeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorktreeOp::Create => write!(f, "create worktree"),
            WorktreeOp::Remove => write!(f, "remove worktree"),
        }
    }
}

/// Per-PR git worktrees under one repository. Every method shells out to git
/// and blocks.
#[derive(Debug, Clone)]
pub struct WorktreeManager {
    root: PathBuf,
    remote: String,
}

impl WorktreeManager {
    pub fn new(root: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            remote: remote.into(),
        }
    }

    pub fn path_for(&self, number: u64) -> PathBuf {
        worktree_path(&self.root, number)
    }

    fn list_porcelain(&self) -> Result<String> {
        git::run(&self.root, &["worktree", "list", "--porcelain"])
    }

    pub fn exists(&self, number: u64) -> Result<bool> {
        let path = self.path_for(number);
        let porcelain = self.list_porcelain()?;
        let found = registered_paths(&porcelain).any(|p| p == path);
        Ok(found)
    }

    /// PR numbers that currently have a registered worktree
    pub fn registered_prs(&self) -> Result<BTreeSet<u64>> {
        let porcelain = self.list_porcelain()?;
        Ok(registered_paths(&porcelain)
            .filter_map(|p| pr_number_of(&self.root, &p))
            .collect())
    }

    /// Fetch the PR head into a local ref, then add a detached worktree on it.
    pub fn create(&self, number: u64) -> Result<()> {
        let path = self.path_for(number);
        let local = local_ref(number);
        let refspec = format!("+refs/pull/{}/head:{}", number, local);

        git::run(&self.root, &["fetch", &self.remote, &refspec])?;

        let path_arg = path.to_string_lossy();
        if let Err(err) = git::run(
            &self.root,
            &["worktree", "add", "--detach", &path_arg, &local],
        ) {
            self.discard_partial(number);
            return Err(err);
        }

        tracing::info!(number, path = %path.display(), "worktree created");
        Ok(())
    }

    pub fn remove(&self, number: u64) -> Result<()> {
        let path = self.path_for(number);
        if !self.exists(number)? {
            return Err(WatchError::GitCommand(format!(
                "{} is not a registered worktree",
                path.display()
            )));
        }

        let path_arg = path.to_string_lossy();
        git::run(&self.root, &["worktree", "remove", "--force", &path_arg])?;

        if let Err(e) = git::run(&self.root, &["update-ref", "-d", &local_ref(number)]) {
            tracing::warn!(number, error = %e, "could not delete local PR ref");
        }

        tracing::info!(number, path = %path.display(), "worktree removed");
        Ok(())
    }

    /// Undo whatever a failed `worktree add` left behind.
    fn discard_partial(&self, number: u64) {
        let path = self.path_for(number);

        if self.exists(number).unwrap_or(false) {
            let path_arg = path.to_string_lossy();
            if let Err(e) = git::run(&self.root, &["worktree", "remove", "--force", &path_arg]) {
                tracing::warn!(number, error = %e, "could not remove partial worktree");
            }
        }
        if let Err(e) = git::run(&self.root, &["worktree", "prune"]) {
            tracing::warn!(error = %e, "worktree prune failed");
        }
        if let Err(e) = git::run(&self.root, &["update-ref", "-d", &local_ref(number)]) {
            tracing::warn!(number, error = %e, "could not delete local PR ref");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    #[test]
    fn path_is_deterministic() {
        assert_eq!(
            worktree_path(Path::new("/repo/root"), 142),
            PathBuf::from("/repo/root/.worktrees/pr-142")
        );
        assert_eq!(
            worktree_path(Path::new("/repo/root"), 142),
            worktree_path(Path::new("/repo/root"), 142)
        );
    }

    #[test]
    fn porcelain_paths_are_matched_exactly() {
        let porcelain = "worktree /repo\nHEAD abc\nbranch refs/heads/main\n\n\
                         worktree /repo/.worktrees/pr-142\nHEAD def\ndetached\n";
        let paths: Vec<_> = registered_paths(porcelain).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/repo"),
                PathBuf::from("/repo/.worktrees/pr-142")
            ]
        );
        assert!(!paths.contains(&PathBuf::from("/repo/.worktrees/pr-14")));
    }

    #[test]
    fn pr_number_only_for_direct_children() {
        let root = Path::new("/repo");
        assert_eq!(pr_number_of(root, Path::new("/repo/.worktrees/pr-9")), Some(9));
        assert_eq!(pr_number_of(root, Path::new("/repo/.worktrees/pr-x")), None);
        assert_eq!(pr_number_of(root, Path::new("/repo/.worktrees/pr-9/sub")), None);
        assert_eq!(pr_number_of(root, Path::new("/elsewhere/.worktrees/pr-9")), None);
        assert_eq!(pr_number_of(root, Path::new("/repo")), None);
    }

    fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    fn sh_git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
            .args(args)
            .output()
            .unwrap();
        assert!(
            status.status.success(),
            "git {:?}: {}",
            args,
            String::from_utf8_lossy(&status.stderr)
        );
    }

    /// A working clone whose origin carries `refs/pull/7/head`.
    fn scratch_repo() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().canonicalize().unwrap();
        let origin = base.join("origin.git");
        let work = base.join("work");
        std::fs::create_dir_all(&origin).unwrap();
        std::fs::create_dir_all(&work).unwrap();

        sh_git(&origin, &["init", "-q", "--bare"]);
        sh_git(&work, &["init", "-q"]);
        sh_git(&work, &["commit", "-q", "--allow-empty", "-m", "init"]);
        sh_git(&work, &["remote", "add", "origin", &origin.to_string_lossy()]);
        sh_git(&work, &["push", "-q", "origin", "HEAD:refs/pull/7/head"]);

        (tmp, work)
    }

    #[test]
    fn create_then_remove_round_trip() {
        if !git_available() {
            return;
        }
        let (_tmp, work) = scratch_repo();
        let manager = WorktreeManager::new(&work, "origin");

        assert!(!manager.exists(7).unwrap());
        manager.create(7).unwrap();
        assert!(manager.exists(7).unwrap());
        assert!(manager.path_for(7).is_dir());
        assert_eq!(manager.registered_prs().unwrap(), BTreeSet::from([7]));

        // Creating again through the op is a no-op
        WorktreeOp::Create.run(&manager, 7).unwrap();

        manager.remove(7).unwrap();
        assert!(!manager.exists(7).unwrap());
        assert!(manager.registered_prs().unwrap().is_empty());
    }

    #[test]
    fn create_for_missing_pr_leaves_nothing_registered() {
        if !git_available() {
            return;
        }
        let (_tmp, work) = scratch_repo();
        let manager = WorktreeManager::new(&work, "origin");

        let err = manager.create(8).unwrap_err();
        assert!(matches!(err, WatchError::GitCommand(_)));
        assert!(!manager.exists(8).unwrap());
        assert!(!manager.path_for(8).exists());
    }

    #[test]
    fn remove_unregistered_path_fails() {
        if !git_available() {
            return;
        }
        let (_tmp, work) = scratch_repo();
        let manager = WorktreeManager::new(&work, "origin");

        assert!(matches!(
            manager.remove(7),
            Err(WatchError::GitCommand(_))
        ));
    }
}
