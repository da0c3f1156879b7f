use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Result, WatchError};

/// Run git with `args` inside `dir` and return trimmed stdout.
pub fn run(dir: &Path, args: &[&str]) -> Result<String> {
    tracing::debug!(dir = %dir.display(), ?args, "running git");

    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| WatchError::GitCommand(format!("cannot run git: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(WatchError::GitCommand(format!(
            "{} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Top-level directory of the repository containing `dir`.
pub fn repo_root(dir: &Path) -> Result<PathBuf> {
    run(dir, &["rev-parse", "--show-toplevel"])
        .map(PathBuf::from)
        .map_err(|_| WatchError::GitCommand("not in a git repository".to_string()))
}

/// URL configured for `remote` (usually "origin").
pub fn remote_url(dir: &Path, remote: &str) -> Result<String> {
    run(dir, &["remote", "get-url", remote])
        .map_err(|e| WatchError::GitCommand(format!("no '{}' remote found: {}", remote, e)))
}
