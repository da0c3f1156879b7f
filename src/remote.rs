use std::fmt;

use url::Url;

use crate::error::{Result, WatchError};

/// Host, owner and repository name taken from a git remote address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentity {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RemoteIdentity {
    /// Parse `[user@]host:owner/name[.git]` or a URL such as
    /// `https://host/owner/name.git` / `ssh://git@host:2222/owner/name`.
    pub fn parse(remote: &str) -> Result<Self> {
        let remote = remote.trim();

        if remote.contains("://") {
            return parse_url(remote);
        }

        parse_scp_like(remote).ok_or_else(|| unrecognized(remote))
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn unrecognized(remote: &str) -> WatchError {
    WatchError::Parse(format!("cannot parse host/owner/repo from remote: {:?}", remote))
}

fn strip_git_suffix(name: &str) -> &str {
    name.strip_suffix(".git").unwrap_or(name)
}

/// scp-like syntax: git@github.com:owner/repo.git
fn parse_scp_like(remote: &str) -> Option<RemoteIdentity> {
    let (authority, path) = remote.split_once(':')?;

    // A userinfo part, if present, ends at the last '@' before the colon
    let host = authority.rsplit('@').next()?;
    if host.is_empty() || host.contains('/') {
        return None;
    }

    let (owner, name) = path.split_once('/')?;
    if owner.is_empty() || name.contains('/') {
        return None;
    }

    let name = strip_git_suffix(name);
    if name.is_empty() {
        return None;
    }

    Some(RemoteIdentity {
        host: host.to_string(),
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

fn parse_url(remote: &str) -> Result<RemoteIdentity> {
    let url = Url::parse(remote)
        .map_err(|e| WatchError::Parse(format!("cannot parse remote URL {:?}: {}", remote, e)))?;

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => return Err(unrecognized(remote)),
    };

    let mut segments = url.path().trim_matches('/').split('/');
    let owner = segments.next().unwrap_or_default();
    let name = strip_git_suffix(segments.next().unwrap_or_default());
    if owner.is_empty() || name.is_empty() {
        return Err(unrecognized(remote));
    }

    Ok(RemoteIdentity {
        host,
        owner: owner.to_string(),
        name: name.to_string(),
    })
}
