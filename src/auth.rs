use std::fmt;

use crate::config::Config;
use crate::error::{Result, WatchError};

/// Where a token was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Env(&'static str),
    TokenCommand,
    StoredFile,
    GhCli,
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Env(var) => write!(f, "{}", var),
            TokenSource::TokenCommand => write!(f, "token_command"),
            TokenSource::StoredFile => write!(f, "token file"),
            TokenSource::GhCli => write!(f, "gh auth token"),
        }
    }
}

/// Lowercase the host and fold `*.github.com` into `github.com`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    if host.ends_with(".github.com") {
        "github.com".to_string()
    } else {
        host
    }
}

/// GitHub Enterprise Cloud with data residency (`<tenant>.ghe.com`)
pub fn is_tenancy(host: &str) -> bool {
    host.ends_with(".ghe.com")
}

pub fn is_enterprise(host: &str) -> bool {
    host != "github.com" && host != "github.localhost" && !is_tenancy(host)
}

fn env_vars_for(host: &str) -> &'static [&'static str] {
    if is_enterprise(host) {
        &["GH_ENTERPRISE_TOKEN", "GITHUB_ENTERPRISE_TOKEN"]
    } else {
        &["GH_TOKEN", "GITHUB_TOKEN"]
    }
}

/// First non-empty token among the env vars that apply to `host`.
fn token_from_env(
    host: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<(String, TokenSource)> {
    env_vars_for(host).iter().copied().find_map(|var| {
        let token = lookup(var)?;
        let token = token.trim();
        (!token.is_empty()).then(|| (token.to_string(), TokenSource::Env(var)))
    })
}

/// Try to run a CLI command and capture stdout as a token
fn try_cli_token(program: &str, args: &[&str]) -> Option<String> {
    let output = std::process::Command::new(program)
        .args(args)
        .output()
        .ok()?;

    if output.status.success() {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Some(token);
        }
    }
    None
}

/// Stored token path: ~/.config/prwatch/tokens/{host}
fn stored_token_path(host: &str) -> Option<std::path::PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("prwatch").join("tokens").join(host))
}

fn load_stored_token(host: &str) -> Option<String> {
    let path = stored_token_path(host)?;
    let token = std::fs::read_to_string(path).ok()?;
    let token = token.trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn missing_token(host: &str) -> WatchError {
    let hint = if host == "github.com" {
        "run `gh auth login` or set GH_TOKEN/GITHUB_TOKEN".to_string()
    } else if is_enterprise(host) {
        format!(
            "run `gh auth login --hostname {}` or set GH_ENTERPRISE_TOKEN/GITHUB_ENTERPRISE_TOKEN",
            host
        )
    } else {
        format!(
            "run `gh auth login --hostname {}` or set GH_TOKEN/GITHUB_TOKEN",
            host
        )
    };
    WatchError::Auth(format!("no GitHub token found for {:?}; {}", host, hint))
}

/// Find a token for `host`, trying in order:
/// 1. Host-class env vars (GH_TOKEN/GITHUB_TOKEN or the enterprise pair)
/// 2. `auth.token_command` from config
/// 3. Stored token from ~/.config/prwatch/tokens/{host}
/// 4. `gh auth token --hostname {host}`
pub fn token_for_host(host: &str, config: &Config) -> Result<(String, TokenSource)> {
    let host = normalize_host(host);

    if let Some(found) = token_from_env(&host, |var| std::env::var(var).ok()) {
        return Ok(found);
    }

    if let Some(cmd) = &config.auth.token_command {
        match shell_words::split(cmd) {
            Ok(parts) => {
                if let Some((program, args)) = parts.split_first() {
                    let args: Vec<&str> = args.iter().map(String::as_str).collect();
                    if let Some(token) = try_cli_token(program, &args) {
                        return Ok((token, TokenSource::TokenCommand));
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "cannot parse auth.token_command"),
        }
    }

    if let Some(token) = load_stored_token(&host) {
        return Ok((token, TokenSource::StoredFile));
    }

    if let Some(token) = try_cli_token("gh", &["auth", "token", "--hostname", &host]) {
        return Ok((token, TokenSource::GhCli));
    }

    Err(missing_token(&host))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn normalize_folds_subdomains() {
        assert_eq!(normalize_host("GitHub.com"), "github.com");
        assert_eq!(normalize_host("ssh.github.com"), "github.com");
        assert_eq!(normalize_host("git.corp.example"), "git.corp.example");
    }

    #[test]
    fn host_classes() {
        assert!(!is_enterprise("github.com"));
        assert!(!is_enterprise("acme.ghe.com"));
        assert!(is_tenancy("acme.ghe.com"));
        assert!(is_enterprise("git.corp.example"));
    }

    #[test]
    fn github_com_prefers_gh_token() {
        let lookup = env(&[("GH_TOKEN", "one"), ("GITHUB_TOKEN", "two")]);
        assert_eq!(
            token_from_env("github.com", lookup),
            Some(("one".to_string(), TokenSource::Env("GH_TOKEN")))
        );
    }

    #[test]
    fn blank_env_values_are_skipped() {
        let lookup = env(&[("GH_TOKEN", "  "), ("GITHUB_TOKEN", "two")]);
        assert_eq!(
            token_from_env("github.com", lookup),
            Some(("two".to_string(), TokenSource::Env("GITHUB_TOKEN")))
        );
    }

    #[test]
    fn enterprise_ignores_public_tokens() {
        let lookup = env(&[("GH_TOKEN", "public")]);
        assert_eq!(token_from_env("git.corp.example", lookup), None);

        let lookup = env(&[("GITHUB_ENTERPRISE_TOKEN", "corp")]);
        assert_eq!(
            token_from_env("git.corp.example", lookup),
            Some(("corp".to_string(), TokenSource::Env("GITHUB_ENTERPRISE_TOKEN")))
        );
    }

    #[test]
    fn missing_token_hint_depends_on_host() {
        assert!(missing_token("github.com")
            .to_string()
            .contains("gh auth login"));
        assert!(missing_token("git.corp.example")
            .to_string()
            .contains("GH_ENTERPRISE_TOKEN"));
        assert!(missing_token("acme.ghe.com")
            .to_string()
            .contains("--hostname acme.ghe.com"));
    }
}
