use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use crate::types::Filter;

const MIN_REFRESH_SECS: u64 = 5;

/// Watch the pull requests waiting on you in the current repository
#[derive(Debug, Parser)]
#[command(name = "prwatch", version, about)]
pub struct Cli {
    /// Git remote that points at the hosted repository
    #[arg(long)]
    pub remote: Option<String>,

    /// Seconds between background refreshes
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Initial list filter
    #[arg(long, value_enum)]
    pub filter: Option<Filter>,

    /// Editor command used to open worktrees
    #[arg(long)]
    pub editor: Option<String>,

    /// Write logs here instead of the cache directory
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub remote: String,
    pub refresh_interval_secs: u64,
    pub default_filter: Filter,
    pub editor: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            refresh_interval_secs: 60,
            default_filter: Filter::ReviewRequested,
            editor: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    pub token_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn config_path() -> Option<PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("prwatch").join("config.toml"))
}

impl Config {
    pub fn load() -> Self {
        let Some(path) = config_path() else {
            return Config::default();
        };

        let Ok(content) = std::fs::read_to_string(&path) else {
            return Config::default();
        };

        match toml::from_str::<Config>(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
                Config::default()
            }
        }
    }

    /// Command-line flags win over the file.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(remote) = &cli.remote {
            self.general.remote = remote.clone();
        }
        if let Some(secs) = cli.interval {
            self.general.refresh_interval_secs = secs;
        }
        if let Some(filter) = cli.filter {
            self.general.default_filter = filter;
        }
        if let Some(editor) = &cli.editor {
            self.general.editor = Some(editor.clone());
        }
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.general.refresh_interval_secs.max(MIN_REFRESH_SECS))
    }
}
