// Configuration for both tools.
//
// Values are resolved from, highest priority first: command-line flags,
// environment variables (clap's `env` support), an optional JSON config file
// and finally placeholder defaults that are expected to be overridden.

use crate::cleanup::CleanupPolicy;
use anyhow::{bail, Context, Result};
use chrono::TimeDelta;
use clap::Args;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Semaphore;

pub const DEFAULT_BASE_URL: &str = "https://your.seafile.org";
pub const DEFAULT_REPO_ID: &str = "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx";
pub const DEFAULT_USERNAME: &str = "your@username.org";
pub const DEFAULT_MAX_AGE_DAYS: i64 = 14;
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Connection flags shared by both binaries.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Seafile API domain without path
    #[arg(long = "baseurl", env = "SEAFILE_BASE_URL")]
    pub base_url: Option<String>,

    /// Seafile repository id
    #[arg(long = "repo", env = "SEAFILE_REPO")]
    pub repo_id: Option<String>,

    /// Seafile username
    #[arg(long, env = "SEAFILE_USERNAME")]
    pub username: Option<String>,

    /// Seafile password (prompted for when omitted and stdin is a terminal)
    #[arg(long, env = "SEAFILE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// JSON config file [default: <config dir>/seafile-tools/config.json]
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Per-request timeout in seconds (no timeout by default)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

/// Cleanup-only flags.
#[derive(Args, Debug, Clone, Default)]
pub struct CleanupArgs {
    /// A file's max age until it's cleaned up, e.g. 14d, 336h or 1d12h [default: 14d]
    #[arg(long = "maxage", value_parser = parse_max_age)]
    pub max_age: Option<TimeDelta>,

    /// Maximum number of files processed at once [default: 8]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Log the files that would be deleted without deleting them
    #[arg(long)]
    pub dry_run: bool,
}

/// On-disk configuration. Every key is optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub repo_id: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_age: Option<String>,
    pub concurrency: Option<usize>,
}

impl FileConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("seafile-tools").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Load `explicit` if given (it must exist), otherwise the default file
    /// when present, otherwise an empty config.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Fully resolved connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub repo_id: String,
    pub username: String,
    pub password: Option<String>,
    pub timeout: Option<Duration>,
}

impl Config {
    pub fn resolve(args: &ConnectionArgs, file: &FileConfig) -> Self {
        let pick = |flag: &Option<String>, from_file: &Option<String>, default: &str| {
            flag.clone()
                .or_else(|| from_file.clone())
                .unwrap_or_else(|| default.to_string())
        };
        Config {
            base_url: pick(&args.base_url, &file.base_url, DEFAULT_BASE_URL),
            repo_id: pick(&args.repo_id, &file.repo_id, DEFAULT_REPO_ID),
            username: pick(&args.username, &file.username, DEFAULT_USERNAME),
            password: args.password.clone().or_else(|| file.password.clone()),
            timeout: args.timeout.or(file.timeout_secs).map(Duration::from_secs),
        }
    }

    /// Names of settings still holding their placeholder default.
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut unset = Vec::new();
        if self.base_url == DEFAULT_BASE_URL {
            unset.push("base url");
        }
        if self.repo_id == DEFAULT_REPO_ID {
            unset.push("repository id");
        }
        if self.username == DEFAULT_USERNAME {
            unset.push("username");
        }
        unset
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("repo_id", &self.repo_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CleanupArgs {
    pub fn policy(&self, file: &FileConfig) -> Result<CleanupPolicy> {
        let max_age = match (self.max_age, &file.max_age) {
            (Some(age), _) => age,
            (None, Some(raw)) => parse_max_age(raw)
                .map_err(anyhow::Error::msg)
                .context("max_age in config file")?,
            (None, None) => TimeDelta::days(DEFAULT_MAX_AGE_DAYS),
        };
        let concurrency = self
            .concurrency
            .or(file.concurrency)
            .unwrap_or(DEFAULT_CONCURRENCY);
        if concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        if concurrency > Semaphore::MAX_PERMITS {
            bail!("concurrency must be at most {}", Semaphore::MAX_PERMITS);
        }
        Ok(CleanupPolicy {
            max_age,
            concurrency,
            dry_run: self.dry_run,
        })
    }
}

/// Parse a duration such as `14d`, `336h`, `90m` or `1d12h`.
///
/// See the duration_str crate for the accepted units.
pub fn parse_max_age(raw: &str) -> std::result::Result<TimeDelta, String> {
    let s = raw.trim();
    let age = duration_str::parse(s).map_err(|e| format!("invalid duration {s:?}: {e}"))?;
    TimeDelta::from_std(age).map_err(|_| format!("duration {s:?} is too large"))
}
