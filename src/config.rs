//! Configuration for the brew day orchestrator.
//!
//! Settings are layered file → environment → CLI. The file is
//! `brewday.toml` in the data directory:
//!
//! ```toml
//! data_dir = "/var/lib/brewday"
//! store = "sqlite"
//!
//! [gotify]
//! url = "http://gotify.local"
//! username = "admin"
//! password = "secret"
//!
//! [log]
//! level = "info"
//! json = false
//! file = "/var/log/brewday"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "brewday.toml";
pub const DB_FILE: &str = "brewday.db";

/// Backend used for recipes, timelines and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[default]
    Sqlite,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::Memory => write!(f, "memory"),
            StoreKind::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreKind::Memory),
            "sqlite" => Ok(StoreKind::Sqlite),
            _ => anyhow::bail!("Invalid store '{}'. Valid values: memory, sqlite", s),
        }
    }
}

/// Gotify connection. Notifications are disabled without a URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GotifyConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Application token; skips the application lookup when set
    #[serde(default)]
    pub token: Option<String>,
}

impl GotifyConfig {
    pub fn is_enabled(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Fallback filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrewdayConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default)]
    pub gotify: GotifyConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Default data directory, e.g. `~/.local/share/brewday` on Linux.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("brewday")
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl BrewdayConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse brewday.toml")
    }

    /// Loads `brewday.toml` from `dir`, or the defaults if there is none.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize brewday.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Applies `BREWDAY_*` overrides through `lookup`.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).and_then(non_empty);
        if let Some(dir) = var("BREWDAY_DATA_DIR") {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(store) = var("BREWDAY_STORE") {
            self.store = store.parse().context("Invalid BREWDAY_STORE")?;
        }
        if let Some(url) = var("BREWDAY_GOTIFY_URL") {
            self.gotify.url = Some(url);
        }
        if let Some(user) = var("BREWDAY_GOTIFY_USER") {
            self.gotify.username = Some(user);
        }
        if let Some(password) = var("BREWDAY_GOTIFY_PASSWORD") {
            self.gotify.password = Some(password);
        }
        if let Some(level) = var("BREWDAY_LOG") {
            self.log.level = level;
        }
        Ok(())
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Resolves the effective configuration: the file in `data_dir` (CLI
    /// flag, then `BREWDAY_DATA_DIR`, then the platform default), then the
    /// environment on top.
    pub fn resolve(cli_data_dir: Option<&Path>) -> Result<Self> {
        let dir = cli_data_dir
            .map(Path::to_path_buf)
            .or_else(|| {
                std::env::var("BREWDAY_DATA_DIR")
                    .ok()
                    .and_then(non_empty)
                    .map(PathBuf::from)
            })
            .unwrap_or_else(default_data_dir);
        let mut config = Self::load_or_default(&dir)?;
        config.apply_env()?;
        if cli_data_dir.is_some() || config.data_dir.is_none() {
            config.data_dir = Some(dir);
        }
        Ok(config)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join(DB_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir().join(CONFIG_FILE)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.store == StoreKind::Memory {
            warnings.push(
                "store = \"memory\": recipes, timelines and summaries are lost when the process exits"
                    .to_string(),
            );
        }

        if let Some(url) = self.gotify.url.as_deref().filter(|u| !u.trim().is_empty()) {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                warnings.push(format!(
                    "Invalid gotify url '{}': should start with http:// or https://",
                    url
                ));
            }
            let has_login = self.gotify.username.is_some() && self.gotify.password.is_some();
            if self.gotify.token.is_none() && !has_login {
                warnings.push(
                    "gotify url is set but neither token nor username/password are".to_string(),
                );
            }
        }

        if tracing_subscriber::EnvFilter::try_new(&self.log.level).is_err() {
            warnings.push(format!("Invalid log level '{}'", self.log.level));
        }

        warnings
    }
}
