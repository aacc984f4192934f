//! Application configuration.
//!
//! Values are layered: built-in defaults, then `~/.config/games/config.toml`
//! when present, then `GAMES_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Directory under the platform config/data roots owned by the app.
pub const APP_DIR: &str = "games";

const CONFIG_FILE: &str = "config.toml";
const DEFAULT_API_ROOT_URL_DEV: &str = "https://api.rawg.io/api/";
const DEFAULT_API_ROOT_URL_PROD: &str = "https://api.rawg.io/api/";
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Which API root the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development backend.
    Dev,
    /// Production backend.
    Prod,
}

impl Environment {
    /// Environment compiled in as the default (`prod` feature selects production).
    pub const fn compiled() -> Self {
        if cfg!(feature = "prod") {
            Environment::Prod
        } else {
            Environment::Dev
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

/// Runtime configuration for the client, the store and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active backend.
    pub environment: Environment,
    /// API root used when `environment = "dev"`.
    pub api_root_url_dev: String,
    /// API root used when `environment = "prod"`.
    pub api_root_url_prod: String,
    /// Key appended to every request as the `key` query parameter.
    pub api_key: String,
    /// Number of games requested per page.
    pub page_size: u32,
    /// SQLite file backing the local store.
    pub database_path: PathBuf,
    /// Directory for the rolling log file.
    pub log_dir: PathBuf,
    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_root = data_root();
        Self {
            environment: Environment::compiled(),
            api_root_url_dev: DEFAULT_API_ROOT_URL_DEV.to_string(),
            api_root_url_prod: DEFAULT_API_ROOT_URL_PROD.to_string(),
            api_key: option_env!("GAMES_API_KEY").unwrap_or_default().to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            database_path: data_root.join("games.db"),
            log_dir: data_root.join("logs"),
            request_timeout_secs: 20,
            connect_timeout_secs: 6,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file location and the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load configuration from `path` (optional) layered under `GAMES_*` variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let defaults = AppConfig::default();
        let settings = config::Config::builder()
            .set_default("environment", defaults.environment.as_str())?
            .set_default("api_root_url_dev", defaults.api_root_url_dev)?
            .set_default("api_root_url_prod", defaults.api_root_url_prod)?
            .set_default("api_key", defaults.api_key)?
            .set_default("page_size", i64::from(defaults.page_size))?
            .set_default(
                "database_path",
                defaults.database_path.to_string_lossy().to_string(),
            )?
            .set_default("log_dir", defaults.log_dir.to_string_lossy().to_string())?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("connect_timeout_secs", defaults.connect_timeout_secs as i64)?
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("GAMES").try_parsing(true))
            .build()
            .with_context(|| format!("failed to read configuration {}", path.display()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("failed to parse configuration")?;
        if config.page_size == 0 {
            anyhow::bail!("page_size must be greater than zero");
        }
        Ok(config)
    }

    /// API root for the active environment.
    pub fn api_root_url(&self) -> &str {
        match self.environment {
            Environment::Dev => &self.api_root_url_dev,
            Environment::Prod => &self.api_root_url_prod,
        }
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Location of the user configuration file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(CONFIG_FILE)
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Write a default configuration file unless one already exists.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }

    let defaults = AppConfig::default();
    let contents = format!(
        "# Games catalog client configuration.\n\
         # Every key can be overridden with a GAMES_<KEY> environment variable.\n\
         \n\
         # \"dev\" or \"prod\"\n\
         environment = \"{}\"\n\
         api_root_url_dev = \"{}\"\n\
         api_root_url_prod = \"{}\"\n\
         # api_key = \"\"\n\
         page_size = {}\n\
         request_timeout_secs = {}\n\
         connect_timeout_secs = {}\n",
        defaults.environment.as_str(),
        defaults.api_root_url_dev,
        defaults.api_root_url_prod,
        defaults.page_size,
        defaults.request_timeout_secs,
        defaults.connect_timeout_secs,
    );
    fs::write(path, contents)
        .with_context(|| format!("failed to write default config {}", path.display()))
}
