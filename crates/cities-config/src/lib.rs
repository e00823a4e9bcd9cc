use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the cities catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file; platform data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Directory materialized images are written to
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    /// CSV file read by `init`
    #[serde(default = "default_source_csv")]
    pub source_csv: PathBuf,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub materialize: MaterializeConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializeConfig {
    /// Serve the freshly cached bytes from the call that fetched them,
    /// instead of requiring a second read
    #[serde(default)]
    pub serve_on_materialize: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body, which bounds image uploads
    #[serde(default = "default_max_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            storage_root: default_storage_root(),
            source_csv: default_source_csv(),
            fetch: FetchConfig::default(),
            materialize: MaterializeConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_bytes: default_max_bytes(),
            user_agent: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_bytes(),
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "cities", "cities")
}

fn default_storage_root() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("images"))
        .unwrap_or_else(|| PathBuf::from("images"))
}

fn default_source_csv() -> PathBuf {
    PathBuf::from("data/cities.csv")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Config {
    /// Load config from default location or create default if not found
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, writing the defaults there if it does not exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = toml::to_string_pretty(&config)?;
            std::fs::write(path, content)?;
            Ok(config)
        }
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = project_dirs() {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("~/.cities/config.toml")
        }
    }
}
