use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
///
/// This gets loaded from the config file, then CLI flags override it.
/// Every section has defaults so an empty (or missing) file is fine.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub paging: PagingSettings,
    #[serde(default)]
    pub search: SearchConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load config from an explicit path. A missing file means defaults.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)
                .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to disk
    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `<config dir>/pokedex/config.toml` - XDG on Linux, Application Support on macOS, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("pokedex").join("config.toml"))
    }

    /// Where the SQLite cache lives: the configured path, or `<data dir>/pokedex/pokedex.db`
    pub fn cache_path(&self) -> crate::Result<PathBuf> {
        if let Some(path) = &self.cache.path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
            .ok_or_else(|| crate::Error::Config("Could not find data directory".into()))?;
        Ok(data_dir.join("pokedex").join("pokedex.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// PokeAPI base URL (point it at a mirror or a local instance)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries for transient failures (5xx, 429, dropped connections)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_base_url() -> String {
    pokedex_api::POKEAPI_BASE.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CacheConfig {
    /// Database file; defaults to the platform data dir
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PagingSettings {
    /// Items per page, both for remote fetches and local reads
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// How close to the end of the list (in items) scrolling has to get before the next page loads
    #[serde(default = "default_page_size")]
    pub prefetch_distance: usize,
}

fn default_page_size() -> usize {
    20
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            prefetch_distance: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Quiet period after the last keystroke before a search runs
    #[serde(default = "default_debounce")]
    pub debounce_ms: u64,
}

fn default_debounce() -> u64 {
    500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce(),
        }
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
