//! Application configuration for citesync.
//!
//! User config lives at `~/.citesync/citesync.toml`.
//! Environment variables override the library section; the access credential
//! is only ever read from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CitesyncError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "citesync.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".citesync";

/// Environment variable overriding `[library].id`.
const LIBRARY_ID_ENV: &str = "ZOTERO_LIBRARY_ID";

/// Environment variable overriding `[library].kind`.
const LIBRARY_TYPE_ENV: &str = "ZOTERO_LIBRARY_TYPE";

// ---------------------------------------------------------------------------
// Config structs (matching citesync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which library to enrich and where the credential lives.
    #[serde(default)]
    pub library: LibrarySection,

    /// Page fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Batch run settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Streaming settings.
    #[serde(default)]
    pub stream: StreamConfig,

    /// Record store endpoint.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Personal or group library.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    #[default]
    User,
    Group,
}

impl LibraryKind {
    /// Path segment used in store URLs and stream topics.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            other => Err(CitesyncError::config(format!(
                "unknown library type '{other}': expected 'user' or 'group'"
            ))),
        }
    }
}

/// `[library]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySection {
    /// Library identifier. May be left empty and supplied via `ZOTERO_LIBRARY_ID`.
    #[serde(default)]
    pub id: String,

    /// Personal or group library.
    #[serde(default)]
    pub kind: LibraryKind,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for LibrarySection {
    fn default() -> Self {
        Self {
            id: String::new(),
            kind: LibraryKind::default(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_api_key_env() -> String {
    "ZOTERO_API_KEY".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Page download timeout.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// Browser-like User-Agent; some platforms refuse obvious bots.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    15
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .into()
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Records requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Pending updates that trigger a flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Log progress every N records.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            flush_threshold: default_flush_threshold(),
            progress_interval: default_progress_interval(),
        }
    }
}

fn default_page_size() -> usize {
    100
}
fn default_flush_threshold() -> usize {
    50
}
fn default_progress_interval() -> usize {
    5
}

/// `[stream]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Streaming websocket endpoint.
    #[serde(default = "default_stream_endpoint")]
    pub endpoint: String,

    /// Most recently modified records fetched per notification.
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Supervisor sleep until the server advises otherwise.
    #[serde(default = "default_retry_ms")]
    pub default_retry_ms: u64,

    /// Connection attempts before a connect call gives up.
    #[serde(default = "default_max_connect_attempts")]
    pub max_connect_attempts: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_stream_endpoint(),
            recent_window: default_recent_window(),
            default_retry_ms: default_retry_ms(),
            max_connect_attempts: default_max_connect_attempts(),
        }
    }
}

fn default_stream_endpoint() -> String {
    "wss://stream.zotero.org".into()
}
fn default_recent_window() -> usize {
    5
}
fn default_retry_ms() -> u64 {
    10_000
}
fn default_max_connect_attempts() -> u32 {
    10
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Web API base URL.
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
        }
    }
}

fn default_store_base_url() -> String {
    "https://api.zotero.org".into()
}

// ---------------------------------------------------------------------------
// Resolved library config (runtime, merged from config file + environment)
// ---------------------------------------------------------------------------

/// Fully resolved access to one library.
#[derive(Clone)]
pub struct LibraryConfig {
    pub api_key: String,
    pub library_id: String,
    pub kind: LibraryKind,
}

impl LibraryConfig {
    /// Stream topic for this library, e.g. `/users/12345`.
    pub fn topic(&self) -> String {
        format!("/{}/{}", self.kind.path_segment(), self.library_id)
    }
}

impl std::fmt::Debug for LibraryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryConfig")
            .field("api_key", &mask_key(&self.api_key))
            .field("library_id", &self.library_id)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Resolve library access from config plus the process environment.
pub fn resolve_library(config: &AppConfig) -> Result<LibraryConfig> {
    resolve_library_with(config, |name| std::env::var(name).ok())
}

/// Resolve library access with an explicit variable lookup.
///
/// Missing credential or identifier is fatal.
pub fn resolve_library_with<F>(config: &AppConfig, lookup: F) -> Result<LibraryConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var_name = &config.library.api_key_env;
    let api_key = lookup(var_name)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CitesyncError::config(format!("{var_name} is not set in environment")))?;

    let library_id = lookup(LIBRARY_ID_ENV)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| config.library.id.clone());
    if library_id.is_empty() {
        return Err(CitesyncError::config(format!(
            "{LIBRARY_ID_ENV} is not set in environment and [library].id is empty"
        )));
    }

    let kind = match lookup(LIBRARY_TYPE_ENV).filter(|v| !v.is_empty()) {
        Some(value) => LibraryKind::parse(&value)?,
        None => config.library.kind,
    };

    Ok(LibraryConfig {
        api_key,
        library_id,
        kind,
    })
}

/// Mask an API key for display.
pub fn mask_key(key: &str) -> String {
    if key.len() < 8 || !key.is_ascii() {
        return "***".into();
    }
    format!("{}...{}", &key[..4], &key[key.len() - 4..])
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.citesync/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CitesyncError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.citesync/citesync.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CitesyncError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CitesyncError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CitesyncError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CitesyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CitesyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
