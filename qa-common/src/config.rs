//! Configuration loading and root folder resolution
//!
//! Configuration is optional. A missing or unreadable TOML file produces a warning and
//! compiled defaults; it never stops a tool from starting.
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `QA_ROOT_FOLDER` environment variable
//! 3. TOML `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "QA_ROOT_FOLDER";
/// Environment variable pointing at an explicit TOML file
pub const CONFIG_PATH_ENV: &str = "QA_CONFIG";
/// Directory / file stem shared by every QA automation binary
pub const APP_DIR_NAME: &str = "qa-automation";
/// SQLite database file inside the root folder
pub const DATABASE_FILE_NAME: &str = "qa-automation.db";

/// Product-count service used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "https://product-counter-api.onrender.com";

/// Top-level TOML schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the job-state database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Product-count API as seen by the spreadsheet tooling
    #[serde(default)]
    pub api: ApiConfig,

    /// Rows of the control sheet holding the linked source locations
    #[serde(default)]
    pub control: ControlRows,

    /// Product-count service settings
    #[serde(default)]
    pub counter: CounterConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when RUST_LOG is not set ("trace" .. "error")
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Remote product-count API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bounded timeout for every remote call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Interval between scheduled poll ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            request_timeout_seconds: default_request_timeout(),
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

fn default_request_timeout() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    60
}

/// 1-based rows of the control sheet where each source location lives
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControlRows {
    pub keyword_gen_row: usize,
    pub manual_row: usize,
    pub semantic_row: usize,
    pub staging_row: usize,
}

impl Default for ControlRows {
    fn default() -> Self {
        Self {
            keyword_gen_row: 14,
            manual_row: 20,
            semantic_row: 21,
            staging_row: 36,
        }
    }
}

/// Product-count service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Search endpoint; `{env}` is replaced with the job environment
    #[serde(default = "default_search_url_template")]
    pub search_url_template: String,

    /// Environment used when a job does not name one
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Concurrent keyword lookups per job
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Search page size (upper bound of a single count)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Attempts per keyword before it is reported as -1
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            search_url_template: default_search_url_template(),
            environment: default_environment(),
            max_concurrency: default_max_concurrency(),
            page_size: default_page_size(),
            max_attempts: default_max_attempts(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:5731".to_string()
}

fn default_search_url_template() -> String {
    "https://search-{env}-dlp-adept-search.search-prod.adeptmind.app/search".to_string()
}

fn default_environment() -> String {
    "prod".to_string()
}

fn default_max_concurrency() -> usize {
    32
}

fn default_page_size() -> usize {
    300
}

fn default_max_attempts() -> u32 {
    5
}

impl TomlConfig {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load configuration with graceful degradation
    ///
    /// **Lookup order:** explicit path → `QA_CONFIG` → platform config dir.
    /// An explicit path that cannot be parsed is still only a warning.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let candidate = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .or_else(default_config_path);

        let Some(path) = candidate else {
            warn!("No configuration directory available, using compiled defaults");
            return Self::default();
        };

        if !path.exists() {
            debug!("Config file {} not found, using compiled defaults", path.display());
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                debug!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!("{} - using compiled defaults", e);
                Self::default()
            }
        }
    }
}

/// Platform config file location (`~/.config/qa-automation/qa-automation.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join(format!("{}.toml", APP_DIR_NAME)))
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("./qa_automation_data"))
}

/// Resolves the root folder from CLI, environment, TOML, then compiled default
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            debug!(module = %self.module_name, "Root folder from TOML config");
            return path.clone();
        }

        default_root_folder()
    }
}

/// Creates the root folder and names the files inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            tracing::info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}
