//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a single TOML file. Every field carries a
//! serde default, so a missing file or a partial file is never fatal: the
//! service logs a warning and starts with built-in values.
//!
//! Root folder priority:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML `root_folder`
//! 4. OS-dependent default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "REDACTOR_ROOT_FOLDER";

/// File name of the TOML config inside the root folder
pub const CONFIG_FILE_NAME: &str = "redactor.toml";

/// File name of the SQLite database inside the root folder
pub const DATABASE_FILE_NAME: &str = "redactor.db";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub drive: DriveConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stdout if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Text-generation provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// API key (lowest priority source, see service config resolution)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// Candidate models in preference order
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Whole-request timeout for one provider call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_provider_base_url(),
            models: default_models(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Stage pipeline limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Characters of the draft handed to the review and final stages
    #[serde(default = "default_review_cutoff_chars")]
    pub review_cutoff_chars: usize,

    #[serde(default = "default_planning_max_output")]
    pub planning_max_output: u32,

    #[serde(default = "default_drafting_max_output")]
    pub drafting_max_output: u32,

    #[serde(default = "default_reviewing_max_output")]
    pub reviewing_max_output: u32,

    #[serde(default = "default_finalizing_max_output")]
    pub finalizing_max_output: u32,

    /// Cap on the plan returned to non-streaming callers (no cap when unset)
    #[serde(default)]
    pub plan_transport_limit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            review_cutoff_chars: default_review_cutoff_chars(),
            planning_max_output: default_planning_max_output(),
            drafting_max_output: default_drafting_max_output(),
            reviewing_max_output: default_reviewing_max_output(),
            finalizing_max_output: default_finalizing_max_output(),
            plan_transport_limit: None,
        }
    }
}

/// Background batch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    /// Pause between consecutive jobs
    #[serde(default = "default_batch_delay_secs")]
    pub delay_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_batch_delay_secs(),
        }
    }
}

/// Document store and OAuth client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriveConfig {
    /// Target folder for uploaded articles
    #[serde(default = "default_folder_name")]
    pub folder_name: String,

    #[serde(default = "default_drive_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_drive_upload_base_url")]
    pub upload_base_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            folder_name: default_folder_name(),
            api_base_url: default_drive_api_base_url(),
            upload_base_url: default_drive_upload_base_url(),
            client_id: String::new(),
            client_secret: String::new(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_provider_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_models() -> Vec<String> {
    [
        "gemini-2.0-flash",
        "gemini-2.0-flash-lite",
        "gemini-1.5-flash",
        "gemini-1.5-pro",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_review_cutoff_chars() -> usize {
    12_000
}

fn default_planning_max_output() -> u32 {
    2048
}

fn default_drafting_max_output() -> u32 {
    8192
}

fn default_reviewing_max_output() -> u32 {
    2048
}

fn default_finalizing_max_output() -> u32 {
    8192
}

fn default_batch_delay_secs() -> u64 {
    3
}

fn default_folder_name() -> String {
    "Redactor Articles".to_string()
}

fn default_drive_api_base_url() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_drive_upload_base_url() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_redirect_uri() -> String {
    "http://localhost:5000/oauth2callback".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/drive.file".to_string()]
}

/// Load the TOML config file
///
/// A missing file yields defaults with a warning. A file that exists but does
/// not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using built-in defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<TomlConfig>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Resolve the root folder: CLI → ENV → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: Option<&TomlConfig>) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml.and_then(|t| t.root_folder.clone()) {
        return path;
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("redactor"))
        .unwrap_or_else(|| PathBuf::from("./redactor_data"))
}

/// Creates the root folder and names the files that live in it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            debug!("Created root folder {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root_folder.join(CONFIG_FILE_NAME)
    }
}
