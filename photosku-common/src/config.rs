//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. Every value has a compiled
//! default, so a missing file is a warning rather than a startup failure.
//!
//! Resolution priority (highest first):
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "PHOTOSKU_ROOT_FOLDER";
/// Shorter alias, lower priority than [`ROOT_FOLDER_ENV`]
pub const ROOT_ENV: &str = "PHOTOSKU_ROOT";
/// Environment variable naming the TOML config file
pub const CONFIG_ENV: &str = "PHOTOSKU_CONFIG";

const DEFAULT_DATABASE_FILE: &str = "photosku.db";
const DEFAULT_OBJECTS_DIR: &str = "objects";

/// Compiled defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub http_bind: String,
    pub telegram_api_base: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "linux") {
            // ~/.local/share/photosku (or /var/lib/photosku for system-wide)
            dirs::data_local_dir()
                .map(|d| d.join("photosku"))
                .unwrap_or_else(|| PathBuf::from("/var/lib/photosku"))
        } else if cfg!(target_os = "macos") {
            dirs::data_dir()
                .map(|d| d.join("photosku"))
                .unwrap_or_else(|| PathBuf::from("/Library/Application Support/photosku"))
        } else if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("photosku"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\photosku"))
        } else {
            PathBuf::from("./photosku_data")
        };

        Self {
            root_folder,
            log_level: default_log_level(),
            http_bind: default_http_bind(),
            telegram_api_base: default_api_base(),
        }
    }
}

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder for the database and object store (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// SQLite database file, relative to the root folder unless absolute
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Filesystem object store directory, relative to the root folder unless absolute
    #[serde(default = "default_objects_path")]
    pub objects_path: PathBuf,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Support contact text shown by the support command
    #[serde(default)]
    pub support_text: Option<String>,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            database_path: default_database_path(),
            objects_path: default_objects_path(),
            telegram: TelegramConfig::default(),
            http: HttpConfig::default(),
            dispatcher: DispatcherConfig::default(),
            logging: LoggingConfig::default(),
            support_text: None,
        }
    }
}

/// How updates arrive from Telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    #[default]
    Polling,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub token: Option<String>,

    /// File holding the token (e.g. a mounted secret); trimmed on read
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Long-polling timeout for getUpdates
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    #[serde(default)]
    pub mode: UpdateMode,

    /// Public URL registered with setWebhook in webhook mode
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// Expected X-Telegram-Bot-Api-Secret-Token header in webhook mode
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_file: None,
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
            mode: UpdateMode::default(),
            webhook_url: None,
            webhook_secret: None,
        }
    }
}

impl TelegramConfig {
    /// Resolve the bot token: CLI/env value, then `token`, then `token_file`
    pub fn resolve_token(&self, cli_or_env: Option<&str>) -> Result<String> {
        if let Some(token) = cli_or_env.map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }

        if let Some(token) = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return Ok(token.to_string());
        }

        if let Some(path) = &self.token_file {
            return read_secret_file(path);
        }

        Err(Error::Config(
            "Telegram bot token is required (--token, PHOTOSKU_TELEGRAM_TOKEN, telegram.token or telegram.token_file)"
                .to_string(),
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listener for the health endpoint and the webhook receiver
    #[serde(default = "default_http_bind")]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_http_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Per-user inbound queue capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Seconds an idle per-user worker lingers before exiting
    #[serde(default = "default_worker_idle_secs")]
    pub worker_idle_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            worker_idle_secs: default_worker_idle_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_FILE)
}

fn default_objects_path() -> PathBuf {
    PathBuf::from(DEFAULT_OBJECTS_DIR)
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_http_bind() -> String {
    "127.0.0.1:5780".to_string()
}

fn default_queue_capacity() -> usize {
    32
}

fn default_worker_idle_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load configuration
    ///
    /// An explicit path (CLI or `PHOTOSKU_CONFIG`) must exist. Without one the
    /// platform locations are tried; if none exists, compiled defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Some(Path::new(&path)));
        }

        match default_config_file() {
            Some(path) => Self::from_file(&path),
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a specific TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid config {}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// Locate the platform config file, if any exists
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("photosku").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/photosku/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Read a secret from a file, trimming surrounding whitespace
pub fn read_secret_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read secret file {}: {}", path.display(), e))
    })?;
    let secret = content.trim();
    if secret.is_empty() {
        return Err(Error::Config(format!("Secret file {} is empty", path.display())));
    }
    Ok(secret.to_string())
}

/// Root folder resolution following the priority order above
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variables
        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        // Priority 4: compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives paths inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
            info!("Created root folder: {}", self.root.display());
        }
        Ok(())
    }

    /// Resolve a configured path against the root folder
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn database_path(&self, config: &TomlConfig) -> PathBuf {
        self.resolve_path(&config.database_path)
    }

    pub fn objects_path(&self, config: &TomlConfig) -> PathBuf {
        self.resolve_path(&config.objects_path)
    }
}
