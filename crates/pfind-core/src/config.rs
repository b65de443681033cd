//! Configuration management for pfind
//!
//! Loads configuration with priority:
//! 1. config.toml (or specified config file)
//! 2. Environment variables referenced as `${VAR_NAME}`
//! 3. Defaults

use crate::auth::{AuthProvider, TokenConfig};
use crate::retry::RetryPolicy;
use crate::types::AmbiguityPolicy;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// pfind configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PfindConfig {
    /// How to obtain Google credentials
    pub auth: AuthProvider,

    pub store: StoreConfig,

    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub versioning: VersioningConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub access: AccessConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreProvider {
    Drive,
    Filesystem,
}

/// Backing store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_provider")]
    pub provider: StoreProvider,

    /// Anchor container id every path is resolved from
    pub root_id: String,

    /// Local directory backing the `filesystem` provider
    pub root_path: Option<PathBuf>,

    #[serde(default = "default_drive_api_base")]
    pub drive_api_base: String,

    #[serde(default = "default_drive_upload_base")]
    pub drive_upload_base: String,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// How long a minted access token is reused
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

/// Where participant files live and what they are called
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_accelerometer_types")]
    pub accelerometer_types: Vec<String>,

    #[serde(default = "default_editable_file")]
    pub editable_file: String,

    #[serde(default = "default_read_only_files")]
    pub read_only_files: [String; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Create attempts per save before giving up with a version conflict
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub ambiguity: AmbiguityPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowlistSourceKind {
    Static,
    File,
    Sheet,
}

/// Allow-list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_allowlist_source")]
    pub source: AllowlistSourceKind,

    #[serde(default)]
    pub users: Vec<String>,

    pub path: Option<PathBuf>,

    pub sheet_id: Option<String>,

    #[serde(default = "default_sheet_range")]
    pub sheet_range: String,

    #[serde(default = "default_sheets_api_base")]
    pub sheets_api_base: String,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Observability configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,

    /// `EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: Option<String>,

    pub service_name: Option<String>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            accelerometer_types: default_accelerometer_types(),
            editable_file: default_editable_file(),
            read_only_files: default_read_only_files(),
        }
    }
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            ambiguity: AmbiguityPolicy::default(),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            source: default_allowlist_source(),
            users: Vec::new(),
            path: None,
            sheet_id: None,
            sheet_range: default_sheet_range(),
            sheets_api_base: default_sheets_api_base(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl PfindConfig {
    /// Load configuration from config.toml in the current directory or a parent
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            p.to_path_buf()
        } else {
            Self::find_config_file()?
        };

        tracing::debug!("Loading configuration from: {:?}", config_path);

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to load config file: {:?}", config_path))
    }

    /// Parse, resolve `${VAR}` references and validate
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: PfindConfig = toml::from_str(contents)?;
        config.resolve_env_vars();
        config.validate()?;
        Ok(config)
    }

    /// Find config.toml by searching current directory and parents
    fn find_config_file() -> Result<PathBuf> {
        let mut current = env::current_dir()?;

        loop {
            let config_path = current.join("config.toml");
            if config_path.exists() {
                return Ok(config_path);
            }

            if !current.pop() {
                break;
            }
        }

        Err(anyhow!(
            "config.toml not found. Create one with: cp config.toml.example config.toml"
        ))
    }

    fn resolve_env_vars(&mut self) {
        if let AuthProvider::Token { ref mut config } = self.auth
            && let Some(resolved) = Self::resolve_env_var(&config.token)
        {
            config.token = resolved;
        }

        if let Some(resolved) = Self::resolve_env_var(&self.store.root_id) {
            self.store.root_id = resolved;
        }

        if let Some(ref sheet) = self.access.sheet_id
            && let Some(resolved) = Self::resolve_env_var(sheet)
        {
            self.access.sheet_id = Some(resolved);
        }
    }

    /// Resolve a single ${VAR_NAME} reference
    fn resolve_env_var(value: &str) -> Option<String> {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            env::var(var_name).ok()
        } else {
            Some(value.to_string())
        }
    }

    /// Reject configurations that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.store.root_id.trim().is_empty() || self.store.root_id.starts_with("${") {
            return Err(anyhow!("store.root_id must name the anchor container"));
        }
        if self.store.provider == StoreProvider::Filesystem && self.store.root_path.is_none() {
            return Err(anyhow!(
                "store.root_path is required for the filesystem provider"
            ));
        }
        if self.versioning.max_attempts == 0 {
            return Err(anyhow!("versioning.max_attempts must be at least 1"));
        }
        if self.layout.accelerometer_types.is_empty() {
            return Err(anyhow!("layout.accelerometer_types must not be empty"));
        }
        if self.layout.editable_file.trim().is_empty()
            || self.layout.read_only_files.iter().any(|f| f.trim().is_empty())
        {
            return Err(anyhow!("layout file names must not be empty"));
        }
        match self.access.source {
            AllowlistSourceKind::File if self.access.path.is_none() => {
                Err(anyhow!("access.path is required for the file allow-list"))
            }
            AllowlistSourceKind::Sheet if self.access.sheet_id.is_none() => {
                Err(anyhow!("access.sheet_id is required for the sheet allow-list"))
            }
            _ => Ok(()),
        }
    }

    /// Create test-friendly defaults (no credentials required)
    pub fn test_defaults() -> Self {
        Self {
            auth: AuthProvider::Token {
                config: TokenConfig {
                    token: "test-token".to_string(),
                },
            },
            store: StoreConfig {
                provider: StoreProvider::Filesystem,
                root_id: "/".to_string(),
                root_path: Some(PathBuf::from("./data")),
                drive_api_base: default_drive_api_base(),
                drive_upload_base: default_drive_upload_base(),
                page_size: default_page_size(),
                token_ttl_secs: default_token_ttl_secs(),
            },
            layout: LayoutConfig::default(),
            versioning: VersioningConfig::default(),
            retry: RetryPolicy::none(),
            access: AccessConfig {
                users: vec!["user@example.edu".to_string()],
                ..AccessConfig::default()
            },
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_store_provider() -> StoreProvider {
    StoreProvider::Drive
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_drive_upload_base() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_token_ttl_secs() -> u64 {
    600
}

fn default_accelerometer_types() -> Vec<String> {
    ["ActiGraph", "GENEActiv", "Axivity", "ActiSleep", "Other"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_editable_file() -> String {
    "part4_nightsummary_sleep_cleaned.csv".to_string()
}

fn default_read_only_files() -> [String; 2] {
    [
        "visualisation_sleep.pdf".to_string(),
        "visualisation_data.pdf".to_string(),
    ]
}

fn default_max_attempts() -> u32 {
    5
}

fn default_allowlist_source() -> AllowlistSourceKind {
    AllowlistSourceKind::Static
}

fn default_sheet_range() -> String {
    "Sheet1!A:A".to_string()
}

fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com/v4".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}
