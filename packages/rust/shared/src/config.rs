//! Application configuration for Flowsmith.
//!
//! User config lives at `~/.flowsmith/flowsmith.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FlowsmithError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "flowsmith.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".flowsmith";

/// Provider used when the caller names none.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Model used when the caller names none.
pub const DEFAULT_MODEL: &str = "gpt-4o";

// ---------------------------------------------------------------------------
// Config structs (matching flowsmith.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Oracle request settings shared by every provider.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Per-provider settings keyed by provider name.
    #[serde(default = "builtin_providers")]
    pub providers: BTreeMap<String, ProviderConfig>,

    /// Component registry source.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Credential storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Flow graph layout constants.
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            oracle: OracleConfig::default(),
            providers: builtin_providers(),
            registry: RegistryConfig::default(),
            storage: StorageConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl AppConfig {
    /// Add any built-in provider the user config does not mention.
    pub fn with_builtin_providers(mut self) -> Self {
        for (name, provider) in builtin_providers() {
            self.providers.entry(name).or_insert(provider);
        }
        self
    }

    /// Make `provider` the default. With a `model` it also becomes that
    /// provider's default model; without one `defaults.model` follows the
    /// provider's configured model, so no stale model from another provider
    /// is kept.
    pub fn select_provider(&mut self, provider: &str, model: Option<&str>) {
        self.defaults.provider = provider.to_string();
        let entry = self.providers.get_mut(provider);
        match (model, entry) {
            (Some(model), Some(entry)) => {
                entry.default_model = model.to_string();
                self.defaults.model = model.to_string();
            }
            (Some(model), None) => self.defaults.model = model.to_string(),
            (None, Some(entry)) => self.defaults.model = entry.default_model.clone(),
            (None, None) => {}
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Oracle provider used when a request names none.
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model used when neither the request nor the provider names one.
    #[serde(default = "default_model")]
    pub model: String,

    /// Principal used by the CLI for credential lookups.
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            user_id: default_user_id(),
        }
    }
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.into()
}
fn default_model() -> String {
    DEFAULT_MODEL.into()
}
fn default_user_id() -> String {
    "local".into()
}

/// `[oracle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Upper bound on a single oracle dispatch, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature sent to providers that accept one.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    4096
}

/// `[providers.<name>]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name of the env var (and stored credential) holding the API key.
    /// `None` for providers that need no key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// API base URL.
    pub base_url: String,

    /// Model suggested for this provider in `providers list`.
    pub default_model: String,
}

fn builtin_providers() -> BTreeMap<String, ProviderConfig> {
    let mut providers = BTreeMap::new();
    providers.insert(
        "openai".to_string(),
        ProviderConfig {
            api_key_env: Some("OPENAI_API_KEY".into()),
            base_url: "https://api.openai.com/v1".into(),
            default_model: "gpt-4o".into(),
        },
    );
    providers.insert(
        "anthropic".to_string(),
        ProviderConfig {
            api_key_env: Some("ANTHROPIC_API_KEY".into()),
            base_url: "https://api.anthropic.com/v1".into(),
            default_model: "claude-3-5-sonnet-latest".into(),
        },
    );
    providers.insert(
        "openrouter".to_string(),
        ProviderConfig {
            api_key_env: Some("OPENROUTER_API_KEY".into()),
            base_url: "https://openrouter.ai/api/v1".into(),
            default_model: "openai/gpt-4o".into(),
        },
    );
    providers.insert(
        "ollama".to_string(),
        ProviderConfig {
            api_key_env: None,
            base_url: "http://localhost:11434".into(),
            default_model: "llama3.1".into(),
        },
    );
    providers
}

/// `[registry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// JSON file of `{category: {name: descriptor}}`.
    #[serde(default = "default_registry_path")]
    pub path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

fn default_registry_path() -> String {
    "~/.flowsmith/components.json".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// libSQL database file for saved credentials.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "~/.flowsmith/flowsmith.db".into()
}

/// `[layout]` section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_node_width")]
    pub node_width: f64,
    #[serde(default = "default_node_height")]
    pub node_height: f64,
    #[serde(default = "default_margin")]
    pub margin: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: default_node_width(),
            node_height: default_node_height(),
            margin: default_margin(),
        }
    }
}

fn default_node_width() -> f64 {
    250.0
}
fn default_node_height() -> f64 {
    150.0
}
fn default_margin() -> f64 {
    50.0
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.flowsmith/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FlowsmithError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.flowsmith/flowsmith.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
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
    let content = std::fs::read_to_string(path).map_err(|e| FlowsmithError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        FlowsmithError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    Ok(config.with_builtin_providers())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    save_config_to(&AppConfig::default(), &path)?;
    tracing::info!(?path, "created default config file");
    Ok(path)
}

/// Persist `config` to the default config file location.
pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let path = config_file_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

/// Persist `config` to `path`, creating parent directories as needed.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| FlowsmithError::io(dir, e))?;
    }
    let content =
        toml::to_string_pretty(config).map_err(|e| FlowsmithError::config(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| FlowsmithError::io(path, e))
}
