//! Configuration loading
//!
//! Figment-based layered configuration:
//! 1. Compiled defaults
//! 2. TOML configuration file
//! 3. `KEYWARDEN_*` environment variable overrides (double underscore for
//!    nested fields, e.g. `KEYWARDEN_KEYS__DIRECTORY`)
//!
//! The configuration is constructed once at startup and passed by
//! reference into every operation; there is no ambient global state.

use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default configuration file name, looked up in the current directory
const DEFAULT_CONFIG_FILE: &str = "keywarden.toml";

/// Environment variable prefix
const ENV_PREFIX: &str = "KEYWARDEN";

/// Top-level keywarden configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywardenConfig {
    /// Inventory file settings
    pub inventory: InventoryConfig,
    /// Local key store settings
    pub keys: KeysConfig,
    /// SSH client settings
    pub ssh: SshOptions,
}

/// Inventory file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Path to the CSV inventory file (`name,ip,port,username` with header)
    pub path: PathBuf,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hosts.csv"),
        }
    }
}

/// Local key store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Directory holding the per-host key files (created with mode 0700)
    pub directory: PathBuf,
    /// Prefix for key file names: `<prefix>-<host>` / `<prefix>-<host>.pub`
    pub identity_prefix: String,
    /// Optional ssh-keygen comment; defaults to `keywarden-<host>`
    pub comment: Option<String>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("~/.keywarden/keys"),
            identity_prefix: "identity".to_string(),
            comment: None,
        }
    }
}

/// SSH client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshOptions {
    /// Connection timeout passed to ssh as `-o ConnectTimeout`
    pub connect_timeout_secs: u64,
    /// Outer timeout applied to non-interactive remote commands
    pub command_timeout_secs: u64,
    /// Whether to enforce strict host key checking
    pub strict_host_key_checking: bool,
    /// Extra `-o` options appended verbatim to every invocation
    pub extra_options: Vec<String>,
}

impl Default for SshOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            command_timeout_secs: 60,
            strict_host_key_checking: true,
            extra_options: vec![],
        }
    }
}

impl KeywardenConfig {
    /// Load configuration with the layered approach.
    ///
    /// An explicitly passed path must exist; otherwise the default file
    /// locations are probed and a missing file falls back to compiled
    /// defaults (plus environment overrides).
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));

        match determine_config_path(config_path)? {
            Some(path) if path.exists() => {
                debug!("Loading configuration from {}", path.display());
                figment = figment.merge(Toml::file(&path));
            }
            Some(path) if config_path.is_some() => {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            Some(path) => {
                warn!(
                    "Configuration file not found: {} (using defaults)",
                    path.display()
                );
            }
            None => debug!("No configuration file found, using defaults"),
        }

        figment = figment.merge(Env::prefixed(&format!("{ENV_PREFIX}_")).split("__"));

        let mut config: Self = figment
            .extract()
            .map_err(|err| ConfigError::ParseError {
                details: format!("Failed to parse configuration: {err}"),
            })?;

        config.keys.directory = expand_path(&config.keys.directory)?;
        config.inventory.path = expand_path(&config.inventory.path)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keys.identity_prefix.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                details: "keys.identity_prefix must not be empty".to_string(),
            });
        }
        if self.ssh.connect_timeout_secs == 0 || self.ssh.command_timeout_secs == 0 {
            return Err(ConfigError::ValidationError {
                details: "ssh timeouts must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Render the default configuration as pretty TOML (for `gen-config`)
    pub fn default_toml() -> Result<String, ConfigError> {
        toml::to_string_pretty(&Self::default()).map_err(|err| ConfigError::ParseError {
            details: format!("Failed to serialize default configuration: {err}"),
        })
    }
}

/// Determine the configuration file path with fallback logic
fn determine_config_path(override_path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = override_path {
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(env_path) = std::env::var(format!("{ENV_PREFIX}_CONFIG_PATH")) {
        debug!("Using config path from environment: {env_path}");
        return Ok(Some(PathBuf::from(env_path)));
    }

    let current_dir_config = PathBuf::from(DEFAULT_CONFIG_FILE);
    if current_dir_config.exists() {
        return Ok(Some(current_dir_config));
    }

    let user_config = expand_path(Path::new("~/.config/keywarden/config.toml"))?;
    if user_config.exists() {
        return Ok(Some(user_config));
    }

    Ok(None)
}

/// Expand a leading tilde using `HOME`
fn expand_path(path: &Path) -> Result<PathBuf, ConfigError> {
    let raw = path.to_string_lossy();
    if let Some(rest) = raw.strip_prefix('~') {
        let home = std::env::var("HOME").map_err(|_| ConfigError::EnvironmentError {
            var: "HOME".to_string(),
            details: "HOME environment variable not set".to_string(),
        })?;
        let rest = rest.trim_start_matches('/');
        if rest.is_empty() {
            return Ok(PathBuf::from(home));
        }
        return Ok(PathBuf::from(home).join(rest));
    }
    Ok(path.to_path_buf())
}
