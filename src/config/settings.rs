use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use validator::Validate;

use crate::{RcbuError, RcbuResult, ResultExt};

pub const DEFAULT_API_HOST: &str = "dfw.backup.api.rackspacecloud.com";
pub const DEFAULT_IDENTITY_URL: &str = "https://identity.api.rackspacecloud.com";

/// Client-wide configuration loaded from config.toml and environment variables
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Settings {
    pub log_level: Option<String>,
    #[validate(nested)]
    pub api: ApiConfig,
    #[validate(nested)]
    pub auth: AuthConfig,
    #[validate(nested)]
    pub rse: RseConfig,
    #[validate(nested)]
    pub backup: BackupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ApiConfig {
    #[validate(length(min = 1, message = "api host must not be empty"))]
    pub host: String,
    pub ssl_enabled: bool,
    /// Per-request timeout in seconds
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct AuthConfig {
    #[validate(url)]
    pub identity_url: String,
    pub username: Option<String>,
    pub api_key: Option<String>,
    /// Pre-issued token; skips the identity service when set
    pub token: Option<String>,
}

/// Real-time Streaming Events settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RseConfig {
    #[validate(length(min = 1))]
    pub app: String,
    #[validate(length(min = 1))]
    pub app_version: String,
    pub agent_key: Option<String>,
    /// Route RSE reads through this API host instead of the agent's RSE host
    pub api_host: Option<String>,
    pub log_file: Option<PathBuf>,
    /// Milliseconds allowed for waking agents and for seeing a heartbeat
    #[validate(range(min = 1000))]
    pub timeout_ms: u64,
    /// Delay between heartbeat polls
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct BackupConfig {
    /// Seconds to wait after a manual start before reporting status
    pub start_delay: u64,
    #[validate(range(min = 1))]
    pub poll_interval: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_API_HOST.to_string(),
            ssl_enabled: true,
            request_timeout: 60,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity_url: DEFAULT_IDENTITY_URL.to_string(),
            username: None,
            api_key: None,
            token: None,
        }
    }
}

impl Default for RseConfig {
    fn default() -> Self {
        Self {
            app: "rcbu".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            agent_key: None,
            api_host: None,
            log_file: None,
            timeout_ms: 60_000,
            poll_interval_ms: 1_000,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            start_delay: 15,
            poll_interval: 60,
        }
    }
}

impl Settings {
    /// Load settings: defaults, then the config file (if present), then environment.
    pub fn load(path: Option<&Path>) -> RcbuResult<Self> {
        let path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(RcbuError::configuration(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => {
                let default = Self::config_path();
                default.exists().then_some(default)
            }
        };

        let mut settings = match path {
            Some(path) => {
                info!("Using config file: {}", path.display());
                Self::from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> RcbuResult<Self> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).with_config_context(&display)?;
        toml::from_str(&content).with_config_context(&display)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RCBU_API_HOST") {
            self.api.host = val;
        }

        if let Ok(val) = std::env::var("RCBU_IDENTITY_URL") {
            self.auth.identity_url = val;
        }

        if let Ok(val) = std::env::var("RCBU_USERNAME") {
            self.auth.username = Some(val);
        }

        if let Ok(val) = std::env::var("RCBU_API_KEY") {
            self.auth.api_key = Some(val);
        }

        if let Ok(val) = std::env::var("RCBU_TOKEN") {
            self.auth.token = Some(val);
        }

        if let Ok(val) = std::env::var("RCBU_AGENT_KEY") {
            self.rse.agent_key = Some(val);
        }

        if let Ok(val) = std::env::var("RCBU_LOG_LEVEL") {
            self.log_level = Some(val);
        }
    }

    pub fn config_path() -> PathBuf {
        if let Ok(custom_path) = std::env::var("RCBU_CONFIG_PATH") {
            PathBuf::from(custom_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rcbu")
                .join("config.toml")
        }
    }

    /// Field-level validation followed by cross-field checks
    pub fn validate_all(&self) -> RcbuResult<()> {
        self.validate()
            .map_err(|e| RcbuError::configuration(e.to_string()))?;

        if self.auth.token.is_none()
            && (self.auth.username.is_none() || self.auth.api_key.is_none())
        {
            return Err(RcbuError::configuration(
                "either auth.token or both auth.username and auth.api_key must be set",
            ));
        }

        Ok(())
    }
}
