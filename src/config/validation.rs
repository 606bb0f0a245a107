//! Configuration validation for the rcbu client

use tracing::{error, info, warn};

use crate::config::settings::{ApiConfig, AuthConfig, BackupConfig, RseConfig, Settings};
use crate::{RcbuError, RcbuResult};

/// Collects configuration warnings and errors beyond the per-field rules
pub struct ConfigurationValidator {
    /// Whether to perform strict validation (fails on warnings)
    strict_mode: bool,
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigurationValidator {
    pub fn new(strict_mode: bool) -> Self {
        Self {
            strict_mode,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Validate complete configuration
    pub fn validate_settings(&mut self, settings: &Settings) -> RcbuResult<()> {
        info!("Starting configuration validation");

        if let Err(e) = settings.validate_all() {
            self.errors.push(e.to_string());
        }

        self.validate_api_config(&settings.api);
        self.validate_auth_config(&settings.auth);
        self.validate_rse_config(&settings.rse);
        self.validate_backup_config(&settings.backup);

        if let Some(level) = &settings.log_level {
            match level.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => {}
                other => {
                    self.warnings.push(format!(
                        "Non-standard log level: {}. Recommended: trace, debug, info, warn, error",
                        other
                    ));
                }
            }
        }

        self.print_validation_summary();

        if !self.errors.is_empty() {
            return Err(RcbuError::configuration(format!(
                "Configuration validation failed with {} errors",
                self.errors.len()
            )));
        }

        if self.strict_mode && !self.warnings.is_empty() {
            return Err(RcbuError::configuration(format!(
                "Configuration validation failed in strict mode with {} warnings",
                self.warnings.len()
            )));
        }

        info!("Configuration validation passed");
        Ok(())
    }

    fn validate_api_config(&mut self, api: &ApiConfig) {
        if api.host.contains("://") {
            self.errors.push(format!(
                "api.host must be a bare host name, not a URL: {}",
                api.host
            ));
        }

        if !api.ssl_enabled {
            self.warnings
                .push("SSL is disabled; auth tokens will be sent in clear text".to_string());
        }

        if api.request_timeout < 10 {
            self.warnings.push(format!(
                "api.request_timeout is very short ({}s). Agent wake calls may fail",
                api.request_timeout
            ));
        }
    }

    fn validate_auth_config(&mut self, auth: &AuthConfig) {
        if auth.token.is_some() && auth.api_key.is_some() {
            self.warnings.push(
                "Both auth.token and auth.api_key are set; the static token takes precedence"
                    .to_string(),
            );
        }

        if !auth.identity_url.starts_with("https://") {
            self.warnings.push(format!(
                "Identity endpoint is not HTTPS: {}",
                auth.identity_url
            ));
        }
    }

    fn validate_rse_config(&mut self, rse: &RseConfig) {
        if rse.agent_key.is_none() && rse.api_host.is_none() {
            self.warnings.push(
                "rse.agent_key is not set; direct RSE heartbeat monitoring will be rejected"
                    .to_string(),
            );
        }

        if rse.poll_interval_ms >= rse.timeout_ms {
            self.warnings.push(format!(
                "rse.poll_interval_ms ({}) is not below rse.timeout_ms ({}); only one heartbeat poll fits",
                rse.poll_interval_ms, rse.timeout_ms
            ));
        }

        if let Some(path) = &rse.log_file {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    self.errors.push(format!(
                        "RSE log file directory does not exist: {:?}",
                        parent
                    ));
                }
            }
        }
    }

    fn validate_backup_config(&mut self, backup: &BackupConfig) {
        if backup.poll_interval < 10 {
            self.warnings.push(format!(
                "backup.poll_interval is very short ({}s). Reports are rate limited server side",
                backup.poll_interval
            ));
        }
    }

    fn print_validation_summary(&self) {
        for warning in &self.warnings {
            warn!("Configuration warning: {}", warning);
        }
        for err in &self.errors {
            error!("Configuration error: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.auth.username = Some("demo".to_string());
        settings.auth.api_key = Some("key".to_string());
        settings.rse.agent_key = Some("agent-key".to_string());
        settings
    }

    #[test]
    fn test_valid_settings_pass() {
        let mut validator = ConfigurationValidator::new(true);
        assert!(validator.validate_settings(&valid_settings()).is_ok());
        assert!(validator.warnings().is_empty());
    }

    #[test]
    fn test_url_host_is_error() {
        let mut settings = valid_settings();
        settings.api.host = "https://dfw.backup.api.rackspacecloud.com".to_string();

        let mut validator = ConfigurationValidator::new(false);
        assert!(validator.validate_settings(&settings).is_err());
        assert_eq!(validator.errors().len(), 1);
    }

    #[test]
    fn test_strict_mode_fails_on_warnings() {
        let mut settings = valid_settings();
        settings.api.ssl_enabled = false;

        let mut lenient = ConfigurationValidator::new(false);
        assert!(lenient.validate_settings(&settings).is_ok());

        let mut strict = ConfigurationValidator::new(true);
        assert!(strict.validate_settings(&settings).is_err());
    }

    #[test]
    fn test_missing_credentials_reported_as_error() {
        let mut settings = valid_settings();
        settings.auth.api_key = None;

        let mut validator = ConfigurationValidator::new(false);
        assert!(validator.validate_settings(&settings).is_err());
        assert!(validator.errors()[0].contains("auth.token"));
    }
}
