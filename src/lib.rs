//! rcbu - Rackspace Cloud Backup client
//!
//! Async client library for the Rackspace Cloud Backup v1.0 REST API:
//! agent details and configuration, agent wake-up and RSE heartbeat
//! monitoring, agent log levels, and manual backup control.

pub mod cli;
pub mod client;
pub mod config;
pub mod models;

/// Application-wide error types with context preservation
#[derive(Debug, thiserror::Error)]
pub enum RcbuError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Invalid parameters: {0}")]
    Parameter(String),

    #[error("API request failed with status {status}: {reason}")]
    Api {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("Invalid auth token")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Agent details not available for machine agent id {0}")]
    AgentDetailsNotAvailable(u64),

    #[error("Agent configuration not available for machine agent id {0}")]
    AgentConfigurationNotAvailable(u64),

    #[error("Backup configuration not found: {0}")]
    BackupConfigurationNotFound(String),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Unexpected response: {message}")]
    UnexpectedResponse { message: String },

    #[error("Timed out: {message}")]
    Timeout { message: String },

    #[error("HTTP error: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl RcbuError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create an API error from a failed response's parts
    pub fn api(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Create an unexpected response error
    pub fn unexpected_response(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            RcbuError::Api { status, .. } => Some(*status),
            RcbuError::Unauthorized => Some(401),
            RcbuError::Forbidden(_) => Some(403),
            RcbuError::Http { source } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            RcbuError::Configuration { .. } | RcbuError::Parameter(_) => 2,
            RcbuError::Authentication { .. } | RcbuError::Unauthorized => 3,
            RcbuError::Forbidden(_) => 4,
            RcbuError::Timeout { .. } => 5,
            _ => 1,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            RcbuError::Configuration { message } => {
                format!("Configuration issue: {}", message)
            }
            RcbuError::Authentication { message } => {
                format!("Could not authenticate: {}", message)
            }
            RcbuError::Parameter(message) => {
                format!("Invalid parameters: {}", message)
            }
            RcbuError::Api { status, reason, body } => {
                if body.is_empty() {
                    format!("Server returned {} ({})", status, reason)
                } else {
                    format!("Server returned {} ({}): {}", status, reason, body)
                }
            }
            RcbuError::Unauthorized => "Invalid auth token".to_string(),
            RcbuError::Forbidden(message) => {
                format!("Permission denied: {}", message)
            }
            RcbuError::AgentDetailsNotAvailable(id) => {
                format!(
                    "Machine agent id ({}) not available. Were the agent details fetched first?",
                    id
                )
            }
            RcbuError::AgentConfigurationNotAvailable(id) => {
                format!(
                    "Machine agent id ({}) not available. Was the agent configuration fetched first?",
                    id
                )
            }
            RcbuError::BackupConfigurationNotFound(name) => {
                format!("No backup configuration named or numbered {}", name)
            }
            RcbuError::InvalidLogLevel(level) => {
                format!(
                    "Log level ({}) is not valid. Use Fatal, Error, Warn, Info, Debug, Trace, All or 1-7",
                    level
                )
            }
            RcbuError::UnexpectedResponse { message } => {
                format!("Unexpected response: {}", message)
            }
            RcbuError::Timeout { message } => {
                format!("Timed out: {}", message)
            }
            RcbuError::Http { source } => {
                format!("Communication error: {}", source)
            }
            RcbuError::Io { source } => {
                format!("File system error: {}", source)
            }
            RcbuError::Serialization { source } => {
                format!("Data format error: {}", source)
            }
        }
    }
}

/// Convenience type alias for Results
pub type RcbuResult<T> = Result<T, RcbuError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    fn with_agent_context(self, machine_agent_id: u64) -> RcbuResult<T>;
    fn with_config_context(self, path: &str) -> RcbuResult<T>;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn with_agent_context(self, machine_agent_id: u64) -> RcbuResult<T> {
        self.map_err(|e| {
            RcbuError::unexpected_response(format!(
                "machine agent {}: {}",
                machine_agent_id,
                e.into()
            ))
        })
    }

    fn with_config_context(self, path: &str) -> RcbuResult<T> {
        self.map_err(|e| {
            RcbuError::configuration(format!("{}: {}", path, e.into()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = RcbuError::configuration("missing api key");
        assert_eq!(err.exit_code(), 2);
        assert!(err.user_message().contains("Configuration issue"));
    }

    #[test]
    fn test_api_error_status() {
        let err = RcbuError::api(503, "Service Unavailable", "");
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.user_message(), "Server returned 503 (Service Unavailable)");
        assert_eq!(RcbuError::Unauthorized.status(), Some(401));
    }

    #[test]
    fn test_missing_cache_messages() {
        let err = RcbuError::AgentDetailsNotAvailable(42);
        assert!(err.user_message().contains("(42)"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_result_extension() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));

        let rcbu_result = result.with_config_context("/etc/rcbu/config.toml");
        match rcbu_result {
            Err(RcbuError::Configuration { message }) => {
                assert!(message.starts_with("/etc/rcbu/config.toml"));
            }
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }
}
