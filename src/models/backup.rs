use serde::{Deserialize, Serialize};
use std::fmt;

use super::agent::EncryptionKey;

/// Lifecycle state of a backup job as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BackupState {
    Queued,
    Preparing,
    InProgress,
    Completed,
    CompletedWithErrors,
    Failed,
    Stopped,
    Skipped,
    Missed,
    /// Any state name this client does not know about
    Other(String),
}

impl BackupState {
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            BackupState::Queued | BackupState::Preparing | BackupState::InProgress
        )
    }

    pub fn is_done(&self) -> bool {
        matches!(
            self,
            BackupState::Completed
                | BackupState::CompletedWithErrors
                | BackupState::Failed
                | BackupState::Stopped
                | BackupState::Skipped
                | BackupState::Missed
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            BackupState::Queued => "Queued",
            BackupState::Preparing => "Preparing",
            BackupState::InProgress => "InProgress",
            BackupState::Completed => "Completed",
            BackupState::CompletedWithErrors => "CompletedWithErrors",
            BackupState::Failed => "Failed",
            BackupState::Stopped => "Stopped",
            BackupState::Skipped => "Skipped",
            BackupState::Missed => "Missed",
            BackupState::Other(name) => name,
        }
    }
}

impl From<String> for BackupState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Queued" => BackupState::Queued,
            "Preparing" => BackupState::Preparing,
            "InProgress" => BackupState::InProgress,
            "Completed" => BackupState::Completed,
            "CompletedWithErrors" => BackupState::CompletedWithErrors,
            "Failed" => BackupState::Failed,
            "Stopped" => BackupState::Stopped,
            "Skipped" => BackupState::Skipped,
            "Missed" => BackupState::Missed,
            _ => BackupState::Other(value),
        }
    }
}

impl From<BackupState> for String {
    fn from(state: BackupState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for BackupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backup job record, e.g. from `GET /v1.0/backup/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupRecord {
    pub backup_id: u64,
    pub current_state: BackupState,
    #[serde(default)]
    pub backup_configuration_id: Option<u64>,
    #[serde(default)]
    pub machine_agent_id: Option<u64>,
    #[serde(default)]
    pub machine_name: Option<String>,
    /// Null for backups that are not encrypted
    #[serde(default)]
    pub encryption_key: Option<EncryptionKey>,
}

/// Completion report from `GET /v1.0/backup/report/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupReport {
    pub backup_id: u64,
    pub state: BackupState,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub completed_time: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub files_searched: Option<u64>,
    #[serde(default)]
    pub bytes_searched: Option<String>,
    #[serde(default)]
    pub files_backed_up: Option<u64>,
    #[serde(default)]
    pub bytes_backed_up: Option<String>,
    #[serde(default)]
    pub num_errors: Option<u64>,
    #[serde(default)]
    pub error_list: Vec<serde_json::Value>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub diagnostics: Option<String>,
    #[serde(default)]
    pub backup_destination: Option<String>,
    #[serde(default)]
    pub computer_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupAction {
    StartManual,
    StopManual,
}

/// Body of `POST /v1.0/backup/action-requested`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActionRequest {
    pub action: BackupAction,
    /// Backup configuration id when starting, backup id when stopping
    pub id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_classification() {
        for running in ["Queued", "Preparing", "InProgress"] {
            let state = BackupState::from(running.to_string());
            assert!(state.is_running(), "{} should be running", running);
            assert!(!state.is_done());
        }
        for done in ["Completed", "CompletedWithErrors", "Failed", "Stopped", "Skipped", "Missed"] {
            let state = BackupState::from(done.to_string());
            assert!(state.is_done(), "{} should be done", done);
            assert!(!state.is_running());
        }

        let unknown = BackupState::from("Verifying".to_string());
        assert!(!unknown.is_done() && !unknown.is_running());
        assert_eq!(unknown.to_string(), "Verifying");
    }

    #[test]
    fn test_record_parse() {
        let record: BackupRecord = serde_json::from_value(json!({
            "BackupId": 555,
            "BackupConfigurationId": 10,
            "CurrentState": "InProgress",
            "MachineAgentId": 123456,
            "MachineName": "web-01",
            "EncryptionKey": {"ModulusHex": "ab12", "ExponentHex": "10001"}
        }))
        .unwrap();

        assert_eq!(record.current_state, BackupState::InProgress);
        assert_eq!(record.backup_configuration_id, Some(10));
        assert_eq!(
            record.encryption_key.map(|key| key.exponent_hex).as_deref(),
            Some("10001")
        );
    }

    #[test]
    fn test_record_without_key_or_details() {
        let record: BackupRecord = serde_json::from_value(json!({
            "BackupId": 556,
            "CurrentState": "Completed",
            "EncryptionKey": null
        }))
        .unwrap();

        assert_eq!(record.current_state, BackupState::Completed);
        assert_eq!(record.backup_configuration_id, None);
        assert!(record.machine_name.is_none());
        assert!(record.encryption_key.is_none());
    }

    #[test]
    fn test_action_request_wire_format() {
        let body = serde_json::to_value(ActionRequest {
            action: BackupAction::StartManual,
            id: 10,
        })
        .unwrap();
        assert_eq!(body, json!({"Action": "StartManual", "Id": 10}));
    }
}
