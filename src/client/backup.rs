//! Manual backup start/stop and status polling

use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::transport::{api_error, ApiClient, ApiRequest};
use crate::log_event;
use crate::models::{ActionRequest, BackupAction, BackupRecord, BackupReport, BackupState};
use crate::{RcbuError, RcbuResult};

/// Time the agent gets to pick up a freshly requested backup
pub const DEFAULT_START_DELAY: Duration = Duration::from_secs(15);

#[derive(Deserialize)]
struct CurrentState {
    #[serde(rename = "CurrentState")]
    current_state: BackupState,
}

/// Live view of one backup job
#[derive(Clone)]
pub struct BackupStatus {
    client: ApiClient,
    backup_id: u64,
}

impl std::fmt::Debug for BackupStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupStatus")
            .field("backup_id", &self.backup_id)
            .finish_non_exhaustive()
    }
}

impl BackupStatus {
    pub fn new(client: ApiClient, backup_id: u64) -> Self {
        Self { client, backup_id }
    }

    pub fn id(&self) -> u64 {
        self.backup_id
    }

    async fn fetch(&self) -> RcbuResult<reqwest::Response> {
        self.client
            .send_expecting(
                ApiRequest::get(format!("/v1.0/backup/{}", self.backup_id)),
                StatusCode::OK,
            )
            .await
    }

    pub async fn record(&self) -> RcbuResult<BackupRecord> {
        Ok(self.fetch().await?.json().await?)
    }

    /// Current state as reported by the API
    pub async fn state(&self) -> RcbuResult<BackupState> {
        let body: CurrentState = self.fetch().await?.json().await?;
        debug!("Backup {} state: {}", self.backup_id, body.current_state);
        Ok(body.current_state)
    }
}

/// Starts, stops and tracks a manual backup for one backup configuration
pub struct BackupCommand {
    client: ApiClient,
    backup_config_id: u64,
    backup_id: Option<u64>,
    state: Option<BackupState>,
    start_delay: Duration,
}

impl BackupCommand {
    pub fn new(client: ApiClient, backup_config_id: u64) -> Self {
        Self {
            client,
            backup_config_id,
            backup_id: None,
            state: None,
            start_delay: DEFAULT_START_DELAY,
        }
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    /// Track a backup that is already known, e.g. to stop it
    pub fn from_record(client: ApiClient, record: &BackupRecord) -> Self {
        Self {
            client,
            backup_config_id: record.backup_configuration_id.unwrap_or(0),
            backup_id: Some(record.backup_id),
            state: Some(record.current_state.clone()),
            start_delay: DEFAULT_START_DELAY,
        }
    }

    pub fn backup_config_id(&self) -> u64 {
        self.backup_config_id
    }

    /// Backup id once started, 0 before
    pub fn id(&self) -> u64 {
        self.backup_id.unwrap_or(0)
    }

    /// Last state this command observed or caused
    pub fn state(&self) -> Option<&BackupState> {
        self.state.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.state.as_ref().is_some_and(BackupState::is_running)
    }

    async fn request_action(&self, action: BackupAction, id: u64) -> RcbuResult<String> {
        let request = ApiRequest::post("/v1.0/backup/action-requested")
            .with_json(&ActionRequest { action, id })?;
        let response = self.client.send(request).await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response.text().await?)
    }

    /// Request a manual backup and wait for the agent to pick it up
    pub async fn start(&mut self) -> RcbuResult<BackupStatus> {
        let body = self
            .request_action(BackupAction::StartManual, self.backup_config_id)
            .await?;

        let backup_id: u64 = body.trim().trim_matches('"').parse().map_err(|_| {
            RcbuError::unexpected_response(format!(
                "backup start returned a non-numeric id: {:?}",
                body
            ))
        })?;

        self.backup_id = Some(backup_id);
        self.state = Some(BackupState::Preparing);
        log_event!(
            backup = backup_id,
            info,
            "Started backup for configuration {}",
            self.backup_config_id
        );

        tokio::time::sleep(self.start_delay).await;
        Ok(BackupStatus::new(self.client.clone(), backup_id))
    }

    pub async fn stop(&mut self) -> RcbuResult<()> {
        let backup_id = self.backup_id.ok_or_else(|| {
            RcbuError::Parameter(format!(
                "backup for configuration {} was never started",
                self.backup_config_id
            ))
        })?;

        self.request_action(BackupAction::StopManual, backup_id).await?;
        self.state = Some(BackupState::Stopped);
        log_event!(backup = backup_id, info, "Stopped backup");
        Ok(())
    }

    pub async fn report(&self) -> RcbuResult<BackupReport> {
        let backup_id = self.backup_id.ok_or_else(|| {
            RcbuError::Parameter("no backup id to report on".to_string())
        })?;
        let response = self
            .client
            .send_expecting(
                ApiRequest::get(format!("/v1.0/backup/report/{}", backup_id)),
                StatusCode::OK,
            )
            .await?;
        Ok(response.json().await?)
    }

    /// Refresh the state from the backup report
    pub async fn is_done(&mut self) -> RcbuResult<bool> {
        let report = self.report().await?;
        let done = report.state.is_done();
        self.state = Some(report.state);
        Ok(done)
    }

    /// Poll the report every `poll_interval` until the backup finishes
    pub async fn wait_for_completion(&mut self, poll_interval: Duration) -> RcbuResult<BackupReport> {
        loop {
            let report = self.report().await?;
            self.state = Some(report.state.clone());
            if report.state.is_done() {
                info!("Backup {} finished: {}", report.backup_id, report.state);
                return Ok(report);
            }
            debug!(
                "Backup {} still {}; next check in {:?}",
                report.backup_id, report.state, poll_interval
            );
            tokio::time::sleep(poll_interval).await;
        }
    }
}
