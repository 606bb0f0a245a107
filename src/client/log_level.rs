//! Agent log level control with per-agent save/restore stacks

use reqwest::StatusCode;
use serde_json::json;
use std::collections::HashMap;
use tracing::{error, info, warn};

use super::transport::{api_error, ApiClient, ApiRequest};
use crate::models::LogLevel;
use crate::RcbuResult;

pub struct AgentLogLevels {
    client: ApiClient,
    saved: HashMap<u64, Vec<LogLevel>>,
}

impl AgentLogLevels {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            saved: HashMap::new(),
        }
    }

    /// Current level as reported by the API
    pub async fn get_log_level(&self, machine_agent_id: u64) -> RcbuResult<LogLevel> {
        let response = self
            .client
            .send(ApiRequest::get(format!("/v1.0/agent/logging/{}", machine_agent_id)))
            .await?;

        if response.status() != StatusCode::OK {
            let err = api_error(response).await;
            error!(
                "Unable to retrieve agent log level for machine agent id {}: {}",
                machine_agent_id, err
            );
            return Err(err);
        }

        // Body is a JSON string such as "Warn", quotes included
        response.text().await?.parse()
    }

    pub async fn set_log_level(&self, machine_agent_id: u64, level: LogLevel) -> RcbuResult<()> {
        let request = ApiRequest::put("/v1.0/agent/logging").with_json(&json!({
            "MachineAgentId": machine_agent_id,
            "LoggingLevelid": level.id(),
        }))?;

        let response = self.client.send(request).await?;
        if response.status() == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            let err = api_error(response).await;
            error!("Unable to set the log level to {}: {}", level, err);
            Err(err)
        }
    }

    /// Save the current level, then switch to `level`. Undo with [`Self::pop_log_level`].
    pub async fn push_log_level(&mut self, machine_agent_id: u64, level: LogLevel) -> RcbuResult<()> {
        let current = self.get_log_level(machine_agent_id).await?;
        self.saved.entry(machine_agent_id).or_default().push(current);
        self.set_log_level(machine_agent_id, level).await
    }

    pub fn has_log_levels(&self, machine_agent_id: u64) -> bool {
        self.saved
            .get(&machine_agent_id)
            .is_some_and(|levels| !levels.is_empty())
    }

    /// Restore the most recently saved level.
    ///
    /// The saved entry is only discarded once the API accepted it. Returns
    /// `None` when nothing was saved for the agent.
    pub async fn pop_log_level(&mut self, machine_agent_id: u64) -> RcbuResult<Option<LogLevel>> {
        let Some(level) = self
            .saved
            .get(&machine_agent_id)
            .and_then(|levels| levels.last().copied())
        else {
            warn!(
                "Machine Agent Id ({}) does not have any stacked log levels",
                machine_agent_id
            );
            return Ok(None);
        };

        if let Err(e) = self.set_log_level(machine_agent_id, level).await {
            error!(
                "Error while resetting the log level for Machine Agent Id ({}) to {}",
                machine_agent_id, level
            );
            return Err(e);
        }

        if let Some(levels) = self.saved.get_mut(&machine_agent_id) {
            levels.pop();
        }
        info!(
            "Restored Machine Agent Id ({}) Log Level to {}",
            machine_agent_id, level
        );
        Ok(Some(level))
    }

    /// Unwind every saved level for every agent
    pub async fn restore_all(&mut self) -> RcbuResult<()> {
        let agents: Vec<u64> = self.saved.keys().copied().collect();
        for machine_agent_id in agents {
            while self.has_log_levels(machine_agent_id) {
                self.pop_log_level(machine_agent_id).await?;
            }
        }
        Ok(())
    }
}

impl Drop for AgentLogLevels {
    fn drop(&mut self) {
        for (machine_agent_id, levels) in &self.saved {
            if !levels.is_empty() {
                warn!(
                    "Dropping {} unrestored log level(s) for Machine Agent Id ({})",
                    levels.len(),
                    machine_agent_id
                );
            }
        }
    }
}
