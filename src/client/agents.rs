//! Machine agent API: details, configuration, registration and wake-up

use reqwest::StatusCode;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::keep_awake::{self, KeepAwake};
use super::log_level::AgentLogLevels;
use super::rse::{Rse, RseRoute};
use super::transport::{api_error, ApiClient, ApiRequest};
use crate::log_event;
use crate::models::{AgentConfiguration, AgentDetails, AgentSummary, HostFilter, RseTiming};
use crate::{RcbuError, RcbuResult, ResultExt};

/// Pause between consecutive wake or heartbeat polls
pub const DEFAULT_POLL_PAUSE: Duration = Duration::from_secs(1);

/// Client for the `/v1.0/agent` and `/v1.0/user` endpoints.
///
/// Details and configurations are cached per agent once fetched.
pub struct Agents {
    client: ApiClient,
    details: HashMap<u64, AgentDetails>,
    configurations: HashMap<u64, AgentConfiguration>,
    keep_awake: Vec<KeepAwake>,
    log_levels: AgentLogLevels,
    poll_pause: Duration,
}

impl Agents {
    pub fn new(client: ApiClient) -> Self {
        Self {
            log_levels: AgentLogLevels::new(client.clone()),
            client,
            details: HashMap::new(),
            configurations: HashMap::new(),
            keep_awake: Vec::new(),
            poll_pause: DEFAULT_POLL_PAUSE,
        }
    }

    pub fn with_poll_pause(mut self, pause: Duration) -> Self {
        self.poll_pause = pause;
        self
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn log_levels(&mut self) -> &mut AgentLogLevels {
        &mut self.log_levels
    }

    //
    // Wake-up
    //

    /// Ask every agent on the account to switch to active polling.
    /// Agents may take up to a minute to respond.
    pub async fn wake_agents(&self) -> RcbuResult<StatusCode> {
        keep_awake::wake_agents(&self.client).await
    }

    /// Wake all agents and confirm `machine_agent_id` through its RSE heartbeat.
    ///
    /// With `keep_agent_awake`, a background task keeps re-waking the agent
    /// every `wake_period`; when no period is given it is derived from the
    /// agent's real-time heartbeat timeout, which requires its configuration
    /// to be fetched first.
    pub async fn wake_specific_agent(
        &mut self,
        machine_agent_id: u64,
        rse: &Rse,
        timeout: Duration,
        keep_agent_awake: bool,
        wake_period: Option<Duration>,
    ) -> RcbuResult<bool> {
        let route = rse.route(machine_agent_id, self.configurations.get(&machine_agent_id))?;
        let woke = keep_awake::wake_and_confirm(
            &self.client,
            rse,
            &route,
            machine_agent_id,
            timeout,
            self.poll_pause,
        )
        .await;

        if woke && keep_agent_awake {
            let period = match wake_period {
                Some(period) => period,
                None => {
                    let heartbeat = self.rse_heartbeat_config(machine_agent_id)?;
                    debug!("Rse heartbeat config: {:?}", heartbeat);
                    keep_awake::wake_period_from_heartbeat(heartbeat.timeout.real_time)
                }
            };
            self.keep_agent_awake(machine_agent_id, rse, route, period);
        }

        Ok(woke)
    }

    /// Start a background task that keeps the agent awake.
    ///
    /// Any task already running for the agent is signalled to stop first.
    pub fn keep_agent_awake(&mut self, machine_agent_id: u64, rse: &Rse, route: RseRoute, period: Duration) {
        if let Some(index) = self
            .keep_awake
            .iter()
            .position(|handle| handle.machine_agent_id() == machine_agent_id)
        {
            self.keep_awake.swap_remove(index).signal();
        }

        let task_log = rse
            .log_file()
            .map(|path| path.with_extension(format!("agent_{}.log", machine_agent_id)));
        let handle = KeepAwake::spawn(
            self.client.clone(),
            rse.clone_with_log_file(task_log),
            route,
            machine_agent_id,
            period,
            self.poll_pause,
        );
        self.keep_awake.push(handle);
    }

    pub fn is_kept_awake(&self, machine_agent_id: u64) -> bool {
        self.keep_awake
            .iter()
            .any(|handle| handle.machine_agent_id() == machine_agent_id)
    }

    /// Agents with a running keep-awake task, one entry per agent
    pub fn kept_awake_ids(&self) -> Vec<u64> {
        self.keep_awake
            .iter()
            .map(KeepAwake::machine_agent_id)
            .collect()
    }

    /// Stop the keep-awake task for the agent and wait for it to exit
    pub async fn stop_keep_agent_awake(&mut self, machine_agent_id: u64) -> bool {
        match self
            .keep_awake
            .iter()
            .position(|handle| handle.machine_agent_id() == machine_agent_id)
        {
            Some(index) => {
                self.keep_awake.swap_remove(index).stop().await;
                true
            }
            None => false,
        }
    }

    /// Stop every keep-awake task; all are signalled before any is awaited
    pub async fn shutdown(&mut self) {
        for handle in &self.keep_awake {
            handle.signal();
        }
        for handle in self.keep_awake.drain(..) {
            handle.stop().await;
        }
    }

    //
    // Agent Details
    //

    /// Fetch and cache everything the API knows about one agent
    pub async fn get_agent_details(&mut self, machine_agent_id: u64) -> RcbuResult<&AgentDetails> {
        let response = self
            .client
            .send(ApiRequest::get(format!("/v1.0/agent/{}", machine_agent_id)))
            .await?;

        if response.status() != StatusCode::OK {
            let err = api_error(response).await;
            log_event!(agent = machine_agent_id, error, "Unable to retrieve agent details: {}", err);
            return Err(err);
        }

        let details: AgentDetails = response.json().await.with_agent_context(machine_agent_id)?;
        debug!("Agent Details(id: {}) - {:?}", machine_agent_id, details);
        self.details.insert(machine_agent_id, details);
        self.agent_details(machine_agent_id)
    }

    /// Agent ids with cached details
    pub fn agent_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.details.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn agent_details(&self, machine_agent_id: u64) -> RcbuResult<&AgentDetails> {
        self.details.get(&machine_agent_id).ok_or_else(|| {
            error!(
                "Machine Agent Id ({}) not available. Were the agent details fetched?",
                machine_agent_id
            );
            RcbuError::AgentDetailsNotAvailable(machine_agent_id)
        })
    }

    //
    // Agent Configurations
    //

    pub async fn get_agent_configuration(
        &mut self,
        machine_agent_id: u64,
    ) -> RcbuResult<&AgentConfiguration> {
        let response = self
            .client
            .send(ApiRequest::get(format!(
                "/v1.0/agent/configuration/{}",
                machine_agent_id
            )))
            .await?;

        if response.status() != StatusCode::OK {
            let err = api_error(response).await;
            log_event!(agent = machine_agent_id, error, "Unable to retrieve agent configuration: {}", err);
            return Err(err);
        }

        let configuration: AgentConfiguration =
            response.json().await.with_agent_context(machine_agent_id)?;
        self.configurations.insert(machine_agent_id, configuration);
        self.agent_configuration(machine_agent_id)
    }

    /// Agent ids with cached configurations
    pub fn agent_configuration_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.configurations.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn agent_configuration(&self, machine_agent_id: u64) -> RcbuResult<&AgentConfiguration> {
        self.configurations.get(&machine_agent_id).ok_or_else(|| {
            error!(
                "Machine Agent Id ({}) not available. Was the agent configuration fetched?",
                machine_agent_id
            );
            RcbuError::AgentConfigurationNotAvailable(machine_agent_id)
        })
    }

    pub fn rse_host(&self, machine_agent_id: u64) -> RcbuResult<&str> {
        Ok(self.agent_configuration(machine_agent_id)?.rse_host())
    }

    pub fn rse_channel(&self, machine_agent_id: u64) -> RcbuResult<&str> {
        Ok(self.agent_configuration(machine_agent_id)?.rse_channel())
    }

    pub fn rse_heartbeat_config(&self, machine_agent_id: u64) -> RcbuResult<RseTiming> {
        Ok(self.agent_configuration(machine_agent_id)?.rse_heartbeat_config())
    }

    //
    // Agent Cleanup
    //

    /// Agents registered for one cloud server, matched by host server id,
    /// machine name or IP address.
    pub async fn get_all_agents_for_host(&self, filter: &HostFilter) -> RcbuResult<Vec<AgentSummary>> {
        if filter.is_empty() {
            return Err(RcbuError::Parameter(
                "Neither Cloud Server Name nor Cloud Server Id (HostServerId) nor Cloud Server IPs were specified. Unable to match a server.".to_string(),
            ));
        }

        let agents = self.list_agents().await?;
        let matched: Vec<AgentSummary> = agents
            .into_iter()
            .filter(|agent| {
                let hit = filter.matches(agent);
                debug!("Agent {} matched: {}", agent.machine_agent_id, hit);
                hit
            })
            .collect();

        info!("{} agent(s) matched {:?}", matched.len(), filter);
        Ok(matched)
    }

    /// Every agent registered to the account
    pub async fn list_agents(&self) -> RcbuResult<Vec<AgentSummary>> {
        let response = self.client.send(ApiRequest::get("/v1.0/user/agents")).await?;
        if response.status() != StatusCode::OK {
            let err = api_error(response).await;
            error!("Unable to retrieve the agent list: {}", err);
            return Err(err);
        }
        Ok(response.json().await?)
    }

    /// De-register the agent. Its id may change if it registers again.
    pub async fn remove_agent(&mut self, machine_agent_id: u64) -> RcbuResult<()> {
        let request = ApiRequest::post("/v1.0/agent/delete")
            .with_json(&json!({ "MachineAgentId": machine_agent_id }))?;
        let response = self.client.send(request).await?;

        if response.status() != StatusCode::NO_CONTENT {
            let err = api_error(response).await;
            log_event!(agent = machine_agent_id, error, "Unable to remove agent: {}", err);
            return Err(err);
        }

        self.details.remove(&machine_agent_id);
        self.configurations.remove(&machine_agent_id);
        log_event!(agent = machine_agent_id, info, "Removed agent");
        warn!("Restart lookups for this host; the agent id may have changed.");
        Ok(())
    }

    /// Remove each listed agent; returns the ids actually removed
    pub async fn remove_all_agents_for_host(&mut self, agents: &[AgentSummary]) -> Vec<u64> {
        let mut removed = Vec::new();
        for agent in agents {
            match self.remove_agent(agent.machine_agent_id).await {
                Ok(()) => removed.push(agent.machine_agent_id),
                Err(e) => debug!("Skipping agent {}: {}", agent.machine_agent_id, e),
            }
        }
        removed
    }

    pub async fn enable_disable_agent(&mut self, machine_agent_id: u64, enabled: bool) -> RcbuResult<()> {
        let request = ApiRequest::post("/v1.0/agent/enable").with_json(&json!({
            "MachineAgentId": machine_agent_id,
            "Enable": enabled,
        }))?;
        let response = self.client.send(request).await?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                info!(
                    "Changed Agent Status - Machine Agent Id: {}, Enabled: {}",
                    machine_agent_id, enabled
                );
                if let Some(details) = self.details.get_mut(&machine_agent_id) {
                    details.is_disabled = !enabled;
                }
                Ok(())
            }
            StatusCode::UNAUTHORIZED => {
                warn!("Invalid AuthToken");
                Err(RcbuError::Unauthorized)
            }
            StatusCode::FORBIDDEN => {
                warn!("User does not have permission to enable/disable this system.");
                Err(RcbuError::Forbidden(format!(
                    "cannot enable/disable agent {}",
                    machine_agent_id
                )))
            }
            _ => {
                let err = api_error(response).await;
                error!("Error changing agent status: {}", err);
                Err(err)
            }
        }
    }
}

impl Drop for Agents {
    fn drop(&mut self) {
        for handle in &self.keep_awake {
            debug!(
                "Telling RSE Wakeup Thread {} to terminate",
                handle.machine_agent_id()
            );
            handle.signal();
        }
    }
}
