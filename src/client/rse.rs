//! Real-time Streaming Events (RSE) channel access

use chrono::Local;
use reqwest::StatusCode;
use serde_json::Value;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error};
use uuid::Uuid;

use super::transport::{ApiClient, ApiRequest};
use crate::config::settings::RseConfig;
use crate::models::{AgentConfiguration, RseEvent, RseMessage};
use crate::{RcbuError, RcbuResult};

/// RSE rejects clients whose version header differs from this
pub const RSE_VERSION: &str = "2011-05-01";
const RSE_UUID_NAMESPACE_PREFIX: &str = "support-tools.cloudbackup.rackspace.com";
const LOG_RULE: &str = "=======================================================================";
const LOG_SECTION: &str = "-----------------------------------------------------------------------";
const LOG_EVENT_RULE: &str = "+++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++";

/// Application identity presented to RSE.
///
/// The user agent must have the shape `name/version uuid/<dashed uuid>`; the
/// uuid is derived from the name and version so it changes per release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RseData {
    app: String,
    app_version: String,
    uuid: Uuid,
    user_agent: String,
}

impl RseData {
    pub fn new(app: impl Into<String>, app_version: impl Into<String>) -> Self {
        let app = app.into();
        let app_version = app_version.into();
        let name = format!("{}/{}/{}", RSE_UUID_NAMESPACE_PREFIX, app, app_version);
        let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes());
        let user_agent = format!("{}/{} uuid/{}", app, app_version, uuid);
        debug!("RSE User-Agent: {}", user_agent);

        Self {
            app,
            app_version,
            uuid,
            user_agent,
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn app_version(&self) -> &str {
        &self.app_version
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Where one agent's events are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RseRoute {
    /// Straight from the agent's RSE host and channel; only its events arrive
    Direct { host: String, channel: String },
    /// Through the API's event relay on `host`
    Relayed { host: String, machine_agent_id: u64 },
}

#[derive(Clone)]
pub struct Rse {
    client: ApiClient,
    data: RseData,
    agent_key: Option<String>,
    api_host: Option<String>,
    log_file: Option<PathBuf>,
    ssl: bool,
}

impl Rse {
    pub fn new(client: ApiClient, data: RseData) -> Self {
        Self {
            client,
            data,
            agent_key: None,
            api_host: None,
            log_file: None,
            ssl: true,
        }
    }

    pub fn from_settings(client: ApiClient, config: &RseConfig) -> Self {
        Self {
            client,
            data: RseData::new(config.app.clone(), config.app_version.clone()),
            agent_key: config.agent_key.clone(),
            api_host: config.api_host.clone(),
            log_file: config.log_file.clone(),
            ssl: true,
        }
    }

    pub fn with_agent_key(mut self, agent_key: impl Into<String>) -> Self {
        self.agent_key = Some(agent_key.into());
        self
    }

    /// Read events through the API relay on `api_host` instead of RSE itself
    pub fn with_api_host(mut self, api_host: impl Into<String>) -> Self {
        self.api_host = Some(api_host.into());
        self
    }

    /// Direct reads are HTTPS; plain HTTP is only for local fakes
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());
        self
    }

    pub fn data(&self) -> &RseData {
        &self.data
    }

    pub fn log_file(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Copy of this reader that logs to `log_file` instead
    pub fn clone_with_log_file(&self, log_file: Option<PathBuf>) -> Self {
        Self {
            log_file,
            ..self.clone()
        }
    }

    /// Relay when an API host is configured, otherwise direct (which needs
    /// the agent configuration for host and channel).
    pub fn route(
        &self,
        machine_agent_id: u64,
        configuration: Option<&AgentConfiguration>,
    ) -> RcbuResult<RseRoute> {
        if let Some(host) = &self.api_host {
            return Ok(RseRoute::Relayed {
                host: host.clone(),
                machine_agent_id,
            });
        }

        let configuration =
            configuration.ok_or(RcbuError::AgentConfigurationNotAvailable(machine_agent_id))?;
        Ok(RseRoute::Direct {
            host: configuration.rse_host().to_string(),
            channel: configuration.rse_channel().to_string(),
        })
    }

    fn request(&self, route: &RseRoute) -> RcbuResult<ApiRequest> {
        match route {
            RseRoute::Direct { host, channel } => {
                let agent_key = self.agent_key.clone().ok_or_else(|| {
                    RcbuError::configuration("direct RSE access requires an agent key")
                })?;
                Ok(ApiRequest::get(channel.clone())
                    .with_host(host.clone())
                    .with_ssl(self.ssl)
                    .with_header("X-Agent-Key", agent_key)
                    .with_header("X-RSE-Version", RSE_VERSION)
                    .with_header("User-Agent", self.data.user_agent().to_string()))
            }
            RseRoute::Relayed {
                host,
                machine_agent_id,
            } => Ok(ApiRequest::get(format!("/v1.0/agent/events/{}", machine_agent_id))
                .with_host(host.clone())),
        }
    }

    /// Fetch one batch from the channel; non-200 replies yield no events
    pub async fn query(&self, route: &RseRoute) -> RcbuResult<RseMessage> {
        let response = self.client.send(self.request(route)?).await?;
        let status = response.status();
        debug!("RSE Query: Code ({})", status);

        let text = response.text().await?;
        let json = if status == StatusCode::OK {
            serde_json::from_str::<Value>(&text).ok()
        } else {
            None
        };

        self.log_query(status, &text, json.as_ref());

        Ok(json.map(RseMessage::from_json).unwrap_or(RseMessage::Empty))
    }

    /// Whether the channel currently shows a fresh heartbeat from the agent.
    ///
    /// Transport failures and malformed events count as "no heartbeat".
    pub async fn monitor_for_heartbeat(&self, route: &RseRoute, machine_agent_id: u64) -> bool {
        let message = match self.query(route).await {
            Ok(message) => message,
            Err(e) => {
                error!("RSE query failed: {}", e);
                return false;
            }
        };

        if message == RseMessage::Empty {
            error!("invalid RSE message received");
            return false;
        }

        for raw in message.raw_events() {
            self.log_event(message.source_label(), raw);
            match serde_json::from_value::<RseEvent>(raw.clone()) {
                Ok(event) if event.is_fresh_heartbeat_from(machine_agent_id) => return true,
                Ok(_) => {}
                Err(e) => {
                    error!("error while parsing RSE data: {}", e);
                    return false;
                }
            }
        }

        false
    }

    fn log_query(&self, status: StatusCode, text: &str, json: Option<&Value>) {
        let Some(path) = &self.log_file else {
            return;
        };

        let json_section = match json {
            Some(value) => serde_json::to_string_pretty(value).unwrap_or_default(),
            None => "--- invalid json returned ---".to_string(),
        };
        let entry = format!(
            "{rule}\nTime: {time}\nStatus Code: {status}\nResult Text:\n{section}\n{text:?}\n{section}\nResult JSON:\n{section}\n{json_section}\n{section}\n",
            rule = LOG_RULE,
            time = Local::now().format("%Y-%m-%d %H:%M:%S %Z"),
            status = status.as_u16(),
            section = LOG_SECTION,
        );
        self.append_log(path, &entry);
    }

    fn log_event(&self, source: &str, event: &Value) {
        if let Some(path) = &self.log_file {
            let entry = format!("({}) Message: {}\n{}\n", source, event, LOG_EVENT_RULE);
            self.append_log(path, &entry);
        }
    }

    fn append_log(&self, path: &PathBuf, entry: &str) {
        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(entry.as_bytes()));
        if let Err(e) = result {
            error!("Unable to write RSE log {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::auth::StaticToken;
    use crate::client::transport::Endpoint;
    use std::sync::Arc;

    fn plain_client() -> ApiClient {
        ApiClient::new(Endpoint::new(false, "localhost:8080"), Arc::new(StaticToken::new("t"))).unwrap()
    }

    #[test]
    fn test_direct_reads_use_https() {
        let client = plain_client();
        let route = RseRoute::Direct {
            host: "rse.drivesrvr.com".to_string(),
            channel: "/channel/abc".to_string(),
        };

        let rse = Rse::new(client.clone(), RseData::new("app", "1")).with_agent_key("key");
        let uri = client.endpoint().request_uri(&rse.request(&route).unwrap());
        assert_eq!(uri, "https://rse.drivesrvr.com/channel/abc");

        let relayed = RseRoute::Relayed {
            host: "localhost:9090".to_string(),
            machine_agent_id: 7,
        };
        let uri = client.endpoint().request_uri(&rse.request(&relayed).unwrap());
        assert_eq!(uri, "http://localhost:9090/v1.0/agent/events/7");

        let plain = rse.with_ssl(false);
        let uri = client.endpoint().request_uri(&plain.request(&route).unwrap());
        assert!(uri.starts_with("http://"));
    }

    #[test]
    fn test_user_agent_shape() {
        let data = RseData::new("myApp", "v1.2");
        let expected = Uuid::new_v5(
            &Uuid::NAMESPACE_URL,
            b"support-tools.cloudbackup.rackspace.com/myApp/v1.2",
        );
        assert_eq!(data.uuid(), expected);
        assert_eq!(data.user_agent(), format!("myApp/v1.2 uuid/{}", expected));
        assert_eq!(data.user_agent().split('/').count(), 3);
    }

    #[test]
    fn test_uuid_changes_with_version() {
        assert_ne!(RseData::new("app", "1").uuid(), RseData::new("app", "2").uuid());
        assert_eq!(RseData::new("app", "1"), RseData::new("app", "1"));
    }
}
