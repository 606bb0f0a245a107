use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// RSA public key material shared by agent details and backup records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EncryptionKey {
    pub modulus_hex: String,
    pub exponent_hex: String,
}

/// A machine agent as described by `GET /v1.0/agent/{id}`
///
/// Every key must be present in the response; nullable keys still have to be
/// sent explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentDetails {
    pub machine_agent_id: u64,
    pub agent_version: String,
    pub architecture: String,
    pub flavor: String,
    pub backup_vault_size: String,
    pub cleanup_allowed: bool,
    pub datacenter: String,
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    pub is_disabled: bool,
    pub is_encrypted: bool,
    pub machine_name: String,
    pub operating_system: String,
    pub operating_system_version: String,
    #[serde(deserialize_with = "required_nullable")]
    pub public_key: Option<EncryptionKey>,
    pub status: String,
    #[serde(deserialize_with = "required_nullable")]
    pub time_of_last_successful_backup: Option<String>,
    pub use_service_net: bool,
    #[serde(deserialize_with = "required_nullable")]
    pub host_server_id: Option<String>,
}

impl AgentDetails {
    pub fn is_enabled(&self) -> bool {
        !self.is_disabled
    }

    /// `TimeOfLastSuccessfulBackup` decoded from its `/Date(<ms>)/` form
    pub fn last_successful_backup(&self) -> Option<DateTime<Utc>> {
        self.time_of_last_successful_backup
            .as_deref()
            .and_then(parse_json_date)
    }
}

/// An agent entry from `GET /v1.0/user/agents`; entries may omit any key but the id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentSummary {
    pub machine_agent_id: u64,
    #[serde(default)]
    pub agent_version: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub flavor: Option<String>,
    #[serde(default)]
    pub backup_vault_size: Option<String>,
    #[serde(default)]
    pub cleanup_allowed: Option<bool>,
    #[serde(default)]
    pub datacenter: Option<String>,
    #[serde(default, rename = "IPAddress")]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub is_disabled: Option<bool>,
    #[serde(default)]
    pub is_encrypted: Option<bool>,
    #[serde(default)]
    pub machine_name: Option<String>,
    #[serde(default)]
    pub operating_system: Option<String>,
    #[serde(default)]
    pub operating_system_version: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub time_of_last_successful_backup: Option<String>,
    #[serde(default)]
    pub use_service_net: Option<bool>,
    #[serde(default)]
    pub host_server_id: Option<String>,
}

/// Criteria for locating the agents registered for one cloud server
#[derive(Debug, Clone, Default)]
pub struct HostFilter {
    /// Machine name; `*` and `?` wildcards are honoured
    pub name: Option<String>,
    /// Cloud Servers (Nova) instance id
    pub host_server_id: Option<String>,
    pub ips: Option<Vec<String>>,
}

impl HostFilter {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.host_server_id.is_none() && self.ips.is_none()
    }

    /// Id first, then name, then IP membership
    pub fn matches(&self, agent: &AgentSummary) -> bool {
        if let (Some(wanted), Some(actual)) = (&self.host_server_id, &agent.host_server_id) {
            if wanted == actual {
                return true;
            }
        }

        if let (Some(pattern), Some(actual)) = (&self.name, &agent.machine_name) {
            if wildmatch::WildMatch::new(pattern).matches(actual) {
                return true;
            }
        }

        if let (Some(ips), Some(actual)) = (&self.ips, &agent.ip_address) {
            if ips.iter().any(|ip| ip == actual) {
                return true;
            }
        }

        false
    }
}

/// Parses the WCF JSON date form `/Date(1351530000000)/`, with or without a
/// trailing `+hhmm`/`-hhmm` offset (the millisecond value is already UTC).
pub fn parse_json_date(raw: &str) -> Option<DateTime<Utc>> {
    let inner = raw.split_once('(')?.1.split_once(')')?.0;
    let (sign, digits) = match inner.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, inner),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let millis: i64 = digits[..end].parse().ok()?;
    DateTime::from_timestamp_millis(sign * millis)
}

fn required_nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}
