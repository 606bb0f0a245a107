use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::{RcbuError, RcbuResult};

/// Full agent configuration from `GET /v1.0/agent/configuration/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentConfiguration {
    #[serde(default)]
    pub volumes: Vec<Volume>,
    pub system_preferences: SystemPreferences,
    #[serde(default)]
    pub user_preferences: UserPreferences,
    #[serde(default)]
    pub backup_configurations: Vec<BackupConfiguration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Volume {
    #[serde(default)]
    pub data_services: Option<serde_json::Value>,
    pub uri: String,
    #[serde(default)]
    pub failover_uri: Option<String>,
    #[serde(default)]
    pub encryption_enabled: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub network_drives: Option<serde_json::Value>,
    pub backup_vault_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemPreferences {
    #[serde(default)]
    pub rate_limit: Option<serde_json::Value>,
    #[serde(default)]
    pub auto_update: Option<AutoUpdate>,
    pub environment: EnvironmentPreferences,
    pub logging: LoggingPreferences,
    pub rse: RseSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AutoUpdate {
    pub enabled: bool,
    #[serde(default)]
    pub latest_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentPreferences {
    pub minimum_disk_space_mb: DiskSpaceRequirements,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DiskSpaceRequirements {
    pub backup: u64,
    pub restore: u64,
    pub cleanup: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoggingPreferences {
    pub level: String,
}

/// Where and how often an agent talks to RSE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RseSettings {
    pub channel: String,
    pub host_name: String,
    pub polling: RseTiming,
    pub heartbeat: RseTiming,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RseTiming {
    pub interval: ModeValues,
    pub timeout: ModeValues,
}

/// Millisecond values per agent poll mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModeValues {
    pub idle: u64,
    pub active: u64,
    pub real_time: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPreferences {
    #[serde(default)]
    pub cache_directory: Option<String>,
    #[serde(default)]
    pub throttle_bandwidth: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BackupConfiguration {
    pub id: u64,
    pub name: String,
    pub volume_uri: String,
    #[serde(default)]
    pub volume_failover_uri: Option<String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub backup_prescript: Option<String>,
    #[serde(default)]
    pub backup_postscript: Option<String>,
    #[serde(default)]
    pub days_to_keep_old_file_versions: Option<u32>,
    #[serde(default)]
    pub keep_old_file_versions_indefinitely: Option<bool>,
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub inclusions: Vec<PathRule>,
    #[serde(default)]
    pub exclusions: Vec<PathRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Schedule {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    #[serde(default)]
    pub initial_scheduled_time: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<String>,
    #[serde(default)]
    pub day_of_week: Option<serde_json::Value>,
    #[serde(default)]
    pub hourly_interval: Option<u32>,
    #[serde(default, rename = "IsDST")]
    pub is_dst: Option<bool>,
    #[serde(default)]
    pub offset: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathRule {
    pub pattern: String,
    #[serde(default, rename = "Type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub args: Option<serde_json::Value>,
}

/// Scheme prefix on volume URIs (`swift:<container>`)
const VOLUME_URI_SCHEME: &str = "swift:";

impl AgentConfiguration {
    pub fn config_log_level(&self) -> &str {
        &self.system_preferences.logging.level
    }

    pub fn minimum_backup_disk_space_mb(&self) -> u64 {
        self.system_preferences.environment.minimum_disk_space_mb.backup
    }

    pub fn minimum_restore_disk_space_mb(&self) -> u64 {
        self.system_preferences.environment.minimum_disk_space_mb.restore
    }

    pub fn minimum_cleanup_disk_space_mb(&self) -> u64 {
        self.system_preferences.environment.minimum_disk_space_mb.cleanup
    }

    pub fn rse(&self) -> &RseSettings {
        &self.system_preferences.rse
    }

    pub fn rse_channel(&self) -> &str {
        &self.rse().channel
    }

    pub fn rse_host(&self) -> &str {
        &self.rse().host_name
    }

    pub fn rse_polling_config(&self) -> RseTiming {
        self.rse().polling
    }

    pub fn rse_heartbeat_config(&self) -> RseTiming {
        self.rse().heartbeat
    }

    pub fn backup_ids(&self) -> BTreeSet<u64> {
        self.backup_configurations.iter().map(|c| c.id).collect()
    }

    pub fn backup_names(&self) -> BTreeSet<String> {
        self.backup_configurations
            .iter()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn backup_name_id_map(&self) -> HashMap<String, u64> {
        self.backup_configurations
            .iter()
            .map(|c| (c.name.clone(), c.id))
            .collect()
    }

    pub fn backup_id_name_map(&self) -> HashMap<u64, String> {
        self.backup_configurations
            .iter()
            .map(|c| (c.id, c.name.clone()))
            .collect()
    }

    pub fn backup_id_from_name(&self, backup_name: &str) -> Option<u64> {
        self.backup_configuration_by_name(backup_name).map(|c| c.id)
    }

    pub fn backup_name_from_id(&self, backup_id: u64) -> Option<&str> {
        self.backup_configuration_by_id(backup_id)
            .map(|c| c.name.as_str())
    }

    pub fn backup_configuration_by_id(&self, backup_id: u64) -> Option<&BackupConfiguration> {
        self.backup_configurations.iter().find(|c| c.id == backup_id)
    }

    pub fn backup_configuration_by_name(&self, backup_name: &str) -> Option<&BackupConfiguration> {
        self.backup_configurations
            .iter()
            .find(|c| c.name == backup_name)
    }

    /// Container holding the VaultDB, for a named backup or the first volume
    pub fn vault_db_container(&self, backup_name: Option<&str>) -> RcbuResult<String> {
        let uri = match backup_name {
            Some(name) => &self.require_backup(name)?.volume_uri,
            None => &self.first_volume()?.uri,
        };

        debug!("VaultDB Container: {}", uri);
        Ok(uri
            .strip_prefix(VOLUME_URI_SCHEME)
            .unwrap_or(uri)
            .to_string())
    }

    /// `BACKUPS/v2.0/{vault id}` for a named backup or the first volume
    pub fn vault_db_path(&self, backup_name: Option<&str>) -> RcbuResult<String> {
        let volume = match backup_name {
            Some(name) => self.volume_for_backup(name)?,
            None => self.first_volume()?,
        };

        let path = format!("BACKUPS/v2.0/{}", volume.backup_vault_id);
        debug!("VaultDB Path: {}", path);
        Ok(path)
    }

    /// Bundle location; bundle ids are zero padded to ten digits
    pub fn bundle_path(&self, backup_name: &str, bundle_id: u64) -> RcbuResult<String> {
        let volume = self.volume_for_backup(backup_name)?;
        let path = format!(
            "BACKUPS/v2.0/{}/BUNDLES/{:010}",
            volume.backup_vault_id, bundle_id
        );
        debug!("Bundle Path: {}", path);
        Ok(path)
    }

    fn require_backup(&self, backup_name: &str) -> RcbuResult<&BackupConfiguration> {
        self.backup_configuration_by_name(backup_name)
            .ok_or_else(|| RcbuError::BackupConfigurationNotFound(backup_name.to_string()))
    }

    fn first_volume(&self) -> RcbuResult<&Volume> {
        self.volumes
            .first()
            .ok_or_else(|| RcbuError::unexpected_response("agent configuration has no volumes"))
    }

    // Several volumes may exist; the backup's VolumeUri picks the last matching one.
    fn volume_for_backup(&self, backup_name: &str) -> RcbuResult<&Volume> {
        let volume_uri = &self.require_backup(backup_name)?.volume_uri;
        self.volumes
            .iter()
            .rev()
            .find(|v| &v.uri == volume_uri)
            .ok_or_else(|| {
                RcbuError::unexpected_response(format!(
                    "no volume matches {} for backup {}",
                    volume_uri, backup_name
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_configuration_json() -> serde_json::Value {
        json!({
            "Volumes": [
                {"Uri": "swift:vault-a", "BackupVaultId": "aaaa-1111", "EncryptionEnabled": false},
                {"Uri": "swift:vault-b", "BackupVaultId": "bbbb-2222", "EncryptionEnabled": true}
            ],
            "SystemPreferences": {
                "RateLimit": null,
                "AutoUpdate": {"Enabled": true, "LatestVersion": "1.18"},
                "Environment": {"MinimumDiskSpaceMb": {"Backup": 512, "Restore": 256, "Cleanup": 128}},
                "Logging": {"Level": "Warn"},
                "Rse": {
                    "Channel": "/123456/rse/channel",
                    "HostName": "rse.drivesrvr.com",
                    "Polling": {
                        "Interval": {"Idle": 600000, "Active": 60000, "RealTime": 5000},
                        "Timeout": {"Idle": 0, "Active": 0, "RealTime": 0}
                    },
                    "Heartbeat": {
                        "Interval": {"Idle": 600000, "Active": 60000, "RealTime": 5000},
                        "Timeout": {"Idle": 0, "Active": 0, "RealTime": 30000}
                    }
                }
            },
            "UserPreferences": {"CacheDirectory": "/var/cache/driveclient", "ThrottleBandwidth": null},
            "BackupConfigurations": [
                {"Id": 10, "Name": "nightly", "VolumeUri": "swift:vault-b", "IsEnabled": true,
                 "Schedules": [{"Frequency": "Daily", "TimeOfDay": "2:00", "IsDST": false}],
                 "Inclusions": [{"Pattern": "/var/www", "Type": "Folder"}],
                 "Exclusions": []},
                {"Id": 11, "Name": "weekly", "VolumeUri": "swift:vault-a", "IsEnabled": false}
            ]
        })
    }

    fn sample() -> AgentConfiguration {
        serde_json::from_value(sample_configuration_json()).unwrap()
    }

    #[test]
    fn test_preference_accessors() {
        let config = sample();
        assert_eq!(config.config_log_level(), "Warn");
        assert_eq!(config.minimum_backup_disk_space_mb(), 512);
        assert_eq!(config.minimum_restore_disk_space_mb(), 256);
        assert_eq!(config.minimum_cleanup_disk_space_mb(), 128);
        assert_eq!(config.rse_host(), "rse.drivesrvr.com");
        assert_eq!(config.rse_heartbeat_config().timeout.real_time, 30000);
    }

    #[test]
    fn test_backup_lookups() {
        let config = sample();
        assert_eq!(config.backup_ids().into_iter().collect::<Vec<_>>(), vec![10, 11]);
        assert!(config.backup_names().contains("nightly"));
        assert_eq!(config.backup_id_from_name("weekly"), Some(11));
        assert_eq!(config.backup_name_from_id(10), Some("nightly"));
        assert_eq!(config.backup_name_id_map()["nightly"], 10);
        assert_eq!(config.backup_id_name_map()[&11], "weekly");
        assert!(config.backup_configuration_by_id(99).is_none());
        assert_eq!(config.backup_configuration_by_name("nightly").unwrap().inclusions.len(), 1);
    }

    #[test]
    fn test_vault_paths() {
        let config = sample();
        assert_eq!(config.vault_db_container(None).unwrap(), "vault-a");
        assert_eq!(config.vault_db_container(Some("nightly")).unwrap(), "vault-b");
        assert_eq!(config.vault_db_path(None).unwrap(), "BACKUPS/v2.0/aaaa-1111");
        assert_eq!(config.vault_db_path(Some("nightly")).unwrap(), "BACKUPS/v2.0/bbbb-2222");
        assert_eq!(
            config.bundle_path("nightly", 42).unwrap(),
            "BACKUPS/v2.0/bbbb-2222/BUNDLES/0000000042"
        );
    }

    #[test]
    fn test_unknown_backup_name_is_error() {
        let config = sample();
        assert!(matches!(
            config.vault_db_path(Some("missing")),
            Err(RcbuError::BackupConfigurationNotFound(_))
        ));
        assert!(config.bundle_path("missing", 1).is_err());
    }
}
