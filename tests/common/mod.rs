#![allow(dead_code)]

use rcbu::client::{ApiClient, Endpoint, StaticToken};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "test-token";
pub const AGENT_ID: u64 = 123456;

/// Fake Cloud Backup API; requests go out over plain HTTP
pub async fn start_api() -> MockServer {
    let _ = rcbu::config::init_test_logging();
    MockServer::start().await
}

/// `host:port` of the mock server, as the endpoint and RSE routes expect it
pub fn host_of(server: &MockServer) -> String {
    server.uri().trim_start_matches("http://").to_string()
}

pub fn api_client(server: &MockServer) -> ApiClient {
    ApiClient::new(
        Endpoint::new(false, host_of(server)),
        Arc::new(StaticToken::new(TEST_TOKEN)),
    )
    .unwrap()
}

pub fn agent_details_json(machine_agent_id: u64) -> Value {
    json!({
        "MachineAgentId": machine_agent_id,
        "AgentVersion": "1.18.7",
        "Architecture": "64-bit",
        "Flavor": "RaxCloudServer",
        "BackupVaultSize": "1.2 GB",
        "CleanupAllowed": true,
        "Datacenter": "DFW",
        "IPAddress": "10.1.2.3",
        "IsDisabled": false,
        "IsEncrypted": false,
        "MachineName": "web-01",
        "OperatingSystem": "Ubuntu",
        "OperatingSystemVersion": "22.04",
        "PublicKey": {"ModulusHex": "c0ffee", "ExponentHex": "10001"},
        "Status": "Online",
        "TimeOfLastSuccessfulBackup": "/Date(1351530000000)/",
        "UseServiceNet": true,
        "HostServerId": "d3b9e4c2-0000-4f6a-9d8e-1234567890ab"
    })
}

/// Agent configuration whose RSE host is `rse_host` (pass the mock server's host)
pub fn agent_configuration_json(rse_host: &str, heartbeat_timeout_ms: u64) -> Value {
    json!({
        "Volumes": [
            {"Uri": "swift:vault-a", "BackupVaultId": "aaaa-1111", "EncryptionEnabled": false}
        ],
        "SystemPreferences": {
            "RateLimit": null,
            "Environment": {"MinimumDiskSpaceMb": {"Backup": 512, "Restore": 256, "Cleanup": 128}},
            "Logging": {"Level": "Warn"},
            "Rse": {
                "Channel": "/123456/rse/channel",
                "HostName": rse_host,
                "Polling": {
                    "Interval": {"Idle": 600000, "Active": 60000, "RealTime": 5000},
                    "Timeout": {"Idle": 0, "Active": 0, "RealTime": 0}
                },
                "Heartbeat": {
                    "Interval": {"Idle": 600000, "Active": 60000, "RealTime": 5000},
                    "Timeout": {"Idle": 0, "Active": 0, "RealTime": heartbeat_timeout_ms}
                }
            }
        },
        "UserPreferences": {},
        "BackupConfigurations": [
            {"Id": 10, "Name": "nightly", "VolumeUri": "swift:vault-a", "IsEnabled": true}
        ]
    })
}

pub fn heartbeat_event(machine_agent_id: u64, age: f64) -> Value {
    json!({
        "age": age,
        "data": {"Event": "Heartbeat", "MachineAgentId": machine_agent_id}
    })
}

pub fn summary_json(machine_agent_id: u64, name: &str, ip: &str, host_server_id: &str) -> Value {
    json!({
        "MachineAgentId": machine_agent_id,
        "MachineName": name,
        "IPAddress": ip,
        "HostServerId": host_server_id,
        "Status": "Online",
        "IsDisabled": false
    })
}

pub fn backup_record_json(backup_id: u64, state: &str) -> Value {
    json!({
        "BackupId": backup_id,
        "BackupConfigurationId": 10,
        "CurrentState": state,
        "MachineAgentId": AGENT_ID,
        "MachineName": "web-01",
        "EncryptionKey": {"ModulusHex": "c0ffee", "ExponentHex": "10001"}
    })
}

pub fn backup_report_json(backup_id: u64, state: &str) -> Value {
    json!({
        "BackupId": backup_id,
        "State": state,
        "StartTime": "/Date(1351530000000)/",
        "CompletedTime": "/Date(1351530600000)/",
        "FilesBackedUp": 120,
        "BytesBackedUp": "1.1 MB",
        "NumErrors": 0,
        "ErrorList": []
    })
}
