use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use rcbu::client::Agents;
use rcbu::models::HostFilter;
use rcbu::RcbuError;

mod common;
use common::*;

#[tokio::test]
async fn test_agent_details_are_fetched_and_cached() {
    let server = start_api().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1.0/agent/{}", AGENT_ID)))
        .and(header("X-Auth-Token", TEST_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(agent_details_json(AGENT_ID)))
        .expect(1)
        .mount(&server)
        .await;

    let mut agents = Agents::new(api_client(&server));
    assert!(matches!(
        agents.agent_details(AGENT_ID),
        Err(RcbuError::AgentDetailsNotAvailable(AGENT_ID))
    ));

    let details = agents.get_agent_details(AGENT_ID).await.unwrap();
    assert_eq!(details.machine_name, "web-01");
    assert!(details.is_enabled());
    assert_eq!(
        details.last_successful_backup().map(|t| t.timestamp_millis()),
        Some(1_351_530_000_000)
    );

    assert_eq!(agents.agent_ids(), vec![AGENT_ID]);
    assert_eq!(agents.agent_details(AGENT_ID).unwrap().datacenter, "DFW");
}

#[tokio::test]
async fn test_agent_details_missing_key_is_rejected() {
    let server = start_api().await;
    let mut body = agent_details_json(AGENT_ID);
    body.as_object_mut().unwrap().remove("HostServerId");

    Mock::given(method("GET"))
        .and(path(format!("/v1.0/agent/{}", AGENT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let mut agents = Agents::new(api_client(&server));
    assert!(agents.get_agent_details(AGENT_ID).await.is_err());
    assert!(agents.agent_ids().is_empty());
}

#[tokio::test]
async fn test_agent_details_failure_status() {
    let server = start_api().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1.0/agent/{}", AGENT_ID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut agents = Agents::new(api_client(&server));
    let err = agents.get_agent_details(AGENT_ID).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_agent_configuration_helpers() {
    let server = start_api().await;
    Mock::given(method("GET"))
        .and(path(format!("/v1.0/agent/configuration/{}", AGENT_ID)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(agent_configuration_json("rse.drivesrvr.com", 30000)),
        )
        .mount(&server)
        .await;

    let mut agents = Agents::new(api_client(&server));
    assert!(agents.rse_host(AGENT_ID).is_err());

    let configuration = agents.get_agent_configuration(AGENT_ID).await.unwrap();
    assert_eq!(configuration.backup_id_from_name("nightly"), Some(10));

    assert_eq!(agents.agent_configuration_ids(), vec![AGENT_ID]);
    assert_eq!(agents.rse_host(AGENT_ID).unwrap(), "rse.drivesrvr.com");
    assert_eq!(agents.rse_channel(AGENT_ID).unwrap(), "/123456/rse/channel");
    assert_eq!(agents.rse_heartbeat_config(AGENT_ID).unwrap().timeout.real_time, 30000);
}

#[tokio::test]
async fn test_agents_for_host_requires_criteria() {
    let server = start_api().await;
    let agents = Agents::new(api_client(&server));

    let err = agents
        .get_all_agents_for_host(&HostFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RcbuError::Parameter(_)));
}

#[tokio::test]
async fn test_agents_for_host_matching() {
    let server = start_api().await;
    Mock::given(method("GET"))
        .and(path("/v1.0/user/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            summary_json(1, "web-01", "10.0.0.1", "server-a"),
            summary_json(2, "web-02", "10.0.0.2", "server-b"),
            summary_json(3, "db-01", "10.0.0.3", "server-c"),
            {"MachineAgentId": 4}
        ])))
        .mount(&server)
        .await;

    let agents = Agents::new(api_client(&server));

    let by_id = agents
        .get_all_agents_for_host(&HostFilter {
            host_server_id: Some("server-b".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_id.iter().map(|a| a.machine_agent_id).collect::<Vec<_>>(), vec![2]);

    let by_name = agents
        .get_all_agents_for_host(&HostFilter {
            name: Some("web-*".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_name.len(), 2);

    // An agent matching on several criteria is listed once
    let combined = agents
        .get_all_agents_for_host(&HostFilter {
            name: Some("db-01".to_string()),
            host_server_id: Some("server-c".to_string()),
            ips: Some(vec!["10.0.0.3".to_string(), "10.0.0.1".to_string()]),
        })
        .await
        .unwrap();
    assert_eq!(
        combined.iter().map(|a| a.machine_agent_id).collect::<Vec<_>>(),
        vec![1, 3]
    );
}

#[tokio::test]
async fn test_remove_agents() {
    let server = start_api().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/agent/delete"))
        .and(body_json(json!({"MachineAgentId": 1})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/agent/delete"))
        .and(body_json(json!({"MachineAgentId": 2})))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let summaries: Vec<rcbu::models::AgentSummary> = serde_json::from_value(json!([
        summary_json(1, "web-01", "10.0.0.1", "server-a"),
        summary_json(2, "web-01", "10.0.0.1", "server-a")
    ]))
    .unwrap();

    let mut agents = Agents::new(api_client(&server));
    let removed = agents.remove_all_agents_for_host(&summaries).await;
    assert_eq!(removed, vec![1]);
}

#[tokio::test]
async fn test_enable_disable_agent_status_mapping() {
    let server = start_api().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/agent/enable"))
        .and(body_json(json!({"MachineAgentId": 1, "Enable": false})))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/agent/enable"))
        .and(body_json(json!({"MachineAgentId": 2, "Enable": true})))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/agent/enable"))
        .and(body_json(json!({"MachineAgentId": 3, "Enable": true})))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/agent/enable"))
        .and(body_json(json!({"MachineAgentId": 4, "Enable": true})))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let mut agents = Agents::new(api_client(&server));
    agents.enable_disable_agent(1, false).await.unwrap();
    assert!(matches!(
        agents.enable_disable_agent(2, true).await,
        Err(RcbuError::Unauthorized)
    ));
    assert!(matches!(
        agents.enable_disable_agent(3, true).await,
        Err(RcbuError::Forbidden(_))
    ));

    let err = agents.enable_disable_agent(4, true).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_wake_agents_returns_status() {
    let server = start_api().await;
    Mock::given(method("POST"))
        .and(path("/v1.0/user/wakeupagents"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let agents = Agents::new(api_client(&server));
    assert_eq!(agents.wake_agents().await.unwrap().as_u16(), 200);
}
