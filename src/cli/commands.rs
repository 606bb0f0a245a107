//! CLI command implementations.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{error, info, warn};

use super::utils::{confirm, print_agent_table, print_json, CommandContext};
use super::HostArgs;
use crate::client::{Agents, AgentLogLevels, BackupCommand, BackupStatus};
use crate::config::validation::ConfigurationValidator;
use crate::config::Settings;
use crate::models::{HostFilter, LogLevel};
use crate::RcbuError;

const REDACTED: &str = "********";

/// List every agent on the account, or those of one cloud server
pub async fn list_agents(ctx: &CommandContext, host: HostArgs) -> Result<()> {
    let (_, client) = ctx.client()?;
    let agents = Agents::new(client);

    let filter = HostFilter::from(host);
    let list = if filter.is_empty() {
        agents.list_agents().await?
    } else {
        agents.get_all_agents_for_host(&filter).await?
    };

    print_agent_table(&list);
    Ok(())
}

/// De-register all agents matching the cloud server
pub async fn remove_host_agents(ctx: &CommandContext, host: HostArgs, yes: bool) -> Result<()> {
    let (_, client) = ctx.client()?;
    let mut agents = Agents::new(client);

    let matched = agents.get_all_agents_for_host(&HostFilter::from(host)).await?;
    if matched.is_empty() {
        println!("No agents matched.");
        return Ok(());
    }

    print_agent_table(&matched);
    if !yes && !confirm(&format!("Remove {} agent(s)?", matched.len()))? {
        println!("Aborted.");
        return Ok(());
    }

    let removed = agents.remove_all_agents_for_host(&matched).await;
    println!("✓ Removed {} of {} agent(s)", removed.len(), matched.len());
    for id in &removed {
        println!("  {}", id);
    }

    if removed.len() != matched.len() {
        anyhow::bail!("{} agent(s) could not be removed", matched.len() - removed.len());
    }
    Ok(())
}

pub async fn show_agent(ctx: &CommandContext, machine_agent_id: u64) -> Result<()> {
    let (_, client) = ctx.client()?;
    let mut agents = Agents::new(client);

    let details = agents.get_agent_details(machine_agent_id).await?;
    print_json(details)?;

    match details.last_successful_backup() {
        Some(when) => info!("Last successful backup: {}", when),
        None => info!("No successful backup recorded"),
    }
    Ok(())
}

pub async fn show_agent_config(
    ctx: &CommandContext,
    machine_agent_id: u64,
    backup: Option<String>,
) -> Result<()> {
    let (_, client) = ctx.client()?;
    let mut agents = Agents::new(client);
    let configuration = agents.get_agent_configuration(machine_agent_id).await?;

    match backup {
        Some(name) => {
            let backup = configuration
                .backup_configuration_by_name(&name)
                .ok_or_else(|| RcbuError::BackupConfigurationNotFound(name.clone()))?;
            print_json(backup)?;
            println!("Vault database: {}", configuration.vault_db_path(Some(&name))?);
        }
        None => print_json(configuration)?,
    }
    Ok(())
}

pub async fn set_agent_enabled(ctx: &CommandContext, machine_agent_id: u64, enabled: bool) -> Result<()> {
    let (_, client) = ctx.client()?;
    let mut agents = Agents::new(client);

    agents.enable_disable_agent(machine_agent_id, enabled).await?;
    println!(
        "✓ Agent {} {}",
        machine_agent_id,
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

pub async fn remove_agent(ctx: &CommandContext, machine_agent_id: u64) -> Result<()> {
    let (_, client) = ctx.client()?;
    let mut agents = Agents::new(client);

    agents.remove_agent(machine_agent_id).await?;
    println!("✓ Removed agent {}", machine_agent_id);
    Ok(())
}

/// Wake one agent; optionally hold it awake for `keep_awake` seconds
pub async fn wake_agent(
    ctx: &CommandContext,
    machine_agent_id: u64,
    timeout: Option<u64>,
    keep_awake: Option<u64>,
    period: Option<u64>,
) -> Result<()> {
    let (settings, client) = ctx.client()?;
    let rse = ctx.rse(&settings, &client);
    let mut agents = Agents::new(client)
        .with_poll_pause(Duration::from_millis(settings.rse.poll_interval_ms));

    // Direct RSE access and the derived wake period both need the configuration
    agents
        .get_agent_configuration(machine_agent_id)
        .await
        .with_context(|| format!("fetching configuration of agent {}", machine_agent_id))?;

    let timeout = timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_millis(settings.rse.timeout_ms));

    let woke = agents
        .wake_specific_agent(
            machine_agent_id,
            &rse,
            timeout,
            keep_awake.is_some(),
            period.map(Duration::from_secs),
        )
        .await?;

    if !woke {
        return Err(RcbuError::timeout(format!(
            "agent {} did not report a heartbeat within {:?}",
            machine_agent_id, timeout
        ))
        .into());
    }
    println!("✓ Agent {} is awake", machine_agent_id);

    if let Some(seconds) = keep_awake {
        println!("  Keeping it awake for {}s (Ctrl-C to stop early)", seconds);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Unable to listen for Ctrl-C: {}", e);
                }
            }
        }
        agents.stop_keep_agent_awake(machine_agent_id).await;
    }

    agents.shutdown().await;
    Ok(())
}

pub async fn get_log_level(ctx: &CommandContext, machine_agent_id: u64) -> Result<()> {
    let (_, client) = ctx.client()?;
    let levels = AgentLogLevels::new(client);

    let level = levels.get_log_level(machine_agent_id).await?;
    println!("{} ({})", level, level.id());
    Ok(())
}

pub async fn set_log_level(ctx: &CommandContext, machine_agent_id: u64, level: &str) -> Result<()> {
    let level: LogLevel = level.parse()?;
    let (_, client) = ctx.client()?;
    let levels = AgentLogLevels::new(client);

    levels.set_log_level(machine_agent_id, level).await?;
    println!("✓ Agent {} log level set to {}", machine_agent_id, level);
    Ok(())
}

/// Start a backup by configuration id, or by name on a given agent
pub async fn start_backup(
    ctx: &CommandContext,
    config_id: Option<u64>,
    name: Option<String>,
    agent: Option<u64>,
    wait: bool,
) -> Result<()> {
    let (settings, client) = ctx.client()?;

    let config_id = match (config_id, name, agent) {
        (Some(id), _, _) => id,
        (None, Some(name), Some(machine_agent_id)) => {
            let mut agents = Agents::new(client.clone());
            let configuration = agents.get_agent_configuration(machine_agent_id).await?;
            configuration
                .backup_id_from_name(&name)
                .ok_or(RcbuError::BackupConfigurationNotFound(name))?
        }
        _ => {
            return Err(RcbuError::Parameter(
                "a backup configuration id, or --name with --agent, is required".to_string(),
            )
            .into())
        }
    };

    let mut command = BackupCommand::new(client, config_id)
        .with_start_delay(Duration::from_secs(settings.backup.start_delay));
    let status = command.start().await?;
    println!("✓ Started backup {} for configuration {}", status.id(), config_id);

    match status.state().await {
        Ok(state) => println!("  State: {}", state),
        Err(e) => warn!("Unable to read state of backup {}: {}", status.id(), e),
    }

    if wait {
        let report = command
            .wait_for_completion(Duration::from_secs(settings.backup.poll_interval))
            .await?;
        print_json(&report)?;
    }
    Ok(())
}

async fn tracked_backup(ctx: &CommandContext, backup_id: u64) -> Result<BackupCommand> {
    let (_, client) = ctx.client()?;
    let record = BackupStatus::new(client.clone(), backup_id)
        .record()
        .await
        .with_context(|| format!("looking up backup {}", backup_id))?;
    Ok(BackupCommand::from_record(client, &record))
}

pub async fn stop_backup(ctx: &CommandContext, backup_id: u64) -> Result<()> {
    let mut command = tracked_backup(ctx, backup_id).await?;
    if !command.is_running() {
        warn!(
            "Backup {} is not running (state: {:?})",
            backup_id,
            command.state().map(|state| state.as_str())
        );
    }

    command.stop().await?;
    println!("✓ Stop requested for backup {}", backup_id);
    Ok(())
}

pub async fn backup_status(ctx: &CommandContext, backup_id: u64) -> Result<()> {
    let (_, client) = ctx.client()?;
    let record = BackupStatus::new(client, backup_id).record().await?;
    println!(
        "Backup {} ({} on {}): {}",
        record.backup_id,
        record
            .backup_configuration_id
            .map_or_else(|| "-".to_string(), |id| id.to_string()),
        record.machine_name.as_deref().unwrap_or("-"),
        record.current_state
    );
    Ok(())
}

pub async fn backup_report(ctx: &CommandContext, backup_id: u64) -> Result<()> {
    let command = tracked_backup(ctx, backup_id).await?;
    let report = command.report().await?;
    print_json(&report)?;
    Ok(())
}

/// Initialize default configuration
pub async fn init(ctx: &CommandContext, force: bool) -> Result<()> {
    let config_path = ctx.config.clone().unwrap_or_else(Settings::config_path);

    if config_path.exists() && !force {
        anyhow::bail!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let settings = Settings::default();
    let toml_content = toml::to_string_pretty(&settings)?;
    std::fs::write(&config_path, toml_content)?;

    println!("✓ Configuration initialized at {:?}", config_path);
    println!("  Set auth.username and auth.api_key (or RCBU_USERNAME / RCBU_API_KEY).");
    Ok(())
}

/// Manage configuration (show, validate)
pub async fn config(ctx: &CommandContext, show: bool, validate: bool, strict: bool) -> Result<()> {
    let settings = ctx.settings()?;

    if show {
        let mut shown = settings.clone();
        if shown.auth.api_key.is_some() {
            shown.auth.api_key = Some(REDACTED.to_string());
        }
        if shown.auth.token.is_some() {
            shown.auth.token = Some(REDACTED.to_string());
        }
        if shown.rse.agent_key.is_some() {
            shown.rse.agent_key = Some(REDACTED.to_string());
        }
        println!("{}", toml::to_string_pretty(&shown)?);
    }

    if validate {
        let mut validator = ConfigurationValidator::new(strict);
        match validator.validate_settings(&settings) {
            Ok(()) => println!("✓ Configuration is valid"),
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Show version information
pub async fn version() -> Result<()> {
    println!("rcbu {}", env!("CARGO_PKG_VERSION"));
    println!("Built with Rust {}", rustc_version::version()?);
    Ok(())
}
