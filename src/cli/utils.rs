//! CLI utility functions.

use anyhow::Result;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use super::HostArgs;
use crate::client::{ApiClient, Rse};
use crate::config::validation::ConfigurationValidator;
use crate::config::Settings;
use crate::models::{AgentSummary, HostFilter};

/// Global options shared by every subcommand
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    pub config: Option<PathBuf>,
    pub token: Option<String>,
}

impl CommandContext {
    /// Load settings with precedence CLI > env > file > defaults
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(token) = &self.token {
            info!("Using auth token from the command line");
            settings.auth.token = Some(token.clone());
        }
        Ok(settings)
    }

    /// Settings that passed validation; warnings are logged, not fatal
    pub fn validated_settings(&self) -> Result<Settings> {
        let settings = self.settings()?;
        ConfigurationValidator::new(false).validate_settings(&settings)?;
        Ok(settings)
    }

    pub fn client(&self) -> Result<(Settings, ApiClient)> {
        let settings = self.validated_settings()?;
        let client = ApiClient::from_settings(&settings)?;
        Ok((settings, client))
    }

    pub fn rse(&self, settings: &Settings, client: &ApiClient) -> Rse {
        Rse::from_settings(client.clone(), &settings.rse)
    }
}

/// Log level with precedence flag > RCBU_LOG_LEVEL > config file
pub fn resolve_log_level(flag: Option<&str>, config: Option<&Path>) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| std::env::var("RCBU_LOG_LEVEL").ok())
        .or_else(|| Settings::load(config).ok().and_then(|settings| settings.log_level))
}

impl From<HostArgs> for HostFilter {
    fn from(args: HostArgs) -> Self {
        HostFilter {
            name: args.name,
            host_server_id: args.host_server_id,
            ips: (!args.ips.is_empty()).then_some(args.ips),
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One line per agent: id, name, IP, status
pub fn print_agent_table(agents: &[AgentSummary]) {
    if agents.is_empty() {
        println!("No agents found.");
        return;
    }

    println!(
        "{:<12} {:<32} {:<16} {:<10} {}",
        "AGENT ID", "MACHINE NAME", "IP ADDRESS", "STATUS", "ENABLED"
    );
    for agent in agents {
        println!(
            "{:<12} {:<32} {:<16} {:<10} {}",
            agent.machine_agent_id,
            agent.machine_name.as_deref().unwrap_or("-"),
            agent.ip_address.as_deref().unwrap_or("-"),
            agent.status.as_deref().unwrap_or("-"),
            agent.is_disabled.map_or("-", |disabled| if disabled { "no" } else { "yes" }),
        );
    }
}

/// Ask on stdin; anything but y/yes declines
pub fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
