//! CLI interface for rcbu.
//!
//! Thin layer over [`crate::client`]: every subcommand loads settings, builds
//! an authenticated API client and calls one or two client operations.

mod commands;
mod utils;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;
pub use utils::*;

#[derive(Parser)]
#[command(name = "rcbu")]
#[command(about = "Rackspace Cloud Backup API client")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Use this auth token instead of configured credentials
    #[arg(long, global = true, env = "RCBU_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Agents registered to the account
    Agents {
        #[command(subcommand)]
        command: AgentsCommand,
    },

    /// Operate on a single machine agent
    Agent {
        /// Machine agent id
        id: u64,

        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Manual backups
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Initialize default configuration at default location
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Manage configuration
    Config {
        #[arg(long)]
        show: bool,

        #[arg(long)]
        validate: bool,

        /// Treat validation warnings as errors
        #[arg(long, requires = "validate")]
        strict: bool,
    },

    /// Show version information
    Version,
}

/// Cloud server matching options; at least one is required for host lookups
#[derive(Args, Debug, Default, Clone)]
pub struct HostArgs {
    /// Cloud server name (wildcards allowed)
    #[arg(long)]
    pub name: Option<String>,

    /// Cloud server id (HostServerId)
    #[arg(long = "host-id")]
    pub host_server_id: Option<String>,

    /// Cloud server IP address (repeatable)
    #[arg(long = "ip")]
    pub ips: Vec<String>,
}

#[derive(Subcommand)]
pub enum AgentsCommand {
    /// List agents, optionally only those of one cloud server
    List {
        #[command(flatten)]
        host: HostArgs,
    },

    /// De-register every agent of one cloud server
    RemoveHost {
        #[command(flatten)]
        host: HostArgs,

        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum AgentCommand {
    /// Agent details
    Show,

    /// Agent configuration, or one of its backup configurations
    Config {
        /// Only show the named backup configuration
        #[arg(long)]
        backup: Option<String>,
    },

    Enable,

    Disable,

    /// De-register the agent
    Remove,

    /// Wake the agent and confirm it through its RSE heartbeat
    Wake {
        /// Seconds allowed for each of the wake and heartbeat phases (defaults to rse.timeout_ms)
        #[arg(long)]
        timeout: Option<u64>,

        /// Keep the agent awake for this many seconds after waking it
        #[arg(long)]
        keep_awake: Option<u64>,

        /// Seconds between keep-awake rounds (derived from the agent's heartbeat if omitted)
        #[arg(long, requires = "keep_awake")]
        period: Option<u64>,
    },

    /// Read or change the agent's log level
    LogLevel {
        #[command(subcommand)]
        command: LogLevelCommand,
    },
}

#[derive(Subcommand)]
pub enum LogLevelCommand {
    Get,

    /// Set the level by name (Fatal..All) or number (1..7)
    Set { level: String },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Start a manual backup
    Start {
        /// Backup configuration id
        #[arg(required_unless_present = "name")]
        config_id: Option<u64>,

        /// Backup configuration name; requires --agent
        #[arg(long, requires = "agent", conflicts_with = "config_id")]
        name: Option<String>,

        /// Machine agent owning the named backup configuration
        #[arg(long)]
        agent: Option<u64>,

        /// Wait for the backup to finish and print its report
        #[arg(long)]
        wait: bool,
    },

    /// Stop a running backup
    Stop { backup_id: u64 },

    /// Current state of a backup
    Status { backup_id: u64 },

    /// Completion report of a backup
    Report { backup_id: u64 },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let ctx = CommandContext {
            config: self.config,
            token: self.token,
        };

        match self.command {
            Commands::Agents { command } => match command {
                AgentsCommand::List { host } => list_agents(&ctx, host).await,
                AgentsCommand::RemoveHost { host, yes } => remove_host_agents(&ctx, host, yes).await,
            },

            Commands::Agent { id, command } => match command {
                AgentCommand::Show => show_agent(&ctx, id).await,
                AgentCommand::Config { backup } => show_agent_config(&ctx, id, backup).await,
                AgentCommand::Enable => set_agent_enabled(&ctx, id, true).await,
                AgentCommand::Disable => set_agent_enabled(&ctx, id, false).await,
                AgentCommand::Remove => remove_agent(&ctx, id).await,
                AgentCommand::Wake {
                    timeout,
                    keep_awake,
                    period,
                } => wake_agent(&ctx, id, timeout, keep_awake, period).await,
                AgentCommand::LogLevel { command } => match command {
                    LogLevelCommand::Get => get_log_level(&ctx, id).await,
                    LogLevelCommand::Set { level } => set_log_level(&ctx, id, &level).await,
                },
            },

            Commands::Backup { command } => match command {
                BackupCommands::Start {
                    config_id,
                    name,
                    agent,
                    wait,
                } => start_backup(&ctx, config_id, name, agent, wait).await,
                BackupCommands::Stop { backup_id } => stop_backup(&ctx, backup_id).await,
                BackupCommands::Status { backup_id } => backup_status(&ctx, backup_id).await,
                BackupCommands::Report { backup_id } => backup_report(&ctx, backup_id).await,
            },

            Commands::Init { force } => init(&ctx, force).await,
            Commands::Config {
                show,
                validate,
                strict,
            } => config(&ctx, show, validate, strict).await,

            Commands::Version => version().await,
        }
    }
}
