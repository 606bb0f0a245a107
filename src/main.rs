//! rcbu - command line client for the Rackspace Cloud Backup API.

use anyhow::Result;
use rcbu::cli::{resolve_log_level, Cli};
use rcbu::config::init_logging;
use rcbu::RcbuError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let level = resolve_log_level(cli.log_level.as_deref(), cli.config.as_deref());
    init_logging(level.as_deref())?;

    if let Err(e) = cli.run().await {
        if let Some(err) = e.downcast_ref::<RcbuError>() {
            eprintln!("Error: {}", err.user_message());
            std::process::exit(err.exit_code());
        }
        return Err(e);
    }
    Ok(())
}
