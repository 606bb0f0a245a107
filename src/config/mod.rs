use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, fmt, EnvFilter};

pub mod settings;
pub mod validation;

pub use settings::Settings;

const DEFAULT_FILTER: &str = "rcbu=info,reqwest=warn,hyper=warn,tokio=warn";

/// Initialize logging system with structured output and environment-based level filtering
///
/// `RUST_LOG` wins over `level`; `level` only adjusts the `rcbu` target.
pub fn init_logging(level: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| match level {
        Some(level) => EnvFilter::try_new(format!(
            "rcbu={},reqwest=warn,hyper=warn,tokio=warn",
            level.to_lowercase()
        )),
        None => EnvFilter::try_new(DEFAULT_FILTER),
    })?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .with_level(true)
                .compact(),
        )
        .try_init()?;

    tracing::debug!("Structured logging initialized");
    Ok(())
}

/// Initialize logging for testing with reduced verbosity
pub fn init_test_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::new("rcbu=debug");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_test_writer().compact())
        .try_init()
        .or_else(|_| Ok(())) // Ignore if already initialized
}

/// Log structured events tagged with the agent or backup they concern
#[macro_export]
macro_rules! log_event {
    (agent = $agent_id:expr, $level:ident, $($field:tt)*) => {
        tracing::$level!(
            machine_agent_id = $agent_id,
            $($field)*
        );
    };
    (backup = $backup_id:expr, $level:ident, $($field:tt)*) => {
        tracing::$level!(
            backup_id = $backup_id,
            $($field)*
        );
    };
}
