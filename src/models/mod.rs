// Public exports for data models

pub mod agent;
pub mod backup;
pub mod configuration;
pub mod log_level;
pub mod rse;

pub use agent::{AgentDetails, AgentSummary, EncryptionKey, HostFilter};
pub use backup::{ActionRequest, BackupAction, BackupRecord, BackupReport, BackupState};
pub use configuration::{AgentConfiguration, BackupConfiguration, RseSettings, RseTiming};
pub use log_level::LogLevel;
pub use rse::{RseEvent, RseMessage};
