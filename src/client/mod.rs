//! Client-side access to the Cloud Backup API
//!
//! Everything goes through [`ApiClient`], which attaches the auth token from
//! an [`Authenticator`]. RSE reads may target a different host.

pub mod agents;
pub mod auth;
pub mod backup;
pub mod keep_awake;
pub mod log_level;
pub mod rse;
pub mod transport;

pub use agents::Agents;
pub use auth::{Authenticator, IdentityAuthenticator, StaticToken};
pub use backup::{BackupCommand, BackupStatus};
pub use keep_awake::KeepAwake;
pub use log_level::AgentLogLevels;
pub use rse::{Rse, RseData, RseRoute};
pub use transport::{ApiClient, ApiRequest, Endpoint};
