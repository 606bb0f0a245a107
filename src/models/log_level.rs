use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RcbuError;

/// Agent log verbosity; the API identifies levels by id 1 through 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Fatal = 1,
    Error = 2,
    Warn = 3,
    Info = 4,
    Debug = 5,
    Trace = 6,
    All = 7,
}

impl LogLevel {
    pub const ALL_LEVELS: [LogLevel; 7] = [
        LogLevel::Fatal,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
        LogLevel::All,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL_LEVELS.iter().copied().find(|level| level.id() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            LogLevel::Fatal => "Fatal",
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
            LogLevel::All => "All",
        }
    }
}

impl FromStr for LogLevel {
    type Err = RcbuError;

    /// Accepts the level name (exact case, as the API reports it) or its id
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('"');
        if let Some(level) = Self::ALL_LEVELS.iter().copied().find(|l| l.name() == trimmed) {
            return Ok(level);
        }

        trimmed
            .parse::<u8>()
            .ok()
            .and_then(Self::from_id)
            .ok_or_else(|| RcbuError::InvalidLogLevel(s.to_string()))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
