use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Heartbeats older than this many seconds do not prove the agent is awake
pub const HEARTBEAT_MAX_AGE: f64 = 26.0;

/// One RSE channel record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RseEvent {
    /// Seconds since the event was published
    pub age: f64,
    pub data: RseEventData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RseEventData {
    pub event: String,
    #[serde(default)]
    pub machine_agent_id: Option<u64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl RseEvent {
    pub fn is_heartbeat(&self) -> bool {
        self.data.event == "Heartbeat"
    }

    /// A recent heartbeat published by `machine_agent_id`
    pub fn is_fresh_heartbeat_from(&self, machine_agent_id: u64) -> bool {
        self.is_heartbeat()
            && self.data.machine_agent_id == Some(machine_agent_id)
            && self.age < HEARTBEAT_MAX_AGE
    }
}

/// Channel read result: direct RSE wraps events in an object, the API relay
/// returns a bare list.
#[derive(Debug, Clone, PartialEq)]
pub enum RseMessage {
    Direct(Vec<Value>),
    Relayed(Vec<Value>),
    Empty,
}

impl RseMessage {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(events) => RseMessage::Relayed(events),
            Value::Object(mut map) => match map.remove("events") {
                Some(Value::Array(events)) => RseMessage::Direct(events),
                _ => RseMessage::Empty,
            },
            _ => RseMessage::Empty,
        }
    }

    pub fn raw_events(&self) -> &[Value] {
        match self {
            RseMessage::Direct(events) | RseMessage::Relayed(events) => events,
            RseMessage::Empty => &[],
        }
    }

    pub fn source_label(&self) -> &'static str {
        match self {
            RseMessage::Direct(_) => "RSE",
            RseMessage::Relayed(_) => "API",
            RseMessage::Empty => "none",
        }
    }
}
