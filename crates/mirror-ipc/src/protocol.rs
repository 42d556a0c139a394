//! Control messages.

use mirror_engine::ControlCommand;
use serde::{Deserialize, Serialize};

/// Client to server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlRequest {
    Start,
    Stop,
    /// Ask for the current snapshot.
    Status,
}

impl ControlRequest {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// The supervisor command this request maps to, if any.
    pub fn command(self) -> Option<ControlCommand> {
        match self {
            ControlRequest::Start => Some(ControlCommand::Start),
            ControlRequest::Stop => Some(ControlCommand::Stop),
            ControlRequest::Status => None,
        }
    }
}
