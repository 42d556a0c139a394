//! Request and response envelopes of the rippled websocket API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A command sent to the node.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerRequest {
    pub id: String,
    pub command: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub streams: Vec<String>,
}

impl LedgerRequest {
    fn new(prefix: &str, command: &str) -> Self {
        Self {
            id: format!("{}-{}", prefix, uuid::Uuid::new_v4()),
            command: command.to_string(),
            accounts: Vec::new(),
            streams: Vec::new(),
        }
    }

    /// Subscribe to transactions touching `accounts` and to the given streams.
    pub fn subscribe(accounts: &[String], streams: &[String]) -> Self {
        Self {
            accounts: accounts.to_vec(),
            streams: streams.to_vec(),
            ..Self::new("subscribe", "subscribe")
        }
    }

    /// Keepalive ping. The node answers with an empty success response.
    pub fn ping() -> Self {
        Self::new("ping", "ping")
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A direct response to a [`LedgerRequest`].
///
/// Pushed stream messages (`transaction`, `ledgerClosed`, ...) do not parse
/// as a response.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerResponse {
    #[serde(default)]
    pub id: Option<Value>,
    pub status: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    msg_type: Option<String>,
}

impl LedgerResponse {
    /// Parse `text` if it is a response envelope.
    pub fn parse(text: &str) -> Option<Self> {
        let envelope: Envelope = serde_json::from_str(text).ok()?;
        if envelope.msg_type.as_deref() != Some("response") {
            return None;
        }
        serde_json::from_str(text).ok()
    }

    /// Whether this answers the request with the given id.
    pub fn answers(&self, request_id: &str) -> bool {
        self.id.as_ref().and_then(Value::as_str) == Some(request_id)
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Human-readable failure reason.
    pub fn error_text(&self) -> String {
        match (&self.error, &self.error_message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => format!("status {}", self.status),
        }
    }
}
