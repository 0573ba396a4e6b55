//! Request and response records for the backend endpoints.
//!
//! Response fields the dashboard can live without are optional, so a backend
//! that omits them still decodes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub reply: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SetupApplied {
    #[serde(default)]
    pub provider_active: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderTest {
    #[serde(default)]
    pub result: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionEntry {
    pub session_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl SessionEntry {
    pub fn label(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.is_empty() => format!("{} ({})", name, self.session_id),
            _ => self.session_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SessionList {
    #[serde(default)]
    pub sessions: Vec<SessionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateSessionRequest {
    pub session_id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct InteractionEvent {
    #[serde(default)]
    pub user_text: String,
    #[serde(default)]
    pub bot_text: Option<String>,
}

/// `/interactions` returns newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Interactions {
    #[serde(default)]
    pub events: Vec<InteractionEvent>,
}

/// What a scheduled job does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JobPayload {
    Heartbeat { kind: String, channel: String },
    Message { kind: String, session_id: String, text: String },
}

impl JobPayload {
    pub const HEARTBEAT: &'static str = "heartbeat";

    /// Heartbeats post to a channel; every other kind sends `text` into a session.
    pub fn new(kind: &str, session_id: &str, text: &str) -> Self {
        if kind == Self::HEARTBEAT {
            let channel = if text.is_empty() { "web-ui" } else { text };
            JobPayload::Heartbeat {
                kind: kind.to_string(),
                channel: channel.to_string(),
            }
        } else {
            JobPayload::Message {
                kind: kind.to_string(),
                session_id: session_id.to_string(),
                text: text.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    pub name: String,
    pub cron: String,
    pub enabled: bool,
    pub payload: JobPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookText {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookRequest {
    pub payload: WebhookText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCheck {
    File(String),
    Shell(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheckRequest {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellCheckRequest {
    pub command: String,
}
