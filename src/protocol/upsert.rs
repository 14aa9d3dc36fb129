//! Item upsert types

use super::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of conversational item an upsert describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Message,
    Thinking,
    ToolCall,
}

impl ItemKind {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "message" => Some(Self::Message),
            "thinking" => Some(Self::Thinking),
            "tool_call" => Some(Self::ToolCall),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Thinking => "thinking",
            Self::ToolCall => "tool_call",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status carried by an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Create,
    Update,
    Complete,
    Error,
}

impl ItemStatus {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// `complete` and `error` end an item; nothing may change it afterwards
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error code and human-readable message, used by items and turns alike
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Result of a tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    pub content: Value,
    pub is_error: bool,
}

impl ToolOutput {
    /// Output as display text: strings verbatim, anything else as compact JSON
    pub fn text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Type-specific part of an upsert.
///
/// `None` means the upsert did not carry the field; the reconciler keeps the
/// previous value in that case.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemPayload {
    Message {
        content: Option<String>,
        origin: Option<String>,
    },
    Thinking {
        content: Option<String>,
        provider_id: Option<String>,
    },
    ToolCall {
        tool_name: Option<String>,
        call_id: Option<String>,
        arguments: Option<Value>,
        /// Status line shown while the tool runs ("running", "done", ...)
        content: Option<String>,
        output: Option<ToolOutput>,
    },
}

impl ItemPayload {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemPayload::Message { .. } => ItemKind::Message,
            ItemPayload::Thinking { .. } => ItemKind::Thinking,
            ItemPayload::ToolCall { .. } => ItemKind::ToolCall,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            ItemPayload::Message { content, .. }
            | ItemPayload::Thinking { content, .. }
            | ItemPayload::ToolCall { content, .. } => content.as_deref(),
        }
    }
}

/// One decoded upsert: the full current state of one item at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    pub turn_id: String,
    pub session_id: SessionId,
    pub item_id: String,
    pub source_timestamp: DateTime<Utc>,
    pub emitted_at: DateTime<Utc>,
    pub status: ItemStatus,
    pub payload: ItemPayload,
    /// Present exactly when `status` is `Error`
    pub error: Option<ErrorDetail>,
}

impl Upsert {
    pub fn kind(&self) -> ItemKind {
        self.payload.kind()
    }
}
