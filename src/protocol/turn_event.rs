//! Turn lifecycle events

use super::SessionId;
use serde::{Deserialize, Serialize};

/// How a turn ended, as reported by `turn_complete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Completed,
    Cancelled,
}

/// Token usage reported when a turn ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_tokens: Option<u64>,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_tokens.unwrap_or(0)
            + self.cache_creation_tokens.unwrap_or(0)
    }
}

/// Turn lifecycle event, sent as a top-level frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum TurnEvent {
    TurnStarted {
        turn_id: String,
        session_id: SessionId,
        model_id: String,
        provider_id: String,
    },
    TurnComplete {
        turn_id: String,
        session_id: SessionId,
        status: TurnOutcome,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    TurnError {
        turn_id: String,
        session_id: SessionId,
        error_code: String,
        error_message: String,
    },
}

impl TurnEvent {
    pub fn turn_id(&self) -> &str {
        match self {
            TurnEvent::TurnStarted { turn_id, .. }
            | TurnEvent::TurnComplete { turn_id, .. }
            | TurnEvent::TurnError { turn_id, .. } => turn_id,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            TurnEvent::TurnStarted { session_id, .. }
            | TurnEvent::TurnComplete { session_id, .. }
            | TurnEvent::TurnError { session_id, .. } => session_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TurnEvent::TurnStarted { .. } => "turn_started",
            TurnEvent::TurnComplete { .. } => "turn_complete",
            TurnEvent::TurnError { .. } => "turn_error",
        }
    }
}
