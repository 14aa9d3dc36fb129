//! Per-item snapshot and field merge policy

use crate::protocol::{ErrorDetail, ItemKind, ItemPayload, ItemStatus, ToolOutput, Upsert};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Type-specific snapshot fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ItemBody {
    Message {
        origin: Option<String>,
    },
    Thinking {
        provider_id: Option<String>,
    },
    ToolCall {
        tool_name: Option<String>,
        call_id: Option<String>,
        tool_arguments: Option<Value>,
        tool_output: Option<ToolOutput>,
    },
}

impl ItemBody {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemBody::Message { .. } => ItemKind::Message,
            ItemBody::Thinking { .. } => ItemKind::Thinking,
            ItemBody::ToolCall { .. } => ItemKind::ToolCall,
        }
    }
}

/// Current state of one item, derived from every upsert accepted for it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSnapshot {
    pub item_id: String,
    pub turn_id: String,
    pub status: ItemStatus,
    /// Full current text; for tool calls, the status line
    pub content: String,
    #[serde(flatten)]
    pub body: ItemBody,
    pub error: Option<ErrorDetail>,
    pub source_timestamp: DateTime<Utc>,
    pub last_emitted_at: DateTime<Utc>,
    /// Arrival sequence of the last accepted upsert
    pub last_sequence: u64,
    /// Number of accepted changes, starting at 1
    pub revision: u32,
    /// Finalized by the orphan policy rather than by an upsert
    pub forced: bool,
}

impl ItemSnapshot {
    /// Snapshot for the first upsert seen for an item; any status is accepted
    pub fn from_upsert(upsert: &Upsert, sequence: u64) -> Self {
        let body = match &upsert.payload {
            ItemPayload::Message { .. } => ItemBody::Message { origin: None },
            ItemPayload::Thinking { .. } => ItemBody::Thinking { provider_id: None },
            ItemPayload::ToolCall { .. } => ItemBody::ToolCall {
                tool_name: None,
                call_id: None,
                tool_arguments: None,
                tool_output: None,
            },
        };
        let mut snapshot = Self {
            item_id: upsert.item_id.clone(),
            turn_id: upsert.turn_id.clone(),
            status: upsert.status,
            content: String::new(),
            body,
            error: None,
            source_timestamp: upsert.source_timestamp,
            last_emitted_at: upsert.emitted_at,
            last_sequence: sequence,
            revision: 0,
            forced: false,
        };
        snapshot.merge(upsert, sequence);
        snapshot
    }

    pub fn kind(&self) -> ItemKind {
        self.body.kind()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fold an accepted upsert into the snapshot.
    ///
    /// Text fields are replaced when present. Identity metadata and the
    /// additive tool fields keep their previous value when omitted. Callers
    /// guarantee the upsert's kind matches the snapshot's.
    pub fn merge(&mut self, upsert: &Upsert, sequence: u64) {
        self.status = upsert.status;
        self.source_timestamp = upsert.source_timestamp;
        self.last_emitted_at = upsert.emitted_at;
        self.last_sequence = sequence;
        self.revision += 1;

        if let Some(error) = &upsert.error {
            self.error = Some(error.clone());
        }
        if let Some(content) = upsert.payload.content() {
            content.clone_into(&mut self.content);
        }

        match (&mut self.body, &upsert.payload) {
            (ItemBody::Message { origin }, ItemPayload::Message { origin: incoming, .. }) => {
                keep_latest(origin, incoming.as_ref());
            }
            (
                ItemBody::Thinking { provider_id },
                ItemPayload::Thinking {
                    provider_id: incoming,
                    ..
                },
            ) => keep_latest(provider_id, incoming.as_ref()),
            (
                ItemBody::ToolCall {
                    tool_name,
                    call_id,
                    tool_arguments,
                    tool_output,
                },
                ItemPayload::ToolCall {
                    tool_name: incoming_name,
                    call_id: incoming_call,
                    arguments,
                    output,
                    ..
                },
            ) => {
                keep_latest(tool_name, incoming_name.as_ref());
                keep_latest(call_id, incoming_call.as_ref());
                keep_latest(tool_arguments, arguments.as_ref());
                keep_latest(tool_output, output.as_ref());
            }
            // Kind mismatches are rejected before merging
            _ => {}
        }
    }

    /// Move a still-open item to `error` without an upsert
    pub(crate) fn force_error(&mut self, error: ErrorDetail) {
        self.status = ItemStatus::Error;
        self.error = Some(error);
        self.revision += 1;
        self.forced = true;
    }
}

fn keep_latest<T: Clone>(slot: &mut Option<T>, incoming: Option<&T>) {
    if let Some(value) = incoming {
        *slot = Some(value.clone());
    }
}
