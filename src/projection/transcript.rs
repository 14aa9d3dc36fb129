//! Plain-text transcript projection
//!
//! Keeps one transcript line per item, created on the first notification for
//! that item and rewritten in place afterwards.

use super::{Projector, RenderHandles};
use crate::protocol::SessionId;
use crate::reconcile::{ItemBody, ItemSnapshot};
use crate::turns::{TurnState, TurnStatus};
use std::collections::HashMap;

/// One rendered transcript line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub item_id: String,
    pub turn_id: String,
    pub text: String,
    /// Item not yet terminal
    pub open: bool,
}

/// Transcript of a single session
#[derive(Debug, Default)]
pub struct Transcript {
    handles: RenderHandles<usize>,
    entries: Vec<TranscriptEntry>,
    turns: HashMap<String, TurnStatus>,
}

impl Transcript {
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn entry(&self, item_id: &str) -> Option<&TranscriptEntry> {
        self.handles.get(item_id).map(|&index| &self.entries[index])
    }

    /// Number of entries ever created; equals the number of distinct items
    pub fn created(&self) -> usize {
        self.handles.created()
    }

    /// Whole transcript, one line per item
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn turn_ended(&self, turn_id: &str) -> bool {
        self.turns
            .get(turn_id)
            .is_some_and(|status| status.is_terminal())
    }

    fn apply_item(&mut self, snapshot: &ItemSnapshot) {
        let interrupted = !snapshot.is_terminal() && self.turn_ended(&snapshot.turn_id);
        let text = render_item(snapshot, interrupted);

        let next_index = self.entries.len();
        let (&mut index, created) = self.handles.get_or_create(&snapshot.item_id, || next_index);
        if created {
            self.entries.push(TranscriptEntry {
                item_id: snapshot.item_id.clone(),
                turn_id: snapshot.turn_id.clone(),
                text,
                open: !snapshot.is_terminal(),
            });
            return;
        }

        let entry = &mut self.entries[index];
        entry.text = text;
        entry.open = !snapshot.is_terminal();
    }

    /// Mark still-open entries of an ended turn as interrupted
    fn apply_turn(&mut self, turn: &TurnState) {
        self.turns.insert(turn.turn_id.clone(), turn.status);
        if !turn.status.is_terminal() {
            return;
        }
        for entry in &mut self.entries {
            if entry.open && entry.turn_id == turn.turn_id && !entry.text.ends_with(INTERRUPTED) {
                entry.text.push_str(INTERRUPTED);
            }
        }
    }
}

const INTERRUPTED: &str = " [interrupted]";

/// Render one item as a single transcript line
pub fn render_item(snapshot: &ItemSnapshot, interrupted: bool) -> String {
    let mut line = match &snapshot.body {
        ItemBody::Message { .. } => snapshot.content.clone(),
        ItemBody::Thinking { .. } => format!("thinking: {}", snapshot.content),
        ItemBody::ToolCall {
            tool_name,
            call_id,
            tool_output,
            ..
        } => {
            let label = tool_name
                .as_deref()
                .or(call_id.as_deref())
                .unwrap_or("unknown");
            let mut line = format!("[tool {label}] {}", snapshot.content);
            if let Some(output) = tool_output {
                let marker = if output.is_error { " (error)" } else { "" };
                line.push_str(&format!("\n  -> {}{marker}", output.text()));
            }
            line
        }
    };

    if let Some(error) = &snapshot.error {
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&format!("error: {} [{}]", error.message, error.code));
    }
    if interrupted {
        line.push_str(INTERRUPTED);
    }
    line
}

/// Projector that keeps a `Transcript` per session
#[derive(Debug, Default)]
pub struct TranscriptProjector {
    sessions: HashMap<SessionId, Transcript>,
}

impl TranscriptProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self, session_id: &SessionId) -> Option<&Transcript> {
        self.sessions.get(session_id)
    }
}

impl Projector for TranscriptProjector {
    fn on_item_change(&mut self, session_id: &SessionId, snapshot: &ItemSnapshot) {
        self.sessions
            .entry(session_id.clone())
            .or_default()
            .apply_item(snapshot);
    }

    fn on_turn_change(&mut self, session_id: &SessionId, turn: &TurnState) {
        self.sessions
            .entry(session_id.clone())
            .or_default()
            .apply_turn(turn);
    }

    fn on_session_disposed(&mut self, session_id: &SessionId) {
        self.sessions.remove(session_id);
    }
}
