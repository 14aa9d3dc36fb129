//! Per-session composition of decode, reconcile, track and notify
//!
//! A `Session` owns all item and turn state of one agent session. Frames are
//! processed one at a time, fully, in the order they are handed in.

mod relay;
#[cfg(test)]
pub(crate) mod testing;

pub use relay::Relay;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::projection::Projector;
use crate::protocol::{decode_frame, DecodeError, ErrorDetail, Frame, SessionId, TurnEvent, Upsert};
use crate::reconcile::{Discard, ItemChange, ItemMap, ItemSnapshot};
use crate::turns::{TurnState, TurnStatus, TurnTracker, TurnTransitionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Error code given to items forced closed because their turn was cancelled
pub const TURN_CANCELLED: &str = "turn_cancelled";

/// What happens to non-terminal items when their turn ends abnormally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Items stay as they are; late upserts are reconciled normally
    #[default]
    LeaveOpen,
    /// Items are forced to `error`; new items for the ended turn are refused
    Finalize,
}

impl OrphanPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "leave_open" => Some(OrphanPolicy::LeaveOpen),
            "finalize" => Some(OrphanPolicy::Finalize),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrphanPolicy::LeaveOpen => "leave_open",
            OrphanPolicy::Finalize => "finalize",
        }
    }
}

impl fmt::Display for OrphanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of ingesting one raw frame
#[derive(Debug)]
pub enum Ingested {
    /// An upsert was accepted
    Item(ItemChange),
    /// A turn event was applied; every turn that changed, in notification order
    Turn(Vec<TurnState>),
    /// The upsert was valid but left its item unchanged
    Discarded(Discard),
    /// The turn event did not change anything
    TurnIgnored(TurnTransitionError),
    /// The frame could not be decoded
    Rejected(DecodeError),
}

impl Ingested {
    /// Whether any state changed
    pub fn is_applied(&self) -> bool {
        matches!(self, Ingested::Item(_) | Ingested::Turn(_))
    }
}

/// Serializable read model of a session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: SessionId,
    pub orphan_policy: OrphanPolicy,
    pub active_turn_id: Option<String>,
    /// Items in first-seen order
    pub items: Vec<ItemSnapshot>,
    /// Turns in first-seen order
    pub turns: Vec<TurnState>,
}

/// All reconciled state of one session
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    items: ItemMap,
    turns: TurnTracker,
    policy: OrphanPolicy,
}

impl Session {
    pub fn new(id: SessionId, policy: OrphanPolicy) -> Self {
        Self {
            turns: TurnTracker::new(id.clone()),
            id,
            items: ItemMap::new(),
            policy,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn policy(&self) -> OrphanPolicy {
        self.policy
    }

    pub fn items(&self) -> &ItemMap {
        &self.items
    }

    pub fn turns(&self) -> &TurnTracker {
        &self.turns
    }

    /// Decode a text frame and apply it
    pub fn ingest_str<P: Projector, D: DiagnosticSink>(
        &mut self,
        raw: &str,
        projector: &mut P,
        sink: &D,
    ) -> Ingested {
        self.ingest_slice(raw.as_bytes(), projector, sink)
    }

    /// Decode a raw byte frame and apply it. Invalid UTF-8 is reported as a
    /// decode failure.
    pub fn ingest_slice<P: Projector, D: DiagnosticSink>(
        &mut self,
        raw: &[u8],
        projector: &mut P,
        sink: &D,
    ) -> Ingested {
        match serde_json::from_slice::<Value>(raw) {
            Ok(value) => self.ingest(&value, projector, sink),
            Err(e) => self.reject(DecodeError::InvalidJson(e), sink),
        }
    }

    /// Decode one frame and apply it.
    ///
    /// Undecodable frames and frames naming another session go to the sink
    /// only; the projector hears about accepted changes only.
    pub fn ingest<P: Projector, D: DiagnosticSink>(
        &mut self,
        raw: &Value,
        projector: &mut P,
        sink: &D,
    ) -> Ingested {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(e) => return self.reject(e, sink),
        };

        if frame.session_id() != &self.id {
            let error = DecodeError::SessionMismatch {
                expected: self.id.to_string(),
                found: frame.session_id().to_string(),
            };
            return self.reject(error, sink);
        }

        match frame {
            Frame::Upsert(upsert) => self.apply_upsert(&upsert, projector, sink),
            Frame::Turn(event) => self.apply_turn_event(&event, projector, sink),
        }
    }

    fn reject<D: DiagnosticSink>(&self, error: DecodeError, sink: &D) -> Ingested {
        sink.report(&self.id.to_string(), Diagnostic::DecodeFailed(&error));
        Ingested::Rejected(error)
    }

    fn apply_upsert<P: Projector, D: DiagnosticSink>(
        &mut self,
        upsert: &Upsert,
        projector: &mut P,
        sink: &D,
    ) -> Ingested {
        let result = match self.refuse_for_ended_turn(upsert) {
            Some(discard) => Err(discard),
            None => self.items.apply(upsert),
        };

        let change = match result {
            Ok(change) => change,
            Err(discard) => {
                sink.report(
                    &self.id.to_string(),
                    Diagnostic::Discarded {
                        item_id: &upsert.item_id,
                        turn_id: &upsert.turn_id,
                        discard: &discard,
                    },
                );
                return Ingested::Discarded(discard);
            }
        };

        for turn in self.turns.record_item(&upsert.turn_id, &upsert.item_id) {
            projector.on_turn_change(&self.id, &turn);
            self.finalize_orphans(&turn, projector);
        }
        projector.on_item_change(&self.id, &change.current);
        Ingested::Item(change)
    }

    /// Under `Finalize`, a new item for a turn that really ended abnormally
    /// is refused. A synthetic superseded outcome does not count.
    fn refuse_for_ended_turn(&self, upsert: &Upsert) -> Option<Discard> {
        if self.policy != OrphanPolicy::Finalize || self.items.contains(&upsert.item_id) {
            return None;
        }
        let turn = self.turns.get(&upsert.turn_id)?;
        let ended = turn.status.is_abnormal() && !turn.has_synthetic_outcome();
        ended.then(|| Discard::TurnEnded {
            turn_id: upsert.turn_id.clone(),
        })
    }

    fn apply_turn_event<P: Projector, D: DiagnosticSink>(
        &mut self,
        event: &TurnEvent,
        projector: &mut P,
        sink: &D,
    ) -> Ingested {
        let changed = match self.turns.apply(event) {
            Ok(changed) => changed,
            Err(e) => {
                sink.report(&self.id.to_string(), Diagnostic::TurnIgnored(&e));
                return Ingested::TurnIgnored(e);
            }
        };

        for turn in &changed {
            tracing::debug!(
                session_id = %self.id,
                turn_id = %turn.turn_id,
                status = %turn.status,
                "Turn changed"
            );
            projector.on_turn_change(&self.id, turn);
            self.finalize_orphans(turn, projector);
        }
        Ingested::Turn(changed)
    }

    /// Force the open items of an abnormally ended turn to `error`.
    ///
    /// A superseded turn is left alone: its real outcome may still arrive,
    /// and forcing its items is irreversible.
    fn finalize_orphans<P: Projector>(&mut self, turn: &TurnState, projector: &mut P) {
        if self.policy != OrphanPolicy::Finalize
            || !turn.status.is_abnormal()
            || turn.has_synthetic_outcome()
        {
            return;
        }
        let detail = orphan_error(turn);
        for item_id in self.items.open_items_of_turn(&turn.turn_id) {
            if let Some(change) = self.items.force_finalize(&item_id, detail.clone()) {
                tracing::debug!(
                    session_id = %self.id,
                    turn_id = %turn.turn_id,
                    item_id = %item_id,
                    "Finalized orphaned item"
                );
                projector.on_item_change(&self.id, &change.current);
            }
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id.clone(),
            orphan_policy: self.policy,
            active_turn_id: self.turns.active().map(|turn| turn.turn_id.clone()),
            items: self.items.iter().cloned().collect(),
            turns: self.turns.iter().cloned().collect(),
        }
    }
}

fn orphan_error(turn: &TurnState) -> ErrorDetail {
    match (turn.status, &turn.error) {
        (TurnStatus::Errored, Some(error)) => error.clone(),
        (TurnStatus::Errored, None) => {
            ErrorDetail::new("turn_error", "Turn failed before this item finished")
        }
        _ => ErrorDetail::new(TURN_CANCELLED, "Turn was cancelled before this item finished"),
    }
}
