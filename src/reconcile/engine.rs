//! Per-session item map

use super::ItemSnapshot;
use crate::protocol::{ErrorDetail, ItemKind, ItemPayload, ItemStatus, Upsert};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Why an upsert did not change its item
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Discard {
    #[error("duplicate of an already applied upsert (emitted at {emitted_at})")]
    Duplicate { emitted_at: DateTime<Utc> },
    #[error("stale upsert emitted at {incoming}; item is already at {current}")]
    Stale {
        incoming: DateTime<Utc>,
        current: DateTime<Utc>,
    },
    #[error("item already reached terminal status '{status}'")]
    TerminalLocked { status: ItemStatus },
    #[error("item is a {existing}, upsert describes a {incoming}")]
    KindMismatch {
        existing: ItemKind,
        incoming: ItemKind,
    },
    #[error("item belongs to turn '{existing}', upsert names turn '{incoming}'")]
    TurnMismatch { existing: String, incoming: String },
    #[error("turn '{turn_id}' already ended; new item refused")]
    TurnEnded { turn_id: String },
}

impl Discard {
    /// Protocol anomalies are worth reporting; stale and duplicate delivery
    /// is expected transport behaviour.
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, Discard::Duplicate { .. } | Discard::Stale { .. })
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Discard::Duplicate { .. } => "duplicate",
            Discard::Stale { .. } => "stale",
            Discard::TerminalLocked { .. } => "terminal_locked",
            Discard::KindMismatch { .. } => "kind_mismatch",
            Discard::TurnMismatch { .. } => "turn_mismatch",
            Discard::TurnEnded { .. } => "turn_ended",
        }
    }
}

/// Result of an accepted change to one item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemChange {
    /// Snapshot before the change; `None` when the item was just created
    pub previous: Option<ItemSnapshot>,
    pub current: ItemSnapshot,
    /// First upsert for the item was not a `create`
    pub implicit_create: bool,
}

impl ItemChange {
    pub fn is_create(&self) -> bool {
        self.previous.is_none()
    }
}

#[derive(Debug)]
struct ItemEntry {
    snapshot: ItemSnapshot,
    /// Fingerprints of the upserts accepted at `snapshot.last_emitted_at`,
    /// for duplicate detection
    frontier: HashSet<u64>,
}

impl ItemEntry {
    fn check(&self, upsert: &Upsert) -> Result<(), Discard> {
        let current = &self.snapshot;

        if upsert.emitted_at == current.last_emitted_at
            && self.frontier.contains(&fingerprint(upsert))
        {
            return Err(Discard::Duplicate {
                emitted_at: upsert.emitted_at,
            });
        }
        if upsert.emitted_at < current.last_emitted_at {
            return Err(Discard::Stale {
                incoming: upsert.emitted_at,
                current: current.last_emitted_at,
            });
        }
        if current.is_terminal() {
            return Err(Discard::TerminalLocked {
                status: current.status,
            });
        }
        if upsert.kind() != current.kind() {
            return Err(Discard::KindMismatch {
                existing: current.kind(),
                incoming: upsert.kind(),
            });
        }
        if upsert.turn_id != current.turn_id {
            return Err(Discard::TurnMismatch {
                existing: current.turn_id.clone(),
                incoming: upsert.turn_id.clone(),
            });
        }
        Ok(())
    }
}

/// Hash of everything an upsert carries, so redelivery of the same upsert can
/// be recognized without keeping it
fn fingerprint(upsert: &Upsert) -> u64 {
    let mut hasher = DefaultHasher::new();
    upsert.turn_id.hash(&mut hasher);
    upsert.item_id.hash(&mut hasher);
    upsert.source_timestamp.hash(&mut hasher);
    upsert.emitted_at.hash(&mut hasher);
    upsert.status.hash(&mut hasher);
    upsert.error.as_ref().map(|e| (&e.code, &e.message)).hash(&mut hasher);

    match &upsert.payload {
        ItemPayload::Message { content, origin } => {
            (ItemKind::Message, content, origin).hash(&mut hasher);
        }
        ItemPayload::Thinking {
            content,
            provider_id,
        } => {
            (ItemKind::Thinking, content, provider_id).hash(&mut hasher);
        }
        ItemPayload::ToolCall {
            tool_name,
            call_id,
            arguments,
            content,
            output,
        } => {
            (ItemKind::ToolCall, tool_name, call_id, content).hash(&mut hasher);
            // JSON values hash through their serialized form
            arguments.as_ref().map(Value::to_string).hash(&mut hasher);
            output
                .as_ref()
                .map(|output| (output.content.to_string(), output.is_error))
                .hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// All item snapshots of one session, keyed by item id
#[derive(Debug, Default)]
pub struct ItemMap {
    entries: HashMap<String, ItemEntry>,
    /// Item ids in first-seen order
    order: Vec<String>,
    next_sequence: u64,
}

impl ItemMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one upsert in arrival order.
    ///
    /// Every call consumes one arrival sequence number, including discarded
    /// upserts. Equal `emittedAt` values are ordered by that sequence, so the
    /// later arrival wins.
    pub fn apply(&mut self, upsert: &Upsert) -> Result<ItemChange, Discard> {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let entry = match self.entries.entry(upsert.item_id.clone()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let snapshot = ItemSnapshot::from_upsert(upsert, sequence);
                vacant.insert(ItemEntry {
                    snapshot: snapshot.clone(),
                    frontier: HashSet::from([fingerprint(upsert)]),
                });
                self.order.push(upsert.item_id.clone());
                return Ok(ItemChange {
                    previous: None,
                    current: snapshot,
                    implicit_create: upsert.status != ItemStatus::Create,
                });
            }
        };

        entry.check(upsert)?;

        let previous = entry.snapshot.clone();
        if upsert.emitted_at > entry.snapshot.last_emitted_at {
            entry.frontier.clear();
        }
        entry.frontier.insert(fingerprint(upsert));
        entry.snapshot.merge(upsert, sequence);

        Ok(ItemChange {
            previous: Some(previous),
            current: entry.snapshot.clone(),
            implicit_create: false,
        })
    }

    /// Finalize a non-terminal item as `error`. Returns `None` when the item
    /// is unknown or already terminal.
    pub fn force_finalize(&mut self, item_id: &str, error: ErrorDetail) -> Option<ItemChange> {
        let entry = self.entries.get_mut(item_id)?;
        if entry.snapshot.is_terminal() {
            return None;
        }
        let previous = entry.snapshot.clone();
        entry.snapshot.force_error(error);
        Some(ItemChange {
            previous: Some(previous),
            current: entry.snapshot.clone(),
            implicit_create: false,
        })
    }

    pub fn get(&self, item_id: &str) -> Option<&ItemSnapshot> {
        self.entries.get(item_id).map(|entry| &entry.snapshot)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    /// Snapshots in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &ItemSnapshot> + '_ {
        self.order.iter().filter_map(|id| self.get(id))
    }

    /// Ids of items of `turn_id` that have not reached a terminal status
    pub fn open_items_of_turn(&self, turn_id: &str) -> Vec<String> {
        self.iter()
            .filter(|snapshot| snapshot.turn_id == turn_id && !snapshot.is_terminal())
            .map(|snapshot| snapshot.item_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
