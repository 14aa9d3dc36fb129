//! Per-session turn tracker

use super::{transition, TurnState, TurnTransitionError};
use crate::protocol::{SessionId, TurnEvent};
use std::collections::HashMap;

/// Owns every turn of one session and the pointer to its running turn
#[derive(Debug)]
pub struct TurnTracker {
    session_id: SessionId,
    turns: HashMap<String, TurnState>,
    /// Turn ids in first-seen order
    order: Vec<String>,
    active: Option<String>,
}

impl TurnTracker {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            turns: HashMap::new(),
            order: Vec::new(),
            active: None,
        }
    }

    /// Apply a turn event.
    ///
    /// Returns every turn whose state changed, in the order observers should
    /// hear about them: a superseded predecessor first, then the event's turn.
    pub fn apply(&mut self, event: &TurnEvent) -> Result<Vec<TurnState>, TurnTransitionError> {
        let next = transition(self.turns.get(event.turn_id()), event)?;
        let mut changed = Vec::new();

        if next.is_running() {
            changed.extend(self.supersede_active(&next.turn_id));
            self.active = Some(next.turn_id.clone());
        } else if self.active.as_deref() == Some(next.turn_id.as_str()) {
            self.active = None;
        }

        self.store(next.clone());
        changed.push(next);
        Ok(changed)
    }

    /// Note that an item of `turn_id` was accepted.
    ///
    /// A turn seen only through its items is started implicitly (its
    /// `turn_started` was lost). It becomes the running turn only when no
    /// other turn is running; otherwise it is recorded as already superseded
    /// by the running turn, so only a real `turn_started` replaces a live
    /// turn. Returns the turns whose lifecycle changed.
    pub fn record_item(&mut self, turn_id: &str, item_id: &str) -> Vec<TurnState> {
        if let Some(turn) = self.turns.get_mut(turn_id) {
            if !turn.item_ids.iter().any(|id| id == item_id) {
                turn.item_ids.push(item_id.to_string());
            }
            return Vec::new();
        }

        let mut turn = TurnState {
            implicit: true,
            ..TurnState::running(turn_id, self.session_id.clone(), None, None)
        };
        turn.item_ids.push(item_id.to_string());

        if let Some(active) = self.active().map(|active| active.turn_id.clone()) {
            tracing::debug!(
                session_id = %self.session_id,
                turn_id,
                item_id,
                active_turn_id = %active,
                "Item references unknown turn while another runs, recording it as superseded"
            );
            turn = turn.supersede(&active);
        } else {
            tracing::debug!(
                session_id = %self.session_id,
                turn_id,
                item_id,
                "Item references unknown turn, starting it implicitly"
            );
            self.active = Some(turn_id.to_string());
        }

        self.store(turn.clone());
        vec![turn]
    }

    /// Mark the running turn as superseded by `next_turn_id`, unless it is
    /// that same turn
    fn supersede_active(&mut self, next_turn_id: &str) -> Option<TurnState> {
        let active_id = self.active.as_deref().filter(|id| *id != next_turn_id)?;
        let turn = self.turns.get_mut(active_id).filter(|turn| turn.is_running())?;

        tracing::warn!(
            session_id = %self.session_id,
            turn_id = %turn.turn_id,
            next_turn_id,
            "Turn superseded before reporting an outcome"
        );

        *turn = turn.supersede(next_turn_id);
        let superseded = turn.clone();
        self.active = None;
        Some(superseded)
    }

    fn store(&mut self, turn: TurnState) {
        if !self.turns.contains_key(&turn.turn_id) {
            self.order.push(turn.turn_id.clone());
        }
        self.turns.insert(turn.turn_id.clone(), turn);
    }

    pub fn get(&self, turn_id: &str) -> Option<&TurnState> {
        self.turns.get(turn_id)
    }

    /// The session's running turn, if any
    pub fn active(&self) -> Option<&TurnState> {
        self.active.as_deref().and_then(|id| self.turns.get(id))
    }

    /// Turns in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = &TurnState> + '_ {
        self.order.iter().filter_map(|id| self.turns.get(id))
    }

    pub fn running_count(&self) -> usize {
        self.turns.values().filter(|turn| turn.is_running()).count()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
