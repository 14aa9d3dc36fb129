//! Turn state types

use crate::protocol::{ErrorDetail, SessionId, TurnOutcome, Usage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error code recorded on a turn that was replaced by a newer `turn_started`
/// before its own terminal event was observed
pub const TURN_SUPERSEDED: &str = "turn_superseded";

/// Lifecycle status of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Running,
    Completed,
    Cancelled,
    Errored,
}

impl TurnStatus {
    /// Everything but `Running` is terminal; there are no transitions out
    pub fn is_terminal(self) -> bool {
        !matches!(self, TurnStatus::Running)
    }

    /// Ended without completing normally
    pub fn is_abnormal(self) -> bool {
        matches!(self, TurnStatus::Cancelled | TurnStatus::Errored)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnStatus::Running => "running",
            TurnStatus::Completed => "completed",
            TurnStatus::Cancelled => "cancelled",
            TurnStatus::Errored => "errored",
        }
    }
}

impl From<TurnOutcome> for TurnStatus {
    fn from(outcome: TurnOutcome) -> Self {
        match outcome {
            TurnOutcome::Completed => TurnStatus::Completed,
            TurnOutcome::Cancelled => TurnStatus::Cancelled,
        }
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one turn within a session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnState {
    pub turn_id: String,
    pub session_id: SessionId,
    pub status: TurnStatus,
    pub model_id: Option<String>,
    pub provider_id: Option<String>,
    pub usage: Option<Usage>,
    pub error: Option<ErrorDetail>,
    /// Items that referenced this turn, in first-seen order
    pub item_ids: Vec<String>,
    /// A newer turn started while this one was still running
    pub superseded: bool,
    /// Created without an observed `turn_started`
    pub implicit: bool,
}

impl TurnState {
    pub fn running(
        turn_id: impl Into<String>,
        session_id: SessionId,
        model_id: Option<String>,
        provider_id: Option<String>,
    ) -> Self {
        Self {
            turn_id: turn_id.into(),
            session_id,
            status: TurnStatus::Running,
            model_id,
            provider_id,
            usage: None,
            error: None,
            item_ids: Vec::new(),
            superseded: false,
            implicit: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == TurnStatus::Running
    }

    /// Terminal outcome was synthesized because a newer turn started; a late
    /// real terminal event may still replace it
    pub fn has_synthetic_outcome(&self) -> bool {
        self.superseded
            && self.status == TurnStatus::Errored
            && self
                .error
                .as_ref()
                .is_some_and(|error| error.code == TURN_SUPERSEDED)
    }

    /// Mark this running turn as replaced by `next_turn_id`
    pub fn supersede(&self, next_turn_id: &str) -> Self {
        Self {
            status: TurnStatus::Errored,
            error: Some(ErrorDetail::new(
                TURN_SUPERSEDED,
                format!("turn {next_turn_id} started before this turn reported an outcome"),
            )),
            superseded: true,
            ..self.clone()
        }
    }
}
