//! Pure turn state transition function
//!
//! `running → {completed, cancelled, errored}`; the three terminal states
//! have no transitions out. The only exception is a synthetic "superseded"
//! outcome, which a late real terminal event replaces.

use super::{TurnState, TurnStatus};
use crate::protocol::{ErrorDetail, SessionId, TurnEvent, Usage};
use thiserror::Error;

/// Turn events that cannot be applied to the current turn state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnTransitionError {
    #[error("turn '{turn_id}' already received {event}")]
    Duplicate {
        turn_id: String,
        event: &'static str,
    },
    #[error("turn '{turn_id}' already ended as {status}; {event} ignored")]
    AlreadyFinished {
        turn_id: String,
        status: TurnStatus,
        event: &'static str,
    },
}

impl TurnTransitionError {
    /// Redelivery is expected under at-least-once delivery; a conflicting
    /// event is not
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, TurnTransitionError::Duplicate { .. })
    }
}

/// Pure transition function
///
/// Given the current state of the event's turn (or `None` when the turn is
/// unknown), returns the turn's next state. Terminal events for unknown
/// turns create the turn directly in its terminal state, so a lost
/// `turn_started` does not lose the outcome.
pub fn transition(
    current: Option<&TurnState>,
    event: &TurnEvent,
) -> Result<TurnState, TurnTransitionError> {
    match (current, event) {
        (
            None,
            TurnEvent::TurnStarted {
                turn_id,
                session_id,
                model_id,
                provider_id,
            },
        ) => Ok(TurnState::running(
            turn_id.clone(),
            session_id.clone(),
            Some(model_id.clone()),
            Some(provider_id.clone()),
        )),

        // A late turn_started fills in what an implicitly started turn lacked.
        // A stray turn recorded as superseded keeps its synthetic outcome.
        (
            Some(turn),
            TurnEvent::TurnStarted {
                model_id,
                provider_id,
                ..
            },
        ) if turn.implicit && (turn.is_running() || turn.has_synthetic_outcome()) => {
            Ok(TurnState {
                model_id: Some(model_id.clone()),
                provider_id: Some(provider_id.clone()),
                implicit: false,
                ..turn.clone()
            })
        }

        (Some(turn), TurnEvent::TurnStarted { .. }) if turn.is_running() => {
            Err(TurnTransitionError::Duplicate {
                turn_id: turn.turn_id.clone(),
                event: event.name(),
            })
        }

        (Some(turn), TurnEvent::TurnStarted { .. }) => Err(TurnTransitionError::AlreadyFinished {
            turn_id: turn.turn_id.clone(),
            status: turn.status,
            event: event.name(),
        }),

        (Some(turn), TurnEvent::TurnComplete { .. } | TurnEvent::TurnError { .. })
            if turn.status.is_terminal() && !turn.has_synthetic_outcome() =>
        {
            if same_outcome(turn, event) {
                Err(TurnTransitionError::Duplicate {
                    turn_id: turn.turn_id.clone(),
                    event: event.name(),
                })
            } else {
                Err(TurnTransitionError::AlreadyFinished {
                    turn_id: turn.turn_id.clone(),
                    status: turn.status,
                    event: event.name(),
                })
            }
        }

        (
            current,
            TurnEvent::TurnComplete {
                turn_id,
                session_id,
                status,
                usage,
            },
        ) => Ok(finish(
            current,
            turn_id,
            session_id,
            (*status).into(),
            *usage,
            None,
        )),

        (
            current,
            TurnEvent::TurnError {
                turn_id,
                session_id,
                error_code,
                error_message,
            },
        ) => Ok(finish(
            current,
            turn_id,
            session_id,
            TurnStatus::Errored,
            None,
            Some(ErrorDetail::new(error_code.clone(), error_message.clone())),
        )),
    }
}

fn finish(
    current: Option<&TurnState>,
    turn_id: &str,
    session_id: &SessionId,
    status: TurnStatus,
    usage: Option<Usage>,
    error: Option<ErrorDetail>,
) -> TurnState {
    let base = current.cloned().unwrap_or_else(|| TurnState {
        implicit: true,
        ..TurnState::running(turn_id, session_id.clone(), None, None)
    });
    TurnState {
        status,
        usage: usage.or(base.usage),
        error,
        ..base
    }
}

fn same_outcome(turn: &TurnState, event: &TurnEvent) -> bool {
    match event {
        TurnEvent::TurnComplete { status, .. } => turn.status == TurnStatus::from(*status),
        TurnEvent::TurnError { error_code, .. } => {
            turn.status == TurnStatus::Errored
                && turn
                    .error
                    .as_ref()
                    .is_some_and(|error| &error.code == error_code)
        }
        TurnEvent::TurnStarted { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TurnOutcome;

    fn session() -> SessionId {
        SessionId::new("claude", "s1")
    }

    fn started(turn_id: &str) -> TurnEvent {
        TurnEvent::TurnStarted {
            turn_id: turn_id.to_string(),
            session_id: session(),
            model_id: "sonnet".to_string(),
            provider_id: "anthropic".to_string(),
        }
    }

    fn complete(turn_id: &str, status: TurnOutcome) -> TurnEvent {
        TurnEvent::TurnComplete {
            turn_id: turn_id.to_string(),
            session_id: session(),
            status,
            usage: Some(Usage {
                input_tokens: 100,
                output_tokens: 20,
                ..Usage::default()
            }),
        }
    }

    fn errored(turn_id: &str) -> TurnEvent {
        TurnEvent::TurnError {
            turn_id: turn_id.to_string(),
            session_id: session(),
            error_code: "provider_crash".to_string(),
            error_message: "provider exited".to_string(),
        }
    }

    #[test]
    fn started_turn_is_running() {
        let turn = transition(None, &started("t1")).unwrap();
        assert_eq!(turn.status, TurnStatus::Running);
        assert_eq!(turn.model_id.as_deref(), Some("sonnet"));
        assert!(!turn.implicit);
    }

    #[test]
    fn completion_records_usage() {
        let running = transition(None, &started("t1")).unwrap();
        let done = transition(Some(&running), &complete("t1", TurnOutcome::Completed)).unwrap();
        assert_eq!(done.status, TurnStatus::Completed);
        assert_eq!(done.usage.map(|u| u.total_tokens()), Some(120));
        assert_eq!(done.model_id.as_deref(), Some("sonnet"));
    }

    #[test]
    fn cancellation_and_error_are_terminal() {
        let running = transition(None, &started("t1")).unwrap();
        let cancelled = transition(Some(&running), &complete("t1", TurnOutcome::Cancelled)).unwrap();
        assert_eq!(cancelled.status, TurnStatus::Cancelled);

        let failed = transition(Some(&running), &errored("t1")).unwrap();
        assert_eq!(failed.status, TurnStatus::Errored);
        assert_eq!(failed.error.as_ref().map(|e| e.code.as_str()), Some("provider_crash"));

        assert!(matches!(
            transition(Some(&cancelled), &errored("t1")),
            Err(TurnTransitionError::AlreadyFinished {
                status: TurnStatus::Cancelled,
                ..
            })
        ));
        assert!(matches!(
            transition(Some(&cancelled), &started("t1")),
            Err(TurnTransitionError::AlreadyFinished { .. })
        ));
    }

    #[test]
    fn repeated_events_are_duplicates() {
        let running = transition(None, &started("t1")).unwrap();
        assert!(matches!(
            transition(Some(&running), &started("t1")),
            Err(TurnTransitionError::Duplicate { .. })
        ));

        let done = transition(Some(&running), &complete("t1", TurnOutcome::Completed)).unwrap();
        assert!(matches!(
            transition(Some(&done), &complete("t1", TurnOutcome::Completed)),
            Err(TurnTransitionError::Duplicate { .. })
        ));
    }

    #[test]
    fn terminal_event_for_unknown_turn_is_recorded() {
        let turn = transition(None, &errored("t9")).unwrap();
        assert_eq!(turn.status, TurnStatus::Errored);
        assert!(turn.implicit);
        assert!(turn.model_id.is_none());
    }

    #[test]
    fn late_outcome_replaces_superseded_marker() {
        let running = transition(None, &started("t1")).unwrap();
        let superseded = running.supersede("t2");
        assert!(superseded.has_synthetic_outcome());

        let cancelled =
            transition(Some(&superseded), &complete("t1", TurnOutcome::Cancelled)).unwrap();
        assert_eq!(cancelled.status, TurnStatus::Cancelled);
        assert!(cancelled.error.is_none());
        assert!(cancelled.superseded);
        assert!(!cancelled.has_synthetic_outcome());

        assert!(transition(Some(&cancelled), &errored("t1")).is_err());
    }

    #[test]
    fn late_start_completes_implicit_turn() {
        let implicit = TurnState {
            implicit: true,
            ..TurnState::running("t1", session(), None, None)
        };
        let known = transition(Some(&implicit), &started("t1")).unwrap();
        assert!(!known.implicit);
        assert!(known.is_running());
        assert_eq!(known.provider_id.as_deref(), Some("anthropic"));
    }

    #[test]
    fn only_conflicting_events_are_anomalies() {
        let running = transition(None, &started("t1")).unwrap();
        let duplicate = transition(Some(&running), &started("t1")).unwrap_err();
        assert!(!duplicate.is_anomaly());

        let done = transition(Some(&running), &complete("t1", TurnOutcome::Completed)).unwrap();
        let conflict = transition(Some(&done), &errored("t1")).unwrap_err();
        assert!(conflict.is_anomaly());
    }

    #[test]
    fn late_start_of_superseded_stray_turn_keeps_its_outcome() {
        let stray = TurnState {
            implicit: true,
            ..TurnState::running("t1", session(), None, None)
        }
        .supersede("t2");
        let known = transition(Some(&stray), &started("t1")).unwrap();
        assert!(!known.implicit);
        assert!(!known.is_running());
        assert!(known.has_synthetic_outcome());
        assert_eq!(known.model_id.as_deref(), Some("sonnet"));
    }
}
